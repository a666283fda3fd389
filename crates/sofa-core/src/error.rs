#[derive(Debug, thiserror::Error)]
pub enum SofaError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("transport failure: {0}")]
    Transport(String),
}

pub type SofaResult<T> = Result<T, SofaError>;

impl SofaError {
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }

    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }
}
