use serde::{Deserialize, Serialize};

pub type DocumentId = String;
pub type Revision = String;

/// Reference to one stored version of a document.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentHeader {
    #[serde(rename = "_id")]
    id: DocumentId,
    #[serde(rename = "_rev")]
    rev: Revision,
}

impl DocumentHeader {
    pub fn new(id: impl Into<DocumentId>, rev: impl Into<Revision>) -> Self {
        Self {
            id: id.into(),
            rev: rev.into(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn rev(&self) -> &str {
        &self.rev
    }
}
