use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

pub const DEFAULT_COUCHDB_URL: &str = "http://127.0.0.1:5984";
pub const DEFAULT_DATABASE: &str = "sofa";

// Everything outside RFC 3986 unreserved characters, so an id always stays one segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b':')
    .add(b';')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'@')
    .add(b'[')
    .add(b'\\')
    .add(b']')
    .add(b'^')
    .add(b'`')
    .add(b'{')
    .add(b'|')
    .add(b'}')
    .add(b'&')
    .add(b'+')
    .add(b',')
    .add(b'$')
    .add(b'!')
    .add(b'\'')
    .add(b'(')
    .add(b')')
    .add(b'*');

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub database: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new(DEFAULT_COUCHDB_URL, DEFAULT_DATABASE)
    }
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            database: database.into(),
        }
    }

    pub fn from_env() -> Self {
        let base_url = env_value("SOFA_COUCHDB_URL")
            .or_else(|| env_value("COUCHDB_URL"))
            .unwrap_or_else(|| DEFAULT_COUCHDB_URL.to_string());
        let database =
            env_value("SOFA_DATABASE").unwrap_or_else(|| DEFAULT_DATABASE.to_string());
        Self::new(base_url, database)
    }

    pub fn database_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            encode_segment(self.database.trim_matches('/'))
        )
    }

    /// `path` is appended verbatim; use [`ClientConfig::document_url`] for ids.
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.database_url(), path.trim_start_matches('/'))
    }

    pub fn document_url(&self, id: &str) -> String {
        self.endpoint(&encode_segment(id))
    }
}

pub fn encode_segment(value: &str) -> String {
    utf8_percent_encode(value, SEGMENT).to_string()
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}
