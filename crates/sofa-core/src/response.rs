use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};

use crate::header::{DocumentHeader, DocumentId, Revision};

/// Error body returned by the server on non-2xx statuses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Fields every response carries regardless of payload.
pub trait ResponseOutcome {
    fn status(&self) -> StatusCode;
    fn request_method(&self) -> &Method;
    fn set_failure(&mut self, body: ErrorBody);

    fn is_success(&self) -> bool {
        self.status().is_success()
    }
}

/// Metadata slots the serializer may fill from a response body.
pub trait MetadataTarget {
    fn set_id(&mut self, id: DocumentId);
    fn set_rev(&mut self, rev: Revision);
    fn set_deleted(&mut self, deleted: bool);
}

/// Result of a single-document operation.
#[derive(Clone, Debug, PartialEq)]
pub struct EntityResponse<T> {
    pub status: StatusCode,
    pub request_method: Method,
    pub error: Option<String>,
    pub reason: Option<String>,
    /// Full document snapshot. Only decoded for successful reads.
    pub content: Option<T>,
    pub id: DocumentId,
    pub rev: Revision,
    pub deleted: bool,
}

impl<T> EntityResponse<T> {
    pub fn new(request_method: Method, status: StatusCode) -> Self {
        Self {
            status,
            request_method,
            error: None,
            reason: None,
            content: None,
            id: DocumentId::new(),
            rev: Revision::new(),
            deleted: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn is_conflict(&self) -> bool {
        self.status == StatusCode::CONFLICT
    }

    /// The `(id, rev)` pair, when both are known.
    pub fn header(&self) -> Option<DocumentHeader> {
        if self.id.trim().is_empty() || self.rev.trim().is_empty() {
            return None;
        }
        Some(DocumentHeader::new(self.id.clone(), self.rev.clone()))
    }
}

impl<T> ResponseOutcome for EntityResponse<T> {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn request_method(&self) -> &Method {
        &self.request_method
    }

    fn set_failure(&mut self, body: ErrorBody) {
        self.error = body.error;
        self.reason = body.reason;
    }
}

impl<T> MetadataTarget for EntityResponse<T> {
    fn set_id(&mut self, id: DocumentId) {
        self.id = id;
    }

    fn set_rev(&mut self, rev: Revision) {
        self.rev = rev;
    }

    fn set_deleted(&mut self, deleted: bool) {
        self.deleted = deleted;
    }
}

/// Per-document outcome of a `_bulk_docs` call.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkRow {
    pub id: DocumentId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rev: Option<Revision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl BulkRow {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    pub fn is_conflict(&self) -> bool {
        self.error.as_deref() == Some("conflict")
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BulkResponse {
    pub status: StatusCode,
    pub request_method: Method,
    pub error: Option<String>,
    pub reason: Option<String>,
    pub rows: Vec<BulkRow>,
}

impl BulkResponse {
    pub fn new(request_method: Method, status: StatusCode) -> Self {
        Self {
            status,
            request_method,
            error: None,
            reason: None,
            rows: Vec::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn conflicts(&self) -> impl Iterator<Item = &BulkRow> {
        self.rows.iter().filter(|row| row.is_conflict())
    }

    pub fn failed_rows(&self) -> impl Iterator<Item = &BulkRow> {
        self.rows.iter().filter(|row| !row.is_success())
    }
}

impl ResponseOutcome for BulkResponse {
    fn status(&self) -> StatusCode {
        self.status
    }

    fn request_method(&self) -> &Method {
        &self.request_method
    }

    fn set_failure(&mut self, body: ErrorBody) {
        self.error = body.error;
        self.reason = body.reason;
    }
}
