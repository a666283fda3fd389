use serde::Serialize;

use crate::error::{SofaError, SofaResult};
use crate::header::DocumentHeader;
use crate::request::Request;
use crate::serializer::{JsonSerializer, Serializer};

pub const BULK_DOCS_PATH: &str = "_bulk_docs";

#[derive(Serialize)]
struct Tombstone<'a> {
    #[serde(rename = "_id")]
    id: &'a str,
    #[serde(rename = "_rev")]
    rev: &'a str,
    #[serde(rename = "_deleted")]
    deleted: bool,
}

/// A batch of inserts, updates and deletes sent in one `_bulk_docs` call.
///
/// Entries are kept in insertion order. The server applies them in sequence,
/// so the order decides which revision wins when one batch touches the same
/// document twice. Tombstones are encoded with the batch's serializer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BulkRequest<S = JsonSerializer> {
    request: Request,
    documents: Vec<String>,
    serializer: S,
    /// Commit the whole batch or nothing. Default is `false`.
    pub all_or_nothing: bool,
    /// When `false` the server stores the given revisions instead of
    /// assigning new ones. Default is `true`.
    pub new_edits: bool,
}

impl<S: Default> Default for BulkRequest<S> {
    fn default() -> Self {
        Self::with_serializer(S::default())
    }
}

impl BulkRequest {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<S> BulkRequest<S> {
    pub fn with_serializer(serializer: S) -> Self {
        Self {
            request: Request::post(BULK_DOCS_PATH),
            documents: Vec::new(),
            serializer,
            all_or_nothing: false,
            new_edits: true,
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns a copy of the included documents in insertion order.
    pub fn documents(&self) -> Vec<String> {
        self.documents.clone()
    }

    /// Includes raw JSON documents for insert, update or delete. Entries are
    /// appended verbatim; well-formedness is left to the server.
    pub fn include<I, D>(&mut self, docs: I) -> &mut Self
    where
        I: IntoIterator<Item = D>,
        D: Into<String>,
    {
        self.documents.extend(docs.into_iter().map(Into::into));
        self
    }

    /// Renders the `_bulk_docs` payload.
    pub fn to_body(&self) -> String {
        // Entries stay unparsed so a malformed one is rejected by the server, not here.
        format!(
            "{{\"docs\":[{}],\"all_or_nothing\":{},\"new_edits\":{}}}",
            self.documents.join(","),
            self.all_or_nothing,
            self.new_edits
        )
    }
}

impl<S: Serializer> BulkRequest<S> {
    /// Includes one tombstone per header. Every header is validated before
    /// anything is appended.
    pub fn delete_many(&mut self, headers: &[DocumentHeader]) -> SofaResult<&mut Self> {
        if headers.is_empty() {
            return Err(SofaError::InvalidInput(
                "headers must contain at least one document header".to_string(),
            ));
        }

        let tombstones = headers
            .iter()
            .map(|header| self.tombstone(header.id(), header.rev()))
            .collect::<SofaResult<Vec<_>>>()?;

        Ok(self.include(tombstones))
    }

    pub fn delete(&mut self, id: &str, rev: &str) -> SofaResult<&mut Self> {
        let entry = self.tombstone(id, rev)?;
        Ok(self.include([entry]))
    }

    fn tombstone(&self, id: &str, rev: &str) -> SofaResult<String> {
        if id.trim().is_empty() {
            return Err(SofaError::InvalidInput(
                "id must not be empty or whitespace".to_string(),
            ));
        }
        if rev.trim().is_empty() {
            return Err(SofaError::InvalidInput(format!(
                "rev must not be empty or whitespace (id={id})"
            )));
        }

        let encoded = self.serializer.serialize(&Tombstone {
            id,
            rev,
            deleted: true,
        })?;
        String::from_utf8(encoded).map_err(|error| {
            SofaError::Serialization(format!("tombstone is not utf-8: {error}"))
        })
    }
}
