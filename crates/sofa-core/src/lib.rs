//! Transport-independent core of the sofa document client.
//!
//! Holds the request model (single and bulk), the typed response model and
//! the materializers that reconcile a raw HTTP response into an
//! [`EntityResponse`] with complete identity/revision metadata.

pub mod bulk;
pub mod error;
pub mod factory;
pub mod header;
pub mod materializer;
pub mod request;
pub mod response;
pub mod serializer;

pub use bulk::{BULK_DOCS_PATH, BulkRequest};
pub use error::{SofaError, SofaResult};
pub use factory::ResponseFactory;
pub use header::{DocumentHeader, DocumentId, Revision};
pub use materializer::{
    BulkResponseMaterializer, EntityResponseMaterializer, RawResponse, etag_revision,
    last_uri_segment,
};
pub use request::Request;
pub use response::{
    BulkResponse, BulkRow, EntityResponse, ErrorBody, MetadataTarget, ResponseOutcome,
};
pub use serializer::{JsonSerializer, Serializer};

pub use http::{HeaderMap, Method, StatusCode};
