#![doc = r#"
HTTP access layer for CouchDB-style document databases.

Operation mapping:

| Client method | HTTP call | Success body |
| --- | --- | --- |
| `DbClient::get` | `GET /{db}/{id}[?rev=]` | full document |
| `DbClient::post` / `post_json` | `POST /{db}` | `{"ok":true,"id":..,"rev":..}` |
| `DbClient::put` / `put_entity` / `put_json` | `PUT /{db}/{id}` | `{"ok":true,"id":..,"rev":..}` |
| `DbClient::delete` / `delete_entity` | `DELETE /{db}/{id}?rev=` | `{"ok":true,"id":..,"rev":..}` |
| `DbClient::bulk` | `POST /{db}/_bulk_docs` | `[{"id":..,"rev":..} / {"id":..,"error":..}]` |

Implementation notes:
- Non-2xx statuses come back as responses with `is_success() == false`; only
  failures to complete the exchange are `SofaError::Transport`.
- Body metadata wins; `id` falls back to the request URI (never for POST) and
  `rev` falls back to the `ETag` header.
- Document ids are percent-encoded as a single path segment.
- Typed writes echo the entity back as `content` with the stored `_id`/`_rev`.
"#]

pub mod client;
pub mod config;
pub mod testing;
pub mod transport;

pub use client::{DbClient, DocumentResponse};
pub use config::{ClientConfig, DEFAULT_COUCHDB_URL, DEFAULT_DATABASE};
pub use testing::MockCouch;
pub use transport::{CouchTransport, HttpRequest, ReqwestTransport};

pub use sofa_core::{
    BulkRequest, BulkResponse, BulkRow, DocumentHeader, EntityResponse, JsonSerializer, Method,
    Serializer, SofaError, SofaResult, StatusCode,
};
