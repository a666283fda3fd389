use crate::transport::{CouchTransport, HttpRequest};
use async_trait::async_trait;
use percent_encoding::percent_decode_str;
use serde_json::{Map, Value, json};
use sofa_core::{HeaderMap, Method, RawResponse, SofaError, SofaResult, StatusCode};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// In-memory stand-in for a CouchDB database, usable as a [`CouchTransport`].
///
/// The database segment of the request path is ignored; every request lands
/// in the same document space. Old revisions are not retained.
#[derive(Clone, Debug, Default)]
pub struct MockCouch {
    inner: Arc<Mutex<MockCouchState>>,
}

#[derive(Clone, Debug, Default)]
struct MockCouchState {
    next_generated_id: u64,
    documents: BTreeMap<String, MockDocument>,
    omit_write_id: bool,
    omit_write_rev: bool,
    requests: Vec<HttpRequest>,
}

#[derive(Clone, Debug)]
struct MockDocument {
    rev: String,
    body: Map<String, Value>,
    deleted: bool,
}

#[derive(Debug)]
enum WriteError {
    Conflict,
    BadRequest(String),
}

impl WriteError {
    fn into_row(self, id: &str) -> Value {
        match self {
            Self::Conflict => {
                json!({"id": id, "error": "conflict", "reason": "Document update conflict."})
            }
            Self::BadRequest(reason) => json!({"id": id, "error": "bad_request", "reason": reason}),
        }
    }

    fn into_response(self, request: &HttpRequest) -> RawResponse {
        match self {
            Self::Conflict => respond(
                request,
                StatusCode::CONFLICT,
                json!({"error": "conflict", "reason": "Document update conflict."}),
                None,
            ),
            Self::BadRequest(reason) => respond(
                request,
                StatusCode::BAD_REQUEST,
                json!({"error": "bad_request", "reason": reason}),
                None,
            ),
        }
    }
}

impl MockCouch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops `id` and/or `rev` from write response bodies, as some proxies
    /// and older servers do, leaving only the request URI and `ETag`.
    pub fn omit_write_metadata(&self, omit_id: bool, omit_rev: bool) -> SofaResult<()> {
        let mut state = self.lock()?;
        state.omit_write_id = omit_id;
        state.omit_write_rev = omit_rev;
        Ok(())
    }

    pub fn requests(&self) -> SofaResult<Vec<HttpRequest>> {
        Ok(self.lock()?.requests.clone())
    }

    pub fn current_rev(&self, id: &str) -> SofaResult<Option<String>> {
        Ok(self
            .lock()?
            .documents
            .get(id)
            .filter(|doc| !doc.deleted)
            .map(|doc| doc.rev.clone()))
    }

    pub fn document_count(&self) -> SofaResult<usize> {
        Ok(self
            .lock()?
            .documents
            .values()
            .filter(|doc| !doc.deleted)
            .count())
    }

    fn lock(&self) -> SofaResult<std::sync::MutexGuard<'_, MockCouchState>> {
        self.inner
            .lock()
            .map_err(|_| SofaError::Transport("mock couch mutex poisoned".to_string()))
    }
}

#[async_trait]
impl CouchTransport for MockCouch {
    async fn send(&self, request: HttpRequest) -> SofaResult<RawResponse> {
        let mut state = self.lock()?;
        state.requests.push(request.clone());

        let uri = request
            .uri
            .parse::<http::Uri>()
            .map_err(|err| SofaError::Transport(format!("invalid request uri: {err}")))?;
        let segments: Vec<String> = uri
            .path()
            .trim_matches('/')
            .split('/')
            .skip(1)
            .map(|segment| percent_decode_str(segment).decode_utf8_lossy().into_owned())
            .collect();
        let rev = query_value(uri.query(), "rev");

        let method = &request.method;
        let response = match segments.as_slice() {
            [] if method == Method::POST => state.post(&request),
            [path] if method == Method::POST && path == "_bulk_docs" => state.bulk(&request),
            [id] if method == Method::GET => state.get(&request, id, rev.as_deref()),
            [id] if method == Method::PUT => state.put(&request, id),
            [id] if method == Method::DELETE => state.delete(&request, id, rev.as_deref()),
            _ => respond(
                &request,
                StatusCode::METHOD_NOT_ALLOWED,
                json!({"error": "method_not_allowed", "reason": "unsupported by mock"}),
                None,
            ),
        };
        Ok(response)
    }
}

impl MockCouchState {
    fn generate_id(&mut self) -> String {
        self.next_generated_id += 1;
        format!("{:032x}", self.next_generated_id)
    }

    fn write_body(&self, id: &str, rev: &str) -> Value {
        let mut body = Map::new();
        body.insert("ok".to_string(), Value::Bool(true));
        if !self.omit_write_id {
            body.insert("id".to_string(), Value::String(id.to_string()));
        }
        if !self.omit_write_rev {
            body.insert("rev".to_string(), Value::String(rev.to_string()));
        }
        Value::Object(body)
    }

    fn get(&self, request: &HttpRequest, id: &str, rev: Option<&str>) -> RawResponse {
        let Some(doc) = self.documents.get(id) else {
            return not_found(request, "missing");
        };
        if doc.deleted {
            return not_found(request, "deleted");
        }
        if rev.is_some_and(|rev| rev != doc.rev) {
            return not_found(request, "missing");
        }

        let mut body = doc.body.clone();
        body.insert("_id".to_string(), Value::String(id.to_string()));
        body.insert("_rev".to_string(), Value::String(doc.rev.clone()));
        respond(request, StatusCode::OK, Value::Object(body), Some(&doc.rev))
    }

    fn post(&mut self, request: &HttpRequest) -> RawResponse {
        let body = match parse_object(request.body.as_deref()) {
            Ok(body) => body,
            Err(error) => return error.into_response(request),
        };
        let id = match body.get("_id").and_then(Value::as_str) {
            Some(id) => id.to_string(),
            None => self.generate_id(),
        };
        match write(&mut self.documents, &id, body, true) {
            Ok(rev) => respond(request, StatusCode::CREATED, self.write_body(&id, &rev), None),
            Err(error) => error.into_response(request),
        }
    }

    fn put(&mut self, request: &HttpRequest, id: &str) -> RawResponse {
        let body = match parse_object(request.body.as_deref()) {
            Ok(body) => body,
            Err(error) => return error.into_response(request),
        };
        match write(&mut self.documents, id, body, true) {
            Ok(rev) => respond(
                request,
                StatusCode::CREATED,
                self.write_body(id, &rev),
                Some(&rev),
            ),
            Err(error) => error.into_response(request),
        }
    }

    fn delete(&mut self, request: &HttpRequest, id: &str, rev: Option<&str>) -> RawResponse {
        let Some(current) = self.documents.get(id).filter(|doc| !doc.deleted) else {
            return not_found(request, "missing");
        };
        if rev != Some(current.rev.as_str()) {
            return WriteError::Conflict.into_response(request);
        }

        let new_rev = next_rev(Some(&current.rev), &Map::new());
        self.documents.insert(
            id.to_string(),
            MockDocument {
                rev: new_rev.clone(),
                body: Map::new(),
                deleted: true,
            },
        );
        respond(
            request,
            StatusCode::OK,
            self.write_body(id, &new_rev),
            Some(&new_rev),
        )
    }

    fn bulk(&mut self, request: &HttpRequest) -> RawResponse {
        let payload = match parse_object(request.body.as_deref()) {
            Ok(payload) => payload,
            Err(error) => return error.into_response(request),
        };
        let Some(docs) = payload.get("docs").and_then(Value::as_array).cloned() else {
            return WriteError::BadRequest("`docs` array is required".to_string())
                .into_response(request);
        };
        let all_or_nothing = payload
            .get("all_or_nothing")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let new_edits = payload
            .get("new_edits")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        let mut staged = self.documents.clone();
        let mut rows = Vec::with_capacity(docs.len());
        let mut failed = false;
        for doc in docs {
            let Value::Object(body) = doc else {
                failed = true;
                rows.push(
                    WriteError::BadRequest("document must be a json object".to_string())
                        .into_row(""),
                );
                continue;
            };
            let id = match body.get("_id").and_then(Value::as_str) {
                Some(id) => id.to_string(),
                None => self.generate_id(),
            };
            match write(&mut staged, &id, body, new_edits) {
                Ok(rev) => rows.push(json!({"ok": true, "id": id, "rev": rev})),
                Err(error) => {
                    failed = true;
                    rows.push(error.into_row(&id));
                }
            }
        }

        if all_or_nothing && failed {
            return respond(
                request,
                StatusCode::EXPECTATION_FAILED,
                json!({
                    "error": "expectation_failed",
                    "reason": "one or more documents failed, nothing was written"
                }),
                None,
            );
        }
        self.documents = staged;
        respond(request, StatusCode::CREATED, Value::Array(rows), None)
    }
}

fn write(
    documents: &mut BTreeMap<String, MockDocument>,
    id: &str,
    mut body: Map<String, Value>,
    new_edits: bool,
) -> Result<String, WriteError> {
    if id.trim().is_empty() {
        return Err(WriteError::BadRequest("document id must not be empty".to_string()));
    }
    body.remove("_id");
    let supplied_rev = match body.remove("_rev") {
        Some(Value::String(rev)) => Some(rev),
        Some(_) => return Err(WriteError::BadRequest("`_rev` must be a string".to_string())),
        None => None,
    };
    let deleted = body
        .remove("_deleted")
        .and_then(|value| value.as_bool())
        .unwrap_or(false);

    let rev = if new_edits {
        let live = documents.get(id).filter(|doc| !doc.deleted);
        match (live, supplied_rev.as_deref()) {
            (Some(doc), Some(rev)) if rev == doc.rev => {}
            (None, None) => {}
            (None, Some(_)) if documents.contains_key(id) => {}
            _ => return Err(WriteError::Conflict),
        }
        let previous = documents.get(id).map(|doc| doc.rev.as_str());
        next_rev(previous, &body)
    } else {
        supplied_rev.ok_or_else(|| {
            WriteError::BadRequest("`_rev` is required when new_edits is false".to_string())
        })?
    };

    documents.insert(
        id.to_string(),
        MockDocument {
            rev: rev.clone(),
            body: if deleted { Map::new() } else { body },
            deleted,
        },
    );
    Ok(rev)
}

fn next_rev(previous: Option<&str>, body: &Map<String, Value>) -> String {
    let generation = previous
        .and_then(|rev| rev.split('-').next())
        .and_then(|value| value.parse::<u64>().ok())
        .unwrap_or(0)
        + 1;
    let encoded = serde_json::to_vec(body).unwrap_or_default();
    let mut seed = generation.to_le_bytes().to_vec();
    seed.extend_from_slice(&encoded);
    let digest = blake3::hash(&seed).to_hex();
    format!("{generation}-{}", &digest.as_str()[..32])
}

fn parse_object(body: Option<&[u8]>) -> Result<Map<String, Value>, WriteError> {
    let bytes = body.ok_or_else(|| WriteError::BadRequest("request body is required".to_string()))?;
    match serde_json::from_slice::<Value>(bytes) {
        Ok(Value::Object(object)) => Ok(object),
        Ok(_) => Err(WriteError::BadRequest(
            "request body must be a json object".to_string(),
        )),
        Err(err) => Err(WriteError::BadRequest(format!("invalid json: {err}"))),
    }
}

fn query_value(query: Option<&str>, key: &str) -> Option<String> {
    query?.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name == key).then(|| percent_decode_str(value).decode_utf8_lossy().into_owned())
    })
}

fn not_found(request: &HttpRequest, reason: &str) -> RawResponse {
    respond(
        request,
        StatusCode::NOT_FOUND,
        json!({"error": "not_found", "reason": reason}),
        None,
    )
}

fn respond(
    request: &HttpRequest,
    status: StatusCode,
    body: Value,
    etag: Option<&str>,
) -> RawResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    let etag = etag.and_then(|rev| http::HeaderValue::from_str(&format!("\"{rev}\"")).ok());
    if let Some(value) = etag {
        headers.insert(http::header::ETAG, value);
    }
    RawResponse::new(
        request.method.clone(),
        request.uri.clone(),
        status,
        headers,
        body.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(method: Method, uri: &str, body: Option<&str>) -> HttpRequest {
        let request = HttpRequest::new(method, uri);
        match body {
            Some(body) => request.with_json_body(body.as_bytes().to_vec()),
            None => request,
        }
    }

    #[tokio::test(flavor = "current_thread")]
    async fn put_then_stale_put_expected_conflict() {
        let couch = MockCouch::new();

        let created = couch
            .send(request(Method::PUT, "http://mock/db/a", Some(r#"{"n":1}"#)))
            .await
            .expect("put should respond");
        assert_eq!(created.status, StatusCode::CREATED);

        let stale = couch
            .send(request(
                Method::PUT,
                "http://mock/db/a",
                Some(r#"{"_rev":"1-00000000000000000000000000000000","n":2}"#),
            ))
            .await
            .expect("put should respond");
        assert_eq!(stale.status, StatusCode::CONFLICT);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn get_after_put_expected_etag_matches_rev() {
        let couch = MockCouch::new();
        couch
            .send(request(Method::PUT, "http://mock/db/a", Some(r#"{"n":1}"#)))
            .await
            .expect("put should respond");
        let rev = couch
            .current_rev("a")
            .expect("state readable")
            .expect("document stored");

        let fetched = couch
            .send(request(Method::GET, "http://mock/db/a", None))
            .await
            .expect("get should respond");

        assert_eq!(fetched.status, StatusCode::OK);
        assert_eq!(sofa_core::etag_revision(&fetched.headers), Some(rev));
        assert!(rev_has_generation(&fetched, 1));
    }

    #[test]
    fn next_rev_expected_incremented_generation() {
        let first = next_rev(None, &Map::new());
        let second = next_rev(Some(&first), &Map::new());

        assert!(first.starts_with("1-"));
        assert!(second.starts_with("2-"));
        assert_eq!(second.len(), "2-".len() + 32);
    }

    #[test]
    fn query_value_encoded_rev_expected_decoded() {
        assert_eq!(
            query_value(Some("batch=ok&rev=1-%61bc"), "rev").as_deref(),
            Some("1-abc")
        );
        assert_eq!(query_value(None, "rev"), None);
    }

    fn rev_has_generation(response: &RawResponse, generation: u64) -> bool {
        serde_json::from_slice::<Value>(&response.body)
            .ok()
            .and_then(|body| body.get("_rev").and_then(Value::as_str).map(str::to_string))
            .is_some_and(|rev| rev.starts_with(&format!("{generation}-")))
    }
}
