use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use sofa_core::{
    BulkRequest, BulkResponse, DocumentHeader, DocumentId, EntityResponse, JsonSerializer,
    MetadataTarget, Method, ResponseFactory, Revision, Serializer, SofaError, SofaResult,
};

use crate::config::{ClientConfig, encode_segment};
use crate::transport::{CouchTransport, HttpRequest, ReqwestTransport};

/// Response of an untyped write or read.
pub type DocumentResponse = EntityResponse<Value>;

/// Single-document and bulk access to one database.
///
/// Calls take `&self` and share no mutable state, so independent requests
/// may be in flight concurrently and complete in any order.
#[derive(Clone, Debug)]
pub struct DbClient<T, S = JsonSerializer> {
    config: ClientConfig,
    transport: T,
    serializer: S,
    responses: ResponseFactory<S>,
}

impl DbClient<ReqwestTransport> {
    pub fn from_env() -> Self {
        Self::new(ClientConfig::from_env(), ReqwestTransport::new())
    }
}

impl<T: CouchTransport> DbClient<T> {
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self::with_serializer(config, transport, JsonSerializer)
    }
}

impl<T, S> DbClient<T, S>
where
    T: CouchTransport,
    S: Serializer + Clone,
{
    pub fn with_serializer(config: ClientConfig, transport: T, serializer: S) -> Self {
        Self {
            config,
            transport,
            responses: ResponseFactory::new(serializer.clone()),
            serializer,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// GET `/{db}/{id}`, optionally pinned to `rev`.
    pub async fn get<E: DeserializeOwned>(
        &self,
        id: &str,
        rev: Option<&str>,
    ) -> SofaResult<EntityResponse<E>> {
        require_non_blank("id", id)?;
        let mut uri = self.config.document_url(id);
        if let Some(rev) = rev.filter(|rev| !rev.trim().is_empty()) {
            uri.push_str(&format!("?rev={}", encode_segment(rev)));
        }
        self.entity(HttpRequest::new(Method::GET, uri)).await
    }

    /// POST `/{db}`. The server assigns the id unless the entity carries `_id`.
    ///
    /// On success `content` echoes the entity with `_id`/`_rev` set to the
    /// stored version.
    pub async fn post<E: Serialize + DeserializeOwned>(
        &self,
        entity: &E,
    ) -> SofaResult<EntityResponse<E>> {
        let body = self.serializer.serialize(entity)?;
        self.write_entity(Method::POST, self.config.database_url(), body).await
    }

    /// PUT `/{db}/{id}`. Updates must carry the current `_rev` in the entity.
    pub async fn put<E: Serialize + DeserializeOwned>(
        &self,
        id: &str,
        entity: &E,
    ) -> SofaResult<EntityResponse<E>> {
        require_non_blank("id", id)?;
        let body = self.serializer.serialize(entity)?;
        self.write_entity(Method::PUT, self.config.document_url(id), body).await
    }

    /// PUT addressed by the entity's own `_id`.
    pub async fn put_entity<E: Serialize + DeserializeOwned>(
        &self,
        entity: &E,
    ) -> SofaResult<EntityResponse<E>> {
        let body = self.serializer.serialize(entity)?;
        let metadata = self.entity_metadata(&body)?;
        require_non_blank("id", &metadata.id)?;
        self.write_entity(Method::PUT, self.config.document_url(&metadata.id), body)
            .await
    }

    pub async fn post_json(&self, json: &str) -> SofaResult<DocumentResponse> {
        self.entity(
            HttpRequest::new(Method::POST, self.config.database_url())
                .with_json_body(json.as_bytes().to_vec()),
        )
        .await
    }

    pub async fn put_json(&self, id: &str, json: &str) -> SofaResult<DocumentResponse> {
        require_non_blank("id", id)?;
        self.entity(
            HttpRequest::new(Method::PUT, self.config.document_url(id))
                .with_json_body(json.as_bytes().to_vec()),
        )
        .await
    }

    /// DELETE `/{db}/{id}?rev={rev}`.
    pub async fn delete(&self, header: &DocumentHeader) -> SofaResult<DocumentResponse> {
        self.entity(self.delete_request(header)?).await
    }

    /// DELETE addressed by the entity's own `_id` and `_rev`. On success
    /// `content` echoes the entity carrying the tombstone revision.
    pub async fn delete_entity<E: Serialize + DeserializeOwned>(
        &self,
        entity: &E,
    ) -> SofaResult<EntityResponse<E>> {
        let body = self.serializer.serialize(entity)?;
        let metadata = self.entity_metadata(&body)?;
        let header = DocumentHeader::new(metadata.id, metadata.rev);
        let mut response = self.entity::<E>(self.delete_request(&header)?).await?;
        self.echo_entity(&mut response, &body)?;
        Ok(response)
    }

    /// POST `/{db}/_bulk_docs`.
    pub async fn bulk<B: Serializer>(&self, request: &BulkRequest<B>) -> SofaResult<BulkResponse> {
        if request.is_empty() {
            return Err(SofaError::InvalidInput(
                "bulk request must include at least one document".to_string(),
            ));
        }
        let logical = request.request();
        let http_request =
            HttpRequest::new(logical.method().clone(), self.config.endpoint(logical.path()))
                .with_json_body(request.to_body().into_bytes());
        tracing::debug!(
            documents = request.len(),
            all_or_nothing = request.all_or_nothing,
            new_edits = request.new_edits,
            "sending bulk request"
        );

        let raw = self.transport.send(http_request).await?;
        self.responses.bulk_response(raw)
    }

    async fn write_entity<E: DeserializeOwned>(
        &self,
        method: Method,
        uri: String,
        body: Vec<u8>,
    ) -> SofaResult<EntityResponse<E>> {
        let mut response = self
            .entity::<E>(HttpRequest::new(method, uri).with_json_body(body.clone()))
            .await?;
        self.echo_entity(&mut response, &body)?;
        Ok(response)
    }

    fn delete_request(&self, header: &DocumentHeader) -> SofaResult<HttpRequest> {
        require_non_blank("id", header.id())?;
        require_non_blank("rev", header.rev())?;
        let uri = format!(
            "{}?rev={}",
            self.config.document_url(header.id()),
            encode_segment(header.rev())
        );
        Ok(HttpRequest::new(Method::DELETE, uri))
    }

    fn entity_metadata(&self, body: &[u8]) -> SofaResult<EntityMetadata> {
        let mut metadata = EntityMetadata::default();
        self.serializer
            .populate(&mut metadata, body)
            .map_err(|error| {
                SofaError::InvalidInput(format!("entity has no readable metadata: {error}"))
            })?;
        Ok(metadata)
    }

    // Rebuilds the written entity with the stored id/rev so it can be written again.
    fn echo_entity<E: DeserializeOwned>(
        &self,
        response: &mut EntityResponse<E>,
        body: &[u8],
    ) -> SofaResult<()> {
        if !response.is_success() {
            return Ok(());
        }
        let mut value: Value = self.serializer.deserialize(body)?;
        if let Value::Object(object) = &mut value {
            if !response.id.trim().is_empty() {
                object.insert("_id".to_string(), Value::String(response.id.clone()));
            }
            if !response.rev.trim().is_empty() {
                object.insert("_rev".to_string(), Value::String(response.rev.clone()));
            }
        }
        let echoed = self.serializer.serialize(&value)?;
        response.content = Some(self.serializer.deserialize(&echoed)?);
        Ok(())
    }

    async fn entity<E: DeserializeOwned>(
        &self,
        request: HttpRequest,
    ) -> SofaResult<EntityResponse<E>> {
        let raw = self.transport.send(request).await?;
        let response = self.responses.entity_response::<E>(raw)?;
        if !response.is_success() {
            tracing::debug!(
                method = %response.request_method,
                status = %response.status,
                error = response.error.as_deref().unwrap_or_default(),
                id = %response.id,
                "request completed without success"
            );
        }
        Ok(response)
    }
}

#[derive(Debug, Default)]
struct EntityMetadata {
    id: DocumentId,
    rev: Revision,
}

impl MetadataTarget for EntityMetadata {
    fn set_id(&mut self, id: DocumentId) {
        self.id = id;
    }

    fn set_rev(&mut self, rev: Revision) {
        self.rev = rev;
    }

    fn set_deleted(&mut self, _deleted: bool) {}
}

fn require_non_blank(field: &str, value: &str) -> SofaResult<()> {
    if value.trim().is_empty() {
        return Err(SofaError::InvalidInput(format!(
            "{field} must not be empty or whitespace"
        )));
    }
    Ok(())
}
