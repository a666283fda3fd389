use async_trait::async_trait;
use sofa_core::{Method, RawResponse, SofaError, SofaResult};
use std::sync::Arc;

pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Outgoing HTTP exchange as seen by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub uri: String,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            body: None,
        }
    }

    pub fn with_json_body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }
}

/// Sends one request and returns the fully buffered response. Non-2xx
/// statuses are responses, not errors; only failures to complete the
/// exchange map to [`SofaError::Transport`].
#[async_trait]
pub trait CouchTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> SofaResult<RawResponse>;
}

#[async_trait]
impl<T> CouchTransport for Arc<T>
where
    T: CouchTransport + ?Sized,
{
    async fn send(&self, request: HttpRequest) -> SofaResult<RawResponse> {
        (**self).send(request).await
    }
}

#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl CouchTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> SofaResult<RawResponse> {
        let HttpRequest { method, uri, body } = request;
        tracing::trace!(%method, %uri, "sending request");

        let mut builder = self
            .client
            .request(method.clone(), &uri)
            .header(reqwest::header::ACCEPT, JSON_CONTENT_TYPE);
        if let Some(body) = body {
            builder = builder
                .header(reqwest::header::CONTENT_TYPE, JSON_CONTENT_TYPE)
                .body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| SofaError::Transport(format!("http {method} failed: {err}")))?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|err| SofaError::Transport(format!("http read body failed: {err}")))?;
        tracing::trace!(%method, %uri, %status, bytes = body.len(), "received response");

        Ok(RawResponse::new(method, uri, status, headers, body))
    }
}
