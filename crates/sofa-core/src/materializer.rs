use bytes::Bytes;
use http::header::ETAG;
use http::{HeaderMap, Method, StatusCode, Uri};
use percent_encoding::percent_decode_str;
use serde::de::DeserializeOwned;

use crate::error::SofaResult;
use crate::response::{BulkResponse, BulkRow, EntityResponse};
use crate::serializer::Serializer;

/// A fully received HTTP response together with the request that produced it.
#[derive(Clone, Debug)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub request_method: Method,
    pub request_uri: String,
}

impl RawResponse {
    pub fn new(
        request_method: Method,
        request_uri: impl Into<String>,
        status: StatusCode,
        headers: HeaderMap,
        body: impl Into<Bytes>,
    ) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            request_method,
            request_uri: request_uri.into(),
        }
    }
}

/// Turns a raw response into a metadata-complete [`EntityResponse`].
///
/// Precedence for `id` and `rev`: the body always wins. When the body leaves
/// `id` blank it is taken from the last request URI segment, except for
/// POST where the server assigns it. When the body leaves `rev` blank it is
/// taken from the `ETag` header.
#[derive(Clone, Debug, Default)]
pub struct EntityResponseMaterializer<S> {
    serializer: S,
}

impl<S: Serializer> EntityResponseMaterializer<S> {
    pub fn new(serializer: S) -> Self {
        Self { serializer }
    }

    pub fn materialize<T: DeserializeOwned>(
        &self,
        response: &mut EntityResponse<T>,
        raw: RawResponse,
    ) -> SofaResult<()> {
        let RawResponse {
            headers,
            body,
            request_method,
            request_uri,
            ..
        } = raw;

        if response.request_method == Method::GET && response.is_success() {
            response.content = Some(self.serializer.deserialize::<T>(&body)?);
        }

        // Error pages from proxies are often not JSON; only 2xx bodies must decode.
        if let Err(error) = self.serializer.populate(response, &body) {
            if response.is_success() {
                return Err(error);
            }
            tracing::debug!(
                status = %response.status,
                %error,
                "error body carries no document metadata"
            );
        }
        set_missing_id_from_request_uri(response, &request_method, &request_uri);
        set_missing_rev_from_etag(response, &headers);
        Ok(())
    }
}

/// Decodes the per-row outcome array returned by `_bulk_docs`.
#[derive(Clone, Debug, Default)]
pub struct BulkResponseMaterializer<S> {
    serializer: S,
}

impl<S: Serializer> BulkResponseMaterializer<S> {
    pub fn new(serializer: S) -> Self {
        Self { serializer }
    }

    pub fn materialize(&self, response: &mut BulkResponse, raw: RawResponse) -> SofaResult<()> {
        if !response.is_success() {
            return Ok(());
        }
        response.rows = self.serializer.deserialize::<Vec<BulkRow>>(&raw.body)?;
        Ok(())
    }
}

fn set_missing_id_from_request_uri<T>(
    response: &mut EntityResponse<T>,
    request_method: &Method,
    request_uri: &str,
) {
    if !response.id.trim().is_empty() || request_method == Method::POST {
        return;
    }
    if let Some(id) = last_uri_segment(request_uri) {
        tracing::debug!(%request_uri, %id, "document id taken from request uri");
        response.id = id;
    }
}

fn set_missing_rev_from_etag<T>(response: &mut EntityResponse<T>, headers: &HeaderMap) {
    if !response.rev.trim().is_empty() {
        return;
    }
    if let Some(rev) = etag_revision(headers) {
        tracing::debug!(%rev, "document revision taken from etag");
        response.rev = rev;
    }
}

/// Last non-empty, percent-decoded path segment of `uri`.
pub fn last_uri_segment(uri: &str) -> Option<String> {
    let uri = uri.parse::<Uri>().ok()?;
    let segment = uri.path().trim_end_matches('/').rsplit('/').next()?;
    if segment.is_empty() {
        return None;
    }
    let decoded = percent_decode_str(segment).decode_utf8().ok()?;
    Some(decoded.into_owned())
}

/// Revision carried by the `ETag` header, with weak prefix and quotes removed.
pub fn etag_revision(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(ETAG)?.to_str().ok()?.trim();
    let raw = raw.strip_prefix("W/").unwrap_or(raw);
    let rev = raw.trim_matches('"').trim();
    if rev.is_empty() {
        return None;
    }
    Some(rev.to_string())
}
