use serde::de::DeserializeOwned;

use crate::error::SofaResult;
use crate::materializer::{BulkResponseMaterializer, EntityResponseMaterializer, RawResponse};
use crate::response::{BulkResponse, EntityResponse, ErrorBody, ResponseOutcome};
use crate::serializer::Serializer;

/// Builds typed responses from raw ones: constructs the empty response from
/// status and method, carries the server error on failure, then hands the
/// body to the matching materializer exactly once.
#[derive(Clone, Debug, Default)]
pub struct ResponseFactory<S> {
    serializer: S,
    entity: EntityResponseMaterializer<S>,
    bulk: BulkResponseMaterializer<S>,
}

impl<S: Serializer + Clone> ResponseFactory<S> {
    pub fn new(serializer: S) -> Self {
        Self {
            entity: EntityResponseMaterializer::new(serializer.clone()),
            bulk: BulkResponseMaterializer::new(serializer.clone()),
            serializer,
        }
    }

    pub fn entity_response<T: DeserializeOwned>(
        &self,
        raw: RawResponse,
    ) -> SofaResult<EntityResponse<T>> {
        let mut response = EntityResponse::new(raw.request_method.clone(), raw.status);
        self.carry_failure(&mut response, &raw);
        self.entity.materialize(&mut response, raw)?;
        Ok(response)
    }

    pub fn bulk_response(&self, raw: RawResponse) -> SofaResult<BulkResponse> {
        let mut response = BulkResponse::new(raw.request_method.clone(), raw.status);
        self.carry_failure(&mut response, &raw);
        self.bulk.materialize(&mut response, raw)?;
        Ok(response)
    }

    fn carry_failure<R: ResponseOutcome>(&self, response: &mut R, raw: &RawResponse) {
        if response.is_success() {
            return;
        }
        match self.serializer.deserialize::<ErrorBody>(&raw.body) {
            Ok(body) => response.set_failure(body),
            Err(error) => {
                tracing::warn!(
                    status = %raw.status,
                    uri = %raw.request_uri,
                    %error,
                    "unreadable error body"
                );
                response.set_failure(ErrorBody {
                    error: raw.status.canonical_reason().map(str::to_string),
                    reason: Some(String::from_utf8_lossy(&raw.body).into_owned()),
                });
            }
        }
    }
}
