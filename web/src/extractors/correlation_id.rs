use crate::middleware::request_id::REQUEST_ID_HEADER;
use axum::{extract::FromRequestParts, http::request::Parts};
use std::convert::Infallible;
use uuid::Uuid;

/// The id that ties a request to the broker events it produces. Read from the
/// `x-request-id` header, which the request id middleware guarantees.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CorrelationId(pub String);

impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Ok(CorrelationId(id))
    }
}

impl CorrelationId {
    pub(crate) fn as_str(&self) -> &str {
        &self.0
    }
}
