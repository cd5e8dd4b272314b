use axum::{
    extract::Request,
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use uuid::Uuid;

/// Header carrying the correlation id of a request, echoed on every response.
pub(crate) const REQUEST_ID_HEADER: &str = "x-request-id";

const MAX_REQUEST_ID_LEN: usize = 128;

/// Makes sure every request carries a usable `x-request-id` and that the
/// response echoes it. A missing or unusable client value is replaced with a
/// fresh UUID.
pub(crate) async fn ensure_request_id(mut request: Request, next: Next) -> Response {
    let request_id = match client_request_id(request.headers()) {
        Some(value) => value,
        None => {
            let generated = HeaderValue::from_str(&Uuid::new_v4().to_string())
                .unwrap_or_else(|_| HeaderValue::from_static("unknown"));
            request
                .headers_mut()
                .insert(REQUEST_ID_HEADER, generated.clone());
            generated
        }
    };

    let mut response = next.run(request).await;
    response.headers_mut().insert(REQUEST_ID_HEADER, request_id);
    response
}

fn client_request_id(headers: &HeaderMap) -> Option<HeaderValue> {
    headers
        .get(REQUEST_ID_HEADER)
        .filter(|value| {
            value
                .to_str()
                .map(|s| !s.trim().is_empty() && s.len() <= MAX_REQUEST_ID_LEN)
                .unwrap_or(false)
        })
        .cloned()
}
