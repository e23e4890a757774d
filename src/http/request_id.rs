//! Request ID and timing middleware

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::util::time::Timer;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");
pub const X_DURATION_MS: HeaderName = HeaderName::from_static("x-duration-ms");

tokio::task_local! {
    static REQUEST_ID: String;
}

/// ID of the request being served by the current task, if any
pub fn current_request_id() -> Option<String> {
    REQUEST_ID.try_with(Clone::clone).ok()
}

/// Request ID available to handlers through `Extension<RequestId>`
#[derive(Debug, Clone)]
pub struct RequestId(pub String);

/// Reuse the caller's `x-request-id` or mint a UUIDv4, run the request
/// inside a span carrying it, and stamp `x-request-id` / `x-duration-ms`
/// on the response.
pub async fn request_id_timing(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(&X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    request.extensions_mut().insert(RequestId(request_id.clone()));

    let span = info_span!("request", request_id = %request_id, method = %method, path = %path);
    let timer = Timer::new();
    let request_timer = timer.clone();

    let mut response = REQUEST_ID
        .scope(request_id.clone(), async move {
            info!(method = %method, path = %path, "Request started");
            let response = next.run(request).await;
            info!(
                method = %method,
                path = %path,
                status_code = response.status().as_u16(),
                duration_ms = request_timer.elapsed_ms(),
                "Request completed"
            );
            response
        })
        .instrument(span)
        .await;

    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        headers.insert(X_REQUEST_ID, value);
    }
    headers.insert(X_DURATION_MS, HeaderValue::from(timer.elapsed_ms()));

    response
}
