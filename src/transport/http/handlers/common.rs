use crate::error::{ScrapeError, UpstreamError};
use crate::transport::http::types::ErrorBody;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;

pub fn status_for(err: &ScrapeError) -> StatusCode {
    match err {
        ScrapeError::Validation(_) => StatusCode::BAD_REQUEST,
        ScrapeError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        ScrapeError::Upstream(UpstreamError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        ScrapeError::Upstream(UpstreamError::Failed(_)) => StatusCode::BAD_GATEWAY,
        ScrapeError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Maps a service error to its HTTP response, keeping its structured fields.
pub fn error_response(err: ScrapeError) -> Response {
    let status = status_for(&err);
    let (remaining_seconds, next_run_at) = match &err {
        ScrapeError::RateLimited {
            remaining_seconds,
            next_run_at,
        } => (Some(*remaining_seconds), Some(*next_run_at)),
        _ => (None, None),
    };

    let body = ErrorBody {
        success: false,
        error: err.to_string(),
        kind: err.kind().to_string(),
        remaining_seconds,
        next_run_at,
    };

    let mut response = (status, Json(body)).into_response();
    if let Some(secs) = remaining_seconds {
        if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
    }
    response
}
