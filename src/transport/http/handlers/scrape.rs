use crate::transport::http::handlers::common::error_response;
use crate::transport::http::types::{json_422, AppState, ClientQuery, TriggerRequest};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

#[utoipa::path(
    get,
    path = "/scrape/{app}/status",
    params(
        ("app" = String, Path, description = "Target application name"),
        ClientQuery
    ),
    responses(
        (status = 200, description = "Current admission state (no side effects)", body = crate::app::scrape_service::ScrapeStatus),
        (status = 400, description = "Malformed client_id or app", body = crate::transport::http::types::ErrorBody),
        (status = 503, description = "Storage unavailable", body = crate::transport::http::types::ErrorBody)
    )
)]
pub async fn status_handler(
    State(state): State<AppState>,
    Path(app): Path<String>,
    Query(query): Query<ClientQuery>,
) -> impl IntoResponse {
    match state.service.status(&query.client_id, &app).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => error_response(e),
    }
}

#[utoipa::path(
    post,
    path = "/scrape/{app}/trigger",
    params(("app" = String, Path, description = "Target application name")),
    request_body = TriggerRequest,
    responses(
        (status = 200, description = "Scrape admitted and completed", body = crate::app::scrape_service::TriggerOutcome),
        (status = 400, description = "Malformed client_id or app", body = crate::transport::http::types::ErrorBody),
        (status = 422, description = "Body is not valid JSON", body = crate::transport::http::types::ErrorBody),
        (status = 429, description = "Rate limited; see remaining_seconds", body = crate::transport::http::types::ErrorBody),
        (status = 502, description = "Upstream scrape failed (cooldown still applies)", body = crate::transport::http::types::ErrorBody),
        (status = 504, description = "Upstream scrape timed out (cooldown still applies)", body = crate::transport::http::types::ErrorBody),
        (status = 503, description = "Storage unavailable", body = crate::transport::http::types::ErrorBody)
    )
)]
pub async fn trigger_handler(
    State(state): State<AppState>,
    Path(app): Path<String>,
    payload: Result<Json<TriggerRequest>, JsonRejection>,
) -> impl IntoResponse {
    let Json(request) = match payload {
        Ok(p) => p,
        Err(e) => return json_422(e, "{ client_id: uuid }").into_response(),
    };

    match state.service.trigger(&request.client_id, &app).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => error_response(e),
    }
}
