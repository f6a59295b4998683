use crate::transport::http::handlers::common::error_response;
use crate::transport::http::types::{AppState, ClientQuery};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

/// Combined read used by most UI views. Never triggers a scrape.
#[utoipa::path(
    get,
    path = "/reviews/{app}",
    params(
        ("app" = String, Path, description = "Target application name"),
        ClientQuery
    ),
    responses(
        (status = 200, description = "Cached reviews with scrape schedule", body = crate::app::scrape_service::CachedReviews),
        (status = 400, description = "Malformed client_id or app", body = crate::transport::http::types::ErrorBody),
        (status = 503, description = "Storage unavailable", body = crate::transport::http::types::ErrorBody)
    )
)]
pub async fn reviews_handler(
    State(state): State<AppState>,
    Path(app): Path<String>,
    Query(query): Query<ClientQuery>,
) -> impl IntoResponse {
    match state.service.cached_reviews(&query.client_id, &app).await {
        Ok(reviews) => (StatusCode::OK, Json(reviews)).into_response(),
        Err(e) => error_response(e),
    }
}
