use crate::app::scrape_service::{CachedReviews, ScrapeStatus, TriggerOutcome};
use crate::domain::review::ReviewRecord;
use crate::transport::http::handlers::{health, reviews, scrape};
use crate::transport::http::types::{ApiResponse, ErrorBody, TriggerRequest};
use axum::routing::{get, post};
use axum::Router;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        health::healthcheck_handler,
        scrape::status_handler,
        scrape::trigger_handler,
        reviews::reviews_handler
    ),
    components(schemas(
        ApiResponse,
        ErrorBody,
        TriggerRequest,
        ScrapeStatus,
        TriggerOutcome,
        CachedReviews,
        ReviewRecord
    ))
)]
pub struct ApiDoc;

pub fn create_router(app_state: crate::transport::http::types::AppState) -> Router {
    Router::new()
        .route("/health", get(health::healthcheck_handler))
        .route("/scrape/:app/status", get(scrape::status_handler))
        .route("/scrape/:app/trigger", post(scrape::trigger_handler))
        .route("/reviews/:app", get(reviews::reviews_handler))
        .with_state(app_state)
}
