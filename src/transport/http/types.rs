use crate::app::scrape_service::ScrapeService;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ScrapeService>,
    /// Backend name reported by `/health`.
    pub storage_backend: &'static str,
}

#[derive(Serialize, Debug, ToSchema)]
pub struct ApiResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Deserialize, Debug, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ClientQuery {
    /// Hyphenated UUID of the requesting client.
    #[serde(default)]
    pub client_id: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct TriggerRequest {
    /// Hyphenated UUID of the requesting client.
    #[serde(default)]
    pub client_id: String,
}

/// Body of every non-2xx response from the scrape endpoints.
#[derive(Serialize, Debug, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    /// One of `validation_error`, `rate_limited`, `upstream_scrape_error`, `storage_error`.
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_run_at: Option<DateTime<Utc>>,
}

pub fn json_422(err: JsonRejection, expected: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorBody {
            success: false,
            error: format!("Invalid JSON body: {} (expected: {})", err, expected),
            kind: "validation_error".to_string(),
            remaining_seconds: None,
            next_run_at: None,
        }),
    )
}
