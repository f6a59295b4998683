// src/bin/api_server.rs

use scrape_gate::domain::AdmissionController;
use scrape_gate::infra::config::{ServiceConfig, StorageBackend};
use scrape_gate::infra::telemetry;
use scrape_gate::storage::{self, PointerStore, ScheduleStore, SnapshotCache};
use scrape_gate::transport;
use scrape_gate::{HttpJsonScraper, ScrapeService};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

type Stores = (
    Arc<dyn ScheduleStore>,
    Arc<dyn PointerStore>,
    Arc<dyn SnapshotCache>,
);

async fn build_stores(config: &ServiceConfig) -> anyhow::Result<Stores> {
    match config.storage_backend {
        StorageBackend::Memory => {
            info!("using in-memory stores (state is lost on restart)");
            let schedules: Arc<dyn ScheduleStore> = Arc::new(storage::MemoryScheduleStore::new());
            let pointers: Arc<dyn PointerStore> = Arc::new(storage::MemoryPointerStore::new());
            let snapshots: Arc<dyn SnapshotCache> = Arc::new(storage::MemorySnapshotCache::new());
            Ok((schedules, pointers, snapshots))
        }
        StorageBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;
            let pool = storage::postgres::connect(url, config.db_max_connections).await?;
            storage::postgres::ensure_schema(&pool).await?;
            info!(max_connections = config.db_max_connections, "connected to postgres");
            let schedules: Arc<dyn ScheduleStore> =
                Arc::new(storage::PostgresScheduleStore::new(pool.clone()));
            let pointers: Arc<dyn PointerStore> =
                Arc::new(storage::PostgresPointerStore::new(pool.clone()));
            let snapshots: Arc<dyn SnapshotCache> =
                Arc::new(storage::PostgresSnapshotCache::new(pool));
            Ok((schedules, pointers, snapshots))
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServiceConfig::from_env()?;
    telemetry::init(config.log_format);

    info!(
        backend = config.storage_backend.as_str(),
        default_interval_secs = config.policy.default_interval().as_secs(),
        identity_prefix_chars = config.policy.identity_prefix_chars(),
        upstream_timeout_secs = config.upstream_timeout.as_secs(),
        "initializing scrape service"
    );

    let (schedules, pointers, snapshots) = build_stores(&config).await?;
    let scraper = Arc::new(HttpJsonScraper::new(
        config.scraper_url_template.clone(),
        config.upstream_timeout,
    )?);
    let service = ScrapeService::new(
        AdmissionController::new(schedules, config.policy.clone()),
        pointers,
        snapshots,
        scraper,
    )
    .with_upstream_timeout(config.upstream_timeout);

    let app_state = transport::http::AppState {
        service: Arc::new(service),
        storage_backend: config.storage_backend.as_str(),
    };

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any);
    let app = transport::http::create_router(app_state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", transport::http::ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(addr = %config.bind_addr, "API server listening");
    info!("Swagger UI available at /swagger-ui");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
            }
        })
        .await?;

    info!("graceful shutdown complete");
    Ok(())
}
