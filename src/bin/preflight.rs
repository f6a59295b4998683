use scrape_gate::infra::config::{ServiceConfig, StorageBackend};
use scrape_gate::storage::{postgres, PostgresScheduleStore, ScheduleStore};

fn usage_and_exit() -> ! {
    eprintln!(
        "Usage: cargo run --bin preflight\n\
         \n\
         Reads the same env vars as api_server:\n\
           BIND_ADDR, STORAGE_BACKEND, DATABASE_URL, DB_MAX_CONNECTIONS,\n\
           SCRAPE_MIN_INTERVAL_SECS, SCRAPE_APP_INTERVALS, IDENTITY_PREFIX_CHARS,\n\
           UPSTREAM_TIMEOUT_SECS, SCRAPER_URL_TEMPLATE, LOG_FORMAT\n"
    );
    std::process::exit(2);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        usage_and_exit();
    }

    // Force-read config (nice error messages if anything is malformed)
    let config = ServiceConfig::from_env()?;

    println!("> Preflight:");
    println!("  BIND_ADDR={}", config.bind_addr);
    println!("  STORAGE_BACKEND={}", config.storage_backend.as_str());
    println!(
        "  SCRAPE_MIN_INTERVAL_SECS={}",
        config.policy.default_interval().as_secs()
    );
    println!(
        "  IDENTITY_PREFIX_CHARS={}",
        config.policy.identity_prefix_chars()
    );
    println!(
        "  UPSTREAM_TIMEOUT_SECS={}",
        config.upstream_timeout.as_secs()
    );
    println!("  SCRAPER_URL_TEMPLATE={}", config.scraper_url_template);

    if config.storage_backend == StorageBackend::Postgres {
        let url = config
            .database_url
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("DATABASE_URL must be set"))?;
        let pool = postgres::connect(url, config.db_max_connections)
            .await
            .map_err(|e| anyhow::anyhow!("Could not connect to DATABASE_URL: {}", e))?;
        postgres::ensure_schema(&pool).await?;
        PostgresScheduleStore::new(pool).ping().await?;
        println!("  Postgres reachable, schema ensured.");
    } else {
        println!("  In-memory storage: nothing to check.");
    }

    println!("> Preflight OK.");
    Ok(())
}
