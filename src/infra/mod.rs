pub mod config;
pub mod scraper;
pub mod telemetry;
