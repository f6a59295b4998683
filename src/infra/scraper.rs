//! The upstream scraper collaborator.
//!
//! Fetching and parsing marketplace pages happens elsewhere; this crate only sees a
//! function that returns review records for an app.

use crate::domain::client::AppName;
use crate::domain::review::ReviewRecord;
use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;

#[async_trait]
pub trait Scraper: Send + Sync {
    async fn scrape(&self, app: &AppName) -> anyhow::Result<Vec<ReviewRecord>>;
}

/// Scraper that GETs a JSON array of reviews from an HTTP endpoint.
///
/// `{app}` in the URL template is replaced with the app name.
pub struct HttpJsonScraper {
    client: reqwest::Client,
    url_template: String,
}

impl HttpJsonScraper {
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build scraper HTTP client")?;
        Ok(Self {
            client,
            url_template: url_template.into(),
        })
    }

    pub fn url_for(&self, app: &AppName) -> String {
        self.url_template.replace("{app}", app.as_str())
    }
}

#[async_trait]
impl Scraper for HttpJsonScraper {
    async fn scrape(&self, app: &AppName) -> anyhow::Result<Vec<ReviewRecord>> {
        let url = self.url_for(app);
        let reviews = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("request to {} failed", url))?
            .error_for_status()
            .with_context(|| format!("{} returned an error status", url))?
            .json::<Vec<ReviewRecord>>()
            .await
            .with_context(|| format!("{} did not return a review list", url))?;
        Ok(reviews)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substitutes_app_into_template() {
        let scraper =
            HttpJsonScraper::new("http://scraper:8081/reviews/{app}?all=1", Duration::from_secs(1))
                .unwrap();
        let app = AppName::parse("Shopify").unwrap();
        assert_eq!(scraper.url_for(&app), "http://scraper:8081/reviews/shopify?all=1");
    }
}
