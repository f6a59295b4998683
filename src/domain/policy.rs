//! Per-app scrape policy: cooldown intervals and the identity prefix length.

use crate::domain::client::AppName;
use std::collections::HashMap;
use std::time::Duration;

pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(3600);
pub const DEFAULT_IDENTITY_PREFIX_CHARS: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapePolicy {
    default_interval: Duration,
    app_intervals: HashMap<String, Duration>,
    identity_prefix_chars: usize,
}

impl ScrapePolicy {
    pub fn new(default_interval: Duration) -> Self {
        Self {
            default_interval,
            app_intervals: HashMap::new(),
            identity_prefix_chars: DEFAULT_IDENTITY_PREFIX_CHARS,
        }
    }

    /// Overrides the cooldown for one app. The name is normalised like [`AppName`].
    pub fn with_app_interval(mut self, app: &str, interval: Duration) -> Self {
        self.app_intervals
            .insert(app.trim().to_lowercase(), interval);
        self
    }

    pub fn with_identity_prefix_chars(mut self, chars: usize) -> Self {
        self.identity_prefix_chars = chars;
        self
    }

    pub fn interval_for(&self, app: &AppName) -> Duration {
        self.app_intervals
            .get(app.as_str())
            .copied()
            .unwrap_or(self.default_interval)
    }

    pub fn default_interval(&self) -> Duration {
        self.default_interval
    }

    pub fn identity_prefix_chars(&self) -> usize {
        self.identity_prefix_chars
    }
}

impl Default for ScrapePolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_override_wins_over_default() {
        let policy = ScrapePolicy::new(Duration::from_secs(60))
            .with_app_interval(" Shopify ", Duration::from_secs(5));
        let shopify = AppName::parse("shopify").unwrap();
        let other = AppName::parse("woo").unwrap();
        assert_eq!(policy.interval_for(&shopify), Duration::from_secs(5));
        assert_eq!(policy.interval_for(&other), Duration::from_secs(60));
        assert_eq!(policy.identity_prefix_chars(), 50);
    }
}
