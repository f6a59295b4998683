use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One scraped marketplace review, as returned by the scraper collaborator.
///
/// Missing fields deserialize to empty values so a partially populated record
/// still takes part in fingerprinting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ReviewRecord {
    #[serde(default)]
    pub store_name: String,
    #[serde(default)]
    pub review_date: String,
    #[serde(default)]
    pub review_content: String,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub country_name: String,
}

impl ReviewRecord {
    pub fn new(
        store_name: impl Into<String>,
        review_date: impl Into<String>,
        review_content: impl Into<String>,
        rating: Option<f64>,
        country_name: impl Into<String>,
    ) -> Self {
        Self {
            store_name: store_name.into(),
            review_date: review_date.into(),
            review_content: review_content.into(),
            rating,
            country_name: country_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_degrade_to_empty() {
        let record: ReviewRecord =
            serde_json::from_value(serde_json::json!({ "store_name": "Acme" })).unwrap();
        assert_eq!(record.store_name, "Acme");
        assert_eq!(record.review_content, "");
        assert_eq!(record.rating, None);
    }
}
