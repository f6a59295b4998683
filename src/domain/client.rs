//! Identifiers of the requesting client and the target application.

use crate::error::ValidationError;
use serde::{Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

const HYPHENATED_UUID_LEN: usize = 36;
const MAX_APP_NAME_LEN: usize = 64;

/// Opaque client identifier. Only the hyphenated 8-4-4-4-12 form is accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        // Uuid::try_parse also takes simple, braced and urn forms; only the
        // hyphenated form is 36 characters long.
        if raw.len() != HYPHENATED_UUID_LEN {
            return Err(ValidationError::MalformedClientId(raw.to_string()));
        }
        Uuid::try_parse(raw)
            .map(ClientId)
            .map_err(|_| ValidationError::MalformedClientId(raw.to_string()))
    }

    pub fn new_random() -> Self {
        ClientId(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl Serialize for ClientId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Normalised target application name (trimmed, lowercased).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct AppName(String);

impl AppName {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let name = raw.trim().to_lowercase();
        if !is_valid_app_name(&name) {
            return Err(ValidationError::InvalidAppName(raw.to_string()));
        }
        Ok(AppName(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AppName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn is_valid_app_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    name.len() <= MAX_APP_NAME_LEN
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_hyphenated_uuid_in_any_case() {
        let lower = ClientId::parse("3f2504e0-4f89-11d3-9a0c-0305e82c3301").unwrap();
        let upper = ClientId::parse("3F2504E0-4F89-11D3-9A0C-0305E82C3301").unwrap();
        assert_eq!(lower, upper);
        assert_eq!(upper.to_string(), "3f2504e0-4f89-11d3-9a0c-0305e82c3301");
    }

    #[test]
    fn rejects_non_hyphenated_forms() {
        for raw in [
            "",
            "not-a-uuid",
            "3f2504e04f8911d39a0c0305e82c3301",
            "{3f2504e0-4f89-11d3-9a0c-0305e82c3301}",
            "urn:uuid:3f2504e0-4f89-11d3-9a0c-0305e82c3301",
            "3f2504e0-4f89-11d3-9a0c-0305e82c330g",
            " 3f2504e0-4f89-11d3-9a0c-0305e82c3301",
            "3f2504e0-4f89-11d3-9a0c-0305e82c3301\t",
        ] {
            assert!(
                matches!(ClientId::parse(raw), Err(ValidationError::MalformedClientId(_))),
                "accepted {raw:?}"
            );
        }
    }

    #[test]
    fn app_names_are_normalised() {
        assert_eq!(AppName::parse("  Shopify-Reviews ").unwrap().as_str(), "shopify-reviews");
        assert!(AppName::parse("").is_err());
        assert!(AppName::parse("-leading").is_err());
        assert!(AppName::parse("has space").is_err());
        assert!(AppName::parse(&"a".repeat(65)).is_err());
    }
}
