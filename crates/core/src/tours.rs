//! Tour feed payloads served by the edge cache.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    #[default]
    All,
    Tag,
    Type,
    Keyword,
    Slug,
    /// Unrecognised modes are forwarded verbatim; the origin decides what they mean.
    Other(String),
}

impl FilterMode {
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
            return Self::All;
        };

        match raw.to_ascii_lowercase().as_str() {
            "all" => Self::All,
            "tag" => Self::Tag,
            "type" => Self::Type,
            "keyword" => Self::Keyword,
            "slug" => Self::Slug,
            _ => Self::Other(raw.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Tag => "tag",
            Self::Type => "type",
            Self::Keyword => "keyword",
            Self::Slug => "slug",
            Self::Other(raw) => raw.as_str(),
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TourFeed {
    pub version: Option<String>,
    #[serde(default)]
    pub tours: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TourFeed {
    pub fn network_error() -> Self {
        Self {
            version: None,
            tours: Vec::new(),
            client: None,
            error: Some("Network error".to_string()),
        }
    }
}

/// True when an origin body reports an application-level `error` member.
pub fn carries_application_error(body: &Value) -> bool {
    body.as_object()
        .and_then(|object| object.get("error"))
        .is_some_and(|error| !error.is_null())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{carries_application_error, FilterMode, TourFeed};

    #[test]
    fn missing_or_blank_mode_means_all() {
        assert_eq!(FilterMode::parse(None), FilterMode::All);
        assert_eq!(FilterMode::parse(Some("  ")), FilterMode::All);
        assert_eq!(FilterMode::parse(Some("TAG")), FilterMode::Tag);
        assert_eq!(FilterMode::parse(Some("region")).as_str(), "region");
    }

    #[test]
    fn network_error_feed_is_empty_but_well_formed() {
        let body = serde_json::to_value(TourFeed::network_error()).expect("serialize");
        assert_eq!(body, json!({ "version": null, "tours": [], "error": "Network error" }));
    }

    #[test]
    fn error_member_detection() {
        assert!(carries_application_error(&json!({ "error": "sheet not found" })));
        assert!(carries_application_error(&json!({ "tours": [], "error": false })));
        assert!(!carries_application_error(&json!({ "tours": [], "error": null })));
        assert!(!carries_application_error(&json!({ "tours": [] })));
        assert!(!carries_application_error(&json!(["error"])));
    }
}
