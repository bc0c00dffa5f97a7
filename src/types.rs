//! Common types used throughout Conduit CDK
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use serde::{Deserialize, Serialize};

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// A single record as delivered to a sink
pub type Row = JsonObject;

// ============================================================================
// HTTP Types
// ============================================================================

/// HTTP method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    GET,
    POST,
    PUT,
    PATCH,
    DELETE,
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::GET => reqwest::Method::GET,
            Method::POST => reqwest::Method::POST,
            Method::PUT => reqwest::Method::PUT,
            Method::PATCH => reqwest::Method::PATCH,
            Method::DELETE => reqwest::Method::DELETE,
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Method::GET => "GET",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::PATCH => "PATCH",
            Method::DELETE => "DELETE",
        };
        f.write_str(name)
    }
}

// ============================================================================
// Run Mode
// ============================================================================

/// How a connector run treats the persisted watermark
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunMode {
    /// Resume from the watermark and advance it after each written day
    #[default]
    Incremental,
    /// Re-import an explicit range; the watermark is left untouched
    #[serde(alias = "MANUAL_BACKFILL")]
    FullBackfill,
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Utilities
// ============================================================================

/// Convert a camelCase or PascalCase node name to snake_case
pub fn to_snake_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    for (i, ch) in name.chars().enumerate() {
        if ch.is_uppercase() {
            if i > 0 && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(ch.to_lowercase());
        } else if ch == '-' || ch == ' ' {
            out.push('_');
        } else {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_conversion() {
        let get: reqwest::Method = Method::GET.into();
        assert_eq!(reqwest::Method::GET, get);
        let post: reqwest::Method = Method::POST.into();
        assert_eq!(reqwest::Method::POST, post);
        assert_eq!(Method::POST.to_string(), "POST");
    }

    #[test]
    fn test_run_mode_serde() {
        let mode: RunMode = serde_json::from_str("\"INCREMENTAL\"").unwrap();
        assert_eq!(mode, RunMode::Incremental);

        let mode: RunMode = serde_json::from_str("\"MANUAL_BACKFILL\"").unwrap();
        assert_eq!(mode, RunMode::FullBackfill);

        let json = serde_json::to_string(&RunMode::FullBackfill).unwrap();
        assert_eq!(json, "\"FULL_BACKFILL\"");
    }

    #[test]
    fn test_to_snake_case() {
        assert_eq!(to_snake_case("repositoryStats"), "repository_stats");
        assert_eq!(to_snake_case("AdGroups"), "ad_groups");
        assert_eq!(to_snake_case("contributors"), "contributors");
        assert_eq!(to_snake_case("public-holidays"), "public_holidays");
    }
}
