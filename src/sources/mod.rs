//! Built-in sources
//!
//! Providers shipped with the binary, addressable by name from the CLI
//! (`--source github`).

mod github;
mod open_holidays;

pub use github::{GitHubSource, GITHUB_API_URL};
pub use open_holidays::{OpenHolidaysSource, OPEN_HOLIDAYS_API_URL};

use crate::schema::NodeSchema;
use crate::source::Source;
use crate::types::{JsonValue, Row};
use std::sync::Arc;

/// Summary of a built-in source for listings
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub aliases: &'static [&'static str],
}

/// Every built-in source
pub fn list_builtin_info() -> Vec<SourceInfo> {
    vec![
        SourceInfo {
            name: "github",
            description: "GitHub repository metadata, contributors and daily stats",
            aliases: &[],
        },
        SourceInfo {
            name: "open-holidays",
            description: "Public holidays and countries from the OpenHolidays API",
            aliases: &["openholidays", "open_holidays"],
        },
    ]
}

/// Primary names of the built-in sources
pub fn list_builtin() -> Vec<&'static str> {
    list_builtin_info().iter().map(|info| info.name).collect()
}

/// Instantiate a built-in source by name or alias
pub fn get_builtin(name: &str) -> Option<Arc<dyn Source>> {
    let name = name.to_lowercase();
    let info = list_builtin_info()
        .into_iter()
        .find(|info| info.name == name || info.aliases.contains(&name.as_str()))?;

    let source: Arc<dyn Source> = match info.name {
        "github" => Arc::new(GitHubSource::new()),
        "open-holidays" => Arc::new(OpenHolidaysSource::new()),
        _ => return None,
    };
    Some(source)
}

pub fn is_builtin(name: &str) -> bool {
    get_builtin(name).is_some()
}

// ============================================================================
// Row helpers shared by the providers
// ============================================================================

/// Flatten one level of nested objects: `{"owner": {"login": "x"}}`
/// becomes `{"owner_login": "x"}`
pub(crate) fn flatten_object(value: &JsonValue) -> Row {
    let mut row = Row::new();
    let Some(object) = value.as_object() else {
        return row;
    };

    for (key, value) in object {
        match value {
            JsonValue::Object(nested) => {
                for (nested_key, nested_value) in nested {
                    row.insert(format!("{key}_{nested_key}"), nested_value.clone());
                }
            }
            _ => {
                row.insert(key.clone(), value.clone());
            }
        }
    }
    row
}

/// Keep only the selected fields plus the node's unique keys
pub(crate) fn select_fields(row: Row, schema: &NodeSchema, fields: &[String]) -> Row {
    row.into_iter()
        .filter(|(key, _)| {
            fields.iter().any(|f| f == key) || schema.unique_keys.iter().any(|k| k == key)
        })
        .collect()
}
