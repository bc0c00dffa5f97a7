//! Node schema types

use crate::error::{Error, Result};
use crate::types::to_snake_case;
use serde::{Deserialize, Serialize};

/// Declared type of a node field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    #[default]
    String,
    Number,
    Integer,
    Boolean,
    Date,
    Datetime,
    Object,
    Array,
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FieldType::String => write!(f, "string"),
            FieldType::Number => write!(f, "number"),
            FieldType::Integer => write!(f, "integer"),
            FieldType::Boolean => write!(f, "boolean"),
            FieldType::Date => write!(f, "date"),
            FieldType::Datetime => write!(f, "datetime"),
            FieldType::Object => write!(f, "object"),
            FieldType::Array => write!(f, "array"),
        }
    }
}

/// A single declared field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Static metadata describing one node a provider exposes
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSchema {
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Link to the provider's API reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub documentation: Option<String>,

    /// Declared fields, in output order
    #[serde(default)]
    pub fields: Vec<FieldSchema>,

    /// Fields that identify a row; the sink upserts on them
    #[serde(default)]
    pub unique_keys: Vec<String>,

    #[serde(default)]
    pub is_time_series: bool,

    /// Defaults to the snake_case node name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination_name: Option<String>,
}

impl NodeSchema {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn documentation(mut self, url: impl Into<String>) -> Self {
        self.documentation = Some(url.into());
        self
    }

    /// Declare a field
    #[must_use]
    pub fn field(mut self, name: impl Into<String>, field_type: FieldType) -> Self {
        self.fields.push(FieldSchema {
            name: name.into(),
            field_type,
            description: None,
        });
        self
    }

    #[must_use]
    pub fn unique_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Mark the node as fetched day by day
    #[must_use]
    pub fn time_series(mut self) -> Self {
        self.is_time_series = true;
        self
    }

    #[must_use]
    pub fn destination_name(mut self, name: impl Into<String>) -> Self {
        self.destination_name = Some(name.into());
        self
    }

    /// Declared field names in order
    pub fn field_names(&self) -> Vec<String> {
        self.fields.iter().map(|f| f.name.clone()).collect()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }

    /// The declared destination, or the snake_case node name
    pub fn default_destination(&self) -> String {
        self.destination_name
            .clone()
            .unwrap_or_else(|| to_snake_case(&self.name))
    }

    /// A node can only be written when it declares unique keys
    pub fn validate_unique_keys(&self) -> Result<()> {
        if self.unique_keys.is_empty() {
            return Err(Error::schema(
                &self.name,
                "unique keys are not defined for this node",
            ));
        }
        if let Some(key) = self.unique_keys.iter().find(|k| !self.has_field(k)) {
            return Err(Error::schema(
                &self.name,
                format!("unique key '{key}' is not a declared field"),
            ));
        }
        Ok(())
    }
}
