//! Parameter definitions
//!
//! These types are both the in-memory representation of a configuration
//! entry and its serialized wire shape.

use crate::types::JsonValue;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Attributes
// ============================================================================

/// Tags that change how a parameter is treated outside validation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Attribute {
    /// Value is a credential; masked when described
    Secret,
    /// Only meaningful for manual backfill runs
    ManualBackfill,
    /// Not shown in configuration forms
    HideInConfigForm,
    /// Filled in by an OAuth consent flow
    OauthFlow,
}

// ============================================================================
// Parameter Value
// ============================================================================

/// A parameter value.
///
/// Mirrors JSON with one addition: validated `date` parameters hold a
/// [`NaiveDate`] instead of their original `YYYY-MM-DD` string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "JsonValue", into = "JsonValue")]
pub enum ParameterValue {
    Null,
    Bool(bool),
    Number(serde_json::Number),
    String(String),
    Date(NaiveDate),
    /// JSON objects and arrays
    Object(JsonValue),
}

impl ParameterValue {
    /// Absent, null, or a blank string. `false` and `0` are values.
    pub fn is_empty(&self) -> bool {
        match self {
            ParameterValue::Null => true,
            ParameterValue::String(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// The runtime type name used in validation messages
    pub fn type_name(&self) -> &'static str {
        match self {
            ParameterValue::Null => "null",
            ParameterValue::Bool(_) => "boolean",
            ParameterValue::Number(_) => "number",
            ParameterValue::String(_) => "string",
            ParameterValue::Date(_) => "date",
            ParameterValue::Object(_) => "object",
        }
    }

    /// Strings are trimmed; everything else is returned unchanged
    #[must_use]
    pub fn trimmed(self) -> Self {
        match self {
            ParameterValue::String(s) => ParameterValue::String(s.trim().to_string()),
            other => other,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParameterValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParameterValue::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParameterValue::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParameterValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// A date, or a string that parses as `YYYY-MM-DD`
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            ParameterValue::Date(d) => Some(*d),
            ParameterValue::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
            _ => None,
        }
    }

    /// Convert to a plain JSON value; dates become `YYYY-MM-DD` strings
    pub fn to_json(&self) -> JsonValue {
        self.clone().into()
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Null => Ok(()),
            ParameterValue::String(s) => f.write_str(s),
            ParameterValue::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<JsonValue> for ParameterValue {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => ParameterValue::Null,
            JsonValue::Bool(b) => ParameterValue::Bool(b),
            JsonValue::Number(n) => ParameterValue::Number(n),
            JsonValue::String(s) => ParameterValue::String(s),
            other => ParameterValue::Object(other),
        }
    }
}

impl From<ParameterValue> for JsonValue {
    fn from(value: ParameterValue) -> Self {
        match value {
            ParameterValue::Null => JsonValue::Null,
            ParameterValue::Bool(b) => JsonValue::Bool(b),
            ParameterValue::Number(n) => JsonValue::Number(n),
            ParameterValue::String(s) => JsonValue::String(s),
            ParameterValue::Date(d) => JsonValue::String(d.format("%Y-%m-%d").to_string()),
            ParameterValue::Object(v) => v,
        }
    }
}

impl From<&str> for ParameterValue {
    fn from(value: &str) -> Self {
        ParameterValue::String(value.to_string())
    }
}

impl From<String> for ParameterValue {
    fn from(value: String) -> Self {
        ParameterValue::String(value)
    }
}

impl From<bool> for ParameterValue {
    fn from(value: bool) -> Self {
        ParameterValue::Bool(value)
    }
}

impl From<i32> for ParameterValue {
    fn from(value: i32) -> Self {
        ParameterValue::Number(value.into())
    }
}

impl From<i64> for ParameterValue {
    fn from(value: i64) -> Self {
        ParameterValue::Number(value.into())
    }
}

impl From<NaiveDate> for ParameterValue {
    fn from(value: NaiveDate) -> Self {
        ParameterValue::Date(value)
    }
}

// ============================================================================
// Parameter
// ============================================================================

/// One option of a `oneOf` parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OneOfOption {
    /// Value selecting this option
    pub value: ParameterValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Nested items this option requires
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<BTreeMap<String, Parameter>>,
}

/// A named configuration entry.
///
/// Every field is optional so that partial definitions can be merged on
/// top of each other; fields present in the newer definition win.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Parameter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ParameterValue>,

    /// One of `string`, `number`, `boolean`, `date`, `object`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_required: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<ParameterValue>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Vec<Attribute>>,

    /// Replaces the generic "required" message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<OneOfOption>>,

    /// Values of nested items for `oneOf` parameters
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<BTreeMap<String, Parameter>>,
}

impl Parameter {
    /// Create an empty definition
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a definition holding only a value
    pub fn with_value(value: impl Into<ParameterValue>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn value(mut self, value: impl Into<ParameterValue>) -> Self {
        self.value = Some(value.into());
        self
    }

    #[must_use]
    pub fn required(mut self) -> Self {
        self.is_required = Some(true);
        self
    }

    #[must_use]
    pub fn required_type(mut self, required_type: impl Into<String>) -> Self {
        self.required_type = Some(required_type.into());
        self
    }

    #[must_use]
    pub fn default_value(mut self, value: impl Into<ParameterValue>) -> Self {
        self.default = Some(value.into());
        self
    }

    #[must_use]
    pub fn attribute(mut self, attribute: Attribute) -> Self {
        let attributes = self.attributes.get_or_insert_with(Vec::new);
        if !attributes.contains(&attribute) {
            attributes.push(attribute);
        }
        self
    }

    #[must_use]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    #[must_use]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    #[must_use]
    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    #[must_use]
    pub fn one_of(mut self, options: Vec<OneOfOption>) -> Self {
        self.one_of = Some(options);
        self
    }

    /// Whether the parameter must carry a non-empty value after validation
    pub fn is_required(&self) -> bool {
        self.is_required.unwrap_or(false)
    }

    pub fn has_attribute(&self, attribute: Attribute) -> bool {
        self.attributes
            .as_ref()
            .is_some_and(|attrs| attrs.contains(&attribute))
    }

    /// True when the value is absent, null, or a blank string
    pub fn is_empty(&self) -> bool {
        self.value.as_ref().map_or(true, ParameterValue::is_empty)
    }

    /// Overlay every field present in `other` onto `self`
    pub fn merge(&mut self, other: Parameter) {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(if other.$field.is_some() {
                    self.$field = other.$field;
                })*
            };
        }
        overlay!(
            value,
            required_type,
            is_required,
            default,
            attributes,
            error_message,
            label,
            description,
            one_of,
            items
        );
    }
}
