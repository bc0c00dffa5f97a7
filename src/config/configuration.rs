//! The parameter registry
//!
//! A [`Configuration`] is built once per connector run by merging the base
//! parameter set, the provider's overrides and run-time values, then
//! validated before anything touches the network.

use super::parameter::{Attribute, Parameter, ParameterValue};
use crate::error::{Error, Result};
use crate::runtime::HostKind;
use crate::types::JsonValue;
use chrono::NaiveDate;
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

/// Name of the synthetic parameter holding the host runtime
pub const ENVIRONMENT: &str = "Environment";

static NON_ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9]").unwrap());

static ISO_DATE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").unwrap());

const KNOWN_TYPES: [&str; 5] = ["string", "number", "boolean", "date", "object"];

/// Strip everything but ASCII letters and digits
pub fn sanitize_name(name: &str) -> String {
    NON_ALPHANUMERIC.replace_all(name, "").into_owned()
}

/// An insertion-ordered registry of named parameters
#[derive(Debug, Clone)]
pub struct Configuration {
    order: Vec<String>,
    parameters: HashMap<String, Parameter>,
}

/// A parameter as exposed to configuration forms
#[derive(Debug, Clone, Serialize)]
pub struct ParameterDescription {
    pub name: String,
    #[serde(flatten)]
    pub parameter: Parameter,
}

impl Configuration {
    /// Create a configuration holding only the `Environment` parameter
    pub fn new(host: HostKind) -> Self {
        let mut config = Self {
            order: Vec::new(),
            parameters: HashMap::new(),
        };
        config.add_parameter(
            ENVIRONMENT,
            Parameter::with_value(host.as_str())
                .required_type("string")
                .attribute(Attribute::HideInConfigForm),
        );
        config
    }

    /// Add a parameter, merging into any existing entry of the same name.
    ///
    /// A trailing `*` marks the parameter required. Names are sanitized
    /// before lookup; a name with no alphanumerics is ignored.
    pub fn add_parameter(&mut self, name: &str, mut spec: Parameter) -> &mut Self {
        if name.ends_with('*') {
            spec.is_required = Some(true);
        }
        spec.value = spec.value.map(ParameterValue::trimmed);

        let name = sanitize_name(name);
        if name.is_empty() {
            return self;
        }

        match self.parameters.get_mut(&name) {
            Some(existing) => existing.merge(spec),
            None => {
                self.order.push(name.clone());
                self.parameters.insert(name, spec);
            }
        }
        self
    }

    /// Add every parameter in order
    pub fn merge_parameters<I, S>(&mut self, parameters: I) -> &mut Self
    where
        I: IntoIterator<Item = (S, Parameter)>,
        S: AsRef<str>,
    {
        for (name, spec) in parameters {
            self.add_parameter(name.as_ref(), spec);
        }
        self
    }

    /// Assign values, creating parameters that do not exist yet
    pub fn set_values<I, S, V>(&mut self, values: I) -> &mut Self
    where
        I: IntoIterator<Item = (S, V)>,
        S: AsRef<str>,
        V: Into<ParameterValue>,
    {
        for (name, value) in values {
            self.set_value(name.as_ref(), value);
        }
        self
    }

    /// Assign a single value
    pub fn set_value(&mut self, name: &str, value: impl Into<ParameterValue>) -> &mut Self {
        self.add_parameter(name, Parameter::with_value(value))
    }

    /// Enforce defaults, required values and declared types.
    ///
    /// Safe to call repeatedly; a valid configuration is left unchanged.
    pub fn validate(&mut self) -> Result<&mut Self> {
        for name in &self.order {
            let Some(parameter) = self.parameters.get_mut(name) else {
                continue;
            };

            if parameter.is_empty() {
                if let Some(default) = &parameter.default {
                    parameter.value = Some(default.clone());
                }
            }

            if parameter.is_empty() && parameter.is_required() {
                let reason = parameter.error_message.clone().unwrap_or_else(|| {
                    format!(
                        "Unable to load the configuration. The parameter '{name}' is required but was provided with an empty value"
                    )
                });
                return Err(Error::configuration(name, reason));
            }

            if parameter.one_of.is_some() {
                validate_one_of(name, parameter)?;
                continue;
            }

            validate_type(name, parameter.required_type.as_deref(), &mut parameter.value)?;
        }

        debug!("validated {} parameters", self.order.len());
        Ok(self)
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.parameters.get(&sanitize_name(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Parameter names in insertion order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// The non-empty value of a parameter
    pub fn value(&self, name: &str) -> Option<&ParameterValue> {
        self.get(name)
            .and_then(|p| p.value.as_ref())
            .filter(|v| !v.is_empty())
    }

    pub fn string(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(ParameterValue::as_str)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        self.value(name).and_then(ParameterValue::as_f64)
    }

    pub fn integer(&self, name: &str) -> Option<i64> {
        self.value(name).and_then(ParameterValue::as_i64)
    }

    pub fn boolean(&self, name: &str) -> Option<bool> {
        self.value(name).and_then(ParameterValue::as_bool)
    }

    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        self.value(name).and_then(ParameterValue::as_date)
    }

    /// The host runtime this configuration was created for
    pub fn environment(&self) -> Option<HostKind> {
        self.string(ENVIRONMENT).and_then(|s| s.parse().ok())
    }

    /// Parameters as shown to a configuration form.
    ///
    /// Hidden parameters are left out and secret values are masked.
    pub fn describe(&self) -> Vec<ParameterDescription> {
        self.order
            .iter()
            .filter_map(|name| {
                let parameter = self.parameters.get(name)?;
                if parameter.has_attribute(Attribute::HideInConfigForm) {
                    return None;
                }
                let mut parameter = parameter.clone();
                if parameter.has_attribute(Attribute::Secret) && !parameter.is_empty() {
                    parameter.value = Some(ParameterValue::String("********".to_string()));
                }
                Some(ParameterDescription {
                    name: name.clone(),
                    parameter,
                })
            })
            .collect()
    }
}

// ============================================================================
// Validation
// ============================================================================

fn validate_type(
    name: &str,
    required_type: Option<&str>,
    value: &mut Option<ParameterValue>,
) -> Result<()> {
    let Some(required_type) = required_type else {
        return Ok(());
    };

    if !KNOWN_TYPES.contains(&required_type) {
        return Err(Error::configuration(
            name,
            format!("Parameter '{name}' has wrong requiredType '{required_type}' in configuration"),
        ));
    }

    let Some(current) = value.as_ref().filter(|v| !v.is_empty()) else {
        return Ok(());
    };

    let coerced = match (required_type, current) {
        ("string", ParameterValue::String(_))
        | ("number", ParameterValue::Number(_))
        | ("boolean", ParameterValue::Bool(_))
        | ("object", ParameterValue::Object(_))
        | ("date", ParameterValue::Date(_)) => None,
        ("date", ParameterValue::String(s)) if ISO_DATE.is_match(s) => {
            let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| {
                Error::configuration(name, format!("Parameter '{name}' is not a valid date: {s}"))
            })?;
            Some(ParameterValue::Date(date))
        }
        (_, other) => {
            return Err(Error::configuration(
                name,
                format!(
                    "Parameter '{name}' must be a {required_type}. Got {} instead",
                    other.type_name()
                ),
            ));
        }
    };

    if coerced.is_some() {
        *value = coerced;
    }
    Ok(())
}

fn validate_one_of(name: &str, parameter: &mut Parameter) -> Result<()> {
    let Some(selected) = parameter.value.clone().filter(|v| !v.is_empty()) else {
        return Ok(());
    };
    let options = parameter.one_of.as_deref().unwrap_or_default();

    let Some(option) = options.iter().find(|opt| opt.value == selected) else {
        let valid = options
            .iter()
            .map(|opt| opt.value.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        return Err(Error::configuration(
            name,
            format!("Parameter '{name}' has invalid value '{selected}'. Valid options: {valid}"),
        ));
    };

    let Some(item_specs) = option.items.clone() else {
        return Ok(());
    };
    let items = parameter.items.get_or_insert_with(Default::default);

    for (item_name, item_spec) in item_specs {
        let qualified = format!("{name}.{item_name}");
        let item = items.entry(item_name).or_default();

        if item.is_empty() {
            if let Some(default) = &item_spec.default {
                item.value = Some(default.clone());
            }
        }
        if item.is_empty() && item_spec.is_required() {
            return Err(Error::configuration(
                &qualified,
                format!("Parameter '{qualified}' is required but was not provided"),
            ));
        }

        let required_type = item
            .required_type
            .as_deref()
            .or(item_spec.required_type.as_deref());
        validate_type(&qualified, required_type, &mut item.value)?;
    }

    Ok(())
}

// ============================================================================
// Loading
// ============================================================================

/// Parse a JSON or YAML mapping of parameter definitions.
///
/// Entries keep document order. A scalar entry is shorthand for
/// `{value: scalar}`.
pub fn load_parameters_from_str(content: &str) -> Result<Vec<(String, Parameter)>> {
    // YAML mappings keep key order; JSON documents are valid YAML.
    let document: serde_yaml::Value = serde_yaml::from_str(content)?;
    let serde_yaml::Value::Mapping(mapping) = document else {
        return Err(Error::configuration(
            "<document>",
            "parameter document must be a mapping",
        ));
    };

    let mut parameters = Vec::with_capacity(mapping.len());
    for (key, value) in mapping {
        let name = match key {
            serde_yaml::Value::String(s) => s,
            other => {
                return Err(Error::configuration(
                    format!("{other:?}"),
                    "parameter names must be strings",
                ))
            }
        };
        let json: JsonValue = serde_json::to_value(value)?;
        let parameter = if json.is_object() {
            serde_json::from_value(json).map_err(|e| {
                Error::configuration(&name, format!("invalid parameter definition: {e}"))
            })?
        } else {
            Parameter::with_value(json)
        };
        parameters.push((name, parameter));
    }

    Ok(parameters)
}

/// Read parameter definitions from a file
pub fn load_parameters_from_path(path: impl AsRef<Path>) -> Result<Vec<(String, Parameter)>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::configuration(
            path.display().to_string(),
            format!("failed to read parameter file: {e}"),
        )
    })?;
    load_parameters_from_str(&content)
}
