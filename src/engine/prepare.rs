//! Row preparation before a sink write

use crate::config::Configuration;
use crate::schema::NodeSchema;
use crate::source::DESTINATION_TABLE_NAME_PREFIX;
use crate::types::{to_snake_case, JsonValue, Row};

/// Insert every schema-declared field missing from a row as null
pub fn add_missing_fields_to_data(rows: &mut [Row], schema: &NodeSchema) {
    for row in rows.iter_mut() {
        for field in &schema.fields {
            if !row.contains_key(&field.name) {
                row.insert(field.name.clone(), JsonValue::Null);
            }
        }
    }
}

/// Destination for `schema`: the configured prefix plus the snake_case node
/// name, or the schema's own destination when no prefix is set
pub fn destination_name(config: &Configuration, schema: &NodeSchema) -> String {
    match config.string(DESTINATION_TABLE_NAME_PREFIX) {
        Some(prefix) => format!("{prefix}{}", to_snake_case(&schema.name)),
        None => schema.default_destination(),
    }
}

/// Description handed to the sink: the node description and its docs link
pub fn sink_description(schema: &NodeSchema) -> String {
    [schema.description.as_deref(), schema.documentation.as_deref()]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
}
