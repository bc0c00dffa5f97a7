//! Parsing of the `Fields` selection parameter
//!
//! The value is a comma separated list of `node field` pairs, e.g.
//! `"repository id, repository stars, contributors login"`.

use crate::error::{Error, Result};

/// Nodes and fields selected for a run, in first-mention order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldSelection {
    nodes: Vec<(String, Vec<String>)>,
}

impl FieldSelection {
    /// Parse a `Fields` value
    pub fn parse(value: &str) -> Result<Self> {
        let mut selection = Self::default();

        for entry in value.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let mut parts = entry.split_whitespace();
            let (Some(node), Some(field), None) = (parts.next(), parts.next(), parts.next()) else {
                return Err(Error::configuration(
                    "Fields",
                    format!("expected 'node field', got '{entry}'"),
                ));
            };
            selection.push(node, field);
        }

        Ok(selection)
    }

    fn push(&mut self, node: &str, field: &str) {
        match self.nodes.iter_mut().find(|(name, _)| name == node) {
            Some((_, fields)) => {
                if !fields.iter().any(|f| f == field) {
                    fields.push(field.to_string());
                }
            }
            None => self.nodes.push((node.to_string(), vec![field.to_string()])),
        }
    }

    /// Selected node names in order
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|(name, _)| name.as_str())
    }

    /// Fields selected for `node`
    pub fn fields(&self, node: &str) -> &[String] {
        self.nodes
            .iter()
            .find(|(name, _)| name == node)
            .map(|(_, fields)| fields.as_slice())
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
