//! Small helper for assembling parameterized Cypher fragments, grounded
//! on `original_source/.../common/query_builder.py`: every call site that
//! used to hand-format a query string now goes through here instead, so
//! identifier validation happens in exactly one place.

use crate::identifier::{validate_identifier, validate_identifiers};
use memstack_core::error::GraphError;
use serde_json::Value;
use std::collections::HashMap;

/// Builds a single Cypher statement plus its bound parameter map.
///
/// Every label/relationship-type/property-key fed to a `with_*` method is
/// validated immediately; the first invalid identifier short-circuits the
/// whole build.
#[derive(Debug, Default)]
pub struct CypherBuilder {
    text: String,
    params: HashMap<String, Value>,
    error: Option<GraphError>,
}

impl CypherBuilder {
    /// Start a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw, already-safe Cypher text (no identifiers to validate —
    /// keywords, punctuation, parameter placeholders).
    pub fn push(mut self, fragment: &str) -> Self {
        self.text.push_str(fragment);
        self
    }

    /// Append a `MERGE (n:Label1:Label2 {uuid: $uuid})`-style node pattern
    /// binding `var` to the given labels, validating each label.
    pub fn node_pattern(mut self, var: &str, labels: &[String]) -> Self {
        if self.error.is_none() {
            if let Err(e) = validate_identifiers(labels.iter().map(String::as_str)) {
                self.error = Some(e);
                return self;
            }
            self.text.push('(');
            self.text.push_str(var);
            for label in labels {
                self.text.push(':');
                self.text.push_str(label);
            }
            self.text.push(')');
        }
        self
    }

    /// Append a `[var:REL_TYPE]`-style relationship pattern, validating
    /// the relationship type.
    pub fn rel_pattern(mut self, var: &str, rel_type: &str) -> Self {
        if self.error.is_none() {
            if let Err(e) = validate_identifier(rel_type) {
                self.error = Some(e);
                return self;
            }
            self.text.push('[');
            self.text.push_str(var);
            self.text.push(':');
            self.text.push_str(rel_type);
            self.text.push(']');
        }
        self
    }

    /// Bind a parameter value, returned alongside the finished text.
    pub fn bind(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    /// Finish the build, surfacing the first identifier-validation error
    /// encountered, if any.
    pub fn build(self) -> Result<(String, HashMap<String, Value>), GraphError> {
        if let Some(e) = self.error {
            return Err(e);
        }
        Ok((self.text, self.params))
    }
}
