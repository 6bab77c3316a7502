//! Identifier validation (spec.md §4.3): labels, relationship types, and
//! property keys must match `^[A-Za-z_][A-Za-z0-9_]*$` before they are
//! ever interpolated into a Cypher query string. Values always travel as
//! bound parameters instead.

use memstack_core::error::GraphError;
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex is valid"));

/// Reject anything that is not a safe-to-interpolate identifier.
pub fn validate_identifier(candidate: &str) -> Result<(), GraphError> {
    if IDENTIFIER.is_match(candidate) {
        Ok(())
    } else {
        Err(GraphError::InvalidIdentifier(candidate.to_string()))
    }
}

/// Validate a whole slice of identifiers (e.g. a label list).
pub fn validate_identifiers<'a, I: IntoIterator<Item = &'a str>>(
    candidates: I,
) -> Result<(), GraphError> {
    for candidate in candidates {
        validate_identifier(candidate)?;
    }
    Ok(())
}
