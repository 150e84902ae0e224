//! Identifier validation and quoting.
//!
//! Drivers cannot bind identifiers as parameters, so table and column names are
//! interpolated into SQL text. Every name goes through [`quote_identifier`] first:
//! it must match a strict pattern, and the accepted name is wrapped in back-ticks.

use std::sync::OnceLock;

use regex::Regex;

use super::error::{MySqlError, Result};

/// MySQL limits identifiers to 64 characters.
const MAX_IDENTIFIER_LEN: usize = 64;

const IDENTIFIER_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_$]*$";

fn identifier_regex() -> std::result::Result<&'static Regex, &'static regex::Error> {
    static IDENTIFIER: OnceLock<std::result::Result<Regex, regex::Error>> = OnceLock::new();
    IDENTIFIER
        .get_or_init(|| Regex::new(IDENTIFIER_PATTERN))
        .as_ref()
}

fn invalid(value: &str, reason: impl Into<String>) -> MySqlError {
    MySqlError::InvalidIdentifier {
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn validate_part(full: &str, part: &str) -> Result<()> {
    if part.is_empty() {
        return Err(invalid(full, "identifier cannot be empty"));
    }
    if part.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid(
            full,
            format!("longer than {} characters", MAX_IDENTIFIER_LEN),
        ));
    }
    let pattern = identifier_regex()
        .map_err(|e| invalid(full, format!("identifier pattern unavailable: {}", e)))?;
    if !pattern.is_match(part) {
        return Err(invalid(
            full,
            "only letters, digits, '_' and '$' are allowed and it must not start with a digit",
        ));
    }
    Ok(())
}

/// Validate a column name and return it back-tick quoted.
pub fn quote_column(name: &str) -> Result<String> {
    let trimmed = name.trim();
    validate_part(name, trimmed)?;
    Ok(format!("`{}`", trimmed))
}

/// Validate a table name, optionally qualified as `schema.table`, and return it quoted.
pub fn quote_identifier(name: &str) -> Result<String> {
    let trimmed = name.trim();
    let parts: Vec<&str> = trimmed.split('.').collect();
    if parts.len() > 2 {
        return Err(invalid(name, "at most one '.' qualifier is allowed"));
    }

    let mut quoted = Vec::with_capacity(parts.len());
    for part in parts {
        validate_part(name, part)?;
        quoted.push(format!("`{}`", part));
    }
    Ok(quoted.join("."))
}
