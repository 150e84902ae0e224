//! WHERE-clause construction from declarative filters.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{MySqlError, Result};
use super::identifier::quote_column;

/// Logical operator supported in a [`Condition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    Like,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    IsNull,
}

impl Operator {
    /// Parse a caller-supplied operator name. `not-equal`, `not_equal` and
    /// `NotEqual`-style spellings are all accepted.
    pub fn parse(value: &str) -> Result<Self> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-' && *c != ' ')
            .flat_map(char::to_lowercase)
            .collect();

        let operator = match normalized.as_str() {
            "equal" => Operator::Equal,
            "notequal" => Operator::NotEqual,
            "like" => Operator::Like,
            "greaterthan" => Operator::GreaterThan,
            "lessthan" => Operator::LessThan,
            "greaterorequal" => Operator::GreaterOrEqual,
            "lessorequal" => Operator::LessOrEqual,
            "isnull" => Operator::IsNull,
            _ => {
                return Err(MySqlError::UnsupportedOperator {
                    value: value.to_string(),
                });
            }
        };
        Ok(operator)
    }

    pub const fn sql(self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "<>",
            Operator::Like => "LIKE",
            Operator::GreaterThan => ">",
            Operator::LessThan => "<",
            Operator::GreaterOrEqual => ">=",
            Operator::LessOrEqual => "<=",
            Operator::IsNull => "IS NULL",
        }
    }

    /// `IS NULL` is the only operator that binds no value.
    pub const fn binds_value(self) -> bool {
        !matches!(self, Operator::IsNull)
    }
}

/// Combinator applied uniformly across a [`ConditionGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Combinator {
    And,
    Or,
}

impl Combinator {
    pub fn parse(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "and" => Ok(Combinator::And),
            "or" => Ok(Combinator::Or),
            _ => Err(MySqlError::InvalidCombinator {
                value: value.to_string(),
            }),
        }
    }

    pub const fn separator(self) -> &'static str {
        match self {
            Combinator::And => " AND ",
            Combinator::Or => " OR ",
        }
    }
}

/// A single `(column, operator, value)` filter as supplied by the caller.
///
/// The operator stays a string here so that an unknown name surfaces as
/// [`MySqlError::UnsupportedOperator`] rather than a deserialization failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub column: String,
    #[serde(default = "default_operator")]
    pub operator: String,
    #[serde(default)]
    pub value: Value,
}

fn default_operator() -> String {
    "equal".to_string()
}

impl Condition {
    pub fn new<C: Into<String>, O: Into<String>>(column: C, operator: O, value: Value) -> Self {
        Self {
            column: column.into(),
            operator: operator.into(),
            value,
        }
    }
}

/// Conditions joined by a single combinator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionGroup {
    #[serde(default = "default_combinator")]
    pub combinator: String,
    #[serde(default)]
    pub conditions: Vec<Condition>,
}

fn default_combinator() -> String {
    "and".to_string()
}

impl ConditionGroup {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn build(&self) -> Result<(String, Vec<Value>)> {
        build_condition_group(&self.combinator, &self.conditions)
    }
}

/// Render `conditions` into a parameterized clause.
///
/// The returned values line up one-to-one, left to right, with the `?`
/// placeholders in the clause; `IS NULL` conditions contribute neither.
pub fn build_condition_group(
    combinator: &str,
    conditions: &[Condition],
) -> Result<(String, Vec<Value>)> {
    let combinator = Combinator::parse(combinator)?;

    let mut fragments = Vec::with_capacity(conditions.len());
    let mut values = Vec::with_capacity(conditions.len());

    for condition in conditions {
        let column = quote_column(&condition.column)?;
        let operator = Operator::parse(&condition.operator)?;

        if operator.binds_value() {
            fragments.push(format!("{} {} ?", column, operator.sql()));
            values.push(condition.value.clone());
        } else {
            fragments.push(format!("{} {}", column, operator.sql()));
        }
    }

    Ok((fragments.join(combinator.separator()), values))
}
