//! Statement building for the five supported operations.
//!
//! Each [`StatementSpec`] turns into an ordered list of [`Statement`]s. Values
//! never appear in SQL text; identifiers are validated and quoted by
//! [`super::identifier`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use super::conditions::ConditionGroup;
use super::error::{MySqlError, Result};
use super::identifier::{quote_column, quote_identifier};

/// How a list of statements is committed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchingMode {
    /// One transaction around the whole batch.
    #[default]
    Transaction,
    /// Each statement commits on its own.
    #[serde(rename = "none", alias = "independent")]
    Independent,
}

/// Optional scheduling hint for inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertPriority {
    #[default]
    #[serde(alias = "none")]
    Normal,
    Low,
    High,
}

impl InsertPriority {
    const fn keyword(self) -> &'static str {
        match self {
            InsertPriority::Normal => "",
            InsertPriority::Low => "LOW_PRIORITY ",
            InsertPriority::High => "HIGH_PRIORITY ",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteCommand {
    Truncate,
    Drop,
    #[default]
    Delete,
}

/// Which operation produced a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatementKind {
    Insert,
    Update,
    Delete,
    Select,
    #[default]
    Raw,
}

impl StatementKind {
    /// Whether `last_insert_id` is meaningful for this kind of statement.
    pub const fn reports_insert_id(self) -> bool {
        matches!(self, StatementKind::Insert | StatementKind::Raw)
    }
}

/// SQL text plus the values bound, in order, to its `?` placeholders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub values: Vec<Value>,
    #[serde(skip)]
    pub kind: StatementKind,
    #[serde(skip)]
    pub returns_rows: bool,
}

impl Statement {
    pub fn new<S: Into<String>>(kind: StatementKind, sql: S, values: Vec<Value>) -> Self {
        let sql = sql.into();
        let returns_rows = match kind {
            StatementKind::Select => true,
            StatementKind::Raw => returns_rows(&sql),
            _ => false,
        };
        Self {
            sql,
            values,
            kind,
            returns_rows,
        }
    }
}

/// Guess whether raw SQL produces a result set from its leading keyword.
pub fn returns_rows(sql: &str) -> bool {
    let keyword = sql
        .trim_start_matches(|c: char| c.is_whitespace() || c == '(')
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(
        keyword.as_str(),
        "SELECT" | "SHOW" | "DESCRIBE" | "DESC" | "EXPLAIN" | "WITH" | "VALUES" | "TABLE"
    )
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsertSpec {
    pub table: String,
    pub rows: Vec<Map<String, Value>>,
    #[serde(default)]
    pub priority: InsertPriority,
    #[serde(default)]
    pub empty_to_null: bool,
    #[serde(default)]
    pub skip_on_conflict: bool,
    #[serde(default)]
    pub detailed_output: bool,
    #[serde(default)]
    pub batching: BatchingMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSpec {
    pub table: String,
    pub row: Map<String, Value>,
    pub match_column: String,
    #[serde(default)]
    pub match_value: Option<Value>,
    #[serde(default)]
    pub empty_to_null: bool,
    #[serde(default)]
    pub detailed_output: bool,
    #[serde(default)]
    pub batching: BatchingMode,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteSpec {
    pub table: String,
    #[serde(default)]
    pub command: DeleteCommand,
    #[serde(default)]
    pub filter: Option<ConditionGroup>,
    #[serde(default)]
    pub detailed_output: bool,
    #[serde(default)]
    pub batching: BatchingMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortRule {
    pub column: String,
    #[serde(default = "default_direction")]
    pub direction: String,
}

fn default_direction() -> String {
    "asc".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectSpec {
    pub table: String,
    #[serde(default)]
    pub filter: Option<ConditionGroup>,
    #[serde(default)]
    pub sort: Vec<SortRule>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub distinct: bool,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub return_all: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawStatement {
    pub sql: String,
    #[serde(default)]
    pub values: Vec<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawExecuteSpec {
    pub statements: Vec<RawStatement>,
    #[serde(default)]
    pub empty_to_null: bool,
    #[serde(default)]
    pub skip_on_conflict: bool,
    #[serde(default)]
    pub detailed_output: bool,
    #[serde(default)]
    pub batching: BatchingMode,
}

/// Engine-facing flags carried by a spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecutionOptions {
    pub batching: BatchingMode,
    pub skip_on_conflict: bool,
    pub detailed_output: bool,
}

#[derive(Debug, Clone)]
pub enum StatementSpec {
    Insert(InsertSpec),
    Update(UpdateSpec),
    Delete(DeleteSpec),
    Select(SelectSpec),
    Execute(RawExecuteSpec),
}

impl StatementSpec {
    /// Decode caller parameters for the named operation.
    pub fn from_operation(operation: &str, parameters: Value) -> Result<Self> {
        fn decode<T: serde::de::DeserializeOwned>(parameters: Value) -> Result<T> {
            serde_json::from_value(parameters).map_err(|e| {
                let details = e.to_string();
                match missing_field(&details).map(str::to_string) {
                    Some(field) => MySqlError::missing(field),
                    None => MySqlError::InvalidInput {
                        field: "parameters".to_string(),
                        details,
                    },
                }
            })
        }

        let spec = match operation {
            "insert" => StatementSpec::Insert(decode(parameters)?),
            "update" => StatementSpec::Update(decode(parameters)?),
            "delete" => StatementSpec::Delete(decode(parameters)?),
            "select" => StatementSpec::Select(decode(parameters)?),
            "execute" => StatementSpec::Execute(decode(parameters)?),
            _ => {
                return Err(MySqlError::UnsupportedOperation {
                    operation: operation.to_string(),
                });
            }
        };
        Ok(spec)
    }

    pub fn operation(&self) -> &'static str {
        match self {
            StatementSpec::Insert(_) => "insert",
            StatementSpec::Update(_) => "update",
            StatementSpec::Delete(_) => "delete",
            StatementSpec::Select(_) => "select",
            StatementSpec::Execute(_) => "execute",
        }
    }

    pub fn execution_options(&self) -> ExecutionOptions {
        match self {
            StatementSpec::Insert(spec) => ExecutionOptions {
                batching: spec.batching,
                skip_on_conflict: spec.skip_on_conflict,
                detailed_output: spec.detailed_output,
            },
            StatementSpec::Update(spec) => ExecutionOptions {
                batching: spec.batching,
                skip_on_conflict: false,
                detailed_output: spec.detailed_output,
            },
            StatementSpec::Delete(spec) => ExecutionOptions {
                batching: spec.batching,
                skip_on_conflict: false,
                detailed_output: spec.detailed_output,
            },
            StatementSpec::Select(_) => ExecutionOptions {
                batching: BatchingMode::Independent,
                skip_on_conflict: false,
                detailed_output: false,
            },
            StatementSpec::Execute(spec) => ExecutionOptions {
                batching: spec.batching,
                skip_on_conflict: spec.skip_on_conflict,
                detailed_output: spec.detailed_output,
            },
        }
    }

    pub fn build(&self) -> Result<Vec<Statement>> {
        match self {
            StatementSpec::Insert(spec) => build_insert(spec),
            StatementSpec::Update(spec) => build_update(spec).map(|s| vec![s]),
            StatementSpec::Delete(spec) => build_delete(spec).map(|s| vec![s]),
            StatementSpec::Select(spec) => build_select(spec).map(|s| vec![s]),
            StatementSpec::Execute(spec) => build_raw(spec),
        }
    }
}

/// Pull the field name out of serde's "missing field `name`" message.
fn missing_field(message: &str) -> Option<&str> {
    let rest = message.strip_prefix("missing field `")?;
    rest.split('`').next().filter(|field| !field.is_empty())
}

fn empty_to_null(value: &Value, enabled: bool) -> Value {
    match value {
        Value::String(s) if enabled && s.is_empty() => Value::Null,
        other => other.clone(),
    }
}

/// One `INSERT` per row; rows with different column sets are independent statements.
pub fn build_insert(spec: &InsertSpec) -> Result<Vec<Statement>> {
    let table = quote_identifier(&spec.table)?;
    if spec.rows.is_empty() {
        return Err(MySqlError::invalid_statement("insert requires at least one row"));
    }

    spec.rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            if row.is_empty() {
                return Err(MySqlError::invalid_statement(format!(
                    "insert row {} has no columns",
                    index
                )));
            }

            let mut columns = Vec::with_capacity(row.len());
            let mut values = Vec::with_capacity(row.len());
            for (column, value) in row {
                columns.push(quote_column(column)?);
                values.push(empty_to_null(value, spec.empty_to_null));
            }
            let placeholders = vec!["?"; columns.len()].join(", ");

            Ok(Statement::new(
                StatementKind::Insert,
                format!(
                    "INSERT {}INTO {} ({}) VALUES ({})",
                    spec.priority.keyword(),
                    table,
                    columns.join(", "),
                    placeholders
                ),
                values,
            ))
        })
        .collect()
}

pub fn build_update(spec: &UpdateSpec) -> Result<Statement> {
    let table = quote_identifier(&spec.table)?;
    let match_column = quote_column(&spec.match_column)?;
    // `col = NULL` never matches, so a null match value is treated as absent.
    let match_value = match &spec.match_value {
        Some(value) if !value.is_null() => value.clone(),
        _ => return Err(MySqlError::missing("match_value")),
    };
    if spec.row.is_empty() {
        return Err(MySqlError::invalid_statement(
            "update requires at least one column to set",
        ));
    }

    let mut assignments = Vec::with_capacity(spec.row.len());
    let mut values = Vec::with_capacity(spec.row.len() + 1);
    for (column, value) in &spec.row {
        assignments.push(format!("{} = ?", quote_column(column)?));
        values.push(empty_to_null(value, spec.empty_to_null));
    }
    // The match value binds to the trailing WHERE placeholder.
    values.push(match_value);

    Ok(Statement::new(
        StatementKind::Update,
        format!(
            "UPDATE {} SET {} WHERE {} = ?",
            table,
            assignments.join(", "),
            match_column
        ),
        values,
    ))
}

pub fn build_delete(spec: &DeleteSpec) -> Result<Statement> {
    let table = quote_identifier(&spec.table)?;

    let statement = match spec.command {
        DeleteCommand::Truncate => Statement::new(
            StatementKind::Delete,
            format!("TRUNCATE TABLE {}", table),
            Vec::new(),
        ),
        DeleteCommand::Drop => Statement::new(
            StatementKind::Delete,
            format!("DROP TABLE {}", table),
            Vec::new(),
        ),
        DeleteCommand::Delete => match spec.filter.as_ref().filter(|group| !group.is_empty()) {
            Some(group) => {
                let (clause, values) = group.build()?;
                Statement::new(
                    StatementKind::Delete,
                    format!("DELETE FROM {} WHERE {}", table, clause),
                    values,
                )
            }
            None => {
                warn!(table = %spec.table, "building DELETE without conditions; every row will be removed");
                Statement::new(
                    StatementKind::Delete,
                    format!("DELETE FROM {}", table),
                    Vec::new(),
                )
            }
        },
    };
    Ok(statement)
}

pub fn build_select(spec: &SelectSpec) -> Result<Statement> {
    let table = quote_identifier(&spec.table)?;

    let columns = if spec.columns.is_empty() {
        "*".to_string()
    } else {
        spec.columns
            .iter()
            .map(|c| quote_column(c))
            .collect::<Result<Vec<_>>>()?
            .join(", ")
    };

    let mut sql = format!(
        "SELECT {}{} FROM {}",
        if spec.distinct { "DISTINCT " } else { "" },
        columns,
        table
    );
    let mut values = Vec::new();

    if let Some(group) = spec.filter.as_ref().filter(|group| !group.is_empty()) {
        let (clause, clause_values) = group.build()?;
        sql.push_str(" WHERE ");
        sql.push_str(&clause);
        values = clause_values;
    }

    if !spec.sort.is_empty() {
        let rules = spec
            .sort
            .iter()
            .map(|rule| {
                let direction = match rule.direction.trim().to_ascii_lowercase().as_str() {
                    "asc" | "" => "ASC",
                    "desc" => "DESC",
                    other => {
                        return Err(MySqlError::InvalidInput {
                            field: "sort.direction".to_string(),
                            details: format!("expected 'asc' or 'desc', got '{}'", other),
                        });
                    }
                };
                Ok(format!("{} {}", quote_column(&rule.column)?, direction))
            })
            .collect::<Result<Vec<_>>>()?;
        sql.push_str(" ORDER BY ");
        sql.push_str(&rules.join(", "));
    }

    if !spec.return_all
        && let Some(limit) = spec.limit
    {
        sql.push_str(&format!(" LIMIT {}", limit));
    }

    Ok(Statement::new(StatementKind::Select, sql, values))
}

/// Raw statements pass through verbatim; only their values are touched.
pub fn build_raw(spec: &RawExecuteSpec) -> Result<Vec<Statement>> {
    if spec.statements.is_empty() {
        return Err(MySqlError::invalid_statement(
            "execute requires at least one statement",
        ));
    }

    spec.statements
        .iter()
        .enumerate()
        .map(|(index, raw)| {
            if raw.sql.trim().is_empty() {
                return Err(MySqlError::invalid_statement(format!(
                    "statement {} is empty",
                    index
                )));
            }
            let values = raw
                .values
                .iter()
                .map(|v| empty_to_null(v, spec.empty_to_null))
                .collect();
            Ok(Statement::new(StatementKind::Raw, raw.sql.clone(), values))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectors::mysql::conditions::Condition;
    use serde_json::json;

    fn row(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn insert_builds_one_statement_per_row_with_own_columns() {
        let spec = InsertSpec {
            table: "users".to_string(),
            rows: vec![
                row(json!({"name": "ada", "email": "ada@example.com"})),
                row(json!({"name": "bob"})),
            ],
            ..Default::default()
        };

        let statements = build_insert(&spec).unwrap();

        assert_eq!(statements.len(), 2);
        assert_eq!(
            statements[0].sql,
            "INSERT INTO `users` (`name`, `email`) VALUES (?, ?)"
        );
        assert_eq!(statements[0].values, vec![json!("ada"), json!("ada@example.com")]);
        assert_eq!(statements[1].sql, "INSERT INTO `users` (`name`) VALUES (?)");
        assert_eq!(statements[1].values, vec![json!("bob")]);
        assert!(statements.iter().all(|s| s.kind == StatementKind::Insert));
        assert!(statements.iter().all(|s| !s.returns_rows));
    }

    #[test]
    fn insert_column_count_matches_row_keys() {
        let spec = InsertSpec {
            table: "t".to_string(),
            rows: vec![row(json!({"a": 1, "b": 2, "c": 3, "d": 4}))],
            ..Default::default()
        };
        let statement = &build_insert(&spec).unwrap()[0];
        assert_eq!(statement.sql.matches('?').count(), 4);
        assert_eq!(statement.values, vec![json!(1), json!(2), json!(3), json!(4)]);
    }

    #[test]
    fn insert_priority_and_empty_to_null() {
        let spec = InsertSpec {
            table: "t".to_string(),
            rows: vec![row(json!({"a": "", "b": "x"}))],
            priority: InsertPriority::Low,
            empty_to_null: true,
            ..Default::default()
        };
        let statement = &build_insert(&spec).unwrap()[0];
        assert_eq!(
            statement.sql,
            "INSERT LOW_PRIORITY INTO `t` (`a`, `b`) VALUES (?, ?)"
        );
        assert_eq!(statement.values, vec![Value::Null, json!("x")]);

        let high = InsertSpec {
            priority: InsertPriority::High,
            empty_to_null: false,
            ..spec
        };
        let statement = &build_insert(&high).unwrap()[0];
        assert!(statement.sql.starts_with("INSERT HIGH_PRIORITY INTO"));
        assert_eq!(statement.values[0], json!(""));
    }

    #[test]
    fn insert_rejects_empty_input() {
        let spec = InsertSpec {
            table: "t".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            build_insert(&spec),
            Err(MySqlError::InvalidStatement { .. })
        ));

        let spec = InsertSpec {
            table: "t".to_string(),
            rows: vec![Map::new()],
            ..Default::default()
        };
        assert!(build_insert(&spec).is_err());
    }

    #[test]
    fn update_binds_match_value_last() {
        let spec = UpdateSpec {
            table: "t".to_string(),
            row: row(json!({"name": "x"})),
            match_column: "id".to_string(),
            match_value: Some(json!(42)),
            ..Default::default()
        };

        let statement = build_update(&spec).unwrap();

        assert_eq!(statement.sql, "UPDATE `t` SET `name` = ? WHERE `id` = ?");
        assert_eq!(statement.values, vec![json!("x"), json!(42)]);
    }

    #[test]
    fn update_requires_fields() {
        let spec = UpdateSpec {
            table: "t".to_string(),
            match_column: "id".to_string(),
            match_value: Some(json!(1)),
            ..Default::default()
        };
        assert!(matches!(
            build_update(&spec),
            Err(MySqlError::InvalidStatement { .. })
        ));
    }

    #[test]
    fn truncate_and_drop_are_pure() {
        for (command, expected) in [
            (DeleteCommand::Truncate, "TRUNCATE TABLE `logs`"),
            (DeleteCommand::Drop, "DROP TABLE `logs`"),
        ] {
            let spec = DeleteSpec {
                table: "logs".to_string(),
                command,
                ..Default::default()
            };
            let first = build_delete(&spec).unwrap();
            let second = build_delete(&spec).unwrap();
            assert_eq!(first, second);
            assert_eq!(first.sql, expected);
            assert!(first.values.is_empty());
        }
    }

    #[test]
    fn conditional_and_unconditional_delete() {
        let spec = DeleteSpec {
            table: "logs".to_string(),
            filter: Some(ConditionGroup {
                combinator: "or".to_string(),
                conditions: vec![
                    Condition::new("level", "equal", json!("debug")),
                    Condition::new("archived_at", "is_null", Value::Null),
                ],
            }),
            ..Default::default()
        };
        let statement = build_delete(&spec).unwrap();
        assert_eq!(
            statement.sql,
            "DELETE FROM `logs` WHERE `level` = ? OR `archived_at` IS NULL"
        );
        assert_eq!(statement.values, vec![json!("debug")]);

        let everything = DeleteSpec {
            table: "logs".to_string(),
            filter: Some(ConditionGroup {
                combinator: "and".to_string(),
                conditions: Vec::new(),
            }),
            ..Default::default()
        };
        assert_eq!(build_delete(&everything).unwrap().sql, "DELETE FROM `logs`");
    }

    #[test]
    fn select_composes_all_clauses() {
        let spec = SelectSpec {
            table: "orders".to_string(),
            filter: Some(ConditionGroup {
                combinator: "and".to_string(),
                conditions: vec![Condition::new("total", "greater-than", json!(100))],
            }),
            sort: vec![
                SortRule {
                    column: "created_at".to_string(),
                    direction: "DESC".to_string(),
                },
                SortRule {
                    column: "id".to_string(),
                    direction: "asc".to_string(),
                },
            ],
            columns: vec!["id".to_string(), "total".to_string()],
            distinct: true,
            limit: Some(10),
            return_all: false,
        };

        let statement = build_select(&spec).unwrap();

        assert_eq!(
            statement.sql,
            "SELECT DISTINCT `id`, `total` FROM `orders` WHERE `total` > ? ORDER BY `created_at` DESC, `id` ASC LIMIT 10"
        );
        assert_eq!(statement.values, vec![json!(100)]);
        assert!(statement.returns_rows);
    }

    #[test]
    fn select_return_all_ignores_limit() {
        let spec = SelectSpec {
            table: "orders".to_string(),
            limit: Some(5),
            return_all: true,
            ..Default::default()
        };
        assert_eq!(build_select(&spec).unwrap().sql, "SELECT * FROM `orders`");

        let unbounded = SelectSpec {
            table: "orders".to_string(),
            ..Default::default()
        };
        assert_eq!(build_select(&unbounded).unwrap().sql, "SELECT * FROM `orders`");
    }

    #[test]
    fn select_rejects_bad_sort_direction() {
        let spec = SelectSpec {
            table: "orders".to_string(),
            sort: vec![SortRule {
                column: "id".to_string(),
                direction: "sideways".to_string(),
            }],
            ..Default::default()
        };
        assert!(matches!(
            build_select(&spec),
            Err(MySqlError::InvalidInput { .. })
        ));
    }

    #[test]
    fn raw_statements_pass_through_with_value_substitution() {
        let spec = RawExecuteSpec {
            statements: vec![
                RawStatement {
                    sql: "UPDATE t SET note = ? WHERE id = ?".to_string(),
                    values: vec![json!(""), json!(1)],
                },
                RawStatement {
                    sql: "  select * from t where note = ''".to_string(),
                    values: Vec::new(),
                },
            ],
            empty_to_null: true,
            ..Default::default()
        };

        let statements = build_raw(&spec).unwrap();

        assert_eq!(statements[0].sql, "UPDATE t SET note = ? WHERE id = ?");
        assert_eq!(statements[0].values, vec![Value::Null, json!(1)]);
        assert!(!statements[0].returns_rows);
        assert_eq!(statements[1].sql, "  select * from t where note = ''");
        assert!(statements[1].returns_rows);
    }

    #[test]
    fn returns_rows_detection() {
        assert!(returns_rows("SELECT 1"));
        assert!(returns_rows("(select 1) union (select 2)"));
        assert!(returns_rows("show tables"));
        assert!(returns_rows("WITH x AS (SELECT 1) SELECT * FROM x"));
        assert!(!returns_rows("INSERT INTO t VALUES (1)"));
        assert!(!returns_rows("SET @a = 1"));
    }

    #[test]
    fn from_operation_decodes_parameters() {
        let spec = StatementSpec::from_operation(
            "insert",
            json!({
                "table": "users",
                "rows": [{"name": "ada"}],
                "skip_on_conflict": true,
                "batching": "none"
            }),
        )
        .unwrap();

        let options = spec.execution_options();
        assert_eq!(options.batching, BatchingMode::Independent);
        assert!(options.skip_on_conflict);
        assert!(!options.detailed_output);
        assert_eq!(spec.operation(), "insert");
    }

    #[test]
    fn from_operation_rejects_unknown_operation_and_bad_parameters() {
        for operation in ["upsert", "INSERT", "raw"] {
            assert!(matches!(
                StatementSpec::from_operation(operation, json!({})),
                Err(MySqlError::UnsupportedOperation { .. })
            ));
        }
        assert!(matches!(
            StatementSpec::from_operation("insert", json!({"table": "t", "rows": "nope"})),
            Err(MySqlError::InvalidInput { .. })
        ));
    }

    #[test]
    fn missing_parameters_name_the_field() {
        let cases = [
            ("update", json!({"row": {"name": "x"}, "match_column": "id", "match_value": 1}), "table"),
            ("update", json!({"table": "t", "match_column": "id", "match_value": 1}), "row"),
            ("insert", json!({"table": "t"}), "rows"),
            ("select", json!({}), "table"),
        ];
        for (operation, parameters, expected) in cases {
            match StatementSpec::from_operation(operation, parameters) {
                Err(MySqlError::MissingInput { field }) => assert_eq!(field, expected),
                other => panic!("{}: expected missing {}, got {:?}", operation, expected, other),
            }
        }
    }

    #[test]
    fn update_without_match_value_is_rejected_before_building_sql() {
        for parameters in [
            json!({"table": "t", "row": {"name": "x"}, "match_column": "id"}),
            json!({"table": "t", "row": {"name": "x"}, "match_column": "id", "match_value": null}),
        ] {
            let spec = StatementSpec::from_operation("update", parameters).unwrap();
            match spec.build() {
                Err(MySqlError::MissingInput { field }) => assert_eq!(field, "match_value"),
                other => panic!("expected missing match_value, got {:?}", other),
            }
        }
    }
}
