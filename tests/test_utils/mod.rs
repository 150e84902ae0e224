//! Test utilities for the MySQL connector.
//!
//! An in-memory stand-in for a MySQL server: tables hold rows keyed by a
//! unique `id` column, transactions snapshot and restore table state, and
//! statements are recognised by the shape the statement builder emits.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{
    Arc, Mutex,
    atomic::{AtomicU64, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use connectors::connectors::mysql::connection::{
    ConnectionIdentity, Session, SessionProvider, SqlWarning, StatementOutcome,
};
use connectors::connectors::mysql::error::{ConnectionError, DriverError};
use connectors::connectors::mysql::normalize::SqlValue;
use connectors::connectors::mysql::{ConnectionConfig, Statement};
use regex::Regex;
use serde_json::Value;

type Table = Vec<BTreeMap<String, Value>>;

/// Shared table state plus counters observed by tests.
#[derive(Default)]
pub struct InMemoryDatabase {
    tables: Mutex<BTreeMap<String, Table>>,
    /// Every SQL text executed, including transaction control.
    log: Mutex<Vec<String>>,
    next_connection_id: AtomicU64,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

impl InMemoryDatabase {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn create_table(&self, name: &str) {
        self.tables
            .lock()
            .unwrap()
            .insert(name.to_string(), Vec::new());
    }

    pub fn rows(&self, table: &str) -> Table {
        self.tables
            .lock()
            .unwrap()
            .get(table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    fn record(&self, sql: &str) {
        self.log.lock().unwrap().push(sql.to_string());
    }
}

pub struct InMemorySession {
    db: Arc<InMemoryDatabase>,
    identity: ConnectionIdentity,
    snapshot: Option<BTreeMap<String, Table>>,
    last_warnings: Vec<SqlWarning>,
}

impl InMemorySession {
    fn insert(&mut self, statement: &Statement) -> Result<StatementOutcome, DriverError> {
        let pattern = Regex::new(r"^INSERT (?:\w+ )?INTO `([^`]+)` \(([^)]*)\) VALUES").unwrap();
        let captures = pattern
            .captures(&statement.sql)
            .ok_or_else(|| DriverError::new("unsupported insert").with_code("1064"))?;
        let table = captures[1].to_string();
        let columns: Vec<String> = captures[2]
            .split(", ")
            .map(|c| c.trim_matches('`').to_string())
            .collect();

        let mut tables = self.db.tables.lock().unwrap();
        let rows = tables
            .get_mut(&table)
            .ok_or_else(|| DriverError::new(format!("Table '{}' doesn't exist", table)).with_code("1146"))?;

        let mut row = BTreeMap::new();
        for (column, value) in columns.into_iter().zip(statement.values.iter()) {
            if column == "missing_column" {
                return Err(DriverError::new("Unknown column 'missing_column' in 'field list'")
                    .with_code("1054"));
            }
            row.insert(column, value.clone());
        }

        if let Some(id) = row.get("id")
            && rows.iter().any(|existing| existing.get("id") == Some(id))
        {
            return Err(DriverError::unique_violation(format!(
                "Duplicate entry '{}' for key 'PRIMARY'",
                id
            )));
        }

        let id = row.get("id").and_then(Value::as_u64);
        rows.push(row);
        self.last_warnings = Vec::new();
        Ok(StatementOutcome {
            affected_rows: 1,
            last_insert_id: Some(id.unwrap_or(rows.len() as u64)),
            rows: None,
        })
    }

    fn select(&self, statement: &Statement) -> Result<StatementOutcome, DriverError> {
        let pattern = Regex::new(r"FROM `([^`]+)`").unwrap();
        let table = pattern
            .captures(&statement.sql)
            .map(|c| c[1].to_string())
            .ok_or_else(|| DriverError::new("unsupported select").with_code("1064"))?;
        let tables = self.db.tables.lock().unwrap();
        let rows = tables
            .get(&table)
            .ok_or_else(|| DriverError::new(format!("Table '{}' doesn't exist", table)).with_code("1146"))?;

        let rows = rows
            .iter()
            .map(|row| {
                row.iter()
                    .map(|(column, value)| (column.clone(), to_sql_value(value)))
                    .collect()
            })
            .collect();
        Ok(StatementOutcome {
            affected_rows: 0,
            last_insert_id: None,
            rows: Some(rows),
        })
    }

    fn delete_all(&mut self, statement: &Statement) -> Result<StatementOutcome, DriverError> {
        let pattern = Regex::new(r"^(?:DELETE FROM|TRUNCATE TABLE) `([^`]+)`$").unwrap();
        let table = pattern
            .captures(&statement.sql)
            .map(|c| c[1].to_string())
            .ok_or_else(|| DriverError::new("unsupported delete").with_code("1064"))?;
        let mut tables = self.db.tables.lock().unwrap();
        let rows = tables
            .get_mut(&table)
            .ok_or_else(|| DriverError::new(format!("Table '{}' doesn't exist", table)).with_code("1146"))?;
        let affected = rows.len() as u64;
        rows.clear();
        Ok(StatementOutcome {
            affected_rows: affected,
            last_insert_id: None,
            rows: None,
        })
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Bool(*b),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Int)
            .or_else(|| n.as_f64().map(SqlValue::Float))
            .unwrap_or(SqlValue::Null),
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Json(other.clone()),
    }
}

#[async_trait]
impl Session for InMemorySession {
    fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }

    async fn begin(&mut self) -> Result<(), DriverError> {
        self.db.record("START TRANSACTION");
        self.snapshot = Some(self.db.tables.lock().unwrap().clone());
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.db.record("COMMIT");
        self.snapshot = None;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.db.record("ROLLBACK");
        if let Some(snapshot) = self.snapshot.take() {
            *self.db.tables.lock().unwrap() = snapshot;
        }
        Ok(())
    }

    async fn execute(&mut self, statement: &Statement) -> Result<StatementOutcome, DriverError> {
        self.db.record(&statement.sql);
        let sql = statement.sql.as_str();
        if sql.starts_with("INSERT") {
            self.insert(statement)
        } else if sql.starts_with("SELECT") {
            self.select(statement)
        } else if sql.starts_with("DELETE") || sql.starts_with("TRUNCATE") {
            self.delete_all(statement)
        } else {
            Err(DriverError::new(format!("You have an error in your SQL syntax near '{}'", sql))
                .with_code("1064"))
        }
    }

    async fn warnings(&mut self) -> Result<Vec<SqlWarning>, DriverError> {
        Ok(self.last_warnings.clone())
    }

    async fn close(self: Box<Self>) {
        self.db.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// Opens sessions on an [`InMemoryDatabase`], or fails with a fixed error.
pub struct InMemoryProvider {
    pub db: Arc<InMemoryDatabase>,
    pub fail_with: Option<ConnectionError>,
}

impl InMemoryProvider {
    pub fn new(db: Arc<InMemoryDatabase>) -> Self {
        Self { db, fail_with: None }
    }

    pub fn failing(db: Arc<InMemoryDatabase>, error: ConnectionError) -> Self {
        Self {
            db,
            fail_with: Some(error),
        }
    }
}

#[async_trait]
impl SessionProvider for InMemoryProvider {
    async fn open(&self, _config: &ConnectionConfig) -> Result<Box<dyn Session>, ConnectionError> {
        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        self.db.opened.fetch_add(1, Ordering::SeqCst);
        let connection_id = self.db.next_connection_id.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(Box::new(InMemorySession {
            db: Arc::clone(&self.db),
            identity: ConnectionIdentity {
                connection_id,
                server_version: "8.0.36-memory".to_string(),
            },
            snapshot: None,
            last_warnings: Vec::new(),
        }))
    }
}

/// Credentials accepted by the resolver for a direct connection.
pub fn direct_credentials() -> Value {
    serde_json::json!({
        "host": "db.internal",
        "port": 3306,
        "database": "shop",
        "user": "app",
        "password": "secret"
    })
}
