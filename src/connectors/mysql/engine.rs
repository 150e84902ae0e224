//! Batch execution over an open [`Session`].

use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use super::connection::{ConnectionIdentity, Session, SqlWarning, StatementOutcome};
use super::error::{DriverError, QueryError, Result};
use super::normalize::normalize_rows;
use super::statement::{BatchingMode, ExecutionOptions, Statement};

pub const NOTE_CONFLICT_SKIPPED: &str = "skipped due to conflict";
pub const NOTE_BATCH_CONFLICT_SKIPPED: &str =
    "skipped due to conflict; transaction rolled back, nothing was committed";

/// Per-statement diagnostics, attached when `detailed_output` is set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatementInfo {
    pub index: usize,
    pub sql: String,
    pub values: Vec<Value>,
    pub connection: ConnectionIdentity,
    pub affected_rows: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_insert_id: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<SqlWarning>,
    pub skipped: bool,
    /// Undone by a transaction rollback; nothing this statement did persists.
    pub rolled_back: bool,
}

/// Normalized rows of one row-returning statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResultSet {
    pub statement_index: usize,
    pub rows: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_info: Option<Vec<StatementInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_sets: Option<Vec<ResultSet>>,
}

impl ExecutionResult {
    fn success() -> Self {
        Self {
            status: "success".to_string(),
            note: None,
            execution_info: None,
            result_sets: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == "success"
    }
}

struct Batch<'a> {
    statements: &'a [Statement],
    options: ExecutionOptions,
    infos: Vec<StatementInfo>,
    result_sets: Vec<ResultSet>,
    skipped: usize,
}

impl<'a> Batch<'a> {
    fn in_transaction(&self) -> bool {
        self.options.batching == BatchingMode::Transaction
    }

    fn info(
        &self,
        index: usize,
        identity: &ConnectionIdentity,
        outcome: Option<&StatementOutcome>,
        warnings: Vec<SqlWarning>,
    ) -> StatementInfo {
        let statement = &self.statements[index];
        StatementInfo {
            index,
            sql: statement.sql.clone(),
            values: statement.values.clone(),
            connection: identity.clone(),
            affected_rows: outcome.map(|o| o.affected_rows).unwrap_or_default(),
            last_insert_id: outcome.and_then(|o| o.last_insert_id),
            warnings,
            skipped: outcome.is_none(),
            rolled_back: false,
        }
    }

    fn failure(&self, index: Option<usize>, err: DriverError, rolled_back: bool) -> QueryError {
        QueryError {
            index,
            sql: index.map(|i| self.statements[i].sql.clone()),
            code: err.code,
            message: err.message,
            rolled_back,
            statements: self.statements.to_vec(),
        }
    }

    fn finish(self, note: Option<&str>) -> ExecutionResult {
        let mut result = ExecutionResult::success();
        result.note = note.map(str::to_string);
        if self.options.detailed_output {
            result.execution_info = Some(self.infos);
        }
        if !self.result_sets.is_empty() {
            result.result_sets = Some(self.result_sets);
        }
        result
    }
}

/// Roll back, reporting whether the server confirmed it.
async fn rollback(session: &mut dyn Session) -> bool {
    match session.rollback().await {
        Ok(()) => true,
        Err(e) => {
            warn!(error = %e, "rollback failed");
            false
        }
    }
}

/// Run `statements` in order under `options`.
///
/// In `transaction` mode nothing is committed unless every statement succeeds.
/// In `none` mode each statement commits on its own and a failure stops the
/// batch, leaving earlier statements applied. Conflicts are skipped instead of
/// failing when `skip_on_conflict` is set.
pub async fn execute(
    session: &mut dyn Session,
    statements: &[Statement],
    options: ExecutionOptions,
) -> Result<ExecutionResult> {
    let started = Instant::now();
    let mut batch = Batch {
        statements,
        options,
        infos: Vec::new(),
        result_sets: Vec::new(),
        skipped: 0,
    };
    let identity = session.identity().clone();
    let transactional = batch.in_transaction();

    if transactional {
        session
            .begin()
            .await
            .map_err(|e| batch.failure(None, e, false))?;
    }

    for (index, statement) in statements.iter().enumerate() {
        match session.execute(statement).await {
            Ok(mut outcome) => {
                let warnings = if options.detailed_output {
                    session.warnings().await.unwrap_or_else(|e| {
                        warn!(index, error = %e, "could not read warnings");
                        Vec::new()
                    })
                } else {
                    Vec::new()
                };

                if let Some(rows) = outcome.rows.take() {
                    batch.result_sets.push(ResultSet {
                        statement_index: index,
                        rows: normalize_rows(rows),
                    });
                }
                if options.detailed_output {
                    let info = batch.info(index, &identity, Some(&outcome), warnings);
                    batch.infos.push(info);
                }
            }
            Err(err) if err.unique_violation && options.skip_on_conflict => {
                if options.detailed_output {
                    let info = batch.info(index, &identity, None, Vec::new());
                    batch.infos.push(info);
                }

                if transactional {
                    let rolled_back = rollback(session).await;
                    warn!(
                        index,
                        code = err.code.as_deref().unwrap_or_default(),
                        rolled_back,
                        "conflict inside transaction; batch skipped"
                    );
                    // Earlier work belongs to the rolled back transaction.
                    batch.result_sets.clear();
                    for info in &mut batch.infos {
                        info.rolled_back = true;
                        info.affected_rows = 0;
                        info.last_insert_id = None;
                    }
                    return Ok(batch.finish(Some(NOTE_BATCH_CONFLICT_SKIPPED)));
                }

                warn!(
                    index,
                    code = err.code.as_deref().unwrap_or_default(),
                    "conflict; statement skipped"
                );
                batch.skipped += 1;
            }
            Err(err) => {
                let rolled_back = transactional && rollback(session).await;
                if transactional {
                    warn!(index, rolled_back, error = %err, "statement failed; transaction rolled back");
                } else {
                    warn!(index, error = %err, "statement failed; batch stopped");
                }
                return Err(batch.failure(Some(index), err, rolled_back).into());
            }
        }
    }

    if transactional && let Err(err) = session.commit().await {
        let rolled_back = rollback(session).await;
        warn!(error = %err, rolled_back, "commit failed");
        return Err(batch.failure(None, err, rolled_back).into());
    }

    info!(
        statements = statements.len(),
        skipped = batch.skipped,
        transactional,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "batch executed"
    );

    let note = (batch.skipped > 0).then_some(NOTE_CONFLICT_SKIPPED);
    Ok(batch.finish(note))
}
