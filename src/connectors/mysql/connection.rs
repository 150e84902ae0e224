//! Connection provider and the live session used for one invocation.
//!
//! [`Session`] and [`SessionProvider`] are the seams between the execution
//! engine and the driver; [`MySqlSessionProvider`] is the `sqlx` implementation.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use sqlx::mysql::{
    MySql, MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlDatabaseError, MySqlRow,
    MySqlSslMode,
};
use sqlx::query::Query;
use sqlx::{Column, ConnectOptions, Connection, Executor as _, Row as _, TypeInfo, ValueRef};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::config::{ConnectionConfig, RetryPolicy};
use super::error::{ConnectionError, ConnectionErrorKind, DriverError};
use super::normalize::{Row, SqlValue};
use super::statement::{Statement, StatementKind};
use super::tunnel::SshTunnel;

/// MySQL error numbers that indicate a duplicate key / unique-constraint violation.
pub const UNIQUE_VIOLATION_CODES: [u16; 4] = [1022, 1062, 1169, 1586];

const ACCESS_DENIED_CODES: [u16; 3] = [1044, 1045, 1698];
const UNKNOWN_DATABASE_CODE: u16 = 1049;
/// `ER_HOST_NOT_PRIVILEGED`: the account may not connect from this host.
const HOST_NOT_ALLOWED_CODE: u16 = 1130;

/// Who the engine is talking to; attached to execution metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionIdentity {
    pub connection_id: u64,
    pub server_version: String,
}

/// What a single statement produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementOutcome {
    pub affected_rows: u64,
    pub last_insert_id: Option<u64>,
    /// Present for row-returning statements.
    pub rows: Option<Vec<Row>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlWarning {
    pub level: String,
    pub code: u64,
    pub message: String,
}

/// One open connection (and its tunnel, if any).
#[async_trait]
pub trait Session: Send {
    fn identity(&self) -> &ConnectionIdentity;

    async fn begin(&mut self) -> Result<(), DriverError>;

    async fn commit(&mut self) -> Result<(), DriverError>;

    async fn rollback(&mut self) -> Result<(), DriverError>;

    async fn execute(&mut self, statement: &Statement) -> Result<StatementOutcome, DriverError>;

    /// Warnings raised by the most recent statement.
    async fn warnings(&mut self) -> Result<Vec<SqlWarning>, DriverError>;

    /// Close the connection and tear down the tunnel.
    async fn close(self: Box<Self>);
}

#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn Session>, ConnectionError>;
}

/// Run `attempt_fn` until it succeeds, fails with a non-retryable error, or
/// `policy.max_attempts` is reached. The returned error carries the attempt count.
pub async fn connect_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    mut attempt_fn: F,
) -> Result<T, ConnectionError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ConnectionError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match attempt_fn(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(attempt, "connected after retry");
                }
                return Ok(value);
            }
            Err(err) => {
                if !err.kind.is_retryable() || attempt >= max_attempts {
                    warn!(
                        attempt,
                        kind = %err.kind,
                        error = %err.message,
                        "giving up on connection"
                    );
                    return Err(err.with_attempts(attempt));
                }

                let delay = policy.delay_after(attempt);
                warn!(
                    attempt,
                    error = %err.message,
                    "connection attempt failed, retrying in {:?}",
                    delay
                );
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

fn mysql_error_number(err: &sqlx::Error) -> Option<u16> {
    match err {
        sqlx::Error::Database(db) => db
            .try_downcast_ref::<MySqlDatabaseError>()
            .map(|e| e.number()),
        _ => None,
    }
}

/// Map a connect-time driver failure onto the connection error taxonomy.
///
/// Only transport-level failures are retryable; anything the server or the
/// TLS layer refused will fail the same way on the next attempt.
pub fn classify_connect_error(err: &sqlx::Error) -> ConnectionErrorKind {
    match mysql_error_number(err) {
        Some(code) if ACCESS_DENIED_CODES.contains(&code) || code == HOST_NOT_ALLOWED_CODE => {
            return ConnectionErrorKind::AuthenticationFailed;
        }
        Some(UNKNOWN_DATABASE_CODE) => return ConnectionErrorKind::DatabaseNotFound,
        _ => {}
    }

    match err {
        sqlx::Error::Io(_) | sqlx::Error::Protocol(_) | sqlx::Error::PoolTimedOut => {
            ConnectionErrorKind::NetworkError
        }
        _ => ConnectionErrorKind::ConnectionRejected,
    }
}

/// Map a statement-time driver failure onto a [`DriverError`].
pub fn driver_error(err: sqlx::Error) -> DriverError {
    if let sqlx::Error::Database(db) = &err
        && let Some(mysql) = db.try_downcast_ref::<MySqlDatabaseError>()
    {
        let code = mysql.number();
        return DriverError {
            code: Some(code.to_string()),
            message: mysql.message().to_string(),
            unique_violation: UNIQUE_VIOLATION_CODES.contains(&code) || db.is_unique_violation(),
        };
    }
    DriverError::new(err.to_string())
}

fn connect_options(config: &ConnectionConfig, host: &str, port: u16) -> MySqlConnectOptions {
    let mut options = MySqlConnectOptions::new()
        .host(host)
        .port(port)
        .username(&config.user)
        .password(config.password.expose())
        .database(&config.database)
        .log_statements(log::LevelFilter::Debug);

    if let Some(tls) = &config.tls {
        options = options
            .ssl_mode(MySqlSslMode::VerifyCa)
            .ssl_ca(&tls.ca_cert_path)
            .ssl_client_cert(&tls.client_cert_path)
            .ssl_client_key(&tls.client_key_path);
    }
    options
}

fn bind_value<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &'q Value,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else if let Some(u) = n.as_u64() {
                query.bind(u)
            } else {
                query.bind(n.as_f64())
            }
        }
        Value::String(s) => query.bind(s.as_str()),
        // Nested structures are sent as their JSON text.
        Value::Array(_) | Value::Object(_) => query.bind(value.to_string()),
    }
}

fn try_cell<'r, T>(row: &'r MySqlRow, index: usize) -> Option<T>
where
    T: sqlx::Decode<'r, MySql> + sqlx::Type<MySql>,
{
    row.try_get::<T, _>(index).ok()
}

fn decode_fallback(row: &MySqlRow, index: usize) -> SqlValue {
    if let Some(text) = try_cell::<String>(row, index) {
        return SqlValue::Text(text);
    }
    match try_cell::<Vec<u8>>(row, index) {
        Some(bytes) => match String::from_utf8(bytes) {
            Ok(text) => SqlValue::Text(text),
            Err(e) => SqlValue::Bytes(e.into_bytes()),
        },
        None => SqlValue::Null,
    }
}

/// Decode one cell using the column's declared type.
pub fn decode_cell(row: &MySqlRow, index: usize) -> SqlValue {
    match row.try_get_raw(index) {
        Ok(raw) if raw.is_null() => return SqlValue::Null,
        Err(_) => return SqlValue::Null,
        Ok(_) => {}
    }

    let type_name = row.column(index).type_info().name().to_ascii_uppercase();
    let decoded = match type_name.as_str() {
        "BOOLEAN" => try_cell::<bool>(row, index).map(SqlValue::Bool),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" => {
            try_cell::<i64>(row, index).map(SqlValue::Int)
        }
        name if name.ends_with(" UNSIGNED") => try_cell::<u64>(row, index).map(SqlValue::UInt),
        "YEAR" => try_cell::<u16>(row, index).map(|y| SqlValue::UInt(u64::from(y))),
        "FLOAT" => try_cell::<f32>(row, index).map(|f| SqlValue::Float(f64::from(f))),
        "DOUBLE" => try_cell::<f64>(row, index).map(SqlValue::Float),
        "DECIMAL" => try_cell::<rust_decimal::Decimal>(row, index).map(SqlValue::Decimal),
        "DATE" => try_cell::<chrono::NaiveDate>(row, index).map(SqlValue::Date),
        "DATETIME" => try_cell::<chrono::NaiveDateTime>(row, index).map(SqlValue::DateTime),
        "TIMESTAMP" => {
            try_cell::<chrono::DateTime<chrono::Utc>>(row, index).map(SqlValue::Timestamp)
        }
        "TIME" => try_cell::<chrono::NaiveTime>(row, index).map(SqlValue::Time),
        "JSON" => try_cell::<Value>(row, index).map(SqlValue::Json),
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => try_cell::<Vec<u8>>(row, index).map(SqlValue::Bytes),
        _ => None,
    };

    // TIME values outside 00:00-24:00 and similar edge cases land here.
    decoded.unwrap_or_else(|| decode_fallback(row, index))
}

fn decode_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .map(|column| (column.name().to_string(), decode_cell(row, column.ordinal())))
        .collect()
}

fn warning_from_row(row: &MySqlRow) -> SqlWarning {
    let text = |index: usize| match decode_cell(row, index) {
        SqlValue::Text(s) => s,
        SqlValue::Null => String::new(),
        other => format!("{:?}", other),
    };
    let code = match decode_cell(row, 1) {
        SqlValue::UInt(u) => u,
        SqlValue::Int(i) => u64::try_from(i).unwrap_or_default(),
        SqlValue::Text(s) => s.parse().unwrap_or_default(),
        _ => 0,
    };
    SqlWarning {
        level: text(0),
        code,
        message: text(2),
    }
}

/// `sqlx` session over one `MySqlConnection`.
pub struct MySqlSession {
    conn: MySqlConnection,
    tunnel: Option<SshTunnel>,
    identity: ConnectionIdentity,
}

impl MySqlSession {
    async fn run_control(&mut self, sql: &'static str) -> Result<(), DriverError> {
        (&mut self.conn)
            .execute(sqlx::raw_sql(sql))
            .await
            .map(|_| ())
            .map_err(driver_error)
    }
}

#[async_trait]
impl Session for MySqlSession {
    fn identity(&self) -> &ConnectionIdentity {
        &self.identity
    }

    async fn begin(&mut self) -> Result<(), DriverError> {
        self.run_control("START TRANSACTION").await
    }

    async fn commit(&mut self) -> Result<(), DriverError> {
        self.run_control("COMMIT").await
    }

    async fn rollback(&mut self) -> Result<(), DriverError> {
        self.run_control("ROLLBACK").await
    }

    async fn execute(&mut self, statement: &Statement) -> Result<StatementOutcome, DriverError> {
        debug!(sql = %statement.sql, params = statement.values.len(), "executing statement");

        // Raw SQL without parameters goes over the text protocol so that
        // statements MySQL cannot prepare still work.
        let unprepared = statement.kind == StatementKind::Raw && statement.values.is_empty();

        if statement.returns_rows {
            let rows = if unprepared {
                (&mut self.conn).fetch_all(sqlx::raw_sql(&statement.sql)).await
            } else {
                statement
                    .values
                    .iter()
                    .fold(sqlx::query(&statement.sql), bind_value)
                    .fetch_all(&mut self.conn)
                    .await
            }
            .map_err(driver_error)?;

            let rows: Vec<Row> = rows.iter().map(decode_row).collect();
            return Ok(StatementOutcome {
                affected_rows: rows.len() as u64,
                last_insert_id: None,
                rows: Some(rows),
            });
        }

        let result = if unprepared {
            (&mut self.conn).execute(sqlx::raw_sql(&statement.sql)).await
        } else {
            statement
                .values
                .iter()
                .fold(sqlx::query(&statement.sql), bind_value)
                .execute(&mut self.conn)
                .await
        }
        .map_err(driver_error)?;

        Ok(StatementOutcome {
            affected_rows: result.rows_affected(),
            last_insert_id: statement
                .kind
                .reports_insert_id()
                .then(|| result.last_insert_id()),
            rows: None,
        })
    }

    async fn warnings(&mut self) -> Result<Vec<SqlWarning>, DriverError> {
        let rows = (&mut self.conn)
            .fetch_all(sqlx::raw_sql("SHOW WARNINGS"))
            .await
            .map_err(driver_error)?;
        Ok(rows.iter().map(warning_from_row).collect())
    }

    async fn close(self: Box<Self>) {
        let MySqlSession {
            conn,
            tunnel,
            identity,
        } = *self;
        if let Err(e) = conn.close().await {
            debug!(connection_id = identity.connection_id, error = %e, "error while closing connection");
        }
        if let Some(tunnel) = tunnel {
            tunnel.close().await;
        }
        debug!(connection_id = identity.connection_id, "session closed");
    }
}

/// Opens [`MySqlSession`]s, directly or through an SSH tunnel.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlSessionProvider;

impl MySqlSessionProvider {
    pub fn new() -> Self {
        Self
    }
}

async fn connect_once(
    options: MySqlConnectOptions,
    connect_timeout: Duration,
    attempt: u32,
) -> Result<MySqlConnection, ConnectionError> {
    debug!(attempt, "connecting to MySQL");
    match tokio::time::timeout(connect_timeout, options.connect()).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(e)) => Err(ConnectionError::new(classify_connect_error(&e), e.to_string())),
        Err(_) => Err(ConnectionError::network(format!(
            "connect timed out after {}ms",
            connect_timeout.as_millis()
        ))),
    }
}

async fn read_identity(conn: &mut MySqlConnection) -> Result<ConnectionIdentity, sqlx::Error> {
    let (connection_id, server_version): (u64, String) =
        sqlx::query_as("SELECT CONNECTION_ID(), VERSION()")
            .fetch_one(conn)
            .await?;
    Ok(ConnectionIdentity {
        connection_id,
        server_version,
    })
}

#[async_trait]
impl SessionProvider for MySqlSessionProvider {
    async fn open(&self, config: &ConnectionConfig) -> Result<Box<dyn Session>, ConnectionError> {
        if let Some(hint) = config.pool_size_hint {
            debug!(pool_size_hint = hint, "pool size hint ignored; one connection per call");
        }

        // The tunnel is set up once; only the database connect is retried.
        let tunnel = match &config.ssh {
            Some(ssh) => Some(SshTunnel::open(ssh, &config.host).await?),
            None => None,
        };

        let (host, port) = match &tunnel {
            Some(tunnel) => ("127.0.0.1".to_string(), tunnel.local_port()),
            None => (config.host.clone(), config.port),
        };
        let options = connect_options(config, &host, port);
        let connect_timeout = config.connect_timeout;

        let connected = connect_with_retry(config.retry, |attempt| {
            connect_once(options.clone(), connect_timeout, attempt)
        })
        .await;

        let mut conn = match connected {
            Ok(conn) => conn,
            Err(err) => {
                if let Some(tunnel) = tunnel {
                    tunnel.close().await;
                }
                return Err(err);
            }
        };

        let identity = match read_identity(&mut conn).await {
            Ok(identity) => identity,
            Err(e) => {
                let _ = conn.close().await;
                if let Some(tunnel) = tunnel {
                    tunnel.close().await;
                }
                return Err(ConnectionError::network(format!(
                    "cannot read connection identity: {}",
                    e
                )));
            }
        };

        info!(
            host = %config.host,
            database = %config.database,
            connection_id = identity.connection_id,
            server_version = %identity.server_version,
            tunneled = config.ssh.is_some(),
            tls = config.tls.is_some(),
            "connected to MySQL"
        );

        Ok(Box::new(MySqlSession {
            conn,
            tunnel,
            identity,
        }))
    }
}
