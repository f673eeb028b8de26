//! SQLite backend
//!
//! Implements the driver seams on top of rusqlite. Templates translate to
//! numbered `?N` parameters; routine calls translate to a scalar function
//! call with `:name` parameters, since SQLite has no stored procedures.

use crate::core::{
    CommandInterrupt, CommandParameters, DatabaseError, DatabaseRow, DatabaseValue, DbExecutor,
    Driver, DriverConnection, ExecutorConfig, NativeCommand, ParameterDescriptor,
    ParameterDirection, ParameterizedQuery, QueryTranslator, Result, ResultCursor,
    StoredProcedureQuery, TemplateSegment,
};
use rusqlite::types::{ToSqlOutput, Value, ValueRef};
use rusqlite::{Connection, ErrorCode, InterruptHandle, OpenFlags, Row, Statement, ToSql};
use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default time to wait on a locked database before failing
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Virtual machine steps between two timeout/cancellation checks
const PROGRESS_STEPS: i32 = 1000;

/// Pause between two attempts on a locked database
const BUSY_RETRY_INTERVAL: Duration = Duration::from_millis(5);

/// Executor running on the SQLite driver
pub type SqliteExecutor = DbExecutor<SqliteDriver>;

impl DbExecutor<SqliteDriver> {
    /// Create an executor over SQLite with default driver settings
    ///
    /// # Errors
    ///
    /// Fails if the connection string or configuration is invalid.
    pub fn sqlite(connection_string: impl Into<String>, config: ExecutorConfig) -> Result<Self> {
        Self::with_driver(SqliteDriver::new(), connection_string, config)
    }
}

/// Translator for the SQLite dialect
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteTranslator;

impl SqliteTranslator {
    fn input_value(descriptor: &ParameterDescriptor) -> Result<DatabaseValue> {
        match descriptor.direction() {
            ParameterDirection::Input | ParameterDirection::InputOutput => {
                Ok(descriptor.value().clone())
            }
            direction => Err(DatabaseError::unsupported(format!(
                "SQLite cannot bind {:?} parameter{}",
                direction,
                descriptor
                    .name()
                    .map(|n| format!(" '{}'", n))
                    .unwrap_or_default()
            ))),
        }
    }
}

impl QueryTranslator for SqliteTranslator {
    fn translate(&self, query: &ParameterizedQuery) -> Result<NativeCommand> {
        let mut sql = String::with_capacity(query.text().len());
        for segment in query.segments()? {
            match segment {
                TemplateSegment::Literal(text) => sql.push_str(&text),
                TemplateSegment::Parameter(index) => {
                    sql.push('?');
                    sql.push_str(&(index + 1).to_string());
                }
            }
        }

        let values = query
            .parameters()
            .iter()
            .map(Self::input_value)
            .collect::<Result<Vec<_>>>()?;

        Ok(NativeCommand::new(sql, CommandParameters::Positional(values)))
    }

    fn procedure_call(&self, query: &StoredProcedureQuery) -> Result<NativeCommand> {
        if query.name().contains('.') {
            return Err(DatabaseError::unsupported(format!(
                "SQLite functions cannot be schema-qualified: '{}'",
                query.name()
            )));
        }

        let mut arguments = Vec::with_capacity(query.parameters().len());
        let mut values = Vec::with_capacity(query.parameters().len());
        for descriptor in query.parameters() {
            let name = descriptor
                .name()
                .ok_or_else(|| DatabaseError::query("Routine arguments must be named"))?;
            let name = format!(":{}", name);
            arguments.push(name.clone());
            values.push((name, Self::input_value(descriptor)?));
        }

        let sql = format!("SELECT {}({})", query.name(), arguments.join(", "));
        Ok(NativeCommand::new(sql, CommandParameters::Named(values)))
    }
}

impl ToSql for DatabaseValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            DatabaseValue::Null => ToSqlOutput::Owned(Value::Null),
            DatabaseValue::Bool(v) => ToSqlOutput::from(*v),
            DatabaseValue::Int(v) => ToSqlOutput::from(*v),
            DatabaseValue::Long(v) => ToSqlOutput::from(*v),
            DatabaseValue::Float(v) => ToSqlOutput::from(f64::from(*v)),
            DatabaseValue::Double(v) => ToSqlOutput::from(*v),
            DatabaseValue::String(v) => ToSqlOutput::Borrowed(ValueRef::Text(v.as_bytes())),
            DatabaseValue::Bytes(v) => ToSqlOutput::Borrowed(ValueRef::Blob(v)),
            DatabaseValue::Timestamp(v) => ToSqlOutput::from(*v),
        })
    }
}

/// SQLite driver
#[derive(Debug, Clone)]
pub struct SqliteDriver {
    translator: SqliteTranslator,
    busy_timeout: Duration,
}

impl SqliteDriver {
    pub fn new() -> Self {
        Self {
            translator: SqliteTranslator,
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Set how long a connection waits on a locked database
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

impl Default for SqliteDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl Driver for SqliteDriver {
    type Connection = SqliteConnection;
    type Translator = SqliteTranslator;

    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn translator(&self) -> &SqliteTranslator {
        &self.translator
    }

    fn validate_connection_string(&self, connection_string: &str) -> Result<()> {
        if connection_string.trim().is_empty() {
            return Err(DatabaseError::invalid_connection_string(
                "connection string is empty",
            ));
        }
        if connection_string.contains('\0') {
            return Err(DatabaseError::invalid_connection_string(
                "connection string contains a NUL byte",
            ));
        }
        Ok(())
    }

    fn open(&self, connection_string: &str) -> Result<SqliteConnection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(connection_string, flags).map_err(|e| {
            DatabaseError::connection_with_source(
                format!("Failed to open '{}'", connection_string),
                Box::new(e),
            )
        })?;
        conn.busy_handler(Some(wait_on_lock))?;

        let connection = SqliteConnection {
            conn,
            cancelled: Arc::new(AtomicBool::new(false)),
            busy_timeout: self.busy_timeout,
        };
        connection.batch("PRAGMA foreign_keys = ON")?;

        tracing::trace!(connection_string, "sqlite connection opened");
        Ok(connection)
    }
}

/// Lock-wait limits of the call currently running on this thread
///
/// The busy handler is a plain function, so the limits of the running call
/// reach it through this slot. SQLite calls the handler on the thread that
/// is stepping the statement.
struct LockWait {
    cancelled: Arc<AtomicBool>,
    timed_out: Arc<AtomicBool>,
    deadline: Option<Instant>,
    busy_timeout: Duration,
    waiting_since: Option<Instant>,
}

thread_local! {
    static LOCK_WAIT: RefCell<Option<LockWait>> = const { RefCell::new(None) };
}

/// Installs a [`LockWait`] for the current thread until dropped
struct LockWaitScope;

impl LockWaitScope {
    fn enter(wait: LockWait) -> Self {
        LOCK_WAIT.with(|slot| *slot.borrow_mut() = Some(wait));
        LockWaitScope
    }
}

impl Drop for LockWaitScope {
    fn drop(&mut self) {
        LOCK_WAIT.with(|slot| slot.borrow_mut().take());
    }
}

/// Busy handler: retry until cancelled, past the command deadline or past
/// the busy timeout of the current lock
fn wait_on_lock(attempts: i32) -> bool {
    let pause = LOCK_WAIT.with(|slot| {
        let mut slot = slot.borrow_mut();
        let Some(wait) = slot.as_mut() else {
            return (BUSY_RETRY_INTERVAL * (attempts.max(0) as u32) < DEFAULT_BUSY_TIMEOUT)
                .then_some(BUSY_RETRY_INTERVAL);
        };
        if wait.cancelled.load(Ordering::Acquire) {
            return None;
        }

        let now = Instant::now();
        if attempts == 0 || wait.waiting_since.is_none() {
            wait.waiting_since = Some(now);
        }
        if let Some(deadline) = wait.deadline {
            if now >= deadline {
                wait.timed_out.store(true, Ordering::Release);
                return None;
            }
        }
        let give_up = wait.waiting_since.unwrap_or(now) + wait.busy_timeout;
        if now >= give_up {
            return None;
        }

        let mut pause = BUSY_RETRY_INTERVAL.min(give_up - now);
        if let Some(deadline) = wait.deadline {
            pause = pause.min(deadline - now);
        }
        Some(pause)
    });

    match pause {
        Some(pause) => {
            std::thread::sleep(pause);
            true
        }
        None => false,
    }
}

/// Interrupts the command running on a [`SqliteConnection`]
pub struct SqliteInterrupt {
    handle: InterruptHandle,
    cancelled: Arc<AtomicBool>,
}

impl CommandInterrupt for SqliteInterrupt {
    fn interrupt(&self) {
        // the flag covers a command that has not reached the VM yet
        self.cancelled.store(true, Ordering::Release);
        self.handle.interrupt();
    }
}

/// One open SQLite connection
pub struct SqliteConnection {
    conn: Connection,
    cancelled: Arc<AtomicBool>,
    busy_timeout: Duration,
}

impl SqliteConnection {
    fn lock_wait(&self, deadline: Option<Instant>, timed_out: &Arc<AtomicBool>) -> LockWaitScope {
        LockWaitScope::enter(LockWait {
            cancelled: Arc::clone(&self.cancelled),
            timed_out: Arc::clone(timed_out),
            deadline,
            busy_timeout: self.busy_timeout,
            waiting_since: None,
        })
    }

    /// Run statements outside a command, waiting on locks up to the busy timeout
    fn batch(&self, sql: &str) -> Result<()> {
        let _wait = self.lock_wait(None, &Arc::new(AtomicBool::new(false)));
        self.conn.execute_batch(sql)?;
        Ok(())
    }

    /// Convert a rusqlite Row to a DatabaseRow
    fn row_to_database_row(row: &Row) -> rusqlite::Result<DatabaseRow> {
        let mut db_row = DatabaseRow::new();
        let column_count = row.as_ref().column_count();

        for i in 0..column_count {
            let column_name = row.as_ref().column_name(i)?.to_string();
            let value = match row.get_ref(i)? {
                ValueRef::Null => DatabaseValue::Null,
                ValueRef::Integer(v) => DatabaseValue::Long(v),
                ValueRef::Real(v) => DatabaseValue::Double(v),
                ValueRef::Text(v) => DatabaseValue::String(String::from_utf8_lossy(v).to_string()),
                ValueRef::Blob(v) => DatabaseValue::Bytes(v.to_vec()),
            };
            db_row.insert(column_name, value);
        }

        Ok(db_row)
    }

    fn bind(stmt: &mut Statement<'_>, parameters: &CommandParameters) -> Result<()> {
        match parameters {
            CommandParameters::Positional(values) => {
                let expected = stmt.parameter_count();
                if expected > values.len() {
                    return Err(DatabaseError::query(format!(
                        "Command expects {} parameters but {} were supplied",
                        expected,
                        values.len()
                    )));
                }
                for (i, value) in values.iter().take(expected).enumerate() {
                    stmt.raw_bind_parameter(i + 1, value)?;
                }
            }
            CommandParameters::Named(values) => {
                for (name, value) in values {
                    let index = stmt.parameter_index(name)?.ok_or_else(|| {
                        DatabaseError::query(format!("Unknown parameter '{}'", name))
                    })?;
                    stmt.raw_bind_parameter(index, value)?;
                }
            }
        }
        Ok(())
    }

    fn run_statement(&self, command: &NativeCommand) -> Result<ResultCursor> {
        let changes_before = self.conn.total_changes();
        let mut stmt = self.conn.prepare(command.text())?;
        Self::bind(&mut stmt, command.parameters())?;

        let columns: Vec<String> = stmt
            .column_names()
            .into_iter()
            .map(String::from)
            .collect();

        let mut rows = Vec::new();
        {
            let mut cursor = stmt.raw_query();
            while let Some(row) = cursor.next()? {
                rows.push(Self::row_to_database_row(row)?);
            }
        }

        // changes() still holds the count of the last DML after DDL or a no-op
        let records_affected = if stmt.readonly() || self.conn.total_changes() == changes_before {
            0
        } else {
            self.conn.changes()
        };
        Ok(ResultCursor::new(columns, rows, records_affected))
    }

    fn error_code(error: &DatabaseError) -> Option<ErrorCode> {
        match error {
            DatabaseError::SqliteError(rusqlite::Error::SqliteFailure(e, _)) => Some(e.code),
            _ => None,
        }
    }
}

impl DriverConnection for SqliteConnection {
    type Interrupt = SqliteInterrupt;

    fn interrupt_handle(&self) -> SqliteInterrupt {
        SqliteInterrupt {
            handle: self.conn.get_interrupt_handle(),
            cancelled: Arc::clone(&self.cancelled),
        }
    }

    fn run(&mut self, command: &NativeCommand, timeout: Option<Duration>) -> Result<ResultCursor> {
        let timed_out = Arc::new(AtomicBool::new(false));
        let deadline = timeout.map(|t| Instant::now() + t);
        {
            let cancelled = Arc::clone(&self.cancelled);
            let timed_out = Arc::clone(&timed_out);
            self.conn.progress_handler(
                PROGRESS_STEPS,
                Some(move || {
                    if cancelled.load(Ordering::Acquire) {
                        return true;
                    }
                    match deadline {
                        Some(deadline) if Instant::now() >= deadline => {
                            timed_out.store(true, Ordering::Release);
                            true
                        }
                        _ => false,
                    }
                }),
            );
        }

        // a cancellation that arrived before the handlers were installed
        let result = if self.cancelled.load(Ordering::Acquire) {
            Err(DatabaseError::Cancelled)
        } else {
            let _wait = self.lock_wait(deadline, &timed_out);
            self.run_statement(command)
        };
        self.conn.progress_handler(0, None::<fn() -> bool>);

        result.map_err(|e| match Self::error_code(&e) {
            Some(ErrorCode::OperationInterrupted | ErrorCode::DatabaseBusy)
                if timed_out.load(Ordering::Acquire) =>
            {
                let timeout_ms = timeout.map(|t| t.as_millis() as u64).unwrap_or_default();
                DatabaseError::query_timeout(timeout_ms)
            }
            Some(ErrorCode::OperationInterrupted) => DatabaseError::Cancelled,
            Some(ErrorCode::DatabaseBusy) if self.cancelled.load(Ordering::Acquire) => {
                DatabaseError::Cancelled
            }
            _ => e,
        })
    }

    fn begin(&mut self) -> Result<()> {
        self.batch("BEGIN")
    }

    fn commit(&mut self) -> Result<()> {
        self.batch("COMMIT")
    }

    fn rollback(&mut self) -> Result<()> {
        // an interrupted write may already have rolled the transaction back
        if self.conn.is_autocommit() {
            return Ok(());
        }
        self.cancelled.store(false, Ordering::Release);
        self.batch("ROLLBACK")
    }

    fn close(self) -> Result<()> {
        self.conn.close().map_err(|(_, e)| DatabaseError::from(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ParameterizedQueryBuilder, ValueList};

    const RUNAWAY: &str =
        "WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c) SELECT count(*) FROM c";

    fn memory() -> SqliteConnection {
        SqliteDriver::new().open(":memory:").unwrap()
    }

    fn command(sql: &str) -> NativeCommand {
        NativeCommand::new(sql, CommandParameters::Positional(Vec::new()))
    }

    #[test]
    fn test_translate_numbers_parameters() {
        let builder = ParameterizedQueryBuilder::new();
        builder.append_text("SELECT '#' AS tag, ");
        builder.append_parameter(&5).unwrap();
        builder.append_text(" + ");
        builder.append_parameter("x").unwrap();

        let native = SqliteTranslator.translate(&builder.create_query()).unwrap();
        assert_eq!(native.text(), "SELECT '#' AS tag, ?1 + ?2");
        assert_eq!(
            native.parameters(),
            &CommandParameters::Positional(vec![
                DatabaseValue::Int(5),
                DatabaseValue::String("x".to_string())
            ])
        );
    }

    #[test]
    fn test_translate_rejects_output_parameter() {
        let descriptor = ParameterDescriptor::new(
            Some("total".to_string()),
            &0i64,
            None,
            ParameterDirection::Output,
        )
        .unwrap();
        let builder = ParameterizedQueryBuilder::new();
        builder.append_text("SELECT ");
        builder.append_descriptor(descriptor);

        let err = SqliteTranslator
            .translate(&builder.create_query())
            .unwrap_err();
        assert!(matches!(err, DatabaseError::UnsupportedOperation(_)));
    }

    #[test]
    fn test_procedure_call_binds_by_name() {
        let call = StoredProcedureQuery::new("max")
            .unwrap()
            .with_parameter("a", &3)
            .unwrap()
            .with_parameter("b", &7)
            .unwrap();

        let native = SqliteTranslator.procedure_call(&call).unwrap();
        assert_eq!(native.text(), "SELECT max(:a, :b)");

        let mut conn = memory();
        let mut cursor = conn.run(&native, None).unwrap();
        let row = cursor.next_row().unwrap();
        assert_eq!(row.values().next(), Some(&DatabaseValue::Long(7)));
    }

    #[test]
    fn test_procedure_call_rejects_schema() {
        let call = StoredProcedureQuery::new("main.max").unwrap();
        assert!(SqliteTranslator.procedure_call(&call).is_err());
    }

    #[test]
    fn test_run_collects_rows_and_changes() {
        let mut conn = memory();
        conn.run(&command("CREATE TABLE t (id INTEGER PRIMARY KEY, name TEXT)"), None)
            .unwrap();

        let insert = NativeCommand::new(
            "INSERT INTO t (name) VALUES (?1), (?2)",
            CommandParameters::Positional(vec![
                DatabaseValue::String("a".to_string()),
                DatabaseValue::Null,
            ]),
        );
        let cursor = conn.run(&insert, None).unwrap();
        assert_eq!(cursor.records_affected(), 2);

        let mut cursor = conn.run(&command("SELECT id, name FROM t ORDER BY id"), None).unwrap();
        assert_eq!(cursor.columns(), ["id".to_string(), "name".to_string()]);
        assert_eq!(cursor.records_affected(), 0);
        let first = cursor.next_row().unwrap();
        assert_eq!(first.get("name"), Some(&DatabaseValue::String("a".to_string())));
        let second = cursor.next_row().unwrap();
        assert_eq!(second.get("name"), Some(&DatabaseValue::Null));
        assert!(cursor.next_row().is_none());
    }

    #[test]
    fn test_empty_value_list_renders_null() {
        let builder = ParameterizedQueryBuilder::new();
        builder.append_text("SELECT 1 WHERE 1 IN (");
        builder
            .append_partial(&ValueList::new(Vec::<i32>::new()).unwrap())
            .unwrap();
        builder.append_text(")");

        let native = SqliteTranslator.translate(&builder.create_query()).unwrap();
        let mut conn = memory();
        let mut cursor = conn.run(&native, None).unwrap();
        assert!(cursor.next_row().is_none());
    }

    #[test]
    fn test_missing_parameters_fail() {
        let mut conn = memory();
        let err = conn.run(&command("SELECT ?1"), None).unwrap_err();
        assert!(matches!(err, DatabaseError::QueryError(_)));
    }

    #[test]
    fn test_timeout_interrupts_command() {
        let mut conn = memory();
        let err = conn
            .run(&command(RUNAWAY), Some(Duration::from_millis(50)))
            .unwrap_err();
        assert!(err.is_timeout(), "unexpected error: {err}");

        // the connection stays usable
        let mut cursor = conn.run(&command("SELECT 1 AS one"), None).unwrap();
        assert_eq!(
            cursor.next_row().unwrap().get("one"),
            Some(&DatabaseValue::Long(1))
        );
    }

    #[test]
    fn test_interrupt_cancels_command() {
        let mut conn = memory();
        let interrupt = conn.interrupt_handle();

        let worker = std::thread::spawn(move || conn.run(&command(RUNAWAY), None));
        std::thread::sleep(Duration::from_millis(50));
        interrupt.interrupt();

        let err = worker.join().unwrap().unwrap_err();
        assert!(err.is_cancelled(), "unexpected error: {err}");
    }

    #[test]
    fn test_ddl_reports_no_changes() {
        let mut conn = memory();
        conn.run(&command("CREATE TABLE t (id INTEGER)"), None).unwrap();
        let cursor = conn.run(&command("INSERT INTO t VALUES (1), (2)"), None).unwrap();
        assert_eq!(cursor.records_affected(), 2);

        let cursor = conn.run(&command("CREATE TABLE u (id INTEGER)"), None).unwrap();
        assert_eq!(cursor.records_affected(), 0);
        let cursor = conn.run(&command("DELETE FROM t WHERE id = 9"), None).unwrap();
        assert_eq!(cursor.records_affected(), 0);
    }

    fn locked_pair(busy_timeout: Duration) -> (tempfile::TempDir, SqliteConnection, SqliteConnection) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lock.db").to_string_lossy().to_string();
        let driver = SqliteDriver::new().with_busy_timeout(busy_timeout);

        let mut holder = driver.open(&path).unwrap();
        holder.run(&command("CREATE TABLE t (id INTEGER)"), None).unwrap();
        holder.begin().unwrap();
        holder.run(&command("INSERT INTO t VALUES (1)"), None).unwrap();

        let waiter = driver.open(&path).unwrap();
        (dir, holder, waiter)
    }

    #[test]
    fn test_lock_wait_bounded_by_busy_timeout() {
        let (_dir, mut holder, mut waiter) = locked_pair(Duration::from_millis(50));

        let err = waiter.run(&command("INSERT INTO t VALUES (2)"), None).unwrap_err();
        assert!(
            matches!(&err, DatabaseError::SqliteError(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::DatabaseBusy),
            "unexpected error: {err}"
        );
        holder.rollback().unwrap();
    }

    #[test]
    fn test_lock_wait_bounded_by_command_timeout() {
        let (_dir, mut holder, mut waiter) = locked_pair(DEFAULT_BUSY_TIMEOUT);

        let started = Instant::now();
        let err = waiter
            .run(&command("INSERT INTO t VALUES (2)"), Some(Duration::from_millis(50)))
            .unwrap_err();
        assert!(err.is_timeout(), "unexpected error: {err}");
        assert!(started.elapsed() < Duration::from_secs(1));

        holder.rollback().unwrap();
        waiter.run(&command("INSERT INTO t VALUES (2)"), None).unwrap();
    }

    #[test]
    fn test_interrupt_stops_lock_wait() {
        let (_dir, mut holder, mut waiter) = locked_pair(DEFAULT_BUSY_TIMEOUT);
        let interrupt = waiter.interrupt_handle();

        let started = Instant::now();
        let worker = std::thread::spawn(move || waiter.run(&command("INSERT INTO t VALUES (2)"), None));
        std::thread::sleep(Duration::from_millis(50));
        interrupt.interrupt();

        let err = worker.join().unwrap().unwrap_err();
        assert!(err.is_cancelled(), "unexpected error: {err}");
        assert!(started.elapsed() < Duration::from_secs(1));
        holder.rollback().unwrap();
    }

    #[test]
    fn test_transaction_rollback() {
        let mut conn = memory();
        conn.run(&command("CREATE TABLE t (id INTEGER)"), None).unwrap();

        conn.begin().unwrap();
        conn.run(&command("INSERT INTO t VALUES (1)"), None).unwrap();
        conn.rollback().unwrap();
        // nothing left to roll back
        conn.rollback().unwrap();

        let mut cursor = conn.run(&command("SELECT count(*) AS n FROM t"), None).unwrap();
        assert_eq!(cursor.next_row().unwrap().get("n"), Some(&DatabaseValue::Long(0)));
        conn.close().unwrap();
    }

    #[test]
    fn test_validate_connection_string() {
        let driver = SqliteDriver::new();
        assert!(driver.validate_connection_string("file:app.db").is_ok());
        assert!(driver.validate_connection_string("   ").is_err());
        assert!(driver.validate_connection_string("a\0b").is_err());
    }

    #[test]
    fn test_open_failure_is_connection_error() {
        let err = SqliteDriver::new()
            .open("file:/nonexistent-dir/x.db?mode=ro")
            .err()
            .unwrap();
        assert!(matches!(err, DatabaseError::ConnectionFailed { .. }));
    }
}
