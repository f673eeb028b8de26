//! Query executor and execute context
//!
//! [`DbExecutor`] translates a [`DbQuery`] through the driver's translator,
//! opens a fresh connection per call, runs the command and hands back an
//! [`ExecuteContext`] owning both the connection and the result cursor.

use super::config::ExecutorConfig;
use super::driver::{
    CommandInterrupt, Driver, DriverConnection, NativeCommand, QueryTranslator, ResultCursor,
};
use super::error::{DatabaseError, Result};
use super::query::DbQuery;
use super::trace::DbTracing;
use super::value::DatabaseRow;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Something that can run a [`DbQuery`] and return its execute context
pub trait QueryExecutor {
    type Connection: DriverConnection;

    fn execute_query(&self, query: DbQuery) -> Result<ExecuteContext<'static, Self::Connection>>;
}

/// Async counterpart of [`QueryExecutor`]
#[async_trait]
pub trait AsyncQueryExecutor: QueryExecutor + Sync {
    async fn execute_query_async(
        &self,
        query: DbQuery,
        token: &CancellationToken,
    ) -> Result<ExecuteContext<'static, Self::Connection>>;
}

/// Executor bound to one connection string and configuration
///
/// # Thread Safety
/// The executor keeps no per-call state; every execution opens its own
/// connection. Clones are cheap and share the driver and configuration.
pub struct DbExecutor<D: Driver> {
    driver: Arc<D>,
    connection_string: Arc<str>,
    config: ExecutorConfig,
}

impl<D: Driver> Clone for DbExecutor<D> {
    fn clone(&self) -> Self {
        Self {
            driver: Arc::clone(&self.driver),
            connection_string: Arc::clone(&self.connection_string),
            config: self.config.clone(),
        }
    }
}

impl<D: Driver> fmt::Debug for DbExecutor<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbExecutor")
            .field("driver", &self.driver.name())
            .field("connection_string", &self.connection_string)
            .field("config", &self.config)
            .finish()
    }
}

impl<D: Driver> DbExecutor<D> {
    /// Create an executor for `driver`
    ///
    /// # Errors
    ///
    /// Fails immediately with a construction error if the connection string
    /// is rejected by the driver or the configuration is invalid.
    pub fn with_driver(
        driver: D,
        connection_string: impl Into<String>,
        config: ExecutorConfig,
    ) -> Result<Self> {
        let connection_string = connection_string.into();
        driver.validate_connection_string(&connection_string)?;
        config.validate()?;

        Ok(Self {
            driver: Arc::new(driver),
            connection_string: connection_string.into(),
            config,
        })
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub(crate) fn create_tracing(&self, query: &DbQuery) -> Option<Box<dyn DbTracing>> {
        self.config
            .trace_service
            .as_ref()
            .and_then(|service| service.create_tracing(query))
    }

    /// Translate a query into the driver's native command
    pub fn translate(&self, query: &DbQuery) -> Result<NativeCommand> {
        let translator = self.driver.translator();
        match query {
            DbQuery::Parameterized(q) => translator.translate(q),
            DbQuery::StoredProcedure(q) => translator.procedure_call(q),
        }
    }

    pub(crate) fn open(&self) -> Result<D::Connection> {
        self.driver.open(&self.connection_string)
    }

    /// Execute a query, blocking the current thread
    ///
    /// # Errors
    ///
    /// Translation, connection and command errors are returned unchanged.
    /// A command failure closes the connection before returning.
    pub fn execute(
        &self,
        query: impl Into<DbQuery>,
    ) -> Result<ExecuteContext<'static, D::Connection>> {
        let query = query.into();
        let trace = self.create_tracing(&query);
        tracing::debug!(
            driver = self.driver.name(),
            kind = query.kind(),
            param_count = query.parameter_count(),
            "execute"
        );

        let command = self.translate(&query).map_err(|e| report(&trace, e))?;
        let mut connection = self.open().map_err(|e| report(&trace, e))?;

        if let Some(t) = &trace {
            t.on_executing(&command);
        }
        match connection.run(&command, self.config.command_timeout) {
            Ok(cursor) => Ok(ExecuteContext::owned(connection, cursor, trace)),
            Err(e) => {
                close_quietly(connection);
                Err(report(&trace, e))
            }
        }
    }

    /// Execute a query without blocking the async runtime
    ///
    /// Opening the connection and running the command both run on the
    /// blocking thread pool and both observe `token`.
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Cancelled`] if `token` fires before the
    /// cursor is obtained; any connection opened for the call is closed.
    pub async fn execute_async(
        &self,
        query: impl Into<DbQuery>,
        token: &CancellationToken,
    ) -> Result<ExecuteContext<'static, D::Connection>> {
        let query = query.into();
        let trace = self.create_tracing(&query);
        tracing::debug!(
            driver = self.driver.name(),
            kind = query.kind(),
            param_count = query.parameter_count(),
            "execute_async"
        );

        let command = self.translate(&query).map_err(|e| report(&trace, e))?;
        let connection = self
            .open_async(token)
            .await
            .map_err(|e| report(&trace, e))?;

        if let Some(t) = &trace {
            t.on_executing(&command);
        }
        let timeout = self.config.command_timeout;
        let (connection, result) =
            interact(connection, token, close_quietly, move |c| c.run(&command, timeout))
                .await
                .map_err(|e| report(&trace, e))?;

        match result {
            Ok(cursor) => Ok(ExecuteContext::owned(connection, cursor, trace)),
            Err(e) => {
                close_quietly(connection);
                Err(report(&trace, e))
            }
        }
    }

    /// Open a connection on the blocking pool, observing `token`
    pub(crate) async fn open_async(&self, token: &CancellationToken) -> Result<D::Connection> {
        if token.is_cancelled() {
            return Err(DatabaseError::Cancelled);
        }

        let driver = Arc::clone(&self.driver);
        let connection_string = Arc::clone(&self.connection_string);
        let open_token = token.clone();

        let mut task = tokio::task::spawn_blocking(move || -> Result<D::Connection> {
            let connection = driver.open(&connection_string)?;
            if open_token.is_cancelled() {
                close_quietly(connection);
                return Err(DatabaseError::Cancelled);
            }
            Ok(connection)
        });

        tokio::select! {
            result = &mut task => {
                result.map_err(|e| DatabaseError::other(format!("Task join error: {}", e)))?
            }
            _ = token.cancelled() => {
                // open() cannot be interrupted; close whatever it produces
                tokio::spawn(async move {
                    if let Ok(Ok(connection)) = task.await {
                        close_quietly(connection);
                    }
                });
                Err(DatabaseError::Cancelled)
            }
        }
    }
}

impl<D: Driver> QueryExecutor for DbExecutor<D> {
    type Connection = D::Connection;

    fn execute_query(&self, query: DbQuery) -> Result<ExecuteContext<'static, D::Connection>> {
        self.execute(query)
    }
}

#[async_trait]
impl<D: Driver> AsyncQueryExecutor for DbExecutor<D> {
    async fn execute_query_async(
        &self,
        query: DbQuery,
        token: &CancellationToken,
    ) -> Result<ExecuteContext<'static, D::Connection>> {
        self.execute_async(query, token).await
    }
}

/// Run `f` against `connection` on the blocking pool
///
/// The connection always comes back to the caller alongside the outcome,
/// unless the blocking task panicked. When `token` fires first, the running
/// command is interrupted, the task is awaited and the outcome is
/// [`DatabaseError::Cancelled`].
///
/// If the returned future is dropped before the task finishes, the command
/// is interrupted and `release` receives the connection once the task hands
/// it back.
pub(crate) async fn interact<C, T, F>(
    mut connection: C,
    token: &CancellationToken,
    release: fn(C),
    f: F,
) -> Result<(C, Result<T>)>
where
    C: DriverConnection,
    T: Send + 'static,
    F: FnOnce(&mut C) -> Result<T> + Send + 'static,
{
    if token.is_cancelled() {
        return Ok((connection, Err(DatabaseError::Cancelled)));
    }

    let interrupt = connection.interrupt_handle();
    let task_token = token.clone();
    let task = tokio::task::spawn_blocking(move || {
        let result = if task_token.is_cancelled() {
            Err(DatabaseError::Cancelled)
        } else {
            f(&mut connection)
        };
        (connection, result)
    });

    let mut pending = PendingTask {
        task: Some(task),
        interrupt,
        release,
    };
    pending.join(token).await
}

/// Blocking task still holding a connection
///
/// Dropping it before [`join`](PendingTask::join) completes interrupts the
/// command and releases the connection in the background.
struct PendingTask<C: DriverConnection, T: Send + 'static> {
    task: Option<JoinHandle<(C, Result<T>)>>,
    interrupt: C::Interrupt,
    release: fn(C),
}

impl<C: DriverConnection, T: Send + 'static> PendingTask<C, T> {
    async fn join(&mut self, token: &CancellationToken) -> Result<(C, Result<T>)> {
        let Some(task) = self.task.as_mut() else {
            return Err(DatabaseError::other("Blocking task already joined"));
        };

        let joined = tokio::select! {
            joined = &mut *task => joined,
            _ = token.cancelled() => {
                self.interrupt.interrupt();
                (&mut *task)
                    .await
                    .map(|(connection, _)| (connection, Err(DatabaseError::Cancelled)))
            }
        };
        self.task = None;

        joined.map_err(|e| DatabaseError::other(format!("Task join error: {}", e)))
    }
}

impl<C: DriverConnection, T: Send + 'static> Drop for PendingTask<C, T> {
    fn drop(&mut self) {
        let Some(task) = self.task.take() else {
            return;
        };
        self.interrupt.interrupt();
        tracing::debug!("execution dropped while running, command interrupted");

        let release = self.release;
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    if let Ok((connection, _)) = task.await {
                        release(connection);
                    }
                });
            }
            Err(_) => tracing::warn!("no runtime to release the connection of a dropped execution"),
        }
    }
}

/// Close a connection on an error path, logging instead of masking the
/// original error
pub(crate) fn close_quietly<C: DriverConnection>(connection: C) {
    if let Err(e) = connection.close() {
        tracing::warn!(error = %e, "failed to close connection");
    }
}

/// Hand a failure to the tracing handle and give it back
pub(crate) fn report(trace: &Option<Box<dyn DbTracing>>, error: DatabaseError) -> DatabaseError {
    if let Some(t) = trace {
        t.on_exception(&error);
    }
    error
}

enum ConnectionSlot<'a, C> {
    Owned(Option<C>),
    Borrowed(&'a mut C),
}

/// Live result of one execution
///
/// Outside a transaction the context owns the connection and closes it when
/// released; inside a transaction it borrows the transaction's connection
/// and leaves it open. Release happens exactly once, through [`close`]
/// or, failing that, on drop.
///
/// [`close`]: ExecuteContext::close
pub struct ExecuteContext<'a, C: DriverConnection> {
    connection: ConnectionSlot<'a, C>,
    cursor: ResultCursor,
    tracing: Option<Box<dyn DbTracing>>,
}

impl<C: DriverConnection> ExecuteContext<'static, C> {
    pub(crate) fn owned(
        connection: C,
        cursor: ResultCursor,
        tracing: Option<Box<dyn DbTracing>>,
    ) -> Self {
        Self {
            connection: ConnectionSlot::Owned(Some(connection)),
            cursor,
            tracing,
        }
    }
}

impl<'a, C: DriverConnection> ExecuteContext<'a, C> {
    pub(crate) fn borrowed(
        connection: &'a mut C,
        cursor: ResultCursor,
        tracing: Option<Box<dyn DbTracing>>,
    ) -> Self {
        Self {
            connection: ConnectionSlot::Borrowed(connection),
            cursor,
            tracing,
        }
    }

    /// Result cursor
    pub fn cursor(&mut self) -> &mut ResultCursor {
        &mut self.cursor
    }

    pub fn columns(&self) -> &[String] {
        self.cursor.columns()
    }

    pub fn records_affected(&self) -> u64 {
        self.cursor.records_affected()
    }

    /// Advance the cursor
    pub fn next_row(&mut self) -> Option<DatabaseRow> {
        self.cursor.next_row()
    }

    /// Drain the remaining rows
    pub fn rows(&mut self) -> impl Iterator<Item = DatabaseRow> + '_ {
        &mut self.cursor
    }

    /// Check if releasing this context closes its connection
    pub fn owns_connection(&self) -> bool {
        matches!(self.connection, ConnectionSlot::Owned(_))
    }

    /// Release the cursor and, when owned, close the connection
    ///
    /// # Errors
    ///
    /// Returns the driver's error if closing the connection fails.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if let Some(t) = self.tracing.take() {
            t.on_complete();
        }
        match &mut self.connection {
            ConnectionSlot::Owned(slot) => match slot.take() {
                Some(connection) => connection.close(),
                None => Ok(()),
            },
            ConnectionSlot::Borrowed(_) => Ok(()),
        }
    }
}

impl<C: DriverConnection> fmt::Debug for ExecuteContext<'_, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecuteContext")
            .field("owns_connection", &self.owns_connection())
            .field("columns", &self.cursor.columns())
            .field("remaining", &self.cursor.remaining())
            .finish()
    }
}

impl<C: DriverConnection> Iterator for ExecuteContext<'_, C> {
    type Item = DatabaseRow;

    fn next(&mut self) -> Option<Self::Item> {
        self.cursor.next_row()
    }
}

impl<C: DriverConnection> Drop for ExecuteContext<'_, C> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            tracing::warn!(error = %e, "failed to close connection while dropping execute context");
        }
    }
}
