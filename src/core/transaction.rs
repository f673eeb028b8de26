//! Transaction context bound to a single connection
//!
//! Executions inside the context share one connection instead of opening a
//! fresh one per call. The context commits or rolls back exactly once and
//! always closes its connection, rolling back on drop when the caller never
//! finished it.

use super::driver::{Driver, DriverConnection};
use super::error::{DatabaseError, Result};
use super::executor::{close_quietly, interact, report, DbExecutor, ExecuteContext};
use super::query::DbQuery;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Lifecycle of a [`TransactionContext`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Created, no connection opened yet
    Pending,
    /// Transaction started on an open connection
    Active,
    Committed,
    RolledBack,
    /// Rolled back after an execution was cancelled
    Aborted,
}

impl TransactionState {
    pub fn is_finished(&self) -> bool {
        matches!(
            self,
            TransactionState::Committed | TransactionState::RolledBack | TransactionState::Aborted
        )
    }
}

/// Scope in which executions run on one connection and one transaction
///
/// # Example
///
/// ```ignore
/// let mut tx = executor.create_transaction();
/// tx.begin()?;
/// tx.execute(debit)?.close()?;
/// tx.execute(credit)?.close()?;
/// tx.commit()?;
/// ```
pub struct TransactionContext<D: Driver> {
    executor: DbExecutor<D>,
    connection: Option<D::Connection>,
    state: TransactionState,
}

impl<D: Driver> DbExecutor<D> {
    /// Create a transaction context; no connection is opened until
    /// [`TransactionContext::begin`]
    pub fn create_transaction(&self) -> TransactionContext<D> {
        TransactionContext {
            executor: self.clone(),
            connection: None,
            state: TransactionState::Pending,
        }
    }
}

impl<D: Driver> TransactionContext<D> {
    pub fn state(&self) -> TransactionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == TransactionState::Active
    }

    fn ensure_pending(&self) -> Result<()> {
        match self.state {
            TransactionState::Pending => Ok(()),
            state => Err(DatabaseError::transaction(format!(
                "Cannot begin a transaction in state {:?}",
                state
            ))),
        }
    }

    fn active_connection(&mut self) -> Result<&mut D::Connection> {
        if self.state != TransactionState::Active {
            return Err(DatabaseError::transaction(format!(
                "Transaction is not active (state {:?})",
                self.state
            )));
        }
        self.connection
            .as_mut()
            .ok_or_else(|| DatabaseError::transaction("Transaction has no connection"))
    }

    /// Open the connection and start the transaction
    ///
    /// # Errors
    ///
    /// Fails if the context was already begun, or with the driver's error;
    /// a connection opened before `BEGIN` failed is closed again.
    pub fn begin(&mut self) -> Result<()> {
        self.ensure_pending()?;

        let mut connection = self.executor.open()?;
        if let Err(e) = connection.begin() {
            close_quietly(connection);
            return Err(e);
        }

        tracing::debug!(driver = self.executor.driver().name(), "transaction started");
        self.connection = Some(connection);
        self.state = TransactionState::Active;
        Ok(())
    }

    /// Async [`begin`](Self::begin), observing `token`
    ///
    /// # Errors
    ///
    /// Returns [`DatabaseError::Cancelled`] if `token` fires first; the
    /// connection, if opened, is closed.
    pub async fn begin_async(&mut self, token: &CancellationToken) -> Result<()> {
        self.ensure_pending()?;

        let connection = self.executor.open_async(token).await?;
        let (connection, result) = interact(connection, token, abandon, |c| c.begin()).await?;
        if let Err(e) = result {
            close_quietly(connection);
            return Err(e);
        }

        tracing::debug!(driver = self.executor.driver().name(), "transaction started");
        self.connection = Some(connection);
        self.state = TransactionState::Active;
        Ok(())
    }

    /// Execute a query on the transaction's connection
    ///
    /// The returned context borrows the connection and leaves it open when
    /// released. A failed command leaves the transaction active so the
    /// caller can decide between rollback and carrying on.
    pub fn execute(&mut self, query: impl Into<DbQuery>) -> Result<ExecuteContext<'_, D::Connection>> {
        let query = query.into();
        let trace = self.executor.create_tracing(&query);
        let timeout = self.executor.config().command_timeout;

        let command = match self.executor.translate(&query) {
            Ok(command) => command,
            Err(e) => return Err(report(&trace, e)),
        };
        let connection = self.active_connection()?;

        if let Some(t) = &trace {
            t.on_executing(&command);
        }
        match connection.run(&command, timeout) {
            Ok(cursor) => Ok(ExecuteContext::borrowed(connection, cursor, trace)),
            Err(e) => Err(report(&trace, e)),
        }
    }

    /// Async [`execute`](Self::execute), observing `token`
    ///
    /// # Errors
    ///
    /// A cancelled execution aborts the whole transaction: it is rolled
    /// back, the connection is closed and the context moves to
    /// [`TransactionState::Aborted`]. Dropping the returned future while the
    /// command runs aborts it the same way.
    pub async fn execute_async(
        &mut self,
        query: impl Into<DbQuery>,
        token: &CancellationToken,
    ) -> Result<ExecuteContext<'_, D::Connection>> {
        let query = query.into();
        let trace = self.executor.create_tracing(&query);
        let timeout = self.executor.config().command_timeout;

        let command = match self.executor.translate(&query) {
            Ok(command) => command,
            Err(e) => return Err(report(&trace, e)),
        };
        self.active_connection()?;
        let connection = self
            .connection
            .take()
            .ok_or_else(|| DatabaseError::transaction("Transaction has no connection"))?;

        if let Some(t) = &trace {
            t.on_executing(&command);
        }
        // stays aborted if this future is dropped while the command runs
        self.state = TransactionState::Aborted;
        let joined = interact(connection, token, abandon, move |c| c.run(&command, timeout)).await;
        let (connection, result) = match joined {
            Ok(pair) => pair,
            // the connection went down with the blocking task
            Err(e) => return Err(report(&trace, e)),
        };
        self.state = TransactionState::Active;

        match result {
            Ok(cursor) => {
                let connection = self.connection.insert(connection);
                Ok(ExecuteContext::borrowed(connection, cursor, trace))
            }
            Err(DatabaseError::Cancelled) => {
                self.abort(connection);
                Err(report(&trace, DatabaseError::Cancelled))
            }
            Err(e) => {
                self.connection = Some(connection);
                Err(report(&trace, e))
            }
        }
    }

    fn abort(&mut self, connection: D::Connection) {
        abandon(connection);
        self.state = TransactionState::Aborted;
    }

    fn finish_connection(&mut self) -> Result<D::Connection> {
        self.active_connection()?;
        self.connection
            .take()
            .ok_or_else(|| DatabaseError::transaction("Transaction has no connection"))
    }

    /// Commit and close the connection
    ///
    /// # Errors
    ///
    /// If `COMMIT` fails the transaction is rolled back, the connection is
    /// closed and the commit error is returned.
    pub fn commit(mut self) -> Result<()> {
        let mut connection = self.finish_connection()?;
        let result = connection.commit();
        self.settle_commit(connection, result)
    }

    /// Roll back and close the connection
    pub fn rollback(mut self) -> Result<()> {
        let mut connection = self.finish_connection()?;
        let result = connection.rollback();
        self.settle_rollback(connection, result)
    }

    /// Async [`commit`](Self::commit); runs to completion once started
    pub async fn commit_async(mut self) -> Result<()> {
        let connection = self.finish_connection()?;
        let (connection, result) =
            interact(connection, &CancellationToken::new(), abandon, |c| c.commit()).await?;
        self.settle_commit(connection, result)
    }

    /// Async [`rollback`](Self::rollback)
    pub async fn rollback_async(mut self) -> Result<()> {
        let connection = self.finish_connection()?;
        let (connection, result) =
            interact(connection, &CancellationToken::new(), abandon, |c| c.rollback()).await?;
        self.settle_rollback(connection, result)
    }

    fn settle_commit(&mut self, mut connection: D::Connection, result: Result<()>) -> Result<()> {
        match result {
            Ok(()) => {
                self.state = TransactionState::Committed;
                tracing::debug!("transaction committed");
                connection.close()
            }
            Err(e) => {
                if let Err(rollback_err) = connection.rollback() {
                    tracing::warn!(error = %rollback_err, "rollback after failed commit failed");
                }
                self.state = TransactionState::RolledBack;
                close_quietly(connection);
                Err(e)
            }
        }
    }

    fn settle_rollback(&mut self, connection: D::Connection, result: Result<()>) -> Result<()> {
        self.state = TransactionState::RolledBack;
        tracing::debug!("transaction rolled back");
        match result {
            Ok(()) => connection.close(),
            Err(e) => {
                close_quietly(connection);
                Err(e)
            }
        }
    }
}

/// Roll back and close a connection whose transaction can no longer finish
fn abandon<C: DriverConnection>(mut connection: C) {
    if let Err(e) = connection.rollback() {
        tracing::warn!(error = %e, "rollback of abandoned transaction failed");
    }
    close_quietly(connection);
}

impl<D: Driver> fmt::Debug for TransactionContext<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionContext")
            .field("driver", &self.executor.driver().name())
            .field("state", &self.state)
            .finish()
    }
}

impl<D: Driver> Drop for TransactionContext<D> {
    fn drop(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            if self.state == TransactionState::Active {
                tracing::warn!("transaction dropped without commit or rollback, rolling back");
                if let Err(e) = connection.rollback() {
                    tracing::warn!(error = %e, "automatic rollback failed");
                }
                self.state = TransactionState::RolledBack;
            }
            close_quietly(connection);
        }
    }
}
