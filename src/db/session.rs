//! Session traits
//!
//! A `Session` is one checked-out connection; a `SessionSource` hands them
//! out. Record operations are written against these traits so the pooled
//! Postgres backend and the scripted test double are interchangeable.
//!
//! Release is scoped: dropping a session gives the connection back to its
//! source on every exit path, including early returns through `?`.

use crate::db::types::Record;
use crate::db::value::SqlValue;
use crate::error::DbResult;
use async_trait::async_trait;

/// A single checked-out connection
#[async_trait]
pub trait Session: Send {
    /// Run a statement and collect its rows
    ///
    /// # Errors
    /// Returns `DbError::QueryFailed` carrying the driver message
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Record>>;

    /// Run a statement and return the affected row count
    ///
    /// # Errors
    /// Returns `DbError::QueryFailed` carrying the driver message
    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<u64>;

    /// Open a transaction
    async fn begin(&mut self) -> DbResult<()>;

    /// Commit the open transaction
    async fn commit(&mut self) -> DbResult<()>;

    /// Roll back the open transaction
    async fn rollback(&mut self) -> DbResult<()>;
}

/// Hands out sessions, waiting when none is free
#[async_trait]
pub trait SessionSource: Send + Sync {
    type Session: Session;

    /// Acquire a session for the duration of one operation
    ///
    /// # Errors
    /// Returns `DbError::PoolExhausted` when the wait timeout elapses and
    /// `DbError::ConnectionFailed` when a new connection cannot be opened
    async fn acquire(&self) -> DbResult<Self::Session>;
}
