//! Operation dispatch
//!
//! Routes a named operation and its JSON payload to the record store.
//! `query-database` propagates its error to the caller; the four mutations
//! never fail across the boundary and report `{ success: false, message }`
//! instead.

use super::operation::Operation;
use super::requests::{decode_payload, decode_query, OperationResult, Response};
use crate::db::session::SessionSource;
use crate::error::{CadastroError, RecordError, RecordResult, RequestError, Result};
use crate::records::{InsertRequest, MutateRequest, RecordStore, RelocateRequest, RemoveRequest};
use crate::sql::Statement;
use serde_json::Value;
use std::collections::HashSet;

/// Table identifiers the boundary accepts; empty accepts any
#[derive(Debug, Clone, Default)]
pub struct TableAllowList {
    tables: HashSet<String>,
}

impl TableAllowList {
    pub fn new<I, T>(tables: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        Self {
            tables: tables.into_iter().map(Into::into).collect(),
        }
    }

    /// Reject a table identifier outside the list
    pub fn check(&self, table: &str) -> RecordResult<()> {
        if self.tables.is_empty() || self.tables.contains(table) {
            return Ok(());
        }
        Err(RecordError::Validation(format!(
            "table {} is not allowed",
            table
        )))
    }
}

/// Routes boundary operations to a `RecordStore`
pub struct Dispatcher<S> {
    store: RecordStore<S>,
    allowed: TableAllowList,
}

impl<S: SessionSource> Dispatcher<S> {
    pub fn new(store: RecordStore<S>, allowed: TableAllowList) -> Self {
        Self { store, allowed }
    }

    pub fn store(&self) -> &RecordStore<S> {
        &self.store
    }

    /// Dispatch by operation name
    ///
    /// # Errors
    /// `RequestError::Unknown` for an unrecognized name, otherwise as `dispatch`
    pub async fn dispatch_named(&self, name: &str, payload: Value) -> Result<Response> {
        let operation = super::operation::parse_operation(name)?;
        self.dispatch(operation, payload).await
    }

    /// Run one operation.
    ///
    /// # Errors
    /// Only `query-database` returns `Err`; mutation failures are folded into
    /// `Response::Outcome`.
    pub async fn dispatch(&self, operation: Operation, payload: Value) -> Result<Response> {
        if !operation.is_mutation() {
            let request = decode_query(payload)?;
            let rows = self.store.query(&request).await.inspect_err(|e| {
                tracing::error!(operation = %operation, error = %e, "query failed");
            })?;
            return Ok(Response::Rows(rows));
        }

        let outcome = match self.mutate(operation, payload).await {
            Ok(affected) => {
                tracing::debug!(operation = %operation, affected, "operation succeeded");
                OperationResult::ok()
            }
            Err(e) => {
                tracing::error!(operation = %operation, error = %e, "operation failed");
                OperationResult::failed(failure_message(&e))
            }
        };
        Ok(Response::Outcome(outcome))
    }

    async fn mutate(&self, operation: Operation, payload: Value) -> Result<u64> {
        let name = operation.name();
        match operation {
            Operation::Insert => {
                let request: InsertRequest = decode_payload(name, payload)?;
                self.allowed.check(&request.table)?;
                Ok(self.store.insert(&request).await?)
            }
            Operation::Update => {
                let request: MutateRequest = decode_payload(name, payload)?;
                self.allowed.check(&request.table)?;
                Ok(self.store.update(&request).await?)
            }
            Operation::Delete => {
                let request: RemoveRequest = decode_payload(name, payload)?;
                self.allowed.check(&request.table)?;
                Ok(self.store.delete(&request).await?)
            }
            Operation::Move => {
                let request: RelocateRequest = decode_payload(name, payload)?;
                self.allowed.check(&request.source_table)?;
                self.allowed.check(&request.destination_table)?;
                let outcome = self.store.relocate(&request).await?;
                Ok(outcome.removed)
            }
            Operation::Query => Err(RequestError::Unsupported(name.to_string()).into()),
        }
    }
}

/// Human-readable message for a failed mutation
fn failure_message(error: &CadastroError) -> String {
    match error {
        CadastroError::Request(e) => e.to_string(),
        other => other.to_string(),
    }
}

/// Build the statement a mutation would run, without touching the database.
///
/// Only insert, update and delete can be planned; a move depends on live
/// catalog introspection and a query is passed through verbatim.
///
/// # Errors
/// `RequestError::Unsupported` for query/move, payload and validation errors
/// as the live operation would report them
pub fn plan(operation: Operation, payload: Value, allowed: &TableAllowList) -> Result<Statement> {
    let name = operation.name();
    let statement = match operation {
        Operation::Insert => {
            let request: InsertRequest = decode_payload(name, payload)?;
            allowed.check(&request.table)?;
            request.validate()?;
            request.statement()
        }
        Operation::Update => {
            let request: MutateRequest = decode_payload(name, payload)?;
            allowed.check(&request.table)?;
            request.validate()?;
            request.statement()
        }
        Operation::Delete => {
            let request: RemoveRequest = decode_payload(name, payload)?;
            allowed.check(&request.table)?;
            request.validate()?;
            request.statement()
        }
        Operation::Query | Operation::Move => {
            return Err(RequestError::Unsupported(name.to_string()).into());
        }
    };
    Ok(statement)
}
