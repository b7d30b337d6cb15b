//! Record operations
//!
//! The five operation families (query, insert, update, delete, move) over a
//! shared `SessionSource`. Each call acquires one session for its whole
//! duration and releases it on every exit path. Request validation runs before
//! acquisition, so a rejected request never holds a connection.
//!
//! Driver failures are rewrapped into the operation's own `RecordError`
//! variant carrying the driver message; nothing is cached between calls.

mod delete;
mod insert;
mod query;
mod relocate;
mod update;

#[cfg(test)]
pub(crate) mod testing;

pub use relocate::RelocateOutcome;

use crate::db::session::{Session, SessionSource};
use crate::db::value::SqlValue;
use crate::error::{RecordError, RecordResult};
use crate::sql::builder::{self, Statement};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A raw read statement with positional parameters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryRequest {
    #[serde(default, alias = "query")]
    pub statement: String,
    #[serde(default, alias = "params")]
    pub parameters: Vec<SqlValue>,
}

/// Insert one row with a dynamic column set
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InsertRequest {
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<SqlValue>,
}

/// Update a set of rows identified by `id_column IN ids`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutateRequest {
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub updates: Assignments,
    #[serde(default)]
    pub ids: Vec<SqlValue>,
    #[serde(default)]
    pub id_column: String,
}

/// Delete a set of rows identified by `id_column IN ids`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveRequest {
    #[serde(default)]
    pub table: String,
    #[serde(default)]
    pub ids: Vec<SqlValue>,
    #[serde(default)]
    pub id_column: String,
}

/// Move rows from one table to another inside one transaction
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelocateRequest {
    #[serde(default)]
    pub source_table: String,
    #[serde(default)]
    pub destination_table: String,
    #[serde(default)]
    pub ids: Vec<SqlValue>,
    #[serde(default)]
    pub id_column: String,
}

/// Ordered column → value pairs for an UPDATE's SET clause.
///
/// Deserializes from a JSON object keeping the object's key order, which
/// fixes the placeholder numbering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignments(Vec<(String, SqlValue)>);

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an assignment
    pub fn set(mut self, column: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.0.push((column.into(), value.into()));
        self
    }

    pub fn as_slice(&self) -> &[(String, SqlValue)] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<(String, SqlValue)>> for Assignments {
    fn from(pairs: Vec<(String, SqlValue)>) -> Self {
        Self(pairs)
    }
}

impl Serialize for Assignments {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.0.iter().map(|(k, v)| (k, v)))
    }
}

impl<'de> Deserialize<'de> for Assignments {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AssignmentsVisitor;

        impl<'de> Visitor<'de> for AssignmentsVisitor {
            type Value = Assignments;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of column names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Assignments, A::Error> {
                let mut pairs = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some((column, value)) = map.next_entry::<String, SqlValue>()? {
                    pairs.push((column, value));
                }
                Ok(Assignments(pairs))
            }
        }

        deserializer.deserialize_map(AssignmentsVisitor)
    }
}

fn require_identifier(value: &str, field: &str) -> RecordResult<()> {
    if value.trim().is_empty() {
        return Err(RecordError::Validation(format!("{} is required", field)));
    }
    Ok(())
}

fn require_non_empty<T>(items: &[T], field: &str) -> RecordResult<()> {
    if items.is_empty() {
        return Err(RecordError::Validation(format!(
            "{} must not be empty",
            field
        )));
    }
    Ok(())
}

impl QueryRequest {
    pub fn new(statement: impl Into<String>, parameters: Vec<SqlValue>) -> Self {
        Self {
            statement: statement.into(),
            parameters,
        }
    }

    pub fn validate(&self) -> RecordResult<()> {
        require_identifier(&self.statement, "statement")
    }
}

impl InsertRequest {
    pub fn validate(&self) -> RecordResult<()> {
        require_identifier(&self.table, "table")?;
        require_non_empty(&self.columns, "columns")?;
        require_non_empty(&self.values, "values")?;
        if self.columns.len() != self.values.len() {
            return Err(RecordError::Validation(format!(
                "columns ({}) and values ({}) must have the same length",
                self.columns.len(),
                self.values.len()
            )));
        }
        for column in &self.columns {
            require_identifier(column, "column name")?;
        }
        Ok(())
    }

    pub fn statement(&self) -> Statement {
        builder::insert(&self.table, &self.columns, &self.values)
    }
}

impl MutateRequest {
    pub fn validate(&self) -> RecordResult<()> {
        require_identifier(&self.table, "table")?;
        require_non_empty(self.updates.as_slice(), "updates")?;
        require_non_empty(&self.ids, "ids")?;
        require_identifier(&self.id_column, "idColumn")?;
        for (column, _) in self.updates.as_slice() {
            require_identifier(column, "column name")?;
        }
        Ok(())
    }

    pub fn statement(&self) -> Statement {
        builder::update(
            &self.table,
            self.updates.as_slice(),
            &self.ids,
            &self.id_column,
        )
    }
}

impl RemoveRequest {
    pub fn validate(&self) -> RecordResult<()> {
        require_identifier(&self.table, "table")?;
        require_non_empty(&self.ids, "ids")?;
        require_identifier(&self.id_column, "idColumn")
    }

    pub fn statement(&self) -> Statement {
        builder::delete(&self.table, &self.ids, &self.id_column)
    }
}

impl RelocateRequest {
    pub fn validate(&self) -> RecordResult<()> {
        require_identifier(&self.source_table, "sourceTable")?;
        require_identifier(&self.destination_table, "destinationTable")?;
        require_non_empty(&self.ids, "ids")?;
        require_identifier(&self.id_column, "idColumn")
    }

    /// Coerce every id to an integer, failing on the first that won't parse
    pub fn integer_ids(&self) -> RecordResult<Vec<i64>> {
        self.ids
            .iter()
            .map(|id| {
                id.as_integer().ok_or_else(|| {
                    RecordError::Coercion(format!("{} is not an integer", id))
                })
            })
            .collect()
    }
}

/// Entry point for the record operations
pub struct RecordStore<S> {
    source: S,
}

impl<S: SessionSource> RecordStore<S> {
    pub fn new(source: S) -> Self {
        Self { source }
    }

    /// The underlying session source
    pub fn source(&self) -> &S {
        &self.source
    }

    async fn session(&self, wrap: fn(String) -> RecordError) -> RecordResult<S::Session> {
        self.source
            .acquire()
            .await
            .map_err(|e| wrap(e.detail().to_string()))
    }

    /// Run one mutation statement on a freshly acquired session
    async fn run_statement(
        &self,
        operation: &'static str,
        statement: &Statement,
        wrap: fn(String) -> RecordError,
    ) -> RecordResult<u64> {
        let mut session = self.session(wrap).await?;
        tracing::debug!(
            operation,
            sql = %statement.sql,
            params = statement.placeholder_count(),
            "executing statement"
        );
        let affected = session
            .execute(&statement.sql, &statement.params)
            .await
            .map_err(|e| wrap(e.detail().to_string()))?;
        tracing::info!(operation, affected, "statement completed");
        Ok(affected)
    }
}
