//! Scripted session double for record operation tests.
//!
//! Every statement a session sees (including BEGIN/COMMIT/ROLLBACK) is logged
//! with its parameters. Catalog lookups are answered from `with_columns`,
//! other queries from `with_rows`.

use crate::db::session::{Session, SessionSource};
use crate::db::types::{CellValue, Record};
use crate::db::value::SqlValue;
use crate::error::{DbError, DbResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Script {
    rows: Vec<Record>,
    affected: u64,
    columns: HashMap<String, Vec<String>>,
    fail_on: Option<String>,
    unavailable: bool,
    calls: Vec<(String, Vec<SqlValue>)>,
    acquired: usize,
    released: usize,
}

#[derive(Clone, Default)]
pub struct ScriptedSource {
    script: Arc<Mutex<Script>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows returned by every non-catalog query
    pub fn with_rows(self, rows: Vec<Record>) -> Self {
        self.script.lock().unwrap().rows = rows;
        self
    }

    /// Affected count returned by every execute
    pub fn with_affected(self, affected: u64) -> Self {
        self.script.lock().unwrap().affected = affected;
        self
    }

    /// Catalog columns for `table`
    pub fn with_columns(self, table: &str, columns: &[&str]) -> Self {
        self.script.lock().unwrap().columns.insert(
            table.to_string(),
            columns.iter().map(|c| c.to_string()).collect(),
        );
        self
    }

    /// Fail any statement containing `fragment`
    pub fn failing_on(self, fragment: &str) -> Self {
        self.script.lock().unwrap().fail_on = Some(fragment.to_string());
        self
    }

    /// Every acquire fails as if the pool timed out
    pub fn unavailable(self) -> Self {
        self.script.lock().unwrap().unavailable = true;
        self
    }

    pub fn calls(&self) -> Vec<(String, Vec<SqlValue>)> {
        self.script.lock().unwrap().calls.clone()
    }

    pub fn acquired(&self) -> usize {
        self.script.lock().unwrap().acquired
    }

    pub fn released(&self) -> usize {
        self.script.lock().unwrap().released
    }
}

#[async_trait]
impl SessionSource for ScriptedSource {
    type Session = ScriptedSession;

    async fn acquire(&self) -> DbResult<ScriptedSession> {
        let mut script = self.script.lock().unwrap();
        if script.unavailable {
            return Err(DbError::PoolExhausted(
                "timed out waiting for a connection".to_string(),
            ));
        }
        script.acquired += 1;
        Ok(ScriptedSession {
            script: Arc::clone(&self.script),
        })
    }
}

pub struct ScriptedSession {
    script: Arc<Mutex<Script>>,
}

impl ScriptedSession {
    fn record(&self, sql: &str, params: &[SqlValue]) -> DbResult<()> {
        let mut script = self.script.lock().unwrap();
        script.calls.push((sql.to_string(), params.to_vec()));
        match &script.fail_on {
            Some(fragment) if sql.contains(fragment.as_str()) => Err(DbError::QueryFailed(
                format!("scripted failure on {}", fragment),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Session for ScriptedSession {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Record>> {
        self.record(sql, params)?;
        let script = self.script.lock().unwrap();
        if sql.contains("information_schema.columns") {
            let table = match params.last() {
                Some(SqlValue::Text(name)) => name.as_str(),
                _ => "",
            };
            let columns = script.columns.get(table).cloned().unwrap_or_default();
            return Ok(columns
                .into_iter()
                .map(|name| {
                    std::iter::once(("column_name".to_string(), CellValue::Text(name))).collect()
                })
                .collect());
        }
        Ok(script.rows.clone())
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
        self.record(sql, params)?;
        Ok(self.script.lock().unwrap().affected)
    }

    async fn begin(&mut self) -> DbResult<()> {
        self.record("BEGIN", &[])
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.record("COMMIT", &[])
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.record("ROLLBACK", &[])
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        if let Ok(mut script) = self.script.lock() {
            script.released += 1;
        }
    }
}
