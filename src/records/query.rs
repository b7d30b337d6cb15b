//! Query Executor

use super::{QueryRequest, RecordStore};
use crate::db::session::{Session, SessionSource};
use crate::db::types::Record;
use crate::error::{RecordError, RecordResult};

impl<S: SessionSource> RecordStore<S> {
    /// Run a parameterized read statement and return its rows.
    ///
    /// # Errors
    /// `RecordError::Validation` for an empty statement, `RecordError::Query`
    /// with the driver message for anything that fails during I/O
    pub async fn query(&self, request: &QueryRequest) -> RecordResult<Vec<Record>> {
        request.validate()?;
        let mut session = self.session(RecordError::Query).await?;
        tracing::debug!(
            sql = %request.statement,
            params = request.parameters.len(),
            "executing query"
        );
        let rows = session
            .query(&request.statement, &request.parameters)
            .await
            .map_err(|e| RecordError::Query(e.detail().to_string()))?;
        tracing::debug!(rows = rows.len(), "query completed");
        Ok(rows)
    }
}
