//! Record Relocator
//!
//! BEGIN → INTROSPECT → INSERT-SELECT → DELETE → COMMIT, with ROLLBACK when
//! any step after BEGIN fails. The copied column list always comes from the
//! source table's catalog entry, never from the caller.

use super::{RecordStore, RelocateRequest};
use crate::db::schema;
use crate::db::session::{Session, SessionSource};
use crate::error::{DbError, RecordError, RecordResult};
use crate::sql::builder;

/// What a successful move did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelocateOutcome {
    /// Rows inserted into the destination
    pub copied: u64,
    /// Rows deleted from the source
    pub removed: u64,
}

impl<S: SessionSource> RecordStore<S> {
    /// Atomically copy the rows matching `ids` from the source table into the
    /// destination table, then delete them from the source.
    ///
    /// Either both statements take effect or neither does. Ids that match no
    /// rows are not an error.
    ///
    /// # Errors
    /// `RecordError::Validation` / `RecordError::Coercion` before any I/O,
    /// `RecordError::Relocate` (after rollback) for failures inside the transaction
    pub async fn relocate(&self, request: &RelocateRequest) -> RecordResult<RelocateOutcome> {
        request.validate()?;
        let ids = request.integer_ids()?;

        let mut session = self.session(RecordError::Relocate).await?;
        session
            .begin()
            .await
            .map_err(|e| RecordError::Relocate(e.detail().to_string()))?;

        let result = match move_rows(&mut session, request, &ids).await {
            Ok(outcome) => session.commit().await.map(|()| outcome),
            Err(e) => Err(e),
        };

        match result {
            Ok(outcome) => {
                tracing::info!(
                    source = %request.source_table,
                    destination = %request.destination_table,
                    copied = outcome.copied,
                    removed = outcome.removed,
                    "records moved"
                );
                Ok(outcome)
            }
            Err(e) => {
                tracing::warn!(
                    source = %request.source_table,
                    destination = %request.destination_table,
                    error = %e,
                    "move failed; rolling back"
                );
                if let Err(rollback_err) = session.rollback().await {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
                Err(RecordError::Relocate(e.detail().to_string()))
            }
        }
    }
}

async fn move_rows<T: Session>(
    session: &mut T,
    request: &RelocateRequest,
    ids: &[i64],
) -> Result<RelocateOutcome, DbError> {
    let columns = schema::table_columns(session, &request.source_table).await?;
    if columns.is_empty() {
        return Err(DbError::SchemaLoadFailed(format!(
            "no columns found for table {}",
            request.source_table
        )));
    }

    let copy = builder::copy_rows(
        &request.source_table,
        &request.destination_table,
        &columns,
        ids,
        &request.id_column,
    );
    tracing::debug!(sql = %copy.sql, params = copy.params.len(), "copying rows");
    let copied = session.execute(&copy.sql, &copy.params).await?;

    let delete = builder::delete_by_integer_ids(&request.source_table, ids, &request.id_column);
    tracing::debug!(sql = %delete.sql, params = delete.params.len(), "removing rows");
    let removed = session.execute(&delete.sql, &delete.params).await?;

    Ok(RelocateOutcome { copied, removed })
}
