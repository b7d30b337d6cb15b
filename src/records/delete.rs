//! Record Remover

use super::{RecordStore, RemoveRequest};
use crate::db::session::SessionSource;
use crate::error::{RecordError, RecordResult};

impl<S: SessionSource> RecordStore<S> {
    /// Delete every row whose `id_column` is in `ids`.
    ///
    /// Deleting ids that are already gone affects zero rows and succeeds.
    pub async fn delete(&self, request: &RemoveRequest) -> RecordResult<u64> {
        request.validate()?;
        let statement = request.statement();
        self.run_statement("delete", &statement, RecordError::Delete)
            .await
    }
}
