//! Record Mutator

use super::{MutateRequest, RecordStore};
use crate::db::session::SessionSource;
use crate::error::{RecordError, RecordResult};

impl<S: SessionSource> RecordStore<S> {
    /// Apply `updates` to every row whose `id_column` is in `ids`.
    ///
    /// Returns the affected row count; zero matches is still a success.
    pub async fn update(&self, request: &MutateRequest) -> RecordResult<u64> {
        request.validate()?;
        let statement = request.statement();
        self.run_statement("update", &statement, RecordError::Update)
            .await
    }
}
