//! Record Inserter

use super::{InsertRequest, RecordStore};
use crate::db::session::SessionSource;
use crate::error::{RecordError, RecordResult};

impl<S: SessionSource> RecordStore<S> {
    /// Insert one row built from `columns`/`values`, returning the affected count.
    ///
    /// Only values are parameter-bound; the table and column identifiers are
    /// trusted as given. Constraint violations surface as `RecordError::Insert`.
    pub async fn insert(&self, request: &InsertRequest) -> RecordResult<u64> {
        request.validate()?;
        let statement = request.statement();
        self.run_statement("insert", &statement, RecordError::Insert)
            .await
    }
}
