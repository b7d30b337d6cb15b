//! Database schema introspection
//!
//! Column discovery through `information_schema.columns`. Results are never
//! cached; callers look columns up inside the transaction that uses them.

use crate::db::session::Session;
use crate::db::types::CellValue;
use crate::db::value::SqlValue;
use crate::error::{DbError, DbResult};

const UNQUALIFIED_COLUMNS_SQL: &str = "SELECT column_name::text AS column_name \
     FROM information_schema.columns \
     WHERE table_schema = current_schema() AND table_name = $1 \
     ORDER BY ordinal_position";

const QUALIFIED_COLUMNS_SQL: &str = "SELECT column_name::text AS column_name \
     FROM information_schema.columns \
     WHERE table_schema = $1 AND table_name = $2 \
     ORDER BY ordinal_position";

/// Split `schema.table` into its parts; a bare name has no schema
pub fn split_qualified(table: &str) -> (Option<&str>, &str) {
    match table.split_once('.') {
        Some((schema, name)) => (Some(schema), name),
        None => (None, table),
    }
}

/// Column names of `table` in ordinal order.
///
/// An unknown table yields an empty list, not an error.
///
/// # Errors
/// Returns `DbError::SchemaLoadFailed` if the catalog query fails
pub async fn table_columns<S: Session + ?Sized>(
    session: &mut S,
    table: &str,
) -> DbResult<Vec<String>> {
    let rows = match split_qualified(table) {
        (Some(schema), name) => {
            session
                .query(
                    QUALIFIED_COLUMNS_SQL,
                    &[SqlValue::from(schema), SqlValue::from(name)],
                )
                .await
        }
        (None, name) => {
            session
                .query(UNQUALIFIED_COLUMNS_SQL, &[SqlValue::from(name)])
                .await
        }
    }
    .map_err(|e| DbError::SchemaLoadFailed(e.detail().to_string()))?;

    rows.iter()
        .map(|row| match row.get("column_name") {
            Some(CellValue::Text(name)) => Ok(name.clone()),
            other => Err(DbError::SchemaLoadFailed(format!(
                "unexpected column_name value: {:?}",
                other
            ))),
        })
        .collect()
}
