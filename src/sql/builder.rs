//! Statement builders
//!
//! Pure functions turning table/column/value descriptors into parameterized
//! statements. Values are only ever bound through `$n` placeholders; table and
//! column identifiers are interpolated as given, so they must come from the
//! calling screen's own literals, never from end-user text.

use crate::db::value::SqlValue;
use serde::Serialize;

/// A statement with its positional parameters, `params[i]` bound to `$i+1`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    /// Number of `$n` placeholders the statement expects
    pub fn placeholder_count(&self) -> usize {
        self.params.len()
    }
}

/// Comma-separated placeholders `$start, $start+1, ...` (`count` of them)
pub fn placeholders(start: usize, count: usize) -> String {
    (start..start + count)
        .map(|i| format!("${}", i))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Double-quote an identifier read from the catalog, doubling embedded quotes
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// `INSERT INTO table (c1, c2) VALUES ($1, $2)`
pub fn insert(table: &str, columns: &[String], values: &[SqlValue]) -> Statement {
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table,
        columns.join(", "),
        placeholders(1, values.len())
    );
    Statement {
        sql,
        params: values.to_vec(),
    }
}

/// `UPDATE table SET a = $1, b = $2 WHERE id IN ($3, $4)`
///
/// SET placeholders take `1..=updates.len()` in the given order; the IN-list
/// continues from `updates.len() + 1`. Parameters are the update values
/// followed by the ids, matching that numbering.
pub fn update(
    table: &str,
    updates: &[(String, SqlValue)],
    ids: &[SqlValue],
    id_column: &str,
) -> Statement {
    let set_clause = updates
        .iter()
        .enumerate()
        .map(|(i, (column, _))| format!("{} = ${}", column, i + 1))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "UPDATE {} SET {} WHERE {} IN ({})",
        table,
        set_clause,
        id_column,
        placeholders(updates.len() + 1, ids.len())
    );

    let mut params = Vec::with_capacity(updates.len() + ids.len());
    params.extend(updates.iter().map(|(_, value)| value.clone()));
    params.extend_from_slice(ids);
    Statement { sql, params }
}

/// `DELETE FROM table WHERE id IN ($1, $2)`
pub fn delete(table: &str, ids: &[SqlValue], id_column: &str) -> Statement {
    let sql = format!(
        "DELETE FROM {} WHERE {} IN ({})",
        table,
        id_column,
        placeholders(1, ids.len())
    );
    Statement {
        sql,
        params: ids.to_vec(),
    }
}

/// `INSERT INTO dest (cols) SELECT cols FROM source WHERE id IN (...)`
///
/// `columns` are catalog names and get quoted.
pub fn copy_rows(
    source: &str,
    destination: &str,
    columns: &[String],
    ids: &[i64],
    id_column: &str,
) -> Statement {
    let column_list = columns
        .iter()
        .map(|c| quote_identifier(c))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "INSERT INTO {} ({}) SELECT {} FROM {} WHERE {} IN ({})",
        destination,
        column_list,
        column_list,
        source,
        id_column,
        placeholders(1, ids.len())
    );
    Statement {
        sql,
        params: ids.iter().copied().map(SqlValue::Integer).collect(),
    }
}

/// `DELETE FROM source WHERE id IN (...)` over integer ids
pub fn delete_by_integer_ids(table: &str, ids: &[i64], id_column: &str) -> Statement {
    let ids: Vec<SqlValue> = ids.iter().copied().map(SqlValue::Integer).collect();
    delete(table, &ids, id_column)
}
