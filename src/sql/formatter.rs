//! SQL formatting
//!
//! Pretty-prints generated statements for `cadastro plan` using the sqlformat crate.

use crate::sql::builder::Statement;
use sqlformat::{FormatOptions, Indent, QueryParams, format};

/// Format a SQL statement string
pub fn format_sql(sql: &str) -> String {
    format(
        sql,
        &QueryParams::None,
        &FormatOptions {
            indent: Indent::Spaces(2),
            uppercase: Some(true),
            lines_between_queries: 1,
            ..Default::default()
        },
    )
}

/// Render a statement and its bound parameters for display
pub fn render_plan(statement: &Statement) -> String {
    let mut out = format_sql(&statement.sql);
    out.push('\n');
    for (i, param) in statement.params.iter().enumerate() {
        out.push_str(&format!("-- ${} = {}\n", i + 1, param));
    }
    out
}
