//! SQL utilities
//!
//! Parameterized statement construction and formatting.

pub mod builder;
pub mod formatter;

pub use builder::Statement;
pub use formatter::{format_sql, render_plan};
