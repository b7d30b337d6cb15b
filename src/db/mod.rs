//! Database abstraction layer
//!
//! Session traits over a pooled PostgreSQL backend, bindable parameter values,
//! result row types and catalog introspection.

pub mod postgres;
pub mod schema;
pub mod session;
pub mod types;
pub mod value;

// Re-export main types
pub use postgres::{PgPool, PgSession};
pub use session::{Session, SessionSource};
pub use types::{CellValue, DataType, Record};
pub use value::SqlValue;
