//! Boundary operations
//!
//! The named entry points (`query-database`, `insert-records`,
//! `update-records`, `delete-records`, `move-records`) and the stdio server
//! that exposes them.

pub mod dispatcher;
pub mod operation;
pub mod requests;
pub mod server;

pub use dispatcher::{Dispatcher, TableAllowList, plan};
pub use operation::{Operation, parse_operation};
pub use requests::{OperationResult, RequestEnvelope, Response, ResponseEnvelope};
pub use server::serve;
