//! Operation names
//!
//! Parses the boundary operation names callers send into the `Operation` enum.

use crate::error::{RequestError, RequestResult};
use std::fmt;

/// Boundary operations that can be invoked by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Run a read statement and return rows
    Query,

    /// Insert one row
    Insert,

    /// Update rows by id
    Update,

    /// Delete rows by id
    Delete,

    /// Move rows between tables
    Move,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Query,
        Operation::Insert,
        Operation::Update,
        Operation::Delete,
        Operation::Move,
    ];

    /// The wire name of the operation
    pub fn name(self) -> &'static str {
        match self {
            Operation::Query => "query-database",
            Operation::Insert => "insert-records",
            Operation::Update => "update-records",
            Operation::Delete => "delete-records",
            Operation::Move => "move-records",
        }
    }

    /// Whether the operation changes data (and so reports `{ success, message }`)
    pub fn is_mutation(self) -> bool {
        !matches!(self, Operation::Query)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Parse an operation name
pub fn parse_operation(input: &str) -> RequestResult<Operation> {
    let input = input.trim();
    Operation::ALL
        .into_iter()
        .find(|op| op.name() == input)
        .ok_or_else(|| RequestError::Unknown(input.to_string()))
}
