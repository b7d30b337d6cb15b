//! Boundary wire types
//!
//! Request/response envelopes for the line-delimited server, the mutation
//! result shape, and payload decoding into the typed record requests.

use crate::db::types::Record;
use crate::error::{RequestError, RequestResult};
use crate::records::QueryRequest;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One request line: `{ "id"?: any, "operation": "...", "payload": ... }`
#[derive(Debug, Clone, Deserialize)]
pub struct RequestEnvelope {
    #[serde(default)]
    pub id: Option<Value>,
    pub operation: String,
    #[serde(default)]
    pub payload: Value,
}

impl RequestEnvelope {
    /// Parse a request line
    pub fn parse(line: &str) -> RequestResult<Self> {
        serde_json::from_str(line).map_err(|e| RequestError::MalformedRequest(e.to_string()))
    }
}

/// One response line, carrying the request id back for correlation
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Response>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    pub fn result(id: Option<Value>, result: Response) -> Self {
        Self {
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, message: impl Into<String>) -> Self {
        Self {
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(message.into()),
        }
    }
}

/// Outcome of a mutating operation: `{ success, message? }`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl OperationResult {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// What a dispatched operation produced
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// Rows from `query-database`
    Rows(Vec<Record>),
    /// Result of a mutation
    Outcome(OperationResult),
}

/// `query-database` accepts either a bare statement string or an object
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum QueryPayload {
    Statement(String),
    Request(QueryRequest),
}

/// Decode a payload into `T`, naming the operation in the error
pub fn decode_payload<T: DeserializeOwned>(operation: &str, payload: Value) -> RequestResult<T> {
    serde_json::from_value(payload).map_err(|e| RequestError::MalformedPayload {
        operation: operation.to_string(),
        message: e.to_string(),
    })
}

/// Decode a `query-database` payload
pub fn decode_query(payload: Value) -> RequestResult<QueryRequest> {
    Ok(match decode_payload("query-database", payload)? {
        QueryPayload::Statement(statement) => QueryRequest::new(statement, Vec::new()),
        QueryPayload::Request(request) => request,
    })
}
