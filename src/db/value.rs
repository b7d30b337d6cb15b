//! Bindable statement parameters
//!
//! `SqlValue` is the loosely typed scalar that crosses the boundary in
//! request payloads. Binding adapts to the parameter type the server inferred
//! for each placeholder, so a JSON number can land in an `int4` column and a
//! JSON string can land in a `date`, `numeric` or `uuid` column.

use base64::{Engine as _, engine::general_purpose::STANDARD};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt;
use std::str::FromStr;
use tokio_postgres::types::{IsNull, Kind, ToSql, Type, to_sql_checked};

/// JSON object key marking a base64-encoded binary payload
pub const BINARY_KEY: &str = "$binary";

type BindResult = Result<IsNull, Box<dyn Error + Sync + Send>>;

/// A scalar-or-null statement parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub enum SqlValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    Binary(Vec<u8>),
    /// Arrays and objects, bound to json/jsonb columns
    Json(serde_json::Value),
}

impl SqlValue {
    /// Coerce to an integer row identifier.
    ///
    /// Integers pass through, integral floats and strings holding an integer
    /// (surrounding whitespace allowed) are converted, anything else is `None`.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            SqlValue::Integer(i) => Some(*i),
            SqlValue::Float(f) if f.fract() == 0.0 && f.is_finite() => {
                let i = *f as i64;
                (i as f64 == *f).then_some(i)
            }
            SqlValue::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Short type label used in log lines and error messages
    pub fn kind(&self) -> &'static str {
        match self {
            SqlValue::Null => "null",
            SqlValue::Bool(_) => "bool",
            SqlValue::Integer(_) => "integer",
            SqlValue::Float(_) => "float",
            SqlValue::Text(_) => "text",
            SqlValue::Binary(_) => "binary",
            SqlValue::Json(_) => "json",
        }
    }
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Bool(b) => write!(f, "{}", b),
            SqlValue::Integer(i) => write!(f, "{}", i),
            SqlValue::Float(x) => write!(f, "{}", x),
            SqlValue::Text(s) => write!(f, "{:?}", s),
            SqlValue::Binary(b) => write!(f, "<binary {} bytes>", b.len()),
            SqlValue::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(s: &str) -> Self {
        SqlValue::Text(s.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(s: String) -> Self {
        SqlValue::Text(s)
    }
}

impl From<i64> for SqlValue {
    fn from(i: i64) -> Self {
        SqlValue::Integer(i)
    }
}

impl From<i32> for SqlValue {
    fn from(i: i32) -> Self {
        SqlValue::Integer(i64::from(i))
    }
}

impl From<bool> for SqlValue {
    fn from(b: bool) -> Self {
        SqlValue::Bool(b)
    }
}

impl From<Vec<u8>> for SqlValue {
    fn from(b: Vec<u8>) -> Self {
        SqlValue::Binary(b)
    }
}

impl TryFrom<serde_json::Value> for SqlValue {
    type Error = String;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;
        Ok(match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => SqlValue::Text(s),
            Value::Object(map) if map.len() == 1 && map.contains_key(BINARY_KEY) => {
                let encoded = map
                    .get(BINARY_KEY)
                    .and_then(Value::as_str)
                    .ok_or_else(|| format!("{} must be a base64 string", BINARY_KEY))?;
                let bytes = STANDARD
                    .decode(encoded)
                    .map_err(|e| format!("invalid base64 in {}: {}", BINARY_KEY, e))?;
                SqlValue::Binary(bytes)
            }
            other => SqlValue::Json(other),
        })
    }
}

impl From<SqlValue> for serde_json::Value {
    fn from(value: SqlValue) -> Self {
        use serde_json::Value;
        match value {
            SqlValue::Null => Value::Null,
            SqlValue::Bool(b) => Value::Bool(b),
            SqlValue::Integer(i) => Value::from(i),
            SqlValue::Float(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            SqlValue::Text(s) => Value::String(s),
            SqlValue::Binary(b) => serde_json::json!({ BINARY_KEY: STANDARD.encode(b) }),
            SqlValue::Json(v) => v,
        }
    }
}

fn is_text_type(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    )
}

fn mismatch(value: &SqlValue, ty: &Type) -> Box<dyn Error + Sync + Send> {
    format!("cannot bind {} value to parameter of type {}", value.kind(), ty.name()).into()
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "t" | "true" | "1" | "y" | "yes" | "on" => Some(true),
        "f" | "false" | "0" | "n" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    const FORMATS: [&str; 4] = [
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    let s = s.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

fn parse_time(s: &str) -> Option<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S%.f")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .ok()
}

fn bind_integer(value: &SqlValue, i: i64, ty: &Type, out: &mut BytesMut) -> BindResult {
    match *ty {
        Type::INT2 => i16::try_from(i)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(i)?.to_sql(ty, out),
        Type::INT8 => i.to_sql(ty, out),
        Type::FLOAT4 => (i as f32).to_sql(ty, out),
        Type::FLOAT8 => (i as f64).to_sql(ty, out),
        Type::NUMERIC => Decimal::from(i).to_sql(ty, out),
        Type::BOOL => (i != 0).to_sql(ty, out),
        Type::OID => u32::try_from(i)?.to_sql(ty, out),
        _ if is_text_type(ty) => i.to_string().to_sql(ty, out),
        _ => Err(mismatch(value, ty)),
    }
}

fn bind_float(value: &SqlValue, f: f64, ty: &Type, out: &mut BytesMut) -> BindResult {
    match *ty {
        Type::FLOAT4 => (f as f32).to_sql(ty, out),
        Type::FLOAT8 => f.to_sql(ty, out),
        Type::NUMERIC => Decimal::try_from(f)?.to_sql(ty, out),
        Type::INT2 | Type::INT4 | Type::INT8 => match value.as_integer() {
            Some(i) => bind_integer(value, i, ty, out),
            None => Err(mismatch(value, ty)),
        },
        _ if is_text_type(ty) => f.to_string().to_sql(ty, out),
        _ => Err(mismatch(value, ty)),
    }
}

fn bind_text(value: &SqlValue, s: &str, ty: &Type, out: &mut BytesMut) -> BindResult {
    if is_text_type(ty) {
        return s.to_sql(ty, out);
    }
    if let Kind::Enum(_) = ty.kind() {
        out.extend_from_slice(s.as_bytes());
        return Ok(IsNull::No);
    }
    let unparsable = || -> Box<dyn Error + Sync + Send> {
        format!("cannot convert {:?} to {}", s, ty.name()).into()
    };
    match *ty {
        Type::INT2 => s.trim().parse::<i16>()?.to_sql(ty, out),
        Type::INT4 => s.trim().parse::<i32>()?.to_sql(ty, out),
        Type::INT8 => s.trim().parse::<i64>()?.to_sql(ty, out),
        Type::FLOAT4 => s.trim().parse::<f32>()?.to_sql(ty, out),
        Type::FLOAT8 => s.trim().parse::<f64>()?.to_sql(ty, out),
        Type::NUMERIC => Decimal::from_str(s.trim())?.to_sql(ty, out),
        Type::BOOL => parse_bool(s).ok_or_else(unparsable)?.to_sql(ty, out),
        Type::DATE => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")?.to_sql(ty, out),
        Type::TIME => parse_time(s).ok_or_else(unparsable)?.to_sql(ty, out),
        Type::TIMESTAMP => parse_timestamp(s).ok_or_else(unparsable)?.to_sql(ty, out),
        Type::TIMESTAMPTZ => {
            let ts = DateTime::parse_from_rfc3339(s.trim())
                .map(|dt| dt.with_timezone(&Utc))
                .ok()
                .or_else(|| parse_timestamp(s).map(|naive| naive.and_utc()))
                .ok_or_else(unparsable)?;
            ts.to_sql(ty, out)
        }
        Type::UUID => uuid::Uuid::parse_str(s.trim())?.to_sql(ty, out),
        Type::JSON | Type::JSONB => {
            let json = serde_json::from_str::<serde_json::Value>(s)
                .unwrap_or_else(|_| serde_json::Value::String(s.to_string()));
            json.to_sql(ty, out)
        }
        Type::BYTEA => s.as_bytes().to_sql(ty, out),
        _ => Err(mismatch(value, ty)),
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> BindResult {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(b) => match *ty {
                Type::BOOL => b.to_sql(ty, out),
                _ if is_text_type(ty) => b.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            SqlValue::Integer(i) => bind_integer(self, *i, ty, out),
            SqlValue::Float(f) => bind_float(self, *f, ty, out),
            SqlValue::Text(s) => bind_text(self, s, ty, out),
            SqlValue::Binary(b) => match *ty {
                Type::BYTEA => b.as_slice().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
            SqlValue::Json(v) => match *ty {
                Type::JSON | Type::JSONB => v.to_sql(ty, out),
                _ if is_text_type(ty) => v.to_string().to_sql(ty, out),
                _ => Err(mismatch(self, ty)),
            },
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
