//! PostgreSQL session source
//!
//! Concrete implementation using a deadpool-postgres pool over tokio-postgres.

use crate::config::{ConnectionConfig, Settings, SslMode};
use crate::db::session::{Session, SessionSource};
use crate::db::types::{CellValue, DataType, Record};
use crate::db::value::SqlValue;
use crate::error::{DbError, DbResult};
use async_trait::async_trait;
use deadpool_postgres::{Manager, ManagerConfig, Object, Pool, PoolError, RecyclingMethod, Runtime};
use rust_decimal::Decimal;
use std::error::Error as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, ToSql, Type};

/// Process-wide pool of PostgreSQL connections
#[derive(Clone)]
pub struct PgPool {
    pool: Pool,
}

impl PgPool {
    /// Build the pool. No connection is opened until the first acquire.
    ///
    /// # Errors
    /// Returns `DbError::ConnectionFailed` if the connection settings are invalid
    pub fn new(config: &ConnectionConfig, settings: &Settings) -> DbResult<Self> {
        let pg_config: tokio_postgres::Config = config
            .connection_string_with_password()
            .parse()
            .map_err(|e: tokio_postgres::Error| DbError::ConnectionFailed(describe(&e)))?;
        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = match config.ssl_mode {
            SslMode::Disable => {
                Manager::from_config(pg_config, tokio_postgres::NoTls, manager_config)
            }
            SslMode::Prefer | SslMode::Require => {
                let tls = tokio_postgres_rustls::MakeRustlsConnect::new(make_tls_config());
                Manager::from_config(pg_config, tls, manager_config)
            }
        };

        let pool = Pool::builder(manager)
            .max_size(settings.pool_max_size.max(1))
            .wait_timeout(settings.pool_wait_timeout())
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| DbError::ConnectionFailed(e.to_string()))?;

        tracing::debug!(
            server = %config.connection_string(),
            max_size = settings.pool_max_size,
            "connection pool created"
        );
        Ok(Self { pool })
    }

    /// Current pool size and number of idle connections
    pub fn status(&self) -> (usize, usize) {
        let status = self.pool.status();
        (status.size, status.available)
    }

    /// Close the pool; sessions already handed out finish normally
    pub fn close(&self) {
        self.pool.close();
    }
}

#[async_trait]
impl SessionSource for PgPool {
    type Session = PgSession;

    async fn acquire(&self) -> DbResult<PgSession> {
        let client = self.pool.get().await.map_err(|e| match &e {
            PoolError::Timeout(_) => DbError::PoolExhausted(e.to_string()),
            PoolError::Backend(pg) => DbError::ConnectionFailed(describe(pg)),
            _ => DbError::ConnectionFailed(e.to_string()),
        })?;
        Ok(PgSession {
            client: Some(client),
            in_transaction: false,
        })
    }
}

/// A pooled connection, returned to the pool on drop
pub struct PgSession {
    client: Option<Object>,
    /// Set between a successful BEGIN and a successful COMMIT/ROLLBACK
    in_transaction: bool,
}

impl PgSession {
    fn client(&self) -> DbResult<&Object> {
        self.client
            .as_ref()
            .ok_or_else(|| DbError::ConnectionFailed("session already released".to_string()))
    }

    async fn batch(&self, sql: &str) -> DbResult<()> {
        self.client()?
            .batch_execute(sql)
            .await
            .map_err(|e| DbError::Transaction(describe(&e)))
    }
}

fn bind(params: &[SqlValue]) -> Vec<&(dyn ToSql + Sync)> {
    params.iter().map(|p| p as &(dyn ToSql + Sync)).collect()
}

#[async_trait]
impl Session for PgSession {
    async fn query(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<Vec<Record>> {
        let pg_rows = self
            .client()?
            .query(sql, &bind(params))
            .await
            .map_err(|e| DbError::QueryFailed(describe(&e)))?;

        Ok(pg_rows.iter().map(pg_row_to_record).collect())
    }

    async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
        self.client()?
            .execute(sql, &bind(params))
            .await
            .map_err(|e| DbError::QueryFailed(describe(&e)))
    }

    async fn begin(&mut self) -> DbResult<()> {
        self.batch("BEGIN").await?;
        self.in_transaction = true;
        Ok(())
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.batch("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    async fn rollback(&mut self) -> DbResult<()> {
        self.batch("ROLLBACK").await?;
        self.in_transaction = false;
        Ok(())
    }
}

impl Drop for PgSession {
    fn drop(&mut self) {
        if !self.in_transaction {
            return;
        }
        // Never hand a connection with an open transaction back to the pool.
        // Detaching drops the client, closing the socket; the server then
        // aborts the transaction.
        if let Some(client) = self.client.take() {
            tracing::warn!("session dropped inside a transaction; discarding connection");
            drop(Object::take(client));
        }
    }
}

/// Render a driver error with the server's message when there is one.
///
/// `tokio_postgres::Error`'s Display only names the error kind, so the
/// database message and any source chain are pulled out explicitly.
fn describe(e: &tokio_postgres::Error) -> String {
    if let Some(db) = e.as_db_error() {
        return match db.detail() {
            Some(detail) => format!("{} ({})", db.message(), detail),
            None => db.message().to_string(),
        };
    }
    let mut msg = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        msg.push_str(": ");
        msg.push_str(&cause.to_string());
        source = cause.source();
    }
    msg
}

/// Build a rustls ClientConfig that trusts OS certificates (with Mozilla roots as fallback)
fn make_tls_config() -> rustls::ClientConfig {
    let mut root_store = rustls::RootCertStore::empty();

    let native_certs = rustls_native_certs::load_native_certs();
    let mut loaded = 0;
    for cert in native_certs.certs {
        if root_store.add(cert).is_ok() {
            loaded += 1;
        }
    }
    if loaded == 0 {
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    }

    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

fn pg_row_to_record(pg_row: &Row) -> Record {
    let mut record = Record::with_capacity(pg_row.len());
    for (idx, column) in pg_row.columns().iter().enumerate() {
        let data_type = pg_type_to_datatype(column.type_());
        record.push(column.name(), extract_cell_value(pg_row, idx, &data_type));
    }
    record
}

/// Map tokio_postgres Type to our DataType enum
fn pg_type_to_datatype(pg_type: &Type) -> DataType {
    match *pg_type {
        Type::INT2 => DataType::SmallInt,
        Type::INT4 => DataType::Integer,
        Type::INT8 => DataType::BigInt,
        Type::FLOAT4 => DataType::Real,
        Type::FLOAT8 => DataType::Double,
        Type::NUMERIC => DataType::Numeric,
        Type::TEXT | Type::NAME => DataType::Text,
        Type::VARCHAR => DataType::Varchar,
        Type::CHAR | Type::BPCHAR => DataType::Char,
        Type::BOOL => DataType::Boolean,
        Type::DATE => DataType::Date,
        Type::TIME => DataType::Time,
        Type::TIMESTAMP => DataType::Timestamp,
        Type::TIMESTAMPTZ => DataType::TimestampTz,
        Type::INTERVAL => DataType::Interval,
        Type::JSON => DataType::Json,
        Type::JSONB => DataType::Jsonb,
        Type::BYTEA => DataType::Bytea,
        Type::UUID => DataType::Uuid,
        Type::BOOL_ARRAY => DataType::Array(Box::new(DataType::Boolean)),
        Type::INT2_ARRAY => DataType::Array(Box::new(DataType::SmallInt)),
        Type::INT4_ARRAY => DataType::Array(Box::new(DataType::Integer)),
        Type::INT8_ARRAY => DataType::Array(Box::new(DataType::BigInt)),
        Type::FLOAT8_ARRAY => DataType::Array(Box::new(DataType::Double)),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::NAME_ARRAY => {
            DataType::Array(Box::new(DataType::Text))
        }
        _ => DataType::Unknown(pg_type.name().to_string()),
    }
}

/// Read column `idx` as `T`, wrapping non-null values with `wrap`.
///
/// A value the expected Rust type can't decode falls back to its text form.
fn cell<'a, T: FromSql<'a>>(
    row: &'a Row,
    idx: usize,
    wrap: impl FnOnce(T) -> CellValue,
) -> CellValue {
    match row.try_get::<_, Option<T>>(idx) {
        Ok(Some(v)) => wrap(v),
        Ok(None) => CellValue::Null,
        Err(_) => try_as_string(row, idx),
    }
}

/// Read a one-dimensional array column element by element
fn array<'a, T: FromSql<'a>>(row: &'a Row, idx: usize, wrap: fn(T) -> CellValue) -> CellValue {
    cell(row, idx, |items: Vec<Option<T>>| {
        CellValue::Array(
            items
                .into_iter()
                .map(|item| item.map_or(CellValue::Null, wrap))
                .collect(),
        )
    })
}

/// Extract a cell value from a row based on the column's DataType
fn extract_cell_value(row: &Row, idx: usize, data_type: &DataType) -> CellValue {
    match data_type {
        DataType::SmallInt => cell(row, idx, |v: i16| CellValue::Integer(v.into())),
        DataType::Integer => cell(row, idx, |v: i32| CellValue::Integer(v.into())),
        DataType::BigInt => cell(row, idx, CellValue::Integer),
        DataType::Real => cell(row, idx, |v: f32| CellValue::Float(v.into())),
        DataType::Double => cell(row, idx, CellValue::Float),
        // Exact decimal text; a JSON float would lose precision
        DataType::Numeric => cell(row, idx, |v: Decimal| CellValue::Text(v.to_string())),
        DataType::Boolean => cell(row, idx, CellValue::Boolean),
        DataType::Json | DataType::Jsonb => cell(row, idx, CellValue::Json),
        DataType::Bytea => cell(row, idx, CellValue::Binary),
        DataType::Uuid => cell(row, idx, |v: uuid::Uuid| CellValue::Uuid(v.to_string())),
        DataType::Date => cell(row, idx, |v: NaiveDate| CellValue::DateTime(v.to_string())),
        DataType::Time => cell(row, idx, |v: NaiveTime| CellValue::DateTime(v.to_string())),
        DataType::Timestamp => {
            cell(row, idx, |v: NaiveDateTime| CellValue::DateTime(v.to_string()))
        }
        DataType::TimestampTz => {
            cell(row, idx, |v: DateTime<Utc>| CellValue::DateTime(v.to_rfc3339()))
        }
        DataType::Array(inner) => match **inner {
            DataType::Text => array(row, idx, CellValue::Text),
            DataType::SmallInt => array(row, idx, |v: i16| CellValue::Integer(v.into())),
            DataType::Integer => array(row, idx, |v: i32| CellValue::Integer(v.into())),
            DataType::BigInt => array(row, idx, CellValue::Integer),
            DataType::Double => array(row, idx, CellValue::Float),
            DataType::Boolean => array(row, idx, CellValue::Boolean),
            _ => try_as_string(row, idx),
        },
        // Text types, interval and anything without a direct mapping
        _ => try_as_string(row, idx),
    }
}

/// Try to extract a value as a string (fallback for type mismatches).
///
/// When even the string fallback fails, includes the postgres type name
/// in the value so the caller knows what type couldn't be rendered.
fn try_as_string(row: &Row, idx: usize) -> CellValue {
    match row.try_get::<_, Option<String>>(idx) {
        Ok(Some(v)) => CellValue::Text(v),
        Ok(None) => CellValue::Null,
        Err(_) => {
            let type_name = row
                .columns()
                .get(idx)
                .map_or("unknown", |c| c.type_().name());
            CellValue::Text(format!("<unable to display: {}>", type_name))
        }
    }
}
