//! Client library backed by sqlx.
//!
//! sqlx speaks the MySQL protocol in pure Rust, so it stands in for the pure
//! backend. It is async; each library owns a current-thread tokio runtime and
//! blocks on it, which means it must not be called from inside another
//! runtime.

use crate::db::escape;
use crate::db::library::{ClientLibrary, Connection, Cursor, CursorOptions};
use crate::db::params::{RewriteCache, format_to_qmark};
use crate::models::{ConnectParams, ErrorClass, LibraryError, Params, Row, Value};
use sqlx::mysql::{
    MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlDatabaseError, MySqlRow,
    MySqlSslMode, MySqlTypeInfo, MySqlValueRef,
};
use sqlx::error::DatabaseError as _;
use sqlx::types::JsonValue;
use sqlx::types::chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::{Column, Connection as _, Decode, MySql, Row as _, Type, TypeInfo};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::debug;

const DEFAULT_CHARSET: &str = "utf8mb4";

pub struct SqlxLibrary {
    runtime: Arc<Runtime>,
    rewrites: Arc<RewriteCache>,
}

impl SqlxLibrary {
    pub fn new() -> Result<Self, LibraryError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        Ok(Self {
            runtime: Arc::new(runtime),
            rewrites: Arc::new(RewriteCache::new()),
        })
    }
}

impl std::fmt::Debug for SqlxLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlxLibrary")
            .field("cached_rewrites", &self.rewrites.len())
            .finish()
    }
}

/// Translate connect parameters into sqlx options.
///
/// Recognized driver options: `charset` (default utf8mb4) and `ssl-mode`.
/// Others are ignored.
pub fn connect_options(params: &ConnectParams) -> Result<MySqlConnectOptions, LibraryError> {
    let mut opts = MySqlConnectOptions::new()
        .host(&params.host)
        .port(params.port)
        .charset(params.option("charset").unwrap_or(DEFAULT_CHARSET));
    if let Some(user) = &params.user {
        opts = opts.username(user);
    }
    if let Some(password) = &params.password {
        opts = opts.password(password);
    }
    if let Some(database) = &params.database {
        opts = opts.database(database);
    }
    if let Some(mode) = params.option("ssl-mode") {
        let mode: MySqlSslMode = mode.parse().map_err(library_error)?;
        opts = opts.ssl_mode(mode);
    }
    Ok(opts)
}

impl ClientLibrary for SqlxLibrary {
    fn connect(&self, params: &ConnectParams) -> Result<Box<dyn Connection>, LibraryError> {
        let opts = connect_options(params)?;
        let conn = self
            .runtime
            .block_on(MySqlConnection::connect_with(&opts))
            .map_err(library_error)?;
        debug!(host = %params.host, port = params.port, "Opened sqlx connection");
        Ok(Box::new(SqlxConnection {
            runtime: Arc::clone(&self.runtime),
            rewrites: Arc::clone(&self.rewrites),
            conn: Some(conn),
        }))
    }

    fn escape_bytes(&self, data: &[u8]) -> Result<Vec<u8>, LibraryError> {
        Ok(escape::escape_bytes(data))
    }
}

pub struct SqlxConnection {
    runtime: Arc<Runtime>,
    rewrites: Arc<RewriteCache>,
    conn: Option<MySqlConnection>,
}

impl SqlxConnection {
    fn live(&mut self) -> Result<&mut MySqlConnection, LibraryError> {
        self.conn
            .as_mut()
            .ok_or_else(|| LibraryError::interface("connection closed"))
    }

    fn run_raw(&mut self, sql: &'static str) -> Result<(), LibraryError> {
        let runtime = Arc::clone(&self.runtime);
        let conn = self.live()?;
        runtime
            .block_on(sqlx::raw_sql(sql).execute(&mut *conn))
            .map_err(library_error)?;
        Ok(())
    }
}

impl Connection for SqlxConnection {
    /// sqlx always reads the full result; `options` has no effect.
    fn cursor(&mut self, _options: CursorOptions) -> Result<Box<dyn Cursor + '_>, LibraryError> {
        let runtime = Arc::clone(&self.runtime);
        let rewrites = Arc::clone(&self.rewrites);
        let conn = self.live()?;
        Ok(Box::new(SqlxCursor {
            runtime,
            rewrites,
            conn,
            rows: Vec::new(),
        }))
    }

    fn set_autocommit(&mut self, on: bool) -> Result<(), LibraryError> {
        self.run_raw(if on {
            "SET autocommit = 1"
        } else {
            "SET autocommit = 0"
        })
    }

    fn commit(&mut self) -> Result<(), LibraryError> {
        self.run_raw("COMMIT")
    }

    fn rollback(&mut self) -> Result<(), LibraryError> {
        self.run_raw("ROLLBACK")
    }

    fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn close(&mut self) -> Result<(), LibraryError> {
        let conn = self
            .conn
            .take()
            .ok_or_else(|| LibraryError::new(ErrorClass::Error, "Already closed"))?;
        self.runtime.block_on(conn.close()).map_err(library_error)
    }
}

struct SqlxCursor<'c> {
    runtime: Arc<Runtime>,
    rewrites: Arc<RewriteCache>,
    conn: &'c mut MySqlConnection,
    rows: Vec<Row>,
}

impl Cursor for SqlxCursor<'_> {
    fn execute(&mut self, sql: &str, params: &Params) -> Result<u64, LibraryError> {
        let (sql, values) = match params {
            Params::None => (sql.to_string(), Vec::new()),
            _ => {
                let (sql, params) = self.rewrites.to_positional(sql, params)?;
                let values = match params {
                    Params::Positional(values) => values,
                    _ => Vec::new(),
                };
                (format_to_qmark(&sql), values)
            }
        };

        let mut query = sqlx::query(&sql);
        for value in &values {
            query = bind_value(query, value);
        }

        self.rows.clear();
        let conn = &mut *self.conn;
        if returns_rows(&sql) {
            let rows = self
                .runtime
                .block_on(query.fetch_all(conn))
                .map_err(library_error)?;
            self.rows = rows.iter().map(decode_row).collect();
            Ok(self.rows.len() as u64)
        } else {
            let result = self
                .runtime
                .block_on(query.execute(conn))
                .map_err(library_error)?;
            Ok(result.rows_affected())
        }
    }

    fn fetch_all(&mut self) -> Result<Vec<Row>, LibraryError> {
        Ok(std::mem::take(&mut self.rows))
    }
}

fn bind_value<'q>(
    query: sqlx::query::Query<'q, MySql, MySqlArguments>,
    value: &'q Value,
) -> sqlx::query::Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(v) => query.bind(*v),
        Value::Int(v) => query.bind(*v),
        Value::Float(v) => query.bind(*v),
        Value::Text(v) => query.bind(v.as_str()),
        Value::Bytes(v) => query.bind(v.as_slice()),
    }
}

/// Whether a statement produces a result set.
pub fn returns_rows(sql: &str) -> bool {
    let head = sql.trim_start().trim_start_matches('(').trim_start();
    let keyword: String = head
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    matches!(
        keyword.as_str(),
        "SELECT" | "SHOW" | "DESCRIBE" | "DESC" | "EXPLAIN" | "WITH" | "VALUES" | "TABLE" | "CALL"
    )
}

/// Map a sqlx failure onto the client error hierarchy.
pub fn library_error(err: sqlx::Error) -> LibraryError {
    match err {
        sqlx::Error::Database(db_err) => {
            match db_err.try_downcast_ref::<MySqlDatabaseError>() {
                Some(mysql) => LibraryError::mysql(mysql.number(), mysql.message()),
                None => LibraryError::new(ErrorClass::Database, db_err.message()),
            }
        }
        sqlx::Error::Io(io_err) => io_err.into(),
        sqlx::Error::Tls(e) => LibraryError::interface(format!("TLS error: {e}")),
        sqlx::Error::Protocol(msg) => LibraryError::interface(format!("Protocol error: {msg}")),
        sqlx::Error::Configuration(e) => LibraryError::interface(e.to_string()),
        sqlx::Error::PoolTimedOut => LibraryError::operational("pool timed out"),
        sqlx::Error::PoolClosed => LibraryError::interface("pool closed"),
        sqlx::Error::WorkerCrashed => LibraryError::interface("connection worker crashed"),
        sqlx::Error::RowNotFound => LibraryError::programming("no rows returned"),
        sqlx::Error::ColumnNotFound(col) => {
            LibraryError::programming(format!("column not found: {col}"))
        }
        sqlx::Error::ColumnIndexOutOfBounds { index, len } => LibraryError::programming(
            format!("column index {index} out of bounds (row has {len} columns)"),
        ),
        sqlx::Error::TypeNotFound { type_name } => {
            LibraryError::new(ErrorClass::NotSupported, format!("type not found: {type_name}"))
        }
        sqlx::Error::ColumnDecode { index, source } => {
            LibraryError::new(ErrorClass::Data, format!("column {index}: {source}"))
        }
        sqlx::Error::Decode(e) => LibraryError::new(ErrorClass::Data, e.to_string()),
        other => LibraryError::new(ErrorClass::Error, other.to_string()),
    }
}

// =============================================================================
// Row decoding
// =============================================================================

/// Logical category of a MySQL column type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeCategory {
    Integer,
    Float,
    Decimal,
    Boolean,
    Binary,
    Date,
    Time,
    DateTime,
    Json,
    Text,
}

pub fn categorize_type(type_name: &str) -> TypeCategory {
    let lower = type_name.to_lowercase();

    match lower.as_str() {
        "date" => return TypeCategory::Date,
        "time" => return TypeCategory::Time,
        "datetime" | "timestamp" => return TypeCategory::DateTime,
        "json" => return TypeCategory::Json,
        _ => {}
    }
    if lower.contains("decimal") || lower.contains("numeric") {
        return TypeCategory::Decimal;
    }
    if lower == "bool" || lower == "boolean" {
        return TypeCategory::Boolean;
    }
    if lower.contains("int") || lower.contains("tiny") || lower == "year" {
        return TypeCategory::Integer;
    }
    if lower.contains("float") || lower.contains("double") || lower == "real" {
        return TypeCategory::Float;
    }
    if lower.contains("blob") || lower.contains("binary") || lower == "bit" {
        return TypeCategory::Binary;
    }
    TypeCategory::Text
}

/// DECIMAL values kept in their exact textual form.
#[derive(Debug)]
struct RawDecimal(String);

impl Type<MySql> for RawDecimal {
    fn type_info() -> MySqlTypeInfo {
        <String as Type<MySql>>::type_info()
    }

    fn compatible(ty: &MySqlTypeInfo) -> bool {
        let name = ty.name().to_lowercase();
        name.contains("decimal") || name.contains("numeric")
    }
}

impl<'r> Decode<'r, MySql> for RawDecimal {
    fn decode(value: MySqlValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as Decode<MySql>>::decode(value)?;
        Ok(RawDecimal(s.to_string()))
    }
}

fn decode_row(row: &MySqlRow) -> Row {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, col)| {
            let type_name = col.type_info().name();
            decode_column(row, idx, categorize_type(type_name)).unwrap_or_else(|| {
                debug!(column = col.name(), type_name, "Column not decodable, using NULL");
                Value::Null
            })
        })
        .collect()
}

/// `None` means the value was present but could not be decoded.
fn decode_column(row: &MySqlRow, idx: usize, category: TypeCategory) -> Option<Value> {
    if let Ok(None) = row.try_get_unchecked::<Option<&[u8]>, _>(idx) {
        return Some(Value::Null);
    }
    match category {
        TypeCategory::Decimal => row.try_get::<RawDecimal, _>(idx).ok().map(|v| Value::Text(v.0)),
        TypeCategory::Integer => decode_integer(row, idx),
        TypeCategory::Boolean => row.try_get::<bool, _>(idx).ok().map(Value::Bool),
        TypeCategory::Float => row
            .try_get::<f64, _>(idx)
            .ok()
            .or_else(|| row.try_get::<f32, _>(idx).ok().map(f64::from))
            .map(Value::Float),
        TypeCategory::Binary => row.try_get::<Vec<u8>, _>(idx).ok().map(Value::Bytes),
        TypeCategory::Date => row
            .try_get::<NaiveDate, _>(idx)
            .ok()
            .map(|v| Value::Text(v.to_string()))
            .or_else(|| decode_raw_text(row, idx)),
        TypeCategory::Time => row
            .try_get::<NaiveTime, _>(idx)
            .ok()
            .map(|v| Value::Text(v.to_string()))
            .or_else(|| decode_raw_text(row, idx)),
        TypeCategory::DateTime => row
            .try_get::<NaiveDateTime, _>(idx)
            .ok()
            .or_else(|| row.try_get::<DateTime<Utc>, _>(idx).ok().map(|v| v.naive_utc()))
            .map(|v| Value::Text(v.to_string()))
            .or_else(|| decode_raw_text(row, idx)),
        TypeCategory::Json => row
            .try_get::<JsonValue, _>(idx)
            .ok()
            .map(|v| Value::Text(v.to_string()))
            .or_else(|| decode_raw_text(row, idx)),
        TypeCategory::Text => row
            .try_get::<String, _>(idx)
            .ok()
            .map(Value::Text)
            .or_else(|| row.try_get::<Vec<u8>, _>(idx).ok().map(Value::Bytes))
            .or_else(|| decode_raw_text(row, idx)),
    }
}

/// The column's bytes as text, skipping sqlx's type check.
///
/// Covers values chrono can't represent, such as zero dates and TIME values
/// outside a day.
fn decode_raw_text(row: &MySqlRow, idx: usize) -> Option<Value> {
    let bytes = row.try_get_unchecked::<Vec<u8>, _>(idx).ok()?;
    Some(match String::from_utf8(bytes) {
        Ok(text) => Value::Text(text),
        Err(e) => Value::Bytes(e.into_bytes()),
    })
}

fn decode_integer(row: &MySqlRow, idx: usize) -> Option<Value> {
    if let Ok(v) = row.try_get::<i8, _>(idx) {
        return Some(Value::Int(v.into()));
    }
    if let Ok(v) = row.try_get::<i16, _>(idx) {
        return Some(Value::Int(v.into()));
    }
    if let Ok(v) = row.try_get::<i32, _>(idx) {
        return Some(Value::Int(v.into()));
    }
    if let Ok(v) = row.try_get::<i64, _>(idx) {
        return Some(Value::Int(v));
    }
    if let Ok(v) = row.try_get::<u8, _>(idx) {
        return Some(Value::Int(v.into()));
    }
    if let Ok(v) = row.try_get::<u16, _>(idx) {
        return Some(Value::Int(v.into()));
    }
    if let Ok(v) = row.try_get::<u32, _>(idx) {
        return Some(Value::Int(v.into()));
    }
    if let Ok(v) = row.try_get::<u64, _>(idx) {
        return Some(match i64::try_from(v) {
            Ok(v) => Value::Int(v),
            Err(_) => Value::Text(v.to_string()),
        });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_returns_rows() {
        assert!(returns_rows("SELECT 1"));
        assert!(returns_rows("  select * from t"));
        assert!(returns_rows("(SELECT 1) UNION (SELECT 2)"));
        assert!(returns_rows("SHOW TABLES"));
        assert!(returns_rows("with x as (select 1) select * from x"));
        assert!(!returns_rows("INSERT INTO t VALUES (1)"));
        assert!(!returns_rows("UPDATE t SET a = 1"));
        assert!(!returns_rows("SET autocommit = 0"));
        assert!(!returns_rows(""));
    }

    #[test]
    fn test_categorize_type() {
        assert_eq!(categorize_type("INT UNSIGNED"), TypeCategory::Integer);
        assert_eq!(categorize_type("TINYINT"), TypeCategory::Integer);
        assert_eq!(categorize_type("DECIMAL"), TypeCategory::Decimal);
        assert_eq!(categorize_type("BOOLEAN"), TypeCategory::Boolean);
        assert_eq!(categorize_type("DOUBLE"), TypeCategory::Float);
        assert_eq!(categorize_type("VARBINARY"), TypeCategory::Binary);
        assert_eq!(categorize_type("MEDIUMBLOB"), TypeCategory::Binary);
        assert_eq!(categorize_type("VARCHAR"), TypeCategory::Text);
        assert_eq!(categorize_type("DATETIME"), TypeCategory::DateTime);
        assert_eq!(categorize_type("TIMESTAMP"), TypeCategory::DateTime);
        assert_eq!(categorize_type("DATE"), TypeCategory::Date);
        assert_eq!(categorize_type("TIME"), TypeCategory::Time);
        assert_eq!(categorize_type("JSON"), TypeCategory::Json);
        assert_eq!(categorize_type("YEAR"), TypeCategory::Integer);
    }

    #[test]
    fn test_io_error_maps_to_io() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err = library_error(sqlx::Error::Io(io));
        assert_eq!(err.class, ErrorClass::Io);
    }

    #[test]
    fn test_transport_errors_map_to_interface() {
        let err = library_error(sqlx::Error::Protocol("bad packet".into()));
        assert_eq!(err.class, ErrorClass::Interface);
        assert!(err.message.contains("bad packet"));

        let err = library_error(sqlx::Error::WorkerCrashed);
        assert_eq!(err.class, ErrorClass::Interface);
    }

    #[test]
    fn test_usage_errors_map_to_programming() {
        assert_eq!(
            library_error(sqlx::Error::RowNotFound).class,
            ErrorClass::Programming
        );
        assert_eq!(
            library_error(sqlx::Error::ColumnNotFound("id".into())).class,
            ErrorClass::Programming
        );
    }

    #[test]
    fn test_pool_timeout_is_operational() {
        assert_eq!(
            library_error(sqlx::Error::PoolTimedOut).class,
            ErrorClass::Operational
        );
    }

    #[test]
    fn test_decode_error_is_data() {
        let source = std::io::Error::new(std::io::ErrorKind::InvalidData, "bad utf8");
        let err = library_error(sqlx::Error::Decode(Box::new(source)));
        assert_eq!(err.class, ErrorClass::Data);
    }

    #[test]
    fn test_connect_options_reject_bad_ssl_mode() {
        let params = ConnectParams::new("localhost").with_option("ssl-mode", "sometimes");
        assert!(connect_options(&params).is_err());

        let params = ConnectParams::new("localhost").with_option("ssl-mode", "disabled");
        assert!(connect_options(&params).is_ok());
    }

    #[test]
    fn test_library_escapes() {
        let library = SqlxLibrary::new().unwrap();
        assert_eq!(library.escape_bytes(b"a'b").unwrap(), b"a\\'b");
        assert_eq!(library.escape_bytes(b"").unwrap(), b"");
    }
}
