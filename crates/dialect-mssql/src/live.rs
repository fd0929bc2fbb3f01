use std::{
    error::Error as StdError,
    io,
    sync::{Mutex, MutexGuard},
};

use futures_util::TryStreamExt;
use sqlshim_core::{
    ConfigError, Connection, ConnectionConfig, ExecutionError, Mutation, ParameterType, Query,
    Result, Row, Value,
};
use tiberius::{AuthMethod, Client, ColumnData, Config, Query as TdsQuery, QueryItem};
use tokio::{
    net::TcpStream,
    runtime::{Builder, Runtime},
};
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::debug;

use crate::catalog_queries;

type TdsClient = Client<Compat<TcpStream>>;

const CONNECT_SQL: &str = "CONNECT mssql";
const DEFAULT_MSSQL_HOST: &str = "127.0.0.1";
const DEFAULT_MSSQL_PORT: u16 = 1433;
const POISONED_CONNECTION_MESSAGE: &str = "mssql connection state was poisoned";

/// Base connection speaking TDS to a SQL Server instance.
///
/// Statements carry generic `?` placeholders; they are renumbered to
/// `@P1..@Pn` before being sent. The client runs on a private
/// current-thread runtime, so every call blocks until the server answers.
pub struct LiveConnection {
    state: Mutex<LiveState>,
}

struct LiveState {
    runtime: Runtime,
    client: TdsClient,
}

impl LiveConnection {
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| execution_error(CONNECT_SQL, source))?;
        let tds_config = build_tiberius_config(config)?;

        let client = runtime.block_on(async {
            let tcp = TcpStream::connect(tds_config.get_addr())
                .await
                .map_err(|source| execution_error(CONNECT_SQL, source))?;
            tcp.set_nodelay(true)
                .map_err(|source| execution_error(CONNECT_SQL, source))?;

            Client::connect(tds_config, tcp.compat_write())
                .await
                .map_err(|source| execution_error(CONNECT_SQL, source))
        })?;

        debug!(database = %config.database, "connected to mssql");
        Ok(Self {
            state: Mutex::new(LiveState { runtime, client }),
        })
    }

    fn lock_state(&self, sql: &str) -> Result<MutexGuard<'_, LiveState>> {
        self.state
            .lock()
            .map_err(|_| execution_error(sql, io::Error::other(POISONED_CONNECTION_MESSAGE)))
    }
}

impl Connection for LiveConnection {
    fn execute_update(&self, mutation: Mutation) -> Result<u64> {
        let sql = to_tds_placeholders(mutation.sql());
        let mut state = self.lock_state(&sql)?;
        let LiveState { runtime, client } = &mut *state;

        debug!(sql = %sql, params = mutation.params().len(), "executing mssql update");
        runtime.block_on(async {
            let mut query = TdsQuery::new(sql.as_str());
            bind_parameters(&mut query, mutation.params(), mutation.types());

            let result = query
                .execute(&mut *client)
                .await
                .map_err(|source| execution_error(&sql, source))?;
            Ok(result.rows_affected().iter().sum())
        })
    }

    fn execute_query(&self, query: Query) -> Result<Vec<Row>> {
        let sql = to_tds_placeholders(query.sql());
        let mut state = self.lock_state(&sql)?;
        let LiveState { runtime, client } = &mut *state;

        debug!(sql = %sql, params = query.params().len(), "executing mssql query");
        runtime.block_on(async {
            let mut tds_query = TdsQuery::new(sql.as_str());
            bind_parameters(&mut tds_query, query.params(), query.types());

            let mut stream = tds_query
                .query(&mut *client)
                .await
                .map_err(|source| execution_error(&sql, source))?;
            let mut rows = Vec::new();

            while let Some(item) = stream
                .try_next()
                .await
                .map_err(|source| execution_error(&sql, source))?
            {
                if let QueryItem::Row(row) = item {
                    rows.push(convert_row(&row));
                }
            }

            Ok(rows)
        })
    }

    fn quote(&self, value: &Value, _parameter_type: ParameterType) -> Result<Value> {
        Ok(match value {
            Value::Null => Value::Text("NULL".to_string()),
            Value::Bool(value) => Value::Int(i64::from(*value)),
            Value::Int(value) => Value::Int(*value),
            Value::Float(value) => Value::Float(*value),
            Value::Text(value) => Value::Text(format!("N'{}'", value.replace('\'', "''"))),
            Value::Bytes(bytes) => Value::Text(format!("0x{}", hex_upper(bytes))),
        })
    }

    fn last_insert_id(&self, _name: Option<&str>) -> Result<String> {
        let rows = self.fetch_all(catalog_queries::SESSION_IDENTITY_QUERY)?;
        Ok(rows
            .first()
            .and_then(|row| row.get(catalog_queries::IDENTITY_VALUE_COLUMN))
            .map(Value::to_text)
            .unwrap_or_default())
    }
}

fn build_tiberius_config(config: &ConnectionConfig) -> Result<Config> {
    let host = config
        .host
        .as_deref()
        .unwrap_or(DEFAULT_MSSQL_HOST)
        .to_string();
    let port = config.port.unwrap_or(DEFAULT_MSSQL_PORT);
    let user = config
        .user
        .clone()
        .ok_or(ConfigError::MissingField { field: "user" })?;
    let password = config.password.clone().unwrap_or_default();

    let mut tds_config = Config::new();
    tds_config.host(host.as_str());
    tds_config.port(port);
    tds_config.database(config.database.clone());
    tds_config.authentication(AuthMethod::sql_server(user, password));
    tds_config.trust_cert();

    Ok(tds_config)
}

/// Renumbers `?` placeholders as `@P1..@Pn`, leaving string literals and
/// quoted identifiers untouched.
pub(crate) fn to_tds_placeholders(sql: &str) -> String {
    let mut rendered = String::with_capacity(sql.len() + 8);
    let mut closing: Option<char> = None;
    let mut index = 0;

    for ch in sql.chars() {
        match closing {
            Some(close) if ch == close => closing = None,
            Some(_) => {}
            None => match ch {
                '\'' => closing = Some('\''),
                '"' => closing = Some('"'),
                '[' => closing = Some(']'),
                '?' => {
                    index += 1;
                    rendered.push_str("@P");
                    rendered.push_str(&index.to_string());
                    continue;
                }
                _ => {}
            },
        }
        rendered.push(ch);
    }

    rendered
}

fn bind_parameters(query: &mut TdsQuery<'_>, params: &[Value], types: &[ParameterType]) {
    for (position, value) in params.iter().enumerate() {
        let parameter_type = types
            .get(position)
            .copied()
            .unwrap_or_else(|| ParameterType::infer(value));
        bind_parameter(query, value, parameter_type);
    }
}

fn bind_parameter(query: &mut TdsQuery<'_>, value: &Value, parameter_type: ParameterType) {
    match value {
        Value::Null if parameter_type.is_binary() => query.bind(Option::<Vec<u8>>::None),
        Value::Null => query.bind(Option::<String>::None),
        Value::Bytes(bytes) => query.bind(bytes.clone()),
        Value::Text(text) if parameter_type.is_binary() => query.bind(text.clone().into_bytes()),
        Value::Text(text) => query.bind(text.clone()),
        Value::Int(value) if parameter_type == ParameterType::Boolean => query.bind(*value != 0),
        Value::Int(value) => query.bind(*value),
        Value::Float(value) => query.bind(*value),
        Value::Bool(value) => query.bind(*value),
    }
}

fn convert_row(row: &tiberius::Row) -> Row {
    row.cells()
        .enumerate()
        .map(|(index, (column, data))| {
            let value = match data {
                ColumnData::DateTime(Some(_))
                | ColumnData::SmallDateTime(Some(_))
                | ColumnData::DateTime2(Some(_)) => row
                    .try_get::<chrono::NaiveDateTime, _>(index)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, |value| {
                        Value::Text(value.format("%Y-%m-%d %H:%M:%S%.f").to_string())
                    }),
                ColumnData::DateTimeOffset(Some(_)) => row
                    .try_get::<chrono::DateTime<chrono::Utc>, _>(index)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, |value| Value::Text(value.to_rfc3339())),
                ColumnData::Date(Some(_)) => row
                    .try_get::<chrono::NaiveDate, _>(index)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, |value| {
                        Value::Text(value.format("%Y-%m-%d").to_string())
                    }),
                ColumnData::Time(Some(_)) => row
                    .try_get::<chrono::NaiveTime, _>(index)
                    .ok()
                    .flatten()
                    .map_or(Value::Null, |value| {
                        Value::Text(value.format("%H:%M:%S%.f").to_string())
                    }),
                _ => convert_column_data(data),
            };
            (column.name().to_string(), value)
        })
        .collect()
}

fn convert_column_data(data: &ColumnData<'_>) -> Value {
    match data {
        ColumnData::Bit(Some(value)) => Value::Bool(*value),
        ColumnData::U8(Some(value)) => Value::Int(i64::from(*value)),
        ColumnData::I16(Some(value)) => Value::Int(i64::from(*value)),
        ColumnData::I32(Some(value)) => Value::Int(i64::from(*value)),
        ColumnData::I64(Some(value)) => Value::Int(*value),
        ColumnData::F32(Some(value)) => Value::Float(f64::from(*value)),
        ColumnData::F64(Some(value)) => Value::Float(*value),
        ColumnData::Numeric(Some(numeric)) => numeric_value(numeric.value(), numeric.scale()),
        ColumnData::String(Some(value)) => Value::Text(value.to_string()),
        ColumnData::Guid(Some(value)) => Value::Text(value.to_string()),
        ColumnData::Binary(Some(value)) => Value::Bytes(value.to_vec()),
        ColumnData::Xml(Some(value)) => Value::Text(value.to_string()),
        _ => Value::Null,
    }
}

/// Exact rendering of a scaled DECIMAL/NUMERIC. Whole numbers that fit are
/// returned as integers; `IDENT_CURRENT` yields `numeric(38, 0)`.
pub(crate) fn numeric_value(raw: i128, scale: u8) -> Value {
    if scale == 0 {
        return i64::try_from(raw).map_or_else(|_| Value::Text(raw.to_string()), Value::Int);
    }

    let divisor = 10_u128.pow(u32::from(scale));
    let magnitude = raw.unsigned_abs();
    let sign = if raw < 0 { "-" } else { "" };
    Value::Text(format!(
        "{sign}{}.{:0width$}",
        magnitude / divisor,
        magnitude % divisor,
        width = usize::from(scale)
    ))
}

fn hex_upper(bytes: &[u8]) -> String {
    bytes.iter().map(|byte| format!("{byte:02X}")).collect()
}

fn execution_error<E>(sql: &str, source: E) -> sqlshim_core::Error
where
    E: StdError + Send + Sync + 'static,
{
    ExecutionError::statement_failed(sql, source).into()
}
