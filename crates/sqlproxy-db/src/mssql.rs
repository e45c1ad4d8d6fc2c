use chrono::{DateTime, NaiveDateTime, Utc};
use tiberius::{AuthMethod, Client, Config, EncryptionLevel, ToSql};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use sqlproxy_config::{DatabaseConfig, DatabaseKind, SessionDefaults, SessionOverrides};
use sqlproxy_core::{Row, RowValue};

use crate::bind::rewrite_mssql_placeholders;
use crate::driver::Driver;
use crate::error::{DataError, DbResult};
use crate::session::mssql_session_statements;

type MssqlClient = Client<Compat<TcpStream>>;

/// SQL Server backend, via `tiberius` — `sqlx` has no SQL Server driver, so
/// this connects through the TDS protocol directly rather than through `sqlx`.
pub struct MssqlDriver {
    name: String,
    read_only: bool,
    defaults: SessionDefaults,
    config: Config,
    client: Mutex<MssqlClient>,
}

impl MssqlDriver {
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        let tiberius_config = build_config(config)?;
        let client = connect_client(&tiberius_config).await?;

        Ok(Self {
            name: config.name.clone(),
            read_only: config.read_only,
            defaults: config.session.clone(),
            config: tiberius_config,
            client: Mutex::new(client),
        })
    }
}

fn build_config(db: &DatabaseConfig) -> DbResult<Config> {
    let mut config = Config::new();
    config.host(db.host.as_deref().unwrap_or("localhost"));
    config.port(db.port.unwrap_or(1433));
    if let (Some(user), Some(password)) = (&db.user, &db.password) {
        config.authentication(AuthMethod::sql_server(user, password));
    }
    if let Some(database) = &db.database {
        config.database(database);
    }
    // ApplicationIntent=ReadOnly iff the connection is read-only (spec §4.2.1).
    if db.read_only {
        config.readonly(true);
    }
    config.encryption(EncryptionLevel::NotSupported);
    config.trust_cert();
    Ok(config)
}

async fn connect_client(config: &Config) -> DbResult<MssqlClient> {
    let tcp = TcpStream::connect(config.get_addr())
        .await
        .map_err(|e| DataError::Unavailable(e.to_string()))?;
    tcp.set_nodelay(true).map_err(|e| DataError::Unavailable(e.to_string()))?;
    Client::connect(config.clone(), tcp.compat_write())
        .await
        .map_err(DataError::from)
}

#[async_trait::async_trait]
impl Driver for MssqlDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Sqlserver
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    async fn query(&self, sql: &str, params: &Row, overrides: &SessionOverrides) -> DbResult<Vec<Row>> {
        let session = overrides.resolve(&self.defaults);
        let mut client = self.client.lock().await;

        for stmt in mssql_session_statements(&session) {
            client.simple_query(stmt).await.map_err(DataError::from)?;
        }
        client
            .simple_query("SET NOCOUNT ON; SET IMPLICIT_TRANSACTIONS OFF; SET ARITHABORT ON")
            .await
            .map_err(DataError::from)?;

        let (rewritten, names) = rewrite_mssql_placeholders(sql);
        let bind_values: Vec<TiberiusParam> = names
            .iter()
            .map(|name| TiberiusParam::from(params.get(name).cloned().unwrap_or(RowValue::Null)))
            .collect();
        let bind_refs: Vec<&dyn ToSql> = bind_values.iter().map(|v| v as &dyn ToSql).collect();

        let stream = client.query(&rewritten, &bind_refs).await.map_err(DataError::from)?;
        let rows = stream.into_first_result().await.map_err(DataError::from)?;
        Ok(rows.iter().map(mssql_row_to_row).collect())
    }

    async fn ping(&self) -> DbResult<()> {
        let mut client = self.client.lock().await;
        client.simple_query("SELECT 1").await.map_err(DataError::from)?;
        Ok(())
    }

    async fn reconnect(&mut self) -> DbResult<()> {
        let client = connect_client(&self.config).await?;
        *self.client.get_mut() = client;
        Ok(())
    }

    async fn close(&self) {
        // `Client` has no explicit close; dropping the guard at the end of
        // the request releases the TCP connection.
    }
}

/// Owned parameter wrapper: `tiberius::ToSql` expects references with a
/// lifetime tied to its caller's locals, which a dynamically-sized bind
/// list built from [`RowValue`]s can't provide without an intermediate
/// owned representation.
enum TiberiusParam {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
    DateTime(NaiveDateTime),
}

impl From<RowValue> for TiberiusParam {
    fn from(value: RowValue) -> Self {
        match value {
            RowValue::Null => TiberiusParam::Null,
            RowValue::Int(i) => TiberiusParam::Int(i),
            RowValue::Float(f) => TiberiusParam::Float(f),
            RowValue::Bool(b) => TiberiusParam::Bool(b),
            RowValue::String(s) => TiberiusParam::String(s),
            RowValue::Bytes(b) => TiberiusParam::String(String::from_utf8_lossy(&b).into_owned()),
            RowValue::Timestamp(dt) => TiberiusParam::DateTime(dt.naive_utc()),
            RowValue::Json(v) => TiberiusParam::String(v.to_string()),
        }
    }
}

impl ToSql for TiberiusParam {
    fn to_sql(&self) -> tiberius::ColumnData<'_> {
        match self {
            TiberiusParam::Null => None::<&str>.to_sql(),
            TiberiusParam::Int(i) => i.to_sql(),
            TiberiusParam::Float(f) => f.to_sql(),
            TiberiusParam::Bool(b) => b.to_sql(),
            TiberiusParam::String(s) => s.to_sql(),
            TiberiusParam::DateTime(dt) => dt.to_sql(),
        }
    }
}

fn mssql_row_to_row(row: &tiberius::Row) -> Row {
    let mut out = Row::new();
    for (i, column) in row.columns().iter().enumerate() {
        out.insert(column.name().to_string(), decode_mssql_value(row, i));
    }
    out
}

fn decode_mssql_value(row: &tiberius::Row, i: usize) -> RowValue {
    if let Ok(Some(v)) = row.try_get::<i64, usize>(i) {
        return RowValue::Int(v);
    }
    if let Ok(Some(v)) = row.try_get::<i32, usize>(i) {
        return RowValue::Int(v as i64);
    }
    if let Ok(Some(v)) = row.try_get::<f64, usize>(i) {
        return RowValue::Float(v);
    }
    if let Ok(Some(v)) = row.try_get::<bool, usize>(i) {
        return RowValue::Bool(v);
    }
    if let Ok(Some(v)) = row.try_get::<NaiveDateTime, usize>(i) {
        return RowValue::Timestamp(DateTime::<Utc>::from_naive_utc_and_offset(v, Utc));
    }
    if let Ok(Some(v)) = row.try_get::<&str, usize>(i) {
        return RowValue::String(v.to_string());
    }
    if let Ok(Some(v)) = row.try_get::<&[u8], usize>(i) {
        return RowValue::String(String::from_utf8_lossy(v).into_owned());
    }
    RowValue::Null
}
