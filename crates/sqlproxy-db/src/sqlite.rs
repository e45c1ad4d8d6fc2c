use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, ValueRef};
use std::str::FromStr;

use sqlproxy_config::{DatabaseConfig, DatabaseKind, SessionOverrides};
use sqlproxy_core::{Row, RowValue};

use crate::bind::rewrite_sqlite_placeholders;
use crate::driver::Driver;
use crate::error::{DataError, DbResult};
use crate::session::sqlite_session_statements;

/// SQLite backend, via `sqlx`'s SQLite driver.
pub struct SqliteDriver {
    name: String,
    read_only: bool,
    defaults: sqlproxy_config::SessionDefaults,
    pool: SqlitePool,
}

impl SqliteDriver {
    pub async fn connect(config: &DatabaseConfig) -> DbResult<Self> {
        let file = config.file.as_deref().unwrap_or(":memory:");
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{file}"))
            .map_err(|e| DataError::Unavailable(e.to_string()))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(DataError::from)?;

        Ok(Self {
            name: config.name.clone(),
            read_only: config.read_only,
            defaults: config.session.clone(),
            pool,
        })
    }
}

#[async_trait::async_trait]
impl Driver for SqliteDriver {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Sqlite
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    async fn query(&self, sql: &str, params: &Row, overrides: &SessionOverrides) -> DbResult<Vec<Row>> {
        let session = overrides.resolve(&self.defaults);
        let mut conn = self.pool.acquire().await.map_err(DataError::from)?;

        for stmt in sqlite_session_statements(&session) {
            sqlx::query(&stmt).execute(&mut *conn).await.map_err(DataError::from)?;
        }

        let (rewritten, names) = rewrite_sqlite_placeholders(sql);
        let mut query = sqlx::query(&rewritten);
        for name in &names {
            let value = params.get(name).cloned().unwrap_or(RowValue::Null);
            query = bind_row_value(query, value);
        }

        let rows = query.fetch_all(&mut *conn).await.map_err(DataError::from)?;
        Ok(rows.iter().map(sqlite_row_to_row).collect())
    }

    async fn ping(&self) -> DbResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await.map_err(DataError::from)?;
        Ok(())
    }

    async fn reconnect(&mut self) -> DbResult<()> {
        self.pool.close().await;
        let options = self.pool.connect_options().as_ref().clone();
        self.pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(DataError::from)?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

type SqliteQuery<'q> = sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>;

fn bind_row_value(query: SqliteQuery<'_>, value: RowValue) -> SqliteQuery<'_> {
    match value {
        RowValue::Null => query.bind(None::<i64>),
        RowValue::Int(i) => query.bind(i),
        RowValue::Float(f) => query.bind(f),
        RowValue::Bool(b) => query.bind(b),
        RowValue::String(s) => query.bind(s),
        RowValue::Bytes(b) => query.bind(b),
        RowValue::Timestamp(ts) => query.bind(ts),
        RowValue::Json(v) => query.bind(v.to_string()),
    }
}

fn sqlite_row_to_row(row: &SqliteRow) -> Row {
    let mut out = Row::new();
    for (i, column) in row.columns().iter().enumerate() {
        out.insert(column.name().to_string(), decode_sqlite_value(row, i));
    }
    out
}

/// SQLite is dynamically typed per-cell, so decoding tries each scalar type
/// in turn rather than trusting the declared column type.
fn decode_sqlite_value(row: &SqliteRow, i: usize) -> RowValue {
    let Ok(raw) = row.try_get_raw(i) else {
        return RowValue::Null;
    };
    if raw.is_null() {
        return RowValue::Null;
    }
    if let Ok(v) = row.try_get::<i64, _>(i) {
        return RowValue::Int(v);
    }
    if let Ok(v) = row.try_get::<f64, _>(i) {
        return RowValue::Float(v);
    }
    if let Ok(v) = row.try_get::<String, _>(i) {
        return RowValue::String(v);
    }
    if let Ok(v) = row.try_get::<Vec<u8>, _>(i) {
        return RowValue::String(String::from_utf8_lossy(&v).into_owned());
    }
    RowValue::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlproxy_config::{DatabaseKind as Kind, SessionDefaults};

    fn config(name: &str) -> DatabaseConfig {
        DatabaseConfig {
            name: name.to_string(),
            kind: Kind::Sqlite,
            host: None,
            port: None,
            user: None,
            password: None,
            database: None,
            file: Some(":memory:".to_string()),
            read_only: false,
            session: SessionDefaults::default(),
        }
    }

    #[tokio::test]
    async fn connects_and_pings_in_memory_database() {
        let driver = SqliteDriver::connect(&config("main")).await.unwrap();
        driver.ping().await.unwrap();
    }

    #[tokio::test]
    async fn runs_query_and_decodes_rows() {
        let driver = SqliteDriver::connect(&config("main")).await.unwrap();
        driver
            .query(
                "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT, active INTEGER)",
                &Row::new(),
                &SessionOverrides::default(),
            )
            .await
            .unwrap();
        driver
            .query(
                "INSERT INTO users (name, active) VALUES ('Alice', 1)",
                &Row::new(),
                &SessionOverrides::default(),
            )
            .await
            .unwrap();

        let rows = driver
            .query("SELECT * FROM users ORDER BY id", &Row::new(), &SessionOverrides::default())
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("name"), Some(&RowValue::String("Alice".to_string())));
    }

    #[tokio::test]
    async fn binds_named_parameters() {
        let driver = SqliteDriver::connect(&config("main")).await.unwrap();
        driver
            .query(
                "CREATE TABLE items (id INTEGER, label TEXT)",
                &Row::new(),
                &SessionOverrides::default(),
            )
            .await
            .unwrap();
        driver
            .query(
                "INSERT INTO items (id, label) VALUES (@id, @label)",
                &Row::from([
                    ("id".to_string(), RowValue::Int(7)),
                    ("label".to_string(), RowValue::String("widget".to_string())),
                ]),
                &SessionOverrides::default(),
            )
            .await
            .unwrap();

        let rows = driver
            .query(
                "SELECT * FROM items WHERE id = @id",
                &Row::from([("id".to_string(), RowValue::Int(7))]),
                &SessionOverrides::default(),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get("label"), Some(&RowValue::String("widget".to_string())));
    }
}
