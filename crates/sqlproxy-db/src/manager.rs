use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use sqlproxy_config::{DatabaseConfig, DatabaseKind, ProxyConfig};
use sqlproxy_core::Row;

use crate::driver::Driver;
use crate::error::{DataError, DbResult};
#[cfg(feature = "sqlite")]
use crate::sqlite::SqliteDriver;

#[cfg(feature = "mssql")]
use crate::mssql::MssqlDriver;

/// Name-keyed registry of live driver connections, built once from a
/// [`ProxyConfig`] at startup.
///
/// Each driver is held behind its own lock so a reconnect on one database
/// never blocks queries against another.
pub struct ConnectionManager {
    drivers: HashMap<String, Arc<RwLock<Box<dyn Driver>>>>,
}

impl ConnectionManager {
    /// Connect every configured database. Fails fast on the first connection
    /// error — a proxy with a database it can't reach shouldn't serve traffic
    /// against it.
    pub async fn connect_all(config: &ProxyConfig) -> DbResult<Self> {
        let mut drivers = HashMap::with_capacity(config.databases.len());
        for db in &config.databases {
            let driver = connect_one(db).await?;
            drivers.insert(db.name.clone(), Arc::new(RwLock::new(driver)));
        }
        Ok(Self { drivers })
    }

    /// Look up a connection by its configured name.
    pub fn get(&self, name: &str) -> DbResult<Arc<RwLock<Box<dyn Driver>>>> {
        self.drivers
            .get(name)
            .cloned()
            .ok_or_else(|| DataError::Unavailable(name.to_string()))
    }

    /// Run a query against the named connection.
    pub async fn query(
        &self,
        database: &str,
        sql: &str,
        params: &Row,
        overrides: &sqlproxy_config::SessionOverrides,
    ) -> DbResult<Vec<Row>> {
        let driver = self.get(database)?;
        let driver = driver.read().await;
        driver.query(sql, params, overrides).await
    }

    /// Ping every registered connection, returning the names of any that failed.
    pub async fn ping_all(&self) -> Vec<String> {
        let mut unhealthy = Vec::new();
        for (name, driver) in &self.drivers {
            let driver = driver.read().await;
            if driver.ping().await.is_err() {
                unhealthy.push(name.clone());
            }
        }
        unhealthy
    }

    pub async fn reconnect(&self, name: &str) -> DbResult<()> {
        let driver = self.get(name)?;
        let mut driver = driver.write().await;
        driver.reconnect().await
    }

    pub async fn reconnect_all(&self) -> Vec<(String, DataError)> {
        let mut failures = Vec::new();
        for (name, driver) in &self.drivers {
            let mut driver = driver.write().await;
            if let Err(e) = driver.reconnect().await {
                failures.push((name.clone(), e));
            }
        }
        failures
    }

    pub async fn close_all(&self) {
        for driver in self.drivers.values() {
            driver.read().await.close().await;
        }
    }
}

async fn connect_one(db: &DatabaseConfig) -> DbResult<Box<dyn Driver>> {
    match db.kind {
        #[cfg(feature = "sqlite")]
        DatabaseKind::Sqlite => Ok(Box::new(SqliteDriver::connect(db).await?)),
        #[cfg(not(feature = "sqlite"))]
        DatabaseKind::Sqlite => Err(DataError::Unavailable(format!(
            "database '{}' requires the 'sqlite' feature",
            db.name
        ))),
        #[cfg(feature = "mssql")]
        DatabaseKind::Sqlserver => Ok(Box::new(MssqlDriver::connect(db).await?)),
        #[cfg(not(feature = "mssql"))]
        DatabaseKind::Sqlserver => Err(DataError::Unavailable(format!(
            "database '{}' requires the 'mssql' feature",
            db.name
        ))),
    }
}
