//! Driver abstraction and connection management for the SQL proxy (spec §4.2).
//!
//! A single [`Driver`] trait captures the capability set every backend
//! exposes; [`ConnectionManager`] holds a name-keyed registry of connections
//! built from [`sqlproxy_config::ProxyConfig`]. Backends are variants behind
//! the trait, not an inheritance hierarchy: SQLite via `sqlx`, SQL Server via
//! `tiberius` (`sqlx` has no SQL Server driver).

mod bind;
mod driver;
mod error;
mod json_columns;
mod manager;
#[cfg(feature = "mssql")]
mod mssql;
mod session;
#[cfg(feature = "sqlite")]
mod sqlite;

pub use driver::Driver;
pub use error::{DataError, DbResult};
pub use json_columns::apply_json_columns;
pub use manager::ConnectionManager;
#[cfg(feature = "mssql")]
pub use mssql::MssqlDriver;
pub use session::{mssql_session_statements, sqlite_session_statements};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDriver;
