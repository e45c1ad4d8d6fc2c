use sqlproxy_config::{DatabaseKind, SessionOverrides};
use sqlproxy_core::Row;

use crate::error::DbResult;

/// The capability set every backend driver implements (spec §4.2).
///
/// Modelled as a single trait over variants rather than an inheritance
/// hierarchy: a [`ConnectionManager`](crate::manager::ConnectionManager)
/// holds a name-keyed registry of `Box<dyn Driver>` and never needs to know
/// which concrete backend is behind a given name.
#[async_trait::async_trait]
pub trait Driver: Send + Sync {
    /// The configured name of this connection (the map key in `ConnectionManager`).
    fn name(&self) -> &str;

    /// Which backend this driver talks to.
    fn kind(&self) -> DatabaseKind;

    /// Whether this connection was configured read-only.
    fn is_read_only(&self) -> bool;

    /// Run one statement with `@name`-style parameters bound from `params`,
    /// applying `overrides` on top of the connection's session defaults.
    async fn query(&self, sql: &str, params: &Row, overrides: &SessionOverrides) -> DbResult<Vec<Row>>;

    /// Cheap liveness check, used by `ConnectionManager::ping_all`.
    async fn ping(&self) -> DbResult<()>;

    /// Tear down and re-establish the underlying connection/pool.
    async fn reconnect(&mut self) -> DbResult<()>;

    /// Release all resources. Called during shutdown.
    async fn close(&self);
}
