use sqlproxy_config::{DeadlockPriority, IsolationLevel, SessionDefaults};

/// Render the `SET` statements SQL Server expects before a query runs,
/// matching the resolved session defaults (spec §4.2.1).
pub fn mssql_session_statements(session: &SessionDefaults) -> Vec<String> {
    vec![
        format!("SET TRANSACTION ISOLATION LEVEL {}", mssql_isolation(session.isolation_level)),
        format!("SET LOCK_TIMEOUT {}", session.lock_timeout_ms),
        format!("SET DEADLOCK_PRIORITY {}", mssql_deadlock_priority(session.deadlock_priority)),
    ]
}

fn mssql_isolation(level: IsolationLevel) -> &'static str {
    match level {
        IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
        IsolationLevel::ReadCommitted => "READ COMMITTED",
        IsolationLevel::RepeatableRead => "REPEATABLE READ",
        IsolationLevel::Serializable => "SERIALIZABLE",
        IsolationLevel::Snapshot => "SNAPSHOT",
    }
}

fn mssql_deadlock_priority(priority: DeadlockPriority) -> &'static str {
    match priority {
        DeadlockPriority::Low => "LOW",
        DeadlockPriority::Normal => "NORMAL",
        DeadlockPriority::High => "HIGH",
    }
}

/// Render the `PRAGMA` statements SQLite expects before a query runs
/// (spec §4.2.2). SQLite has no isolation-level or deadlock-priority
/// concept, so only `journal_mode` and `busy_timeout` apply.
pub fn sqlite_session_statements(session: &SessionDefaults) -> Vec<String> {
    vec![
        format!("PRAGMA journal_mode = {}", session.journal_mode),
        format!("PRAGMA busy_timeout = {}", session.busy_timeout_ms),
    ]
}
