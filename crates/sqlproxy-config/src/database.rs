use serde::{Deserialize, Deserializer};

/// Which driver backend a [`DatabaseConfig`] is handled by.
///
/// Parsed case-insensitively at config-load time, the same way
/// [`crate::ParamType`] handles `type:` — `sqlserver`/`SqlServer`/`SQLSERVER`
/// all resolve to the same variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseKind {
    Sqlserver,
    Sqlite,
}

impl DatabaseKind {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "sqlserver" => Some(DatabaseKind::Sqlserver),
            "sqlite" => Some(DatabaseKind::Sqlite),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for DatabaseKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        DatabaseKind::parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("unknown database kind: {raw}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
    Snapshot,
}

impl Default for IsolationLevel {
    fn default() -> Self {
        IsolationLevel::ReadCommitted
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeadlockPriority {
    Low,
    Normal,
    High,
}

impl Default for DeadlockPriority {
    fn default() -> Self {
        DeadlockPriority::Normal
    }
}

/// Session-scoped settings applied before every query (spec glossary:
/// "Session configuration").
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SessionDefaults {
    pub isolation_level: IsolationLevel,
    pub lock_timeout_ms: u64,
    pub deadlock_priority: DeadlockPriority,
    /// SQLite-only: journal mode applied via `PRAGMA journal_mode`.
    pub journal_mode: String,
    /// SQLite-only: busy timeout applied via `PRAGMA busy_timeout`.
    pub busy_timeout_ms: u64,
}

impl Default for SessionDefaults {
    fn default() -> Self {
        Self {
            isolation_level: IsolationLevel::default(),
            lock_timeout_ms: 5000,
            deadlock_priority: DeadlockPriority::default(),
            journal_mode: "WAL".to_string(),
            busy_timeout_ms: 5000,
        }
    }
}

/// Optional per-query overrides of the database's [`SessionDefaults`]
/// (spec §9: "Session overrides compose as query > database > implicit-default").
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SessionOverrides {
    pub isolation_level: Option<IsolationLevel>,
    pub lock_timeout_ms: Option<u64>,
    pub deadlock_priority: Option<DeadlockPriority>,
    pub journal_mode: Option<String>,
    pub busy_timeout_ms: Option<u64>,
}

impl SessionOverrides {
    /// Apply this override on top of a database's defaults.
    pub fn resolve(&self, defaults: &SessionDefaults) -> SessionDefaults {
        SessionDefaults {
            isolation_level: self.isolation_level.unwrap_or(defaults.isolation_level),
            lock_timeout_ms: self.lock_timeout_ms.unwrap_or(defaults.lock_timeout_ms),
            deadlock_priority: self.deadlock_priority.unwrap_or(defaults.deadlock_priority),
            journal_mode: self
                .journal_mode
                .clone()
                .unwrap_or_else(|| defaults.journal_mode.clone()),
            busy_timeout_ms: self.busy_timeout_ms.unwrap_or(defaults.busy_timeout_ms),
        }
    }
}

fn default_read_only() -> bool {
    true
}

/// An immutable record describing one named database connection (spec §3).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    pub name: String,
    pub kind: DatabaseKind,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    /// SQL Server: database name. SQLite: ignored in favour of `file`.
    pub database: Option<String>,
    /// SQLite: file path, or `:memory:`.
    pub file: Option<String>,
    #[serde(default = "default_read_only")]
    pub read_only: bool,
    #[serde(default)]
    pub session: SessionDefaults,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_override_falls_back_to_defaults() {
        let defaults = SessionDefaults::default();
        let over = SessionOverrides {
            lock_timeout_ms: Some(9999),
            ..Default::default()
        };
        let resolved = over.resolve(&defaults);
        assert_eq!(resolved.lock_timeout_ms, 9999);
        assert_eq!(resolved.isolation_level, defaults.isolation_level);
    }
}
