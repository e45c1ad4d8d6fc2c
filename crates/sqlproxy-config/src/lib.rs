//! Configuration data model for the SQL proxy (spec §3).
//!
//! Loading itself — variable expansion, profile overlays, `.env` merging —
//! is an external collaborator per spec.md §1; this crate owns only the
//! data model plus a baseline YAML loader and the load-time validation that
//! enforces the invariants of §3.

pub mod cache;
pub mod database;
pub mod param;
pub mod query;
pub mod schedule;

pub use cache::CacheConfig;
pub use database::{DatabaseConfig, DatabaseKind, DeadlockPriority, IsolationLevel, SessionDefaults, SessionOverrides};
pub use param::{ParamConfig, ParamType};
pub use query::{is_write_statement, QueryConfig};
pub use schedule::ScheduleConfig;

use serde::Deserialize;
use sqlproxy_core::AppError;
use std::collections::HashSet;

/// The full set of configured databases and queries/endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    pub databases: Vec<DatabaseConfig>,
    pub queries: Vec<QueryConfig>,
}

impl ProxyConfig {
    /// Parse from a YAML document and validate the invariants of spec §3.
    pub fn from_yaml(yaml: &str) -> Result<Self, AppError> {
        let config: ProxyConfig = serde_yaml::from_str(yaml)
            .map_err(|e| AppError::ConfigInvalid(format!("yaml parse error: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn database(&self, name: &str) -> Option<&DatabaseConfig> {
        self.databases.iter().find(|d| d.name == name)
    }

    pub fn query(&self, name: &str) -> Option<&QueryConfig> {
        self.queries.iter().find(|q| q.name == name)
    }

    /// Enforce the invariants of spec §3. Collects every violation rather
    /// than failing on the first, so a misconfigured proxy gets one useful
    /// error report instead of a fix-one-rerun loop.
    pub fn validate(&self) -> Result<(), AppError> {
        let mut errors = Vec::new();

        let mut db_names = HashSet::new();
        for db in &self.databases {
            if !db_names.insert(db.name.as_str()) {
                errors.push(format!("duplicate database name: {}", db.name));
            }
        }

        let mut query_names = HashSet::new();
        let mut paths = HashSet::new();
        for q in &self.queries {
            if !query_names.insert(q.name.as_str()) {
                errors.push(format!("duplicate query name: {}", q.name));
            }
            if let Some(path) = &q.path {
                if !paths.insert(path.as_str()) {
                    errors.push(format!("duplicate http path: {path}"));
                }
            }

            let Some(db) = self.database(&q.database) else {
                errors.push(format!(
                    "query '{}' references unknown database '{}'",
                    q.name, q.database
                ));
                continue;
            };

            if db.read_only && is_write_statement(&q.sql) {
                errors.push(format!(
                    "query '{}' is a write statement against read-only database '{}'",
                    q.name, db.name
                ));
            }

            for p in &q.params {
                if p.name == sqlproxy_core::RESERVED_PARAM_TIMEOUT
                    || p.name == sqlproxy_core::RESERVED_PARAM_NOCACHE
                {
                    errors.push(format!(
                        "query '{}' declares reserved parameter name '{}'",
                        q.name, p.name
                    ));
                }
            }

            if let Some(schedule) = &q.schedule {
                for p in &q.params {
                    if p.param_type != ParamType::Int {
                        continue;
                    }
                    let Some(raw) = schedule.params.get(&p.name) else {
                        continue;
                    };
                    if is_schedule_dateword(raw) {
                        continue;
                    }
                    if raw.trim().parse::<i64>().is_err() {
                        errors.push(format!(
                            "query '{}' schedule param '{}' is declared as int but '{raw}' does not parse as an integer",
                            q.name, p.name
                        ));
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::ConfigInvalid(errors.join("; ")))
        }
    }
}

/// Whether a schedule param value is one of the dynamic keywords resolved at
/// run time (`sqlproxy_scheduler::dateword::resolve`) rather than a literal
/// the loader can validate here.
fn is_schedule_dateword(raw: &str) -> bool {
    matches!(raw.to_ascii_lowercase().as_str(), "now" | "today" | "yesterday" | "tomorrow")
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID_YAML: &str = r#"
databases:
  - name: main
    kind: sqlite
    file: ":memory:"
    read_only: true
queries:
  - name: list_users
    database: main
    path: /api/users
    method: GET
    sql: "SELECT * FROM users ORDER BY id"
    params: []
"#;

    #[test]
    fn loads_valid_config() {
        let config = ProxyConfig::from_yaml(VALID_YAML).unwrap();
        assert_eq!(config.databases.len(), 1);
        assert_eq!(config.queries.len(), 1);
    }

    #[test]
    fn rejects_write_against_read_only_database() {
        let yaml = r#"
databases:
  - name: main
    kind: sqlite
    file: ":memory:"
    read_only: true
queries:
  - name: add_user
    database: main
    sql: "INSERT INTO users (name) VALUES (@name)"
    params: []
"#;
        let err = ProxyConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("write statement"));
    }

    #[test]
    fn rejects_unknown_database_reference() {
        let yaml = r#"
databases: []
queries:
  - name: q1
    database: missing
    sql: "SELECT 1"
    params: []
"#;
        let err = ProxyConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("unknown database"));
    }

    #[test]
    fn rejects_reserved_param_name() {
        let yaml = r#"
databases:
  - name: main
    kind: sqlite
    file: ":memory:"
queries:
  - name: q1
    database: main
    sql: "SELECT 1"
    params:
      - name: _timeout
        type: int
"#;
        let err = ProxyConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("reserved parameter"));
    }

    #[test]
    fn rejects_non_numeric_int_schedule_param() {
        let yaml = r#"
databases:
  - name: main
    kind: sqlite
    file: ":memory:"
queries:
  - name: nightly_rollup
    database: main
    sql: "SELECT @days"
    params:
      - name: days
        type: int
    schedule:
      cron: "0 2 * * *"
      params:
        days: "not-a-number"
"#;
        let err = ProxyConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("does not parse as an integer"));
    }

    #[test]
    fn allows_dateword_keyword_for_int_schedule_param() {
        let yaml = r#"
databases:
  - name: main
    kind: sqlite
    file: ":memory:"
queries:
  - name: nightly_rollup
    database: main
    sql: "SELECT @days"
    params:
      - name: days
        type: int
    schedule:
      cron: "0 2 * * *"
      params:
        days: "today"
"#;
        assert!(ProxyConfig::from_yaml(yaml).is_ok());
    }

    #[test]
    fn rejects_duplicate_path() {
        let yaml = r#"
databases:
  - name: main
    kind: sqlite
    file: ":memory:"
queries:
  - name: q1
    database: main
    path: /api/x
    sql: "SELECT 1"
  - name: q2
    database: main
    path: /api/x
    sql: "SELECT 2"
"#;
        let err = ProxyConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("duplicate http path"));
    }
}
