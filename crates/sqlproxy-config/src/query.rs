use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::database::SessionOverrides;
use crate::param::ParamConfig;
use crate::schedule::ScheduleConfig;

/// A logical endpoint/job (spec §3 `QueryConfig`).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QueryConfig {
    pub name: String,
    pub database: String,
    pub path: Option<String>,
    pub method: Option<String>,
    pub sql: String,
    #[serde(default)]
    pub params: Vec<ParamConfig>,
    pub session: Option<SessionOverrides>,
    pub timeout_sec: Option<u64>,
    pub cache: Option<CacheConfig>,
    pub json_columns: Option<Vec<String>>,
    pub schedule: Option<ScheduleConfig>,
}

impl QueryConfig {
    /// Whether this query is reachable as an HTTP endpoint.
    pub fn is_http_endpoint(&self) -> bool {
        self.path.is_some()
    }

    pub fn http_method(&self) -> &str {
        self.method.as_deref().unwrap_or("GET")
    }
}

/// Conservative write-statement classifier used by load-time validation
/// (spec §3 invariant: "A write-classified SQL statement is rejected at
/// load time if its target database is read-only").
///
/// Skips leading whitespace and `--`/`/* */` comments, then checks the
/// first keyword against a closed list. This is deliberately simple: it is
/// a safety net against misconfiguration, not a SQL parser.
pub fn is_write_statement(sql: &str) -> bool {
    const WRITE_KEYWORDS: &[&str] = &[
        "insert", "update", "delete", "merge", "drop", "create", "alter", "truncate",
    ];
    let first_word = first_keyword(sql);
    WRITE_KEYWORDS.iter().any(|kw| first_word.eq_ignore_ascii_case(kw))
}

fn first_keyword(sql: &str) -> &str {
    let mut s = sql.trim_start();
    loop {
        if let Some(rest) = s.strip_prefix("--") {
            s = rest.splitn(2, '\n').nth(1).unwrap_or("").trim_start();
        } else if let Some(rest) = s.strip_prefix("/*") {
            s = rest.splitn(2, "*/").nth(1).unwrap_or("").trim_start();
        } else {
            break;
        }
    }
    s.split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_select_as_read() {
        assert!(!is_write_statement("SELECT * FROM users"));
    }

    #[test]
    fn classifies_insert_as_write() {
        assert!(is_write_statement("INSERT INTO users (name) VALUES (@name)"));
    }

    #[test]
    fn skips_leading_comment() {
        assert!(is_write_statement("-- note\nDELETE FROM users WHERE id = @id"));
    }

    #[test]
    fn is_case_insensitive() {
        assert!(is_write_statement("update users set x = 1"));
    }
}
