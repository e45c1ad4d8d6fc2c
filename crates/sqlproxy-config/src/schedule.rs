use serde::Deserialize;
use std::collections::HashMap;

/// Binds a [`crate::QueryConfig`] to a cron schedule (spec §4.4).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// Five-field (minute precision) cron expression.
    pub cron: String,
    /// Schedule-provided parameter values, merged with `ParamConfig` defaults
    /// at run time. Values may be the dynamic keywords `now`/`today`/
    /// `yesterday`/`tomorrow` (case-insensitive), resolved at tick time.
    #[serde(default)]
    pub params: HashMap<String, String>,
    /// Log up to 10 sample rows on success when set (spec §4.4.4).
    #[serde(default)]
    pub log_results: bool,
    /// Optional webhook POSTed with the result set on completion (spec §4.4.6).
    pub webhook_url: Option<String>,
}
