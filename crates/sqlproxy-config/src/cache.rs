use serde::Deserialize;

fn default_ttl_sec() -> u64 {
    60
}

/// Per-endpoint cache configuration (spec §3 `CacheConfig`).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Key template, e.g. `"{{.status}}:{{.page | default \"1\"}}"`.
    pub key: String,
    #[serde(default = "default_ttl_sec")]
    pub ttl_sec: u64,
    pub max_size_mb: Option<u64>,
    /// Cron expression that triggers `Clear(endpoint)` (spec §4.3.2).
    pub evict_cron: Option<String>,
}
