use sqlproxy_handler::ServerDefaults;

use crate::logging::LogFormat;

/// Process-level settings that sit outside [`sqlproxy_config::ProxyConfig`]:
/// where to bind, where the proxy config file lives, and the server-wide
/// timeout/cache fallbacks the handler needs (spec §4.5 step 4, §4.3).
///
/// Read from environment variables rather than a config file of its own —
/// this is the one layer of the proxy that genuinely is deployment-specific
/// rather than declarative.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub config_path: String,
    pub log_format: LogFormat,
    pub defaults: ServerDefaults,
    pub metrics_enabled: bool,
    pub openapi_enabled: bool,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            bind_addr: env_or("SQLPROXY_BIND_ADDR", "0.0.0.0:8080"),
            config_path: env_or("SQLPROXY_CONFIG", "sqlproxy.yaml"),
            log_format: LogFormat::from_env(),
            defaults: ServerDefaults {
                default_timeout_sec: env_parse_or("SQLPROXY_DEFAULT_TIMEOUT_SEC", 30),
                max_timeout_sec: env_parse_or("SQLPROXY_MAX_TIMEOUT_SEC", 300),
                default_cache_ttl_sec: env_parse_or("SQLPROXY_DEFAULT_CACHE_TTL_SEC", 60),
            },
            metrics_enabled: env_bool_or("SQLPROXY_METRICS_ENABLED", true),
            openapi_enabled: env_bool_or("SQLPROXY_OPENAPI_ENABLED", true),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse_or(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool_or(key: &str, default: bool) -> bool {
    std::env::var(key).ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(default)
}
