//! Metrics recorder interface (spec §2: "interface only" — no `/metrics`
//! route is wired by this crate; `apps/sqlproxy-server` mounts one using
//! [`CONTENT_TYPE`] and [`Recorder::encode`]).

mod recorder;

pub use recorder::Recorder;

/// Content-type for the Prometheus text exposition format, matching
/// `r2e_prometheus::handler::metrics_handler`.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
