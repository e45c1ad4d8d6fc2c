use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use cron::Schedule;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use sqlproxy_config::{ProxyConfig, QueryConfig};
use sqlproxy_db::ConnectionManager;
use sqlproxy_metrics::Recorder;

use crate::job::execute_job;

/// Metadata for one registered job, exposed for introspection (e.g. an
/// admin endpoint listing what's scheduled).
#[derive(Debug, Clone)]
pub struct ScheduledJobInfo {
    pub query_name: String,
    pub cron: String,
}

/// Owns the cron runtime: one background task per registered job, all
/// sharing a single [`CancellationToken`] (spec §4.4).
pub struct SchedulerRegistry {
    cancel: CancellationToken,
    handles: Vec<JoinHandle<()>>,
    jobs: Vec<ScheduledJobInfo>,
}

impl SchedulerRegistry {
    /// Register every query with a `ScheduleConfig` and start its cron
    /// loop. An invalid cron expression is logged and skipped rather than
    /// aborting startup (spec §4.4: "Invalid cron expressions are rejected
    /// at registration time without aborting scheduler startup").
    pub fn start(config: &ProxyConfig, manager: Arc<ConnectionManager>, recorder: Option<Arc<Recorder>>) -> Self {
        let cancel = CancellationToken::new();
        let mut handles = Vec::new();
        let mut jobs = Vec::new();

        for query in &config.queries {
            let Some(schedule_cfg) = &query.schedule else {
                continue;
            };

            let expr = five_field_to_cron_crate_syntax(&schedule_cfg.cron);
            let schedule = match Schedule::from_str(&expr) {
                Ok(s) => s,
                Err(e) => {
                    tracing::error!(query = %query.name, cron = %schedule_cfg.cron, error = %e, "invalid cron expression, job not registered");
                    continue;
                }
            };

            jobs.push(ScheduledJobInfo {
                query_name: query.name.clone(),
                cron: schedule_cfg.cron.clone(),
            });

            let query = Arc::new(query.clone());
            let manager = manager.clone();
            let recorder = recorder.clone();
            let cancel_for_job = cancel.clone();
            handles.push(tokio::spawn(run_job_loop(query, manager, recorder, schedule, cancel_for_job)));
        }

        tracing::info!(count = jobs.len(), "scheduler started");
        Self { cancel, handles, jobs }
    }

    pub fn jobs(&self) -> &[ScheduledJobInfo] {
        &self.jobs
    }

    pub fn token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Signal every job to stop, then wait for each to exit (spec §4.4 "Stop").
    pub async fn stop(self) {
        self.cancel.cancel();
        for handle in self.handles {
            let _ = handle.await;
        }
    }
}

async fn run_job_loop(
    query: Arc<QueryConfig>,
    manager: Arc<ConnectionManager>,
    recorder: Option<Arc<Recorder>>,
    schedule: Schedule,
    cancel: CancellationToken,
) {
    loop {
        let Some(next) = schedule.upcoming(Utc).next() else {
            tracing::warn!(query = %query.name, "cron schedule has no upcoming occurrence, stopping job");
            return;
        };
        let delay = (next - Utc::now()).to_std().unwrap_or(std::time::Duration::ZERO);

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => return,
        }

        execute_job(query.clone(), manager.clone(), recorder.clone(), cancel.clone()).await;

        if cancel.is_cancelled() {
            return;
        }
    }
}

/// `cron` 0.15 expects an optional leading seconds field; the spec's cron
/// expressions are the conventional 5-field, minute-precision form, so a
/// `"0"` seconds field is prepended.
fn five_field_to_cron_crate_syntax(expr: &str) -> String {
    format!("0 {expr}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepends_seconds_field() {
        assert_eq!(five_field_to_cron_crate_syntax("*/5 * * * *"), "0 */5 * * * *");
    }

    #[tokio::test]
    async fn skips_invalid_cron_without_panicking() {
        let config = ProxyConfig::from_yaml(
            r#"
databases:
  - name: main
    kind: sqlite
    file: ":memory:"
queries:
  - name: bad_schedule
    database: main
    sql: "SELECT 1"
    schedule:
      cron: "not a cron expression"
"#,
        )
        .unwrap();
        let manager = Arc::new(ConnectionManager::connect_all(&config).await.unwrap());
        let registry = SchedulerRegistry::start(&config, manager, None);
        assert!(registry.jobs().is_empty());
        registry.stop().await;
    }
}
