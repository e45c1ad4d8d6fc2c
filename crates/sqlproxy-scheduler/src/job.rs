use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use sqlproxy_config::{QueryConfig, SessionOverrides};
use sqlproxy_core::Row;
use sqlproxy_db::ConnectionManager;
use sqlproxy_metrics::Recorder;
use sqlproxy_params::{parse_parameters, RequestParams};

use crate::backoff::{run_with_backoff, Outcome};
use crate::dateword;
use crate::webhook;

const DEFAULT_TIMEOUT_SEC: u64 = 30;
const OUTCOME_SUCCESS: &str = "success";
const OUTCOME_FAILURE: &str = "failure";

/// Run one tick of a scheduled query end to end (spec §4.4 "Per-run semantics").
pub async fn execute_job(
    query: Arc<QueryConfig>,
    manager: Arc<ConnectionManager>,
    recorder: Option<Arc<Recorder>>,
    cancel: CancellationToken,
) {
    let Some(schedule) = &query.schedule else {
        return;
    };

    let form_fields: Vec<(String, String)> = schedule
        .params
        .iter()
        .map(|(name, raw)| (name.clone(), dateword::resolve(raw)))
        .collect();
    let request = RequestParams::from_form(form_fields);

    let params = match parse_parameters(&request, &query.params) {
        Ok(params) => params,
        Err(e) => {
            tracing::error!(query = %query.name, error = %e, "scheduled_query_failed");
            if let Some(recorder) = &recorder {
                recorder.record_scheduled_run(&query.name, OUTCOME_FAILURE);
            }
            return;
        }
    };

    let timeout = Duration::from_secs(query.timeout_sec.unwrap_or(DEFAULT_TIMEOUT_SEC));
    let overrides = query.session.clone().unwrap_or_default();

    let outcome = run_with_backoff(&cancel, |attempt| {
        let manager = manager.clone();
        let query = query.clone();
        let params = params.clone();
        let overrides = overrides.clone();
        async move {
            if attempt > 0 {
                tracing::warn!(query = %query.name, attempt, "retrying scheduled query");
            }
            let mut rows = tokio::time::timeout(timeout, manager.query(&query.database, &query.sql, &params, &overrides))
                .await
                .map_err(|_| "query timed out".to_string())
                .and_then(|r| r.map_err(|e| e.to_string()))?;
            if let Some(columns) = &query.json_columns {
                sqlproxy_db::apply_json_columns(&mut rows, columns).map_err(|e| e.to_string())?;
            }
            Ok(rows)
        }
    })
    .await;

    let result = match outcome {
        Outcome::Cancelled => {
            tracing::info!(query = %query.name, "scheduled query cancelled");
            return;
        }
        Outcome::Completed(result) => result,
    };

    log_outcome(&query, &result);
    if let Some(recorder) = &recorder {
        let outcome = if result.is_ok() { OUTCOME_SUCCESS } else { OUTCOME_FAILURE };
        recorder.record_scheduled_run(&query.name, outcome);
    }

    if let Some(url) = &schedule.webhook_url {
        webhook::deliver(url, &query.name, &result).await;
    }
}

fn log_outcome(query: &QueryConfig, result: &Result<Vec<Row>, String>) {
    let schedule = query.schedule.as_ref().expect("execute_job only runs scheduled queries");
    match result {
        Ok(rows) => {
            if schedule.log_results {
                let sample: Vec<_> = rows.iter().take(10).map(sqlproxy_core::row_to_json).collect();
                tracing::info!(query = %query.name, row_count = rows.len(), sample = ?sample, "scheduled_query_completed");
            } else {
                tracing::info!(query = %query.name, row_count = rows.len(), "scheduled_query_completed");
            }
        }
        Err(error) => {
            tracing::error!(query = %query.name, error = %error, "scheduled_query_failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlproxy_config::ProxyConfig;

    fn config() -> ProxyConfig {
        ProxyConfig::from_yaml(
            r#"
databases:
  - name: main
    kind: sqlite
    file: ":memory:"
    read_only: false
queries:
  - name: nightly_rollup
    database: main
    sql: "SELECT 1 AS one"
    schedule:
      cron: "0 2 * * *"
      params: {}
"#,
        )
        .unwrap()
    }

    #[tokio::test]
    async fn runs_scheduled_query_to_completion() {
        let config = config();
        let manager = Arc::new(ConnectionManager::connect_all(&config).await.unwrap());
        let query = Arc::new(config.query("nightly_rollup").unwrap().clone());
        let cancel = CancellationToken::new();
        // Only asserting it doesn't panic and reaches a terminal log line;
        // the manager/driver path is covered directly in sqlproxy-db.
        execute_job(query, manager, None, cancel).await;
    }
}
