use serde_json::json;
use sqlproxy_core::{row_to_json, Row};

/// Fire-and-log webhook delivery of a scheduled run's outcome (spec §4.4
/// point 6). Payload templating beyond this flat envelope is delegated to
/// an external collaborator, so this always sends the same shape.
#[cfg(feature = "webhook")]
pub async fn deliver(url: &str, query_name: &str, result: &Result<Vec<Row>, String>) {
    let client = reqwest::Client::new();
    let payload = match result {
        Ok(rows) => json!({
            "query": query_name,
            "success": true,
            "row_count": rows.len(),
            "data": rows.iter().map(row_to_json).collect::<Vec<_>>(),
        }),
        Err(error) => json!({
            "query": query_name,
            "success": false,
            "error": error,
        }),
    };

    if let Err(e) = client.post(url).json(&payload).send().await {
        tracing::warn!(query = query_name, webhook_url = url, error = %e, "webhook delivery failed");
    }
}

#[cfg(not(feature = "webhook"))]
pub async fn deliver(_url: &str, _query_name: &str, _result: &Result<Vec<Row>, String>) {}
