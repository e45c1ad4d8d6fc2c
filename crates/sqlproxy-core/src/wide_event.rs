use serde::Serialize;

/// A single wide log record per request, accumulated across the handler's
/// state machine and emitted once at `WRITTEN`/`FAILED` (spec §4.5
/// Observability).
///
/// Fields are filled in as the request progresses; any field left `None`
/// simply means that transition was never reached (e.g. `cache_hit` stays
/// `None` for an endpoint with caching disabled).
#[derive(Debug, Clone, Default, Serialize)]
pub struct WideEvent {
    pub request_id: String,
    pub endpoint: String,
    pub query_name: String,
    pub database: String,
    pub method: String,
    pub remote_addr: Option<String>,
    pub parse_duration_ms: Option<u64>,
    pub param_count: Option<usize>,
    pub timeout_sec: Option<u64>,
    pub cache_hit: Option<bool>,
    pub cache_key: Option<String>,
    pub query_duration_ms: Option<u64>,
    pub row_count: Option<usize>,
    pub total_duration_ms: Option<u64>,
    pub status_code: Option<u16>,
    pub error: Option<String>,
}

impl WideEvent {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    /// Emit the accumulated record as one structured `tracing` event.
    ///
    /// A query whose duration exceeds 80% of the resolved timeout gets a
    /// separate `slow_query` warning first (spec §4.5 Observability).
    pub fn emit(&self) {
        if let (Some(query_ms), Some(timeout_s)) = (self.query_duration_ms, self.timeout_sec) {
            let timeout_ms = timeout_s.saturating_mul(1000);
            if timeout_ms > 0 && query_ms * 10 > timeout_ms * 8 {
                tracing::warn!(
                    request_id = %self.request_id,
                    endpoint = %self.endpoint,
                    query_duration_ms = query_ms,
                    timeout_sec = timeout_s,
                    "slow_query"
                );
            }
        }

        tracing::info!(
            request_id = %self.request_id,
            endpoint = %self.endpoint,
            query_name = %self.query_name,
            database = %self.database,
            method = %self.method,
            remote_addr = self.remote_addr.as_deref().unwrap_or(""),
            parse_duration_ms = self.parse_duration_ms,
            param_count = self.param_count,
            timeout_sec = self.timeout_sec,
            cache_hit = self.cache_hit,
            cache_key = self.cache_key.as_deref().unwrap_or(""),
            query_duration_ms = self.query_duration_ms,
            row_count = self.row_count,
            total_duration_ms = self.total_duration_ms,
            status_code = self.status_code,
            error = self.error.as_deref().unwrap_or(""),
            "request_completed"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_invariant_holds() {
        let ev = WideEvent {
            parse_duration_ms: Some(5),
            query_duration_ms: Some(20),
            total_duration_ms: Some(30),
            ..WideEvent::new("users")
        };
        assert!(
            ev.parse_duration_ms.unwrap() + ev.query_duration_ms.unwrap()
                <= ev.total_duration_ms.unwrap()
        );
    }
}
