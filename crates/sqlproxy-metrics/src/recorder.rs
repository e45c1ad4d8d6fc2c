use prometheus::{
    CounterVec, Encoder, Gauge, HistogramVec, Opts, Registry, TextEncoder,
};

/// Prometheus-backed metrics recorder, grounded on `r2e_prometheus`'s
/// counter/gauge set but keyed by endpoint instead of HTTP route, since this
/// proxy's unit of observability is a configured endpoint, not a framework
/// route (spec §2: "per-endpoint metrics").
///
/// Exposed as a trait-free struct, not a trait: there is exactly one
/// implementation and the handler crate only ever needs to hold an
/// `Arc<Recorder>`, so a trait seam would have no second implementor.
pub struct Recorder {
    registry: Registry,
    requests_total: CounterVec,
    request_duration_seconds: HistogramVec,
    cache_hits_total: CounterVec,
    cache_misses_total: CounterVec,
    query_duration_seconds: HistogramVec,
    scheduled_runs_total: CounterVec,
    in_flight: Gauge,
}

impl Recorder {
    pub fn new() -> Self {
        let registry = Registry::new();

        let requests_total = CounterVec::new(
            Opts::new("sqlproxy_requests_total", "Total HTTP requests handled"),
            &["endpoint", "method", "status"],
        )
        .expect("static metric config is valid");
        let request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "sqlproxy_request_duration_seconds",
                "End-to-end request duration",
            ),
            &["endpoint"],
        )
        .expect("static metric config is valid");
        let cache_hits_total = CounterVec::new(
            Opts::new("sqlproxy_cache_hits_total", "Cache hits per endpoint"),
            &["endpoint"],
        )
        .expect("static metric config is valid");
        let cache_misses_total = CounterVec::new(
            Opts::new("sqlproxy_cache_misses_total", "Cache misses per endpoint"),
            &["endpoint"],
        )
        .expect("static metric config is valid");
        let query_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "sqlproxy_query_duration_seconds",
                "Driver query duration",
            ),
            &["database"],
        )
        .expect("static metric config is valid");
        let scheduled_runs_total = CounterVec::new(
            Opts::new(
                "sqlproxy_scheduled_runs_total",
                "Scheduled query runs, by outcome",
            ),
            &["query_name", "outcome"],
        )
        .expect("static metric config is valid");
        let in_flight = Gauge::new(
            "sqlproxy_requests_in_flight",
            "Requests currently being handled",
        )
        .expect("static metric config is valid");

        for collector in [
            Box::new(requests_total.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(request_duration_seconds.clone()),
            Box::new(cache_hits_total.clone()),
            Box::new(cache_misses_total.clone()),
            Box::new(query_duration_seconds.clone()),
            Box::new(scheduled_runs_total.clone()),
            Box::new(in_flight.clone()),
        ] {
            registry
                .register(collector)
                .expect("metric names are registered exactly once");
        }

        Self {
            registry,
            requests_total,
            request_duration_seconds,
            cache_hits_total,
            cache_misses_total,
            query_duration_seconds,
            scheduled_runs_total,
            in_flight,
        }
    }

    pub fn inc_in_flight(&self) {
        self.in_flight.inc();
    }

    pub fn dec_in_flight(&self) {
        self.in_flight.dec();
    }

    pub fn record_request(&self, endpoint: &str, method: &str, status: u16, duration_secs: f64) {
        self.requests_total
            .with_label_values(&[endpoint, method, &status.to_string()])
            .inc();
        self.request_duration_seconds
            .with_label_values(&[endpoint])
            .observe(duration_secs);
    }

    pub fn record_cache(&self, endpoint: &str, hit: bool) {
        if hit {
            self.cache_hits_total.with_label_values(&[endpoint]).inc();
        } else {
            self.cache_misses_total.with_label_values(&[endpoint]).inc();
        }
    }

    pub fn record_query(&self, database: &str, duration_secs: f64) {
        self.query_duration_seconds
            .with_label_values(&[database])
            .observe(duration_secs);
    }

    pub fn record_scheduled_run(&self, query_name: &str, outcome: &str) {
        self.scheduled_runs_total
            .with_label_values(&[query_name, outcome])
            .inc();
    }

    /// Render the registry in Prometheus text exposition format, matching
    /// `r2e_prometheus::handler::metrics_handler`'s content type.
    pub fn encode(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .expect("encoding gathered metrics never fails");
        String::from_utf8(buffer).expect("prometheus text encoding is always valid UTF-8")
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_request_and_encodes_it() {
        let recorder = Recorder::new();
        recorder.record_request("list_users", "GET", 200, 0.012);
        let body = recorder.encode();
        assert!(body.contains("sqlproxy_requests_total"));
        assert!(body.contains("endpoint=\"list_users\""));
    }

    #[test]
    fn tracks_in_flight_gauge() {
        let recorder = Recorder::new();
        recorder.inc_in_flight();
        recorder.inc_in_flight();
        recorder.dec_in_flight();
        let body = recorder.encode();
        assert!(body.contains("sqlproxy_requests_in_flight 1"));
    }

    #[test]
    fn distinguishes_cache_hits_from_misses() {
        let recorder = Recorder::new();
        recorder.record_cache("list_users", true);
        recorder.record_cache("list_users", false);
        recorder.record_cache("list_users", false);
        let body = recorder.encode();
        assert!(body.contains("sqlproxy_cache_hits_total{endpoint=\"list_users\"} 1"));
        assert!(body.contains("sqlproxy_cache_misses_total{endpoint=\"list_users\"} 2"));
    }
}
