use serde_json::Value;

/// Everything the transport layer extracts from an inbound request before
/// handing it to [`crate::HandlerCore::handle`] (spec §4.5). Framework-free
/// on purpose: `apps/sqlproxy-server` is the only place that knows about
/// `axum::extract::Request`.
#[derive(Debug, Clone)]
pub struct RequestCtx {
    /// The query this request was routed to, resolved by path+method at the
    /// transport boundary.
    pub query_name: String,
    pub method: String,
    pub x_request_id: Option<String>,
    pub x_correlation_id: Option<String>,
    pub remote_addr: Option<String>,
    /// Query-string fields, always present regardless of method — this is
    /// where `_timeout` and `_nocache` are read from (spec §6).
    pub query_params: Vec<(String, String)>,
    /// `Some(Ok(_))` when the request body was `application/json` and
    /// parsed; takes precedence over `query_params`/`form_body` for declared
    /// parameters (spec §4.1). `Some(Err(()))` when `Content-Type` claimed
    /// JSON but the body failed to parse — distinct from `None` ("no JSON
    /// body was sent at all") so the handler can surface a 400 instead of
    /// silently treating malformed JSON as an absent body.
    pub json_body: Option<Result<Value, ()>>,
    /// Parsed `application/x-www-form-urlencoded` body fields, if any.
    pub form_body: Vec<(String, String)>,
}

/// The handler's verdict for one request: a status code, a JSON body, and
/// the response headers to attach (request id, cache headers).
#[derive(Debug, Clone)]
pub struct HandlerOutcome {
    pub status: u16,
    pub body: Value,
    pub headers: Vec<(String, String)>,
}
