use axum::body::Bytes;
use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post, put, MethodRouter};
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use sqlproxy_config::ProxyConfig;
use sqlproxy_handler::{HandlerOutcome, RequestCtx};
use sqlproxy_openapi::{build_spec, OpenApiConfig};

use crate::state::AppState;

/// Build the axum router: one route per configured HTTP endpoint, plus the
/// `/metrics` and `/openapi.json` interfaces (spec §2).
///
/// Assumes each endpoint owns a distinct `path`; two endpoints sharing a
/// path is a configuration error caught elsewhere, not handled here.
pub fn build_router(state: AppState, metrics_enabled: bool, openapi_enabled: bool) -> Router {
    let mut router = Router::new();

    for query in state.config.queries.iter().filter(|q| q.is_http_endpoint()) {
        let path = query.path.clone().expect("is_http_endpoint guarantees a path");
        let name = query.name.clone();
        let method_router = route_for_method(query.http_method(), name);
        router = router.route(&path, method_router);
    }

    if metrics_enabled {
        router = router.route("/metrics", get(metrics_handler));
    }
    if openapi_enabled {
        router = router.route("/openapi.json", get(openapi_handler));
    }

    router
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(default_cors()))
        .with_state(state)
}

/// Permissive CORS: this proxy has no authentication layer of its own, so
/// there is no session/cookie boundary a stricter policy would protect.
fn default_cors() -> CorsLayer {
    CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
}

fn route_for_method(method: &str, query_name: String) -> MethodRouter<AppState> {
    let handler = move |state: State<AppState>, headers: HeaderMap, raw_query: RawQuery, method: Method, body: Bytes| {
        dynamic_handler(state, query_name.clone(), headers, raw_query, method, body)
    };
    match method.to_ascii_uppercase().as_str() {
        "POST" => post(handler),
        "PUT" => put(handler),
        "PATCH" => patch(handler),
        "DELETE" => delete(handler),
        _ => get(handler),
    }
}

async fn dynamic_handler(
    State(state): State<AppState>,
    query_name: String,
    headers: HeaderMap,
    RawQuery(raw_query): RawQuery,
    method: Method,
    body: Bytes,
) -> Response {
    let query_params = raw_query
        .map(|q| form_urlencoded::parse(q.as_bytes()).into_owned().collect())
        .unwrap_or_default();

    let content_type = headers.get(axum::http::header::CONTENT_TYPE).and_then(|v| v.to_str().ok()).unwrap_or("");
    let (json_body, form_body) = if content_type.starts_with("application/json") {
        let value = serde_json::from_slice::<serde_json::Value>(&body).map_err(|_| ());
        (Some(value), Vec::new())
    } else if content_type.starts_with("application/x-www-form-urlencoded") {
        let fields = form_urlencoded::parse(&body).into_owned().collect();
        (None, fields)
    } else {
        (None, Vec::new())
    };

    let ctx = RequestCtx {
        query_name,
        method: method.to_string(),
        x_request_id: header_str(&headers, "x-request-id"),
        x_correlation_id: header_str(&headers, "x-correlation-id"),
        remote_addr: None,
        query_params,
        json_body,
        form_body,
    };

    outcome_to_response(state.handler.handle(ctx).await)
}

fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn outcome_to_response(outcome: HandlerOutcome) -> Response {
    let status = StatusCode::from_u16(outcome.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, Json(outcome.body)).into_response();
    for (name, value) in outcome.headers {
        if let (Ok(name), Ok(value)) = (
            axum::http::HeaderName::try_from(name),
            axum::http::HeaderValue::from_str(&value),
        ) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}

async fn metrics_handler(State(state): State<AppState>) -> Response {
    let Some(recorder) = &state.recorder else {
        return StatusCode::NOT_FOUND.into_response();
    };
    ([(axum::http::header::CONTENT_TYPE, sqlproxy_metrics::CONTENT_TYPE)], recorder.encode()).into_response()
}

async fn openapi_handler(State(state): State<AppState>) -> Json<serde_json::Value> {
    let spec = build_spec(&openapi_config(&state.config), &state.config.queries);
    Json(spec)
}

fn openapi_config(config: &ProxyConfig) -> OpenApiConfig {
    let description = format!(
        "{} configured endpoint(s)",
        config.queries.iter().filter(|q| q.is_http_endpoint()).count()
    );
    OpenApiConfig::new("SQL Proxy", env!("CARGO_PKG_VERSION")).with_description(&description)
}
