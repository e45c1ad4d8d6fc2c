//! Binary entry point: loads a [`ProxyConfig`] from disk, connects every
//! configured database, starts the scheduler, and serves the configured
//! HTTP endpoints (spec §2, §4.4, §4.5).

mod config;
mod logging;
mod routes;
mod state;

use std::sync::Arc;

use sqlproxy_cache::ResultCache;
use sqlproxy_config::ProxyConfig;
use sqlproxy_db::ConnectionManager;
use sqlproxy_handler::HandlerCore;
use sqlproxy_metrics::Recorder;
use sqlproxy_scheduler::SchedulerRegistry;

use config::ServerConfig;
use state::AppState;

#[tokio::main]
async fn main() {
    let server_config = ServerConfig::from_env();
    logging::init_tracing(server_config.log_format);

    let yaml = std::fs::read_to_string(&server_config.config_path).unwrap_or_else(|e| {
        panic!("failed to read proxy config at '{}': {e}", server_config.config_path)
    });
    let proxy_config = Arc::new(ProxyConfig::from_yaml(&yaml).expect("proxy config failed validation"));

    let manager = Arc::new(
        ConnectionManager::connect_all(&proxy_config)
            .await
            .expect("failed to connect configured databases"),
    );
    let cache = Arc::new(ResultCache::default());
    let recorder = server_config.metrics_enabled.then(|| Arc::new(Recorder::new()));

    let handler = Arc::new(HandlerCore::new(
        proxy_config.clone(),
        manager.clone(),
        cache,
        recorder.clone(),
        server_config.defaults,
    ));

    let scheduler = SchedulerRegistry::start(&proxy_config, manager.clone(), recorder.clone());

    let state = AppState {
        config: proxy_config,
        handler,
        recorder,
    };
    let router = routes::build_router(state, server_config.metrics_enabled, server_config.openapi_enabled);

    let listener = tokio::net::TcpListener::bind(&server_config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("failed to bind '{}': {e}", server_config.bind_addr));
    tracing::info!(addr = %server_config.bind_addr, "sqlproxy listening");

    let shutdown = async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
    };

    axum::serve(listener, router).with_graceful_shutdown(shutdown).await.expect("server error");

    scheduler.stop().await;
}
