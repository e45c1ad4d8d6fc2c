use std::sync::Arc;

use sqlproxy_config::ProxyConfig;
use sqlproxy_handler::HandlerCore;
use sqlproxy_metrics::Recorder;

/// Shared application state handed to every axum handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ProxyConfig>,
    pub handler: Arc<HandlerCore>,
    pub recorder: Option<Arc<Recorder>>,
}
