pub mod config;
pub mod handlers;
pub mod services;
pub mod startup;

use services::{EndpointAllowList, UpstreamClient};
use std::sync::Arc;

/// Shared state for relay handlers. Holds no per-request data.
#[derive(Clone)]
pub struct AppState {
    pub upstream: Arc<UpstreamClient>,
    pub allow_list: Arc<EndpointAllowList>,
}

impl AppState {
    pub fn new(upstream: Arc<UpstreamClient>, allow_list: Arc<EndpointAllowList>) -> Self {
        Self {
            upstream,
            allow_list,
        }
    }

    pub fn from_settings(settings: &config::UpstreamSettings) -> Self {
        Self::new(
            Arc::new(UpstreamClient::new(settings)),
            Arc::new(EndpointAllowList::new(&settings.allowed_endpoints)),
        )
    }
}
