pub mod config;
pub mod discovery;
pub mod error;
pub mod handlers;
pub mod mcp;
pub mod models;
pub mod services;

// Make test_utils available for both unit tests and integration tests
pub mod test_utils;

use std::sync::Arc;

use crate::services::router_service::RouterService;

#[derive(Clone)]
pub struct AppState {
    pub router: Arc<RouterService>,
}

impl AppState {
    pub fn new(router: RouterService) -> Self {
        Self {
            router: Arc::new(router),
        }
    }
}
