use config::Config;
use std::sync::Arc;

pub mod config;
pub mod logging;

// Service-level state containing only infrastructure concerns
// Needs to implement Clone to be able to be passed into Router as State
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub sse_manager: Arc<sse::Manager>,
}

impl AppState {
    pub fn new(config: Config, sse_manager: Arc<sse::Manager>) -> Self {
        Self {
            config,
            sse_manager,
        }
    }
}
