use std::sync::Arc;

use chainrun_core::config::GatewayConfig;
use chainrun_core::traits::RunStore;
use chainrun_engine::ExecutionService;

/// Shared application state for axum handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub store: Arc<dyn RunStore>,
    pub executions: ExecutionService,
}
