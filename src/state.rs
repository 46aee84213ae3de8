use std::sync::Arc;

use crate::llm::PortraitGenerator;

/// Shared application state, cloned per request. The generator handle is
/// injected once at startup.
#[derive(Clone)]
pub struct AppState {
    pub generator: Arc<dyn PortraitGenerator>,
}

impl AppState {
    pub fn new(generator: Arc<dyn PortraitGenerator>) -> Self {
        AppState { generator }
    }
}
