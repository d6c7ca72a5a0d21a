//! Logging Renderer Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    renderer::{EvaluationResult, RendererCall, RendererEndpoint},
};
use std::sync::Mutex;
use tracing::info;

/// Renderer stand-in for headless development runs.
///
/// Every call is logged and kept, so a host without a web view can still see
/// what the map would have been told.
#[derive(Debug, Default)]
pub struct LoggingRenderer {
    history: Mutex<Vec<String>>,
}

impl LoggingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts evaluated so far, oldest first.
    pub fn scripts(&self) -> Vec<String> {
        self.history
            .lock()
            .map(|history| history.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl RendererEndpoint for LoggingRenderer {
    async fn evaluate(&self, call: RendererCall) -> Result<EvaluationResult> {
        let script = call.to_script();
        info!(target: "renderer", %script, "Renderer call");

        self.history
            .lock()
            .map_err(|_| BridgeError::OperationFailed("renderer history poisoned".to_string()))?
            .push(script);
        Ok(EvaluationResult(None))
    }
}
