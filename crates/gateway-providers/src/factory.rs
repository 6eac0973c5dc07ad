//! Backend construction from configuration.

use crate::ollama::{OllamaBackend, OllamaConfig};
use gateway_config::{BackendConfig, BackendKind};
use gateway_core::{GatewayResult, ModelBackend};
use std::sync::Arc;
use tracing::info;

/// Build the configured backend
///
/// # Errors
/// Returns error if the backend cannot be constructed
pub fn backend_from_config(config: &BackendConfig) -> GatewayResult<Arc<dyn ModelBackend>> {
    let backend: Arc<dyn ModelBackend> = match config.kind {
        BackendKind::Ollama => {
            let ollama = OllamaConfig::new(&config.base_url, &config.model)
                .with_connect_timeout(config.connect_timeout);
            Arc::new(OllamaBackend::new(ollama)?)
        }
    };

    info!(
        backend = %config.kind,
        model = %config.model,
        base_url = %config.base_url,
        "Model backend ready"
    );
    Ok(backend)
}
