//! Seam for reclaiming accelerator memory held by the LLM service.

use async_trait::async_trait;
use yomi_ollama::OllamaApi;

/// Something that can drop cached model weights from the accelerator.
///
/// Eviction is best-effort: implementations log failures and report how
/// many models they asked to unload.
#[async_trait]
pub trait ModelEvictor: Send + Sync {
    async fn evict_models(&self) -> usize;
}

#[async_trait]
impl ModelEvictor for OllamaApi {
    async fn evict_models(&self) -> usize {
        match self.unload_running_models().await {
            Ok(count) => {
                if count > 0 {
                    tracing::info!(count, "Unloaded LLM models from GPU");
                }
                count
            }
            Err(e) if e.is_unreachable() => {
                tracing::debug!(error = %e, "LLM service unreachable, nothing to evict");
                0
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to list running LLM models");
                0
            }
        }
    }
}
