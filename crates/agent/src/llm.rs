use anyhow::Result;
use async_trait::async_trait;

/// Prompt-in/text-out contract to the generative backend. One call per
/// prompt, no retries; callers decide how to degrade on failure.
#[async_trait]
pub trait GenerativeClient: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}
