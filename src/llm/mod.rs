//! Hosted LLM client used by the agent bridge.

mod anthropic;
mod error;

pub use anthropic::{AnthropicClient, DEFAULT_MODEL};
pub use error::{classify_http_status, LlmError, LlmErrorKind};

/// A chat-completion backend. One call in, one text out; the bridge maps
/// every error to a fallback string.
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError>;
}
