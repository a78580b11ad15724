//! Agent bridge: prefix-dispatched message handling.
//!
//! Messages starting with `/mcp`, `/claude`, or `/send` route to dedicated
//! handlers; everything else goes through the LLM "improve" path. The MCP
//! and downstream-agent paths return canned responses — there is no real
//! downstream transport. Dispatch never fails the request: errors surface
//! as response strings.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::llm::LlmClient;

/// Routing metadata accompanying a message.
#[derive(Debug, Clone, Default)]
pub struct MessageMetadata {
    pub sender: Option<String>,
    pub conversation_id: Option<String>,
}

/// One recorded turn in a conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationEntry {
    pub timestamp: i64,
    pub sender: String,
    pub message: String,
}

/// The bridge relaying chat messages to the LLM or a named agent.
pub struct AgentBridge {
    name: String,
    llm: Option<Arc<dyn LlmClient>>,
    conversations: RwLock<HashMap<String, Vec<ConversationEntry>>>,
}

impl AgentBridge {
    pub fn new(name: &str, llm: Option<Arc<dyn LlmClient>>) -> Self {
        Self {
            name: name.to_string(),
            llm,
            conversations: RwLock::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether an LLM backend is configured.
    pub fn llm_configured(&self) -> bool {
        self.llm.is_some()
    }

    /// Handle one inbound message and produce a response string.
    pub async fn handle_message(&self, message: &str, metadata: &MessageMetadata) -> String {
        let sender = metadata.sender.as_deref().unwrap_or("unknown");
        let preview: String = message.chars().take(100).collect();
        tracing::info!(sender = sender, "Received message: {}", preview);

        if let Some(conversation_id) = &metadata.conversation_id {
            let entry = ConversationEntry {
                timestamp: chrono::Utc::now().timestamp_millis(),
                sender: sender.to_string(),
                message: message.to_string(),
            };
            self.conversations
                .write()
                .await
                .entry(conversation_id.clone())
                .or_default()
                .push(entry);
        }

        if let Some(rest) = message.strip_prefix("/mcp") {
            self.handle_mcp_query(rest.trim()).await
        } else if let Some(rest) = message.strip_prefix("/claude") {
            self.handle_claude_query(rest.trim()).await
        } else if let Some(rest) = message.strip_prefix("/send") {
            self.handle_send_to_agent(rest.trim()).await
        } else {
            self.improve_message(message).await
        }
    }

    /// MCP queries are mocked; no MCP server is wired up.
    async fn handle_mcp_query(&self, command: &str) -> String {
        format!("MCP Query Result: {}", command)
    }

    /// Direct LLM query.
    async fn handle_claude_query(&self, query: &str) -> String {
        let Some(llm) = &self.llm else {
            return "Claude API not configured".to_string();
        };
        match llm.complete(query, 1500).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("LLM query failed: {}", e);
                format!("Claude Error: {}", e)
            }
        }
    }

    /// Relay to a named downstream agent. Mocked: no A2A transport.
    async fn handle_send_to_agent(&self, rest: &str) -> String {
        match rest.split_once(' ') {
            Some((agent_name, agent_message)) if !agent_message.trim().is_empty() => {
                format!("Message sent to {}: {}", agent_name, agent_message.trim())
            }
            _ => "Usage: /send <agent_name> <message>".to_string(),
        }
    }

    /// Improve a plain message via the LLM, with fallbacks when no backend
    /// is configured or the call fails.
    async fn improve_message(&self, message: &str) -> String {
        let Some(llm) = &self.llm else {
            return format!("Processed: {}", message);
        };
        let prompt = format!(
            "Please improve this message while maintaining its meaning: {}",
            message
        );
        match llm.complete(&prompt, 1000).await {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("Error improving message: {}", e);
                format!("Default response: {}", message)
            }
        }
    }

    /// Conversation history for one conversation id.
    pub async fn conversation_history(&self, conversation_id: &str) -> Vec<ConversationEntry> {
        self.conversations
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    /// All known conversation ids.
    pub async fn conversation_ids(&self) -> Vec<String> {
        self.conversations.read().await.keys().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;

    struct FakeLlm {
        fail: bool,
    }

    #[async_trait::async_trait]
    impl LlmClient for FakeLlm {
        async fn complete(&self, prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
            if self.fail {
                Err(LlmError::server_error(500, "overloaded".to_string()))
            } else {
                Ok(format!("improved({})", prompt))
            }
        }
    }

    fn bridge_without_llm() -> AgentBridge {
        AgentBridge::new("agent_bridge", None)
    }

    #[tokio::test]
    async fn test_mcp_query_is_mocked() {
        let bridge = bridge_without_llm();
        let response = bridge
            .handle_message("/mcp list tools", &MessageMetadata::default())
            .await;
        assert_eq!(response, "MCP Query Result: list tools");
    }

    #[tokio::test]
    async fn test_claude_query_without_key() {
        let bridge = bridge_without_llm();
        let response = bridge
            .handle_message("/claude what is rust", &MessageMetadata::default())
            .await;
        assert_eq!(response, "Claude API not configured");
    }

    #[tokio::test]
    async fn test_send_to_agent() {
        let bridge = bridge_without_llm();
        let response = bridge
            .handle_message("/send other-agent hello there", &MessageMetadata::default())
            .await;
        assert_eq!(response, "Message sent to other-agent: hello there");
    }

    #[tokio::test]
    async fn test_send_usage_when_message_missing() {
        let bridge = bridge_without_llm();
        let response = bridge
            .handle_message("/send other-agent", &MessageMetadata::default())
            .await;
        assert_eq!(response, "Usage: /send <agent_name> <message>");
    }

    #[tokio::test]
    async fn test_plain_message_without_llm() {
        let bridge = bridge_without_llm();
        let response = bridge
            .handle_message("hello", &MessageMetadata::default())
            .await;
        assert_eq!(response, "Processed: hello");
    }

    #[tokio::test]
    async fn test_plain_message_goes_through_llm() {
        let bridge = AgentBridge::new("agent_bridge", Some(Arc::new(FakeLlm { fail: false })));
        let response = bridge
            .handle_message("hello", &MessageMetadata::default())
            .await;
        assert_eq!(
            response,
            "improved(Please improve this message while maintaining its meaning: hello)"
        );
    }

    #[tokio::test]
    async fn test_llm_failure_falls_back() {
        let bridge = AgentBridge::new("agent_bridge", Some(Arc::new(FakeLlm { fail: true })));
        let response = bridge
            .handle_message("hello", &MessageMetadata::default())
            .await;
        assert_eq!(response, "Default response: hello");
    }

    #[tokio::test]
    async fn test_conversation_recorded() {
        let bridge = bridge_without_llm();
        let metadata = MessageMetadata {
            sender: Some("client-1".to_string()),
            conversation_id: Some("conv-1".to_string()),
        };
        bridge.handle_message("first", &metadata).await;
        bridge.handle_message("second", &metadata).await;

        let history = bridge.conversation_history("conv-1").await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].message, "first");
        assert_eq!(history[0].sender, "client-1");
        assert_eq!(bridge.conversation_ids().await, vec!["conv-1".to_string()]);
        assert!(bridge.conversation_history("missing").await.is_empty());
    }
}
