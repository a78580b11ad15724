//! API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::MessageRecord;

/// Body for `POST /api/send` and `POST /api/receive_message`.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    /// The chat message text
    pub message: Option<String>,

    /// Conversation to append to; a fresh one is opened when absent
    pub conversation_id: Option<String>,

    /// Caller identifier
    pub client_id: Option<String>,
}

/// Response for `POST /api/send`.
#[derive(Debug, Clone, Serialize)]
pub struct SendMessageResponse {
    pub response: String,
    pub conversation_id: String,
    pub agent_id: String,
    pub message_id: Uuid,
    pub timestamp: i64,
    pub cost: String,
    pub payment_verified: bool,
    pub success: bool,
}

/// Response for `POST /api/receive_message`.
#[derive(Debug, Clone, Serialize)]
pub struct ReceiveMessageResponse {
    pub status: String,
    pub message_id: Uuid,
    pub timestamp: i64,
    pub cost: String,
    pub payment_verified: bool,
    pub success: bool,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: i64,
    pub agent_port: u16,
    pub ui_port: u16,
    /// "enabled" or "disabled"
    pub payments: String,
    pub facilitator: String,
    pub agent_name: String,
}

/// One entry in the agents listing.
#[derive(Debug, Clone, Serialize)]
pub struct AgentEntry {
    pub name: String,
    pub url: String,
    pub status: String,
}

/// Response for `GET /api/agents/list`.
#[derive(Debug, Clone, Serialize)]
pub struct AgentsListResponse {
    pub agents: Vec<AgentEntry>,
}

/// Response for `GET /api/render`.
#[derive(Debug, Clone, Serialize)]
pub struct RenderResponse {
    pub message: String,
    pub timestamp: i64,
}

/// Query parameters for `GET /api/messages`.
#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Paginated page of the message log, newest first.
#[derive(Debug, Clone, Serialize)]
pub struct MessagesResponse {
    pub messages: Vec<MessageRecord>,
    pub total: usize,
    pub limit: usize,
    pub offset: usize,
}

/// Response for `GET /api/conversations/{id}`.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationResponse {
    pub conversation_id: String,
    pub messages: Vec<MessageRecord>,
    pub count: usize,
}

/// Response for `GET /api/stats`.
#[derive(Debug, Clone, Serialize)]
pub struct StatsResponse {
    pub total_messages: usize,
    pub paid_messages: usize,
    pub free_requests: usize,
    pub total_revenue_np: u64,
    pub facilitator_url: String,
    pub agent_name: String,
    pub timestamp: i64,
}

/// One requirement entry in the payment info listing.
#[derive(Debug, Clone, Serialize)]
pub struct RequirementInfo {
    pub amount: u64,
    pub description: String,
}

/// Response for `GET /api/payments/info`.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentInfoResponse {
    pub facilitator_url: String,
    pub agent_name: String,
    pub payment_requirements: PaymentRequirementsInfo,
}

/// Per-endpoint payment requirements.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentRequirementsInfo {
    pub send_message: RequirementInfo,
    pub receive_message: RequirementInfo,
}

/// Generic error body.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}
