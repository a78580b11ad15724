//! HTTP API for the NANDA bridge.
//!
//! ## Endpoints
//!
//! - `GET /api/health` - Health check
//! - `GET /api/agents/list` - List known agents
//! - `POST /api/send` - Send a message to the bridge (10 NP)
//! - `POST /api/receive_message` - Record an inbound message (5 NP)
//! - `GET /api/render` - Latest message text
//! - `GET /api/messages` - Paginated message log, newest first
//! - `GET /api/messages/stream` - Stream appended records via SSE
//! - `GET /api/conversations/{id}` - Messages for one conversation
//! - `GET /api/stats` - Payment and usage statistics
//! - `GET /api/payments/info` - Static payment requirements

mod routes;
pub mod types;

pub use routes::{router, serve, AppState};
pub use types::*;
