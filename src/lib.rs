//! # NANDA Bridge
//!
//! Agent bridge relaying chat-style messages between a UI, an external
//! agent registry, and a hosted LLM, with NANDA Points (x402) payment
//! gating on the message endpoints.
//!
//! This library provides:
//! - An HTTP API for sending/receiving messages and inspecting the log
//! - An x402 payment gate settled against an external facilitator service
//! - A prefix-dispatching agent bridge backed by the Anthropic API
//!
//! ## Request Flow
//!
//! ```text
//!        ┌─────────────────────────────────┐
//!        │        Payment Gate             │
//!        │  (verify → execute → settle)    │
//!        └───────────────┬─────────────────┘
//!                        │
//!                        ▼
//!               ┌─────────────────┐      ┌──────────────┐
//!               │  AgentBridge    │─────▶│  LLM / agent │
//!               └────────┬────────┘      └──────────────┘
//!                        │
//!                        ▼
//!               ┌─────────────────┐
//!               │  MessageStore   │──▶ SSE subscribers
//!               └─────────────────┘
//! ```
//!
//! ## Modules
//! - `payments`: x402 payload codec, facilitator client, payment gate
//! - `bridge`: prefix-dispatched message handling
//! - `api`: axum routes and request/response types
//! - `store`: bounded in-memory message log with subscriptions

pub mod api;
pub mod bridge;
pub mod config;
pub mod llm;
pub mod payments;
pub mod registry;
pub mod store;

pub use config::Config;
pub use payments::{PaymentConfig, PaymentRequirement};
pub use store::MessageStore;
