//! HTTP route handlers.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    middleware,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, post},
    Json, Router,
};
use futures::stream::Stream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::bridge::{AgentBridge, MessageMetadata};
use crate::config::Config;
use crate::llm::{AnthropicClient, LlmClient};
use crate::payments::gate::{require_payment, PaymentGate, VerifiedPayment};
use crate::payments::types::PaymentRequirement;
use crate::registry::RegistryClient;
use crate::store::{MessageKind, MessageStore, NewMessage, PaymentMeta};

use super::types::*;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub store: MessageStore,
    pub bridge: AgentBridge,
}

/// Payment bound to `/api/send`.
fn send_requirement() -> PaymentRequirement {
    PaymentRequirement::new(10, "Send message to agent bridge")
}

/// Payment bound to `/api/receive_message`.
fn receive_requirement() -> PaymentRequirement {
    PaymentRequirement::new(5, "Receive message from agent bridge")
}

/// Build the application router.
pub fn router(config: Config) -> Router {
    let llm = config
        .anthropic_api_key
        .clone()
        .map(|key| Arc::new(AnthropicClient::new(key)) as Arc<dyn LlmClient>);
    if llm.is_none() {
        tracing::info!("No ANTHROPIC_API_KEY configured; LLM paths use canned responses");
    }

    let bridge = AgentBridge::new(&config.agent_name, llm);
    let store = MessageStore::new(config.message_log_capacity);

    let payment_config = config.payment_config();
    let send_gate = PaymentGate::new(send_requirement(), payment_config.clone());
    let receive_gate = PaymentGate::new(receive_requirement(), payment_config);

    let state = Arc::new(AppState {
        config,
        store,
        bridge,
    });

    Router::new()
        .route("/api/health", get(health))
        .route("/api/agents/list", get(list_agents))
        .route("/api/render", get(render_latest))
        .route("/api/messages", get(get_messages))
        .route("/api/messages/stream", get(stream_messages))
        .route("/api/conversations/:id", get(get_conversation))
        .route("/api/stats", get(get_stats))
        .route("/api/payments/info", get(payment_info))
        .route(
            "/api/send",
            post(send_message).layer(middleware::from_fn_with_state(send_gate, require_payment)),
        )
        .route(
            "/api/receive_message",
            post(receive_message)
                .layer(middleware::from_fn_with_state(receive_gate, require_payment)),
        )
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    // Register with the agent registry in the background; failure is not
    // fatal.
    if let Some(registry_url) = config.registry_url.clone() {
        let agent_name = config.agent_name.clone();
        let agent_url = config.agent_url();
        tokio::spawn(async move {
            let registry = RegistryClient::new(&registry_url);
            if let Err(e) = registry
                .register(
                    &agent_name,
                    &agent_url,
                    &["message_processing", "claude_ai", "mcp_queries"],
                )
                .await
            {
                tracing::warn!("Could not register with registry: {}", e);
            }
        });
    }

    let tls_paths = config
        .tls_paths()
        .map(|(cert, key)| (cert.to_path_buf(), key.to_path_buf()));
    let addr: SocketAddr = format!("{}:{}", config.host, config.ui_port).parse()?;
    let app = router(config);

    if let Some((cert, key)) = tls_paths {
        let tls = axum_server::tls_rustls::RustlsConfig::from_pem_file(cert, key).await?;
        tracing::info!("Server listening on https://{}", addr);
        axum_server::bind_rustls(addr, tls)
            .serve(app.into_make_service())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("Server listening on http://{}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    }

    Ok(())
}

/// Wait for SIGINT/SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Health check endpoint.
async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now().timestamp_millis(),
        agent_port: state.config.agent_port,
        ui_port: state.config.ui_port,
        payments: "enabled".to_string(),
        facilitator: state.config.facilitator_url.clone(),
        agent_name: state.config.agent_name.clone(),
    })
}

/// List known agents. Only the local bridge is advertised; a registry
/// lookup would go here.
async fn list_agents(State(state): State<Arc<AppState>>) -> Json<AgentsListResponse> {
    Json(AgentsListResponse {
        agents: vec![AgentEntry {
            name: "local_agent".to_string(),
            url: state.config.agent_url(),
            status: "active".to_string(),
        }],
    })
}

/// Send a message to the agent bridge. Gated at 10 NP.
async fn send_message(
    State(state): State<Arc<AppState>>,
    payment: Option<Extension<VerifiedPayment>>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<SendMessageResponse>, (StatusCode, Json<ErrorResponse>)> {
    let message = match req.message.filter(|m| !m.is_empty()) {
        Some(message) => message,
        None => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Message is required".to_string(),
                }),
            ))
        }
    };
    let conversation_id = req
        .conversation_id
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    let client_id = req.client_id.unwrap_or_else(|| "default_client".to_string());

    let metadata = MessageMetadata {
        sender: Some(client_id.clone()),
        conversation_id: Some(conversation_id.clone()),
    };
    let response = state.bridge.handle_message(&message, &metadata).await;

    let payment_meta = payment.map(|Extension(VerifiedPayment(p))| PaymentMeta {
        verified: true,
        amount_np: p.amount.parse().unwrap_or(0),
    });
    let cost = payment_meta
        .as_ref()
        .map(|p| format!("{} NP", p.amount_np))
        .unwrap_or_else(|| "FREE".to_string());
    let payment_verified = payment_meta.is_some();

    let record = state
        .store
        .append(NewMessage {
            message,
            response: Some(response.clone()),
            kind: MessageKind::Sent,
            conversation_id: Some(conversation_id.clone()),
            client_id,
            agent_id: state.config.agent_id.clone(),
            payment: payment_meta,
        })
        .await;

    Ok(Json(SendMessageResponse {
        response,
        conversation_id,
        agent_id: state.config.agent_id.clone(),
        message_id: record.id,
        timestamp: record.timestamp,
        cost,
        payment_verified,
        success: true,
    }))
}

/// Record an inbound message from the agent bridge. Gated at 5 NP.
async fn receive_message(
    State(state): State<Arc<AppState>>,
    payment: Option<Extension<VerifiedPayment>>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<ReceiveMessageResponse>, (StatusCode, Json<ErrorResponse>)> {
    let message = match req.message.filter(|m| !m.is_empty()) {
        Some(message) => message,
        None => {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse {
                    error: "Message is required".to_string(),
                }),
            ))
        }
    };
    let client_id = req.client_id.unwrap_or_else(|| "agent_bridge".to_string());

    let payment_meta = payment.map(|Extension(VerifiedPayment(p))| PaymentMeta {
        verified: true,
        amount_np: p.amount.parse().unwrap_or(0),
    });
    let cost = payment_meta
        .as_ref()
        .map(|p| format!("{} NP", p.amount_np))
        .unwrap_or_else(|| "FREE".to_string());
    let payment_verified = payment_meta.is_some();

    let record = state
        .store
        .append(NewMessage {
            message,
            response: None,
            kind: MessageKind::Received,
            conversation_id: req.conversation_id,
            client_id,
            agent_id: state.config.agent_id.clone(),
            payment: payment_meta,
        })
        .await;

    Ok(Json(ReceiveMessageResponse {
        status: "received".to_string(),
        message_id: record.id,
        timestamp: record.timestamp,
        cost,
        payment_verified,
        success: true,
    }))
}

/// Latest message text for the UI.
async fn render_latest(State(state): State<Arc<AppState>>) -> Json<RenderResponse> {
    let message = state
        .store
        .latest()
        .await
        .map(|record| record.response.unwrap_or(record.message))
        .unwrap_or_default();
    Json(RenderResponse {
        message,
        timestamp: chrono::Utc::now().timestamp_millis(),
    })
}

/// Paginated slice of the message log, newest first.
async fn get_messages(
    State(state): State<Arc<AppState>>,
    Query(params): Query<MessagesQuery>,
) -> Json<MessagesResponse> {
    let limit = params.limit.unwrap_or(50);
    let offset = params.offset.unwrap_or(0);
    let messages = state.store.list(limit, offset).await;
    Json(MessagesResponse {
        total: state.store.total().await,
        messages,
        limit,
        offset,
    })
}

/// Messages filtered by conversation id, in append order.
async fn get_conversation(
    State(state): State<Arc<AppState>>,
    Path(conversation_id): Path<String>,
) -> Json<ConversationResponse> {
    let messages = state.store.by_conversation(&conversation_id).await;
    Json(ConversationResponse {
        conversation_id,
        count: messages.len(),
        messages,
    })
}

/// Payment and usage statistics.
async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    let stats = state.store.stats().await;
    Json(StatsResponse {
        total_messages: stats.total_messages,
        paid_messages: stats.paid_messages,
        free_requests: stats.free_requests,
        total_revenue_np: stats.total_revenue_np,
        facilitator_url: state.config.facilitator_url.clone(),
        agent_name: state.config.agent_name.clone(),
        timestamp: chrono::Utc::now().timestamp_millis(),
    })
}

/// Static payment requirement listing.
async fn payment_info(State(state): State<Arc<AppState>>) -> Json<PaymentInfoResponse> {
    let send = send_requirement();
    let receive = receive_requirement();
    Json(PaymentInfoResponse {
        facilitator_url: state.config.facilitator_url.clone(),
        agent_name: state.config.agent_name.clone(),
        payment_requirements: PaymentRequirementsInfo {
            send_message: RequirementInfo {
                amount: send.amount,
                description: send.description,
            },
            receive_message: RequirementInfo {
                amount: receive.amount,
                description: receive.description,
            },
        },
    })
}

/// Stream message records via SSE as they are appended. The current latest
/// record is sent on connect.
async fn stream_messages(
    State(state): State<Arc<AppState>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.store.subscribe();
    let latest = state.store.latest().await;

    let stream = async_stream::stream! {
        if let Some(record) = latest {
            yield Ok(Event::default().json_data(&record).unwrap());
        }
        loop {
            match rx.recv().await {
                Ok(record) => {
                    yield Ok(Event::default().json_data(&record).unwrap());
                }
                Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("SSE subscriber lagged, skipped {} records", skipped);
                }
                Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}
