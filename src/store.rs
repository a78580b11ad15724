//! Bounded in-memory message log with push-based subscriptions.
//!
//! The store is explicitly owned and injected through the application
//! state. Records carry a monotonically increasing sequence id assigned on
//! append; the ring evicts the oldest record at capacity. Every append is
//! broadcast to subscribers, which is what feeds the SSE stream endpoint.

use std::collections::VecDeque;

use serde::Serialize;
use tokio::sync::{broadcast, RwLock};
use uuid::Uuid;

/// Default ring capacity.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Broadcast channel depth; slow subscribers observe a lag, not unbounded
/// growth.
const EVENT_BUFFER: usize = 256;

/// Direction of a recorded message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Sent,
    Received,
}

/// Payment metadata attached to a gated message.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentMeta {
    pub verified: bool,
    pub amount_np: u64,
}

/// One record in the message log.
#[derive(Debug, Clone, Serialize)]
pub struct MessageRecord {
    pub id: Uuid,

    /// Monotonically increasing append sequence
    pub seq: u64,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,

    pub kind: MessageKind,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    pub client_id: String,

    pub agent_id: String,

    /// Millisecond timestamp assigned on append
    pub timestamp: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentMeta>,
}

/// Fields supplied by the caller; id, seq, and timestamp are assigned on
/// append.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub message: String,
    pub response: Option<String>,
    pub kind: MessageKind,
    pub conversation_id: Option<String>,
    pub client_id: String,
    pub agent_id: String,
    pub payment: Option<PaymentMeta>,
}

/// Usage and payment statistics over the retained log.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStats {
    pub total_messages: usize,
    pub paid_messages: usize,
    pub free_requests: usize,
    pub total_revenue_np: u64,
}

struct Inner {
    records: VecDeque<MessageRecord>,
    next_seq: u64,
    capacity: usize,
}

/// Thread-safe bounded message log.
pub struct MessageStore {
    inner: RwLock<Inner>,
    events: broadcast::Sender<MessageRecord>,
}

impl MessageStore {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            inner: RwLock::new(Inner {
                records: VecDeque::with_capacity(capacity.min(1024)),
                next_seq: 0,
                capacity: capacity.max(1),
            }),
            events,
        }
    }

    /// Append a record, evicting the oldest at capacity, and notify
    /// subscribers.
    pub async fn append(&self, new: NewMessage) -> MessageRecord {
        let record = {
            let mut inner = self.inner.write().await;
            let record = MessageRecord {
                id: Uuid::new_v4(),
                seq: inner.next_seq,
                message: new.message,
                response: new.response,
                kind: new.kind,
                conversation_id: new.conversation_id,
                client_id: new.client_id,
                agent_id: new.agent_id,
                timestamp: chrono::Utc::now().timestamp_millis(),
                payment: new.payment,
            };
            inner.next_seq += 1;
            if inner.records.len() >= inner.capacity {
                inner.records.pop_front();
            }
            inner.records.push_back(record.clone());
            record
        };
        // No receivers is fine; the stream endpoint may not be connected.
        let _ = self.events.send(record.clone());
        record
    }

    /// Newest-first page of the log.
    pub async fn list(&self, limit: usize, offset: usize) -> Vec<MessageRecord> {
        let inner = self.inner.read().await;
        inner
            .records
            .iter()
            .rev()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Number of retained records.
    pub async fn total(&self) -> usize {
        self.inner.read().await.records.len()
    }

    /// Records for one conversation, in append order.
    pub async fn by_conversation(&self, conversation_id: &str) -> Vec<MessageRecord> {
        let inner = self.inner.read().await;
        inner
            .records
            .iter()
            .filter(|r| r.conversation_id.as_deref() == Some(conversation_id))
            .cloned()
            .collect()
    }

    /// Most recently appended record.
    pub async fn latest(&self) -> Option<MessageRecord> {
        self.inner.read().await.records.back().cloned()
    }

    /// Usage statistics over the retained records.
    pub async fn stats(&self) -> StoreStats {
        let inner = self.inner.read().await;
        let total_messages = inner.records.len();
        let paid: Vec<_> = inner
            .records
            .iter()
            .filter_map(|r| r.payment.as_ref().filter(|p| p.verified))
            .collect();
        let paid_messages = paid.len();
        let total_revenue_np = paid.iter().map(|p| p.amount_np).sum();
        StoreStats {
            total_messages,
            paid_messages,
            free_requests: total_messages - paid_messages,
            total_revenue_np,
        }
    }

    /// Subscribe to appended records.
    pub fn subscribe(&self) -> broadcast::Receiver<MessageRecord> {
        self.events.subscribe()
    }
}

impl Default for MessageStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sent(message: &str, conversation_id: Option<&str>) -> NewMessage {
        NewMessage {
            message: message.to_string(),
            response: Some(format!("re: {}", message)),
            kind: MessageKind::Sent,
            conversation_id: conversation_id.map(str::to_string),
            client_id: "client-1".to_string(),
            agent_id: "agent-1".to_string(),
            payment: None,
        }
    }

    #[tokio::test]
    async fn test_append_assigns_monotonic_seq() {
        let store = MessageStore::new(10);
        let a = store.append(sent("a", None)).await;
        let b = store.append(sent("b", None)).await;
        assert_eq!(a.seq, 0);
        assert_eq!(b.seq, 1);
        assert_ne!(a.id, b.id);
    }

    #[tokio::test]
    async fn test_list_is_newest_first() {
        let store = MessageStore::new(10);
        store.append(sent("first", None)).await;
        store.append(sent("second", None)).await;

        let page = store.list(1, 0).await;
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].message, "second");

        let page = store.list(10, 1).await;
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].message, "first");
    }

    #[tokio::test]
    async fn test_ring_evicts_oldest_at_capacity() {
        let store = MessageStore::new(3);
        for i in 0..5 {
            store.append(sent(&format!("m{}", i), None)).await;
        }
        assert_eq!(store.total().await, 3);
        let page = store.list(10, 0).await;
        let kept: Vec<_> = page.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(kept, vec!["m4", "m3", "m2"]);
        // Sequence ids keep counting past evicted records.
        assert_eq!(page[0].seq, 4);
    }

    #[tokio::test]
    async fn test_by_conversation_in_append_order() {
        let store = MessageStore::new(10);
        store.append(sent("a", Some("conv-1"))).await;
        store.append(sent("b", Some("conv-2"))).await;
        store.append(sent("c", Some("conv-1"))).await;

        let records = store.by_conversation("conv-1").await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message, "a");
        assert_eq!(records[1].message, "c");
    }

    #[tokio::test]
    async fn test_subscribers_observe_appends() {
        let store = MessageStore::new(10);
        let mut rx = store.subscribe();
        store.append(sent("pushed", None)).await;
        let record = rx.recv().await.unwrap();
        assert_eq!(record.message, "pushed");
    }

    #[tokio::test]
    async fn test_stats_counts_paid_messages() {
        let store = MessageStore::new(10);
        store.append(sent("free", None)).await;
        let mut paid = sent("paid", None);
        paid.payment = Some(PaymentMeta {
            verified: true,
            amount_np: 10,
        });
        store.append(paid.clone()).await;
        store.append(paid).await;

        let stats = store.stats().await;
        assert_eq!(stats.total_messages, 3);
        assert_eq!(stats.paid_messages, 2);
        assert_eq!(stats.free_requests, 1);
        assert_eq!(stats.total_revenue_np, 20);
    }

    #[tokio::test]
    async fn test_latest_returns_last_appended() {
        let store = MessageStore::new(10);
        assert!(store.latest().await.is_none());
        store.append(sent("a", None)).await;
        store.append(sent("b", None)).await;
        assert_eq!(store.latest().await.unwrap().message, "b");
    }
}
