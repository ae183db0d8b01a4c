//! StreamHub (§4.9): per-tenant broadcast topics feeding the `/calls/stream`
//! SSE endpoint. Each tenant gets a bounded `tokio::sync::broadcast` channel;
//! a slow subscriber that falls behind the channel capacity is told it
//! missed messages rather than blocking publishers (drop-oldest semantics is
//! `broadcast`'s native behavior, surfaced here as a `Lagged` event).

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value as Json;
use tokio::sync::broadcast;

use callhub_core::ids::TenantId;

const TOPIC_CAPACITY: usize = 256;
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum StreamEvent {
    #[serde(rename = "CALL_LOG_CHANGED")]
    CallLogChanged(Json),
    #[serde(rename = "BATCH_CHANGED")]
    BatchChanged(Json),
    #[serde(rename = "HEARTBEAT")]
    Heartbeat,
    #[serde(rename = "ERROR")]
    Error(Json),
}

struct Topic {
    sender: broadcast::Sender<StreamEvent>,
    last: std::sync::Mutex<Option<StreamEvent>>,
}

pub struct StreamHub {
    topics: DashMap<TenantId, Arc<Topic>>,
}

impl StreamHub {
    pub fn new() -> Self {
        StreamHub { topics: DashMap::new() }
    }

    fn topic(&self, tenant: TenantId) -> Arc<Topic> {
        self.topics
            .entry(tenant)
            .or_insert_with(|| {
                let (sender, _) = broadcast::channel(TOPIC_CAPACITY);
                Arc::new(Topic { sender, last: std::sync::Mutex::new(None) })
            })
            .clone()
    }

    pub fn publish(&self, tenant: TenantId, event: StreamEvent) {
        let topic = self.topic(tenant);
        *topic.last.lock().unwrap() = Some(event.clone());
        let _ = topic.sender.send(event);
    }

    /// Subscribes to `tenant`'s topic, replaying the last known event first
    /// (if any) so a client connecting mid-stream doesn't start blind.
    pub fn subscribe(&self, tenant: TenantId) -> (Option<StreamEvent>, broadcast::Receiver<StreamEvent>) {
        let topic = self.topic(tenant);
        let replay = topic.last.lock().unwrap().clone();
        let receiver = topic.sender.subscribe();
        (replay, receiver)
    }
}

impl Default for StreamHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_last_event_to_new_subscriber() {
        let hub = StreamHub::new();
        let tenant = TenantId::new();
        hub.publish(tenant, StreamEvent::CallLogChanged(serde_json::json!({"id": "1"})));
        let (replay, _rx) = hub.subscribe(tenant);
        assert!(replay.is_some());
    }

    #[tokio::test]
    async fn new_tenant_has_no_replay() {
        let hub = StreamHub::new();
        let (replay, _rx) = hub.subscribe(TenantId::new());
        assert!(replay.is_none());
    }
}
