//! Domain event system: decoupled observation of turns.
//!
//! Events are published when something interesting happens in a turn.
//! Observers subscribe to react without coupling to the turn engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use crate::plan::PlanState;

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A message was appended to a conversation
    MessageAppended {
        conversation_id: String,
        sender: String,
        rounds: u64,
        timestamp: DateTime<Utc>,
    },

    /// A plan moved to a new state
    PlanStateChanged {
        conversation_id: String,
        task_uid: String,
        state: PlanState,
        retry_count: u32,
        timestamp: DateTime<Utc>,
    },

    /// A model failed retryably and another one was selected
    ModelFallback {
        conversation_id: String,
        failed_model: String,
        next_model: Option<String>,
        error_code: i32,
        timestamp: DateTime<Utc>,
    },

    /// An action was executed
    ActionExecuted {
        conversation_id: String,
        kind: String,
        success: bool,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A turn produced its reply
    TurnFinished {
        conversation_id: String,
        agent: String,
        success: bool,
        attempts: u32,
        timestamp: DateTime<Utc>,
    },
}

/// A broadcast-based event bus for domain events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<DomainEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: DomainEvent) {
        // No subscribers is fine
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DomainEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn event_bus_publish_subscribe() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();

        bus.publish(DomainEvent::ActionExecuted {
            conversation_id: "c1".into(),
            kind: "tool".into(),
            success: true,
            duration_ms: 42,
            timestamp: Utc::now(),
        });

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::ActionExecuted { kind, success, .. } => {
                assert_eq!(kind, "tool");
                assert!(success);
            }
            _ => panic!("Expected ActionExecuted event"),
        }
    }

    #[test]
    fn event_bus_no_subscribers_doesnt_panic() {
        let bus = EventBus::new(16);
        bus.publish(DomainEvent::TurnFinished {
            conversation_id: "c1".into(),
            agent: "solver".into(),
            success: false,
            attempts: 3,
            timestamp: Utc::now(),
        });
    }
}
