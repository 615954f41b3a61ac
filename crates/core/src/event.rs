//! Domain event system: decoupled communication between bounded contexts.
//!
//! Events are published when something interesting happens in a session.
//! Renderers and side channels can subscribe without coupling to the
//! orchestrator.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use crate::message::{Role, TurnStatus};

/// All domain events in the system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DomainEvent {
    /// A finalized turn joined a conversation history
    TurnAppended {
        conversation_id: String,
        turn_id: String,
        role: Role,
        status: TurnStatus,
        timestamp: DateTime<Utc>,
    },

    /// A provider stream finished (normally or not)
    ReplyStreamed {
        conversation_id: String,
        model: String,
        fragments: usize,
        characters: usize,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// An attachment went through the extraction gateway
    ExtractionFinished {
        artifact: String,
        mime_type: String,
        success: bool,
        characters: usize,
        timestamp: DateTime<Utc>,
    },

    /// A side-channel translation of a reply is available
    TranslationReady {
        conversation_id: String,
        turn_id: String,
        language: String,
        text: String,
        timestamp: DateTime<Utc>,
    },

    /// An error occurred
    ErrorOccurred {
        context: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// Session entered or left the awaiting-reply state
    SessionStateChanged {
        conversation_id: String,
        awaiting_reply: bool,
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
