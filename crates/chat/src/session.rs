//! Per-session state: the conversation history and the in-flight flag.

use std::sync::atomic::{AtomicBool, Ordering};

use talkback_core::error::TurnError;
use talkback_core::message::{ChatMessage, ConversationHistory, ConversationId, Turn};
use tokio::sync::RwLock;

/// Where a session is in its turn cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    AwaitingProviderReply,
}

/// One chat session.
///
/// Renderers may read [`ChatSession::snapshot`] while a submit is running;
/// only the orchestrator appends.
pub struct ChatSession {
    id: ConversationId,
    history: RwLock<ConversationHistory>,
    in_flight: AtomicBool,
}

impl ChatSession {
    pub fn new() -> Self {
        let history = ConversationHistory::new();
        Self {
            id: history.id().clone(),
            history: RwLock::new(history),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn phase(&self) -> SessionPhase {
        if self.in_flight.load(Ordering::Acquire) {
            SessionPhase::AwaitingProviderReply
        } else {
            SessionPhase::Idle
        }
    }

    /// Ordered copy of every finalized turn.
    pub async fn snapshot(&self) -> Vec<Turn> {
        self.history.read().await.all().to_vec()
    }

    pub async fn len(&self) -> usize {
        self.history.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.history.read().await.is_empty()
    }

    pub async fn last(&self) -> Option<Turn> {
        self.history.read().await.last().cloned()
    }

    /// Provider transcript of the completed turns.
    pub async fn transcript(&self) -> Vec<ChatMessage> {
        self.history.read().await.to_chat_messages()
    }

    pub(crate) async fn append(&self, turn: Turn) {
        self.history.write().await.append(turn);
    }

    /// Move to `AwaitingProviderReply`, or fail with `Busy` if already there.
    pub(crate) fn begin_reply(&self) -> Result<ReplyGuard<'_>, TurnError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| TurnError::Busy)?;
        Ok(ReplyGuard { session: self })
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the session to `Idle` when dropped, including on cancellation.
pub(crate) struct ReplyGuard<'a> {
    session: &'a ChatSession,
}

impl Drop for ReplyGuard<'_> {
    fn drop(&mut self) {
        self.session.in_flight.store(false, Ordering::Release);
    }
}
