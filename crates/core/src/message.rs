//! Turn and ConversationHistory domain types.
//!
//! A [`Turn`] is what the renderer shows: one user input or one assistant
//! reply, with a display tag. A [`ConversationHistory`] is the append-only
//! log of turns for one session. [`ChatMessage`] is the wire-level projection
//! sent to a provider.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a conversation (session).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender.
///
/// Turns are only ever `User` or `Assistant`; `System` exists for the
/// instructions prepended to a provider request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instructions
    System,
    /// The end user
    User,
    /// The AI assistant
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// How a turn's content came to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    /// Fully written (user input, or a reply whose stream ended normally)
    Complete,
    /// A reply whose stream was cut off; content is what arrived before the cut
    Truncated,
    /// A visible error message standing in for a reply
    Error,
}

/// One message unit in a conversation.
///
/// Fields are private: once built, a turn's role, tag and content are fixed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    id: String,
    role: Role,
    content: String,
    tag: String,
    status: TurnStatus,
    created_at: DateTime<Utc>,
}

impl Turn {
    fn new(role: Role, content: String, tag: String, status: TurnStatus) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content,
            tag,
            status,
            created_at: Utc::now(),
        }
    }

    /// A user turn.
    pub fn user(content: impl Into<String>, tag: impl Into<String>) -> Self {
        Self::new(Role::User, content.into(), tag.into(), TurnStatus::Complete)
    }

    /// A finished assistant reply.
    pub fn assistant(content: impl Into<String>, tag: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into(), tag.into(), TurnStatus::Complete)
    }

    /// An assistant reply whose stream ended early.
    pub fn truncated(content: impl Into<String>, tag: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content.into(), tag.into(), TurnStatus::Truncated)
    }

    /// An assistant-side error shown to the user as a chat message.
    pub fn error(message: impl Into<String>, tag: impl Into<String>) -> Self {
        Self::new(Role::Assistant, message.into(), tag.into(), TurnStatus::Error)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn status(&self) -> TurnStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn is_truncated(&self) -> bool {
        self.status == TurnStatus::Truncated
    }

    pub fn is_error(&self) -> bool {
        self.status == TurnStatus::Error
    }

    /// Project this turn into a provider message.
    pub fn to_chat_message(&self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// A message as sent to a provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// The ordered, append-only log of turns for one session.
///
/// `append` is the only mutation. A reply under assembly is never a member;
/// it joins the history only once finalized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationHistory {
    id: ConversationId,
    turns: Vec<Turn>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ConversationHistory {
    /// Create a new empty history.
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            id: ConversationId::new(),
            turns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn id(&self) -> &ConversationId {
        &self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Add a finalized turn to the end of the log.
    pub fn append(&mut self, turn: Turn) {
        self.updated_at = Utc::now();
        self.turns.push(turn);
    }

    /// Every turn, oldest first.
    pub fn all(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// The provider-facing transcript. Error turns are local notices and
    /// are never sent back to the model.
    pub fn to_chat_messages(&self) -> Vec<ChatMessage> {
        self.turns
            .iter()
            .filter(|t| !t.is_error())
            .map(Turn::to_chat_message)
            .collect()
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new()
    }
}
