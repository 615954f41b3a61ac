//! # Talkback Core
//!
//! Domain types, traits, and error definitions for the Talkback chat runtime.
//! This crate has no framework dependencies: it defines the turn/history
//! model, the provider and extraction seams, and the domain event bus that
//! the other crates implement against.
//!
//! ## Layout
//!
//! - [`message`]: turns, the append-only conversation history, wire messages
//! - [`provider`]: the LLM provider trait and its streaming chunk types
//! - [`attachment`]: uploaded artifacts, media kinds, the extraction seam
//! - [`event`]: domain events published while a turn runs

pub mod error;
pub mod message;
pub mod provider;
pub mod attachment;
pub mod event;

// Re-export key types at crate root for ergonomics
pub use error::{Error, Result};
pub use message::{ChatMessage, ConversationHistory, ConversationId, Role, Turn, TurnStatus};
pub use provider::{ChunkReceiver, CompletionRequest, CompletionResponse, Provider, StreamChunk, Usage};
pub use attachment::{Artifact, Extractable, ExtractionGateway, ExtractionResult, ExtractorRegistry, MediaKind};
pub use event::{DomainEvent, EventBus};
