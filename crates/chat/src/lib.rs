//! Chat turn machinery for Talkback.
//!
//! - [`stream`]: adapts a provider's chunk receiver into reply fragments
//! - [`assembler`]: accumulates fragments into the reply text
//! - [`session`]: per-session history and in-flight state
//! - [`orchestrator`]: runs one turn end to end
//! - [`hooks`]: side channels fed with each finalized reply

pub mod assembler;
pub mod hooks;
pub mod orchestrator;
pub mod session;
pub mod stream;

#[cfg(test)]
mod test_helpers;

pub use assembler::{Assembly, ResponseAssembler, StreamEnding, assemble, assemble_with, drive};
pub use hooks::{ReplyHook, TranslationHook};
pub use orchestrator::{Submission, TurnOrchestrator, TurnOutcome};
pub use session::{ChatSession, SessionPhase};
pub use stream::{StreamFragment, StreamInterrupted, TokenStream};
