//! Side channels that observe finalized assistant replies.
//!
//! Hooks run on spawned tasks after the reply is already in the history.
//! A failing hook is logged and never touches the conversation.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use talkback_core::error::Result;
use talkback_core::event::{DomainEvent, EventBus};
use talkback_core::message::{ChatMessage, ConversationId, Turn};
use talkback_core::provider::{CompletionRequest, Provider};
use tracing::{debug, warn};

#[async_trait]
pub trait ReplyHook: Send + Sync {
    fn name(&self) -> &str;

    async fn on_reply(&self, conversation_id: &ConversationId, turn: &Turn) -> Result<()>;
}

/// Hand `turn` to every hook on its own task.
pub(crate) fn dispatch(hooks: &[Arc<dyn ReplyHook>], conversation_id: &ConversationId, turn: &Turn) {
    for hook in hooks {
        let hook = Arc::clone(hook);
        let conversation_id = conversation_id.clone();
        let turn = turn.clone();
        tokio::spawn(async move {
            if let Err(e) = hook.on_reply(&conversation_id, &turn).await {
                warn!(hook = hook.name(), turn = turn.id(), error = %e, "Reply hook failed");
            }
        });
    }
}

/// Translates each reply into a target language and publishes
/// [`DomainEvent::TranslationReady`].
pub struct TranslationHook {
    provider: Arc<dyn Provider>,
    model: String,
    language: String,
    event_bus: Arc<EventBus>,
}

impl TranslationHook {
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        language: impl Into<String>,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            language: language.into(),
            event_bus,
        }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    fn request(&self, text: &str) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(format!(
                    "Translate the user's message into the language with code '{}'. \
                     Reply with the translation only.",
                    self.language
                )),
                ChatMessage::user(text),
            ],
            temperature: 0.2,
            max_tokens: None,
            stream: false,
            stop: Vec::new(),
        }
    }
}

#[async_trait]
impl ReplyHook for TranslationHook {
    fn name(&self) -> &str {
        "translation"
    }

    async fn on_reply(&self, conversation_id: &ConversationId, turn: &Turn) -> Result<()> {
        let response = self.provider.complete(self.request(turn.content())).await?;
        debug!(
            turn = turn.id(),
            language = %self.language,
            characters = response.message.content.len(),
            "Reply translated"
        );

        self.event_bus.publish(DomainEvent::TranslationReady {
            conversation_id: conversation_id.to_string(),
            turn_id: turn.id().to_string(),
            language: self.language.clone(),
            text: response.message.content,
            timestamp: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ScriptedProvider;
    use talkback_core::message::Role;

    #[tokio::test]
    async fn translation_is_published_for_the_turn() {
        let provider = Arc::new(ScriptedProvider::new(vec![]).with_completion("Hola"));
        let bus = Arc::new(EventBus::default());
        let mut rx = bus.subscribe();
        let hook = TranslationHook::new(provider.clone(), "llama3-8b-8192", "es", bus);

        let id = ConversationId::new();
        let turn = Turn::assistant("Hello", "🤖");
        hook.on_reply(&id, &turn).await.unwrap();

        let event = rx.recv().await.unwrap();
        match event.as_ref() {
            DomainEvent::TranslationReady {
                conversation_id,
                turn_id,
                language,
                text,
                ..
            } => {
                assert_eq!(conversation_id, &id.to_string());
                assert_eq!(turn_id, turn.id());
                assert_eq!(language, "es");
                assert_eq!(text, "Hola");
            }
            other => panic!("unexpected event: {other:?}"),
        }

        let request = &provider.requests()[0];
        assert!(!request.stream);
        assert_eq!(request.messages[0].role, Role::System);
        assert!(request.messages[0].content.contains("'es'"));
        assert_eq!(request.messages[1].content, "Hello");
    }
}
