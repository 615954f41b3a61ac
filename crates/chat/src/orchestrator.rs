//! The turn orchestrator.
//!
//! One `submit` call runs a whole turn against a [`ChatSession`]:
//! validate the input, extract the attachment (if any), append the user
//! turn, stream the provider reply, and append the assembled reply. The
//! session is `AwaitingProviderReply` for the duration and back to `Idle`
//! when the call returns or its future is dropped.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use talkback_config::{AppConfig, ConfigError};
use talkback_core::attachment::{Artifact, ExtractionGateway, ExtractionResult};
use talkback_core::error::{Error, ExtractionError, ProviderError, TurnError};
use talkback_core::event::{DomainEvent, EventBus};
use talkback_core::message::{ChatMessage, Turn};
use talkback_core::provider::{CompletionRequest, Provider};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::assembler::{Assembly, StreamEnding, drive};
use crate::hooks::{ReplyHook, dispatch};
use crate::session::ChatSession;
use crate::stream::TokenStream;

/// One user submission.
#[derive(Debug, Clone, Default)]
pub struct Submission {
    pub text: String,
    pub attachment: Option<Artifact>,
    /// Overrides the orchestrator's default model for this turn
    pub model: Option<String>,
}

impl Submission {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn with_attachment(mut self, artifact: Artifact) -> Self {
        self.attachment = Some(artifact);
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }
}

/// How an accepted turn ended. Every variant carries the turn that was
/// appended for it.
#[derive(Debug)]
pub enum TurnOutcome {
    /// The reply streamed to completion
    Replied(Turn),
    /// The stream broke or timed out after some text arrived
    Truncated { turn: Turn, reason: String },
    /// Extraction or the provider failed; the turn is a visible error
    Failed { turn: Turn, error: Error },
}

impl TurnOutcome {
    pub fn turn(&self) -> &Turn {
        match self {
            Self::Replied(turn) => turn,
            Self::Truncated { turn, .. } => turn,
            Self::Failed { turn, .. } => turn,
        }
    }
}

pub struct TurnOrchestrator {
    provider: Arc<dyn Provider>,
    extractor: Option<Arc<dyn ExtractionGateway>>,
    model: String,
    allowed_models: Vec<String>,
    temperature: f32,
    max_tokens: Option<u32>,
    system_prompt: Option<String>,
    timeout: Option<Duration>,
    user_tag: String,
    assistant_tag: String,
    event_bus: Arc<EventBus>,
    hooks: Vec<Arc<dyn ReplyHook>>,
}

impl TurnOrchestrator {
    /// An orchestrator that only accepts `model`.
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>, event_bus: Arc<EventBus>) -> Self {
        let model = model.into();
        Self {
            provider,
            extractor: None,
            allowed_models: vec![model.clone()],
            model,
            temperature: 0.7,
            max_tokens: None,
            system_prompt: None,
            timeout: None,
            user_tag: "👦".into(),
            assistant_tag: "🤖".into(),
            event_bus,
            hooks: Vec::new(),
        }
    }

    /// Model, allow-list, sampling, timeout and avatars from config.
    ///
    /// Fails with `ConfigurationMissing` when no API key is configured for
    /// the default provider.
    pub fn from_config(
        config: &AppConfig,
        provider: Arc<dyn Provider>,
        event_bus: Arc<EventBus>,
    ) -> Result<Self, ConfigError> {
        config.require_api_key()?;
        let mut orchestrator = Self::new(provider, &config.default_model, event_bus)
            .with_allowed_models(config.models.clone())
            .with_temperature(config.temperature)
            .with_timeout(config.request_timeout())
            .with_tags(&config.display.user_avatar, &config.display.assistant_avatar);
        orchestrator.max_tokens = config.max_tokens;
        orchestrator.system_prompt = config.system_prompt.clone();
        Ok(orchestrator)
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn ExtractionGateway>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    /// Replace the allow-list. The default model is always allowed.
    pub fn with_allowed_models(mut self, models: Vec<String>) -> Self {
        self.allowed_models = models;
        if !self.allowed_models.contains(&self.model) {
            self.allowed_models.push(self.model.clone());
        }
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Bound on the provider call plus the whole stream.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_tags(mut self, user: impl Into<String>, assistant: impl Into<String>) -> Self {
        self.user_tag = user.into();
        self.assistant_tag = assistant.into();
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn ReplyHook>) -> Self {
        self.hooks.push(hook);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn allowed_models(&self) -> &[String] {
        &self.allowed_models
    }

    pub fn is_model_allowed(&self, model: &str) -> bool {
        self.allowed_models.iter().any(|m| m == model)
    }

    /// Run one turn. `sink` receives each non-empty reply fragment as it
    /// arrives.
    ///
    /// `InvalidInput`, `UnknownModel` and `Busy` leave the history untouched.
    /// `InvalidInput` is also returned when there is no typed text and the
    /// attachment extracts to nothing but whitespace.
    /// Every accepted turn appends a user turn and a reply, or a single
    /// error turn when the attachment could not be read.
    pub async fn submit<F>(
        &self,
        session: &ChatSession,
        submission: Submission,
        sink: F,
    ) -> Result<TurnOutcome, TurnError>
    where
        F: FnMut(&str) + Send,
    {
        let Submission {
            text,
            attachment,
            model,
        } = submission;

        if text.trim().is_empty() && attachment.is_none() {
            debug!(conversation = %session.id(), "Blank submission rejected");
            return Err(TurnError::InvalidInput);
        }

        let model = model.unwrap_or_else(|| self.model.clone());
        if !self.is_model_allowed(&model) {
            warn!(conversation = %session.id(), model = %model, "Unknown model rejected");
            return Err(TurnError::UnknownModel(model));
        }

        let _guard = session.begin_reply()?;
        self.publish_phase(session, true);
        let outcome = self.run_turn(session, text, attachment, &model, sink).await;
        self.publish_phase(session, false);
        outcome
    }

    async fn run_turn<F>(
        &self,
        session: &ChatSession,
        text: String,
        attachment: Option<Artifact>,
        model: &str,
        sink: F,
    ) -> Result<TurnOutcome, TurnError>
    where
        F: FnMut(&str) + Send,
    {
        let content = match attachment {
            None => text,
            Some(artifact) => match self.extract(&artifact).await {
                ExtractionResult::Text(extracted) => augment(&text, &artifact.name, &extracted),
                ExtractionResult::Failure(e) => return Ok(self.fail(session, e.into()).await),
            },
        };

        // Blank typed text plus an attachment with no text in it
        if content.trim().is_empty() {
            debug!(conversation = %session.id(), "Submission has no text after extraction");
            return Err(TurnError::InvalidInput);
        }

        self.record(session, Turn::user(content, &self.user_tag)).await;
        Ok(self.stream_reply(session, model, sink).await)
    }

    async fn extract(&self, artifact: &Artifact) -> ExtractionResult {
        let result = match &self.extractor {
            Some(extractor) => extractor.extract(artifact).await,
            None => ExtractionResult::Failure(ExtractionError::UnsupportedKind(
                artifact.mime_type.clone(),
            )),
        };

        let characters = match &result {
            ExtractionResult::Text(text) => text.len(),
            ExtractionResult::Failure(_) => 0,
        };
        self.event_bus.publish(DomainEvent::ExtractionFinished {
            artifact: artifact.name.clone(),
            mime_type: artifact.mime_type.clone(),
            success: !result.is_failure(),
            characters,
            timestamp: Utc::now(),
        });
        result
    }

    async fn stream_reply<F>(&self, session: &ChatSession, model: &str, sink: F) -> TurnOutcome
    where
        F: FnMut(&str) + Send,
    {
        let mut messages = Vec::new();
        if let Some(prompt) = &self.system_prompt {
            messages.push(ChatMessage::system(prompt.clone()));
        }
        messages.extend(session.transcript().await);

        let request = CompletionRequest {
            model: model.to_string(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream: true,
            stop: Vec::new(),
        };

        debug!(
            conversation = %session.id(),
            provider = self.provider.name(),
            model = %model,
            messages = request.messages.len(),
            "Requesting reply"
        );

        let started = std::time::Instant::now();
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);

        let opened = match deadline {
            Some(deadline) => tokio::time::timeout_at(deadline, self.provider.stream(request))
                .await
                .unwrap_or_else(|_| Err(self.timeout_error())),
            None => self.provider.stream(request).await,
        };
        let rx = match opened {
            Ok(rx) => rx,
            Err(e) => return self.fail(session, e.into()).await,
        };

        let mut tokens = TokenStream::new(rx);
        let Assembly {
            text,
            fragments,
            ending,
        } = drive(&mut tokens, deadline, sink).await;

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            conversation = %session.id(),
            model = %model,
            fragments,
            characters = text.len(),
            duration_ms,
            ending = ?ending,
            "Reply stream ended"
        );
        self.event_bus.publish(DomainEvent::ReplyStreamed {
            conversation_id: session.id().to_string(),
            model: model.to_string(),
            fragments,
            characters: text.len(),
            duration_ms,
            timestamp: Utc::now(),
        });

        match ending {
            StreamEnding::Completed if text.trim().is_empty() => {
                self.fail(session, ProviderError::EmptyReply.into()).await
            }
            StreamEnding::Completed => {
                let turn = Turn::assistant(text, &self.assistant_tag);
                self.record(session, turn.clone()).await;
                dispatch(&self.hooks, session.id(), &turn);
                TurnOutcome::Replied(turn)
            }
            StreamEnding::Interrupted(reason) if !text.trim().is_empty() => {
                self.truncate(session, text, reason).await
            }
            StreamEnding::TimedOut if !text.trim().is_empty() => {
                self.truncate(session, text, "timed out".into()).await
            }
            StreamEnding::Interrupted(reason) => {
                self.fail(session, ProviderError::StreamInterrupted(reason).into()).await
            }
            StreamEnding::TimedOut => self.fail(session, self.timeout_error().into()).await,
        }
    }

    fn timeout_error(&self) -> ProviderError {
        let secs = self.timeout.map(|t| t.as_secs()).unwrap_or_default();
        ProviderError::Timeout(format!("no reply within {secs}s"))
    }

    async fn truncate(&self, session: &ChatSession, text: String, reason: String) -> TurnOutcome {
        warn!(
            conversation = %session.id(),
            reason = %reason,
            characters = text.len(),
            "Reply truncated"
        );
        let turn = Turn::truncated(text, &self.assistant_tag);
        self.record(session, turn.clone()).await;
        dispatch(&self.hooks, session.id(), &turn);
        TurnOutcome::Truncated { turn, reason }
    }

    async fn fail(&self, session: &ChatSession, error: Error) -> TurnOutcome {
        warn!(conversation = %session.id(), error = %error, "Turn failed");
        self.event_bus.publish(DomainEvent::ErrorOccurred {
            context: format!("conversation {}", session.id()),
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });

        let turn = Turn::error(error.to_string(), &self.assistant_tag);
        self.record(session, turn.clone()).await;
        TurnOutcome::Failed { turn, error }
    }

    async fn record(&self, session: &ChatSession, turn: Turn) {
        let event = DomainEvent::TurnAppended {
            conversation_id: session.id().to_string(),
            turn_id: turn.id().to_string(),
            role: turn.role(),
            status: turn.status(),
            timestamp: Utc::now(),
        };
        session.append(turn).await;
        self.event_bus.publish(event);
    }

    fn publish_phase(&self, session: &ChatSession, awaiting_reply: bool) {
        self.event_bus.publish(DomainEvent::SessionStateChanged {
            conversation_id: session.id().to_string(),
            awaiting_reply,
            timestamp: Utc::now(),
        });
    }
}

/// Combine typed text with text extracted from an attachment.
///
/// With no typed text the extracted text is the whole message.
fn augment(typed: &str, artifact_name: &str, extracted: &str) -> String {
    let typed = typed.trim();
    let extracted = extracted.trim();
    if extracted.is_empty() {
        typed.to_string()
    } else if typed.is_empty() {
        extracted.to_string()
    } else {
        format!("{typed}\n\n[Attached: {artifact_name}]\n{extracted}")
    }
}
