//! Scripted providers and gateways shared by the chat crate's tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use talkback_core::attachment::{Artifact, ExtractionGateway, ExtractionResult};
use talkback_core::error::ProviderError;
use talkback_core::message::ChatMessage;
use talkback_core::provider::{
    ChunkReceiver, CompletionRequest, CompletionResponse, Provider, StreamChunk,
};

/// What the next `stream()` call hands back.
pub enum Script {
    /// Send these items, then hang up.
    Chunks(Vec<Result<StreamChunk, ProviderError>>),
    /// A receiver the test keeps feeding.
    Receiver(ChunkReceiver),
    /// Fail before any chunk.
    OpenError(ProviderError),
}

/// Deltas for `texts`, then the terminal chunk.
pub fn reply(texts: &[&str]) -> Script {
    let mut chunks: Vec<_> = texts.iter().map(|t| Ok(StreamChunk::delta(*t))).collect();
    chunks.push(Ok(StreamChunk::finished(None)));
    Script::Chunks(chunks)
}

/// Deltas for `texts`, then a transport error.
pub fn broken_reply(texts: &[&str], reason: &str) -> Script {
    let mut chunks: Vec<_> = texts.iter().map(|t| Ok(StreamChunk::delta(*t))).collect();
    chunks.push(Err(ProviderError::StreamInterrupted(reason.into())));
    Script::Chunks(chunks)
}

pub struct ScriptedProvider {
    scripts: Mutex<VecDeque<Script>>,
    completion: String,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            completion: String::new(),
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Text returned by non-streaming `complete()` calls.
    pub fn with_completion(mut self, text: &str) -> Self {
        self.completion = text.to_string();
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let model = request.model.clone();
        self.requests.lock().unwrap().push(request);
        Ok(CompletionResponse {
            message: ChatMessage::assistant(self.completion.clone()),
            usage: None,
            model,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<ChunkReceiver, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);
        let script = self.scripts.lock().unwrap().pop_front();

        match script {
            Some(Script::Chunks(items)) => {
                let (tx, rx) = tokio::sync::mpsc::channel(items.len().max(1));
                for item in items {
                    let _ = tx.try_send(item);
                }
                Ok(rx)
            }
            Some(Script::Receiver(rx)) => Ok(rx),
            Some(Script::OpenError(e)) => Err(e),
            None => Err(ProviderError::NotConfigured("script exhausted".into())),
        }
    }
}

/// Gateway returning a fixed result and counting calls.
pub struct FixedGateway {
    result: ExtractionResult,
    calls: AtomicUsize,
}

impl FixedGateway {
    pub fn new(result: ExtractionResult) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExtractionGateway for FixedGateway {
    async fn extract(&self, _artifact: &Artifact) -> ExtractionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}
