//! Token stream adapter.
//!
//! Turns a provider's chunk receiver into a forward-only stream of
//! [`StreamFragment`]s. Chunks without a content delta become empty
//! fragments. A transport failure, or the provider hanging up before its
//! terminal chunk, surfaces once as [`StreamInterrupted`] carrying the text
//! emitted so far. After that, or after the terminal fragment, the stream
//! yields nothing; check [`TokenStream::is_exhausted`] rather than reading
//! an empty pull as an empty reply.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use talkback_core::error::ProviderError;
use talkback_core::provider::{ChunkReceiver, StreamChunk};
use tokio_stream::wrappers::ReceiverStream;

/// One incremental piece of assistant text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamFragment {
    pub text: String,
    pub is_terminal: bool,
}

impl StreamFragment {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_terminal: false,
        }
    }

    /// The end-of-reply marker; carries no text.
    pub fn terminal() -> Self {
        Self {
            text: String::new(),
            is_terminal: true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

impl From<StreamChunk> for StreamFragment {
    fn from(chunk: StreamChunk) -> Self {
        Self {
            text: chunk.content.unwrap_or_default(),
            is_terminal: chunk.done,
        }
    }
}

/// The provider stream broke before its terminal chunk.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("stream interrupted after {} bytes: {reason}", .emitted.len())]
pub struct StreamInterrupted {
    /// Everything emitted before the break, in order
    pub emitted: String,
    pub reason: String,
}

/// Forward-only fragment stream over a provider's chunk receiver.
pub struct TokenStream {
    inner: ReceiverStream<Result<StreamChunk, ProviderError>>,
    emitted: String,
    exhausted: bool,
}

impl TokenStream {
    pub fn new(rx: ChunkReceiver) -> Self {
        Self {
            inner: ReceiverStream::new(rx),
            emitted: String::new(),
            exhausted: false,
        }
    }

    /// True once the terminal fragment or an interruption has been yielded.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Text yielded so far.
    pub fn emitted(&self) -> &str {
        &self.emitted
    }

    fn interrupted(&mut self, reason: String) -> StreamInterrupted {
        self.exhausted = true;
        StreamInterrupted {
            emitted: self.emitted.clone(),
            reason,
        }
    }
}

impl Stream for TokenStream {
    type Item = Result<StreamFragment, StreamInterrupted>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.exhausted {
            return Poll::Ready(None);
        }

        let item = match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Pending => return Poll::Pending,
            Poll::Ready(item) => item,
        };

        let item = match item {
            Some(Ok(chunk)) => {
                let fragment = StreamFragment::from(chunk);
                this.emitted.push_str(&fragment.text);
                if fragment.is_terminal {
                    this.exhausted = true;
                }
                Ok(fragment)
            }
            Some(Err(e)) => {
                let reason = match e {
                    ProviderError::StreamInterrupted(reason) => reason,
                    other => other.to_string(),
                };
                Err(this.interrupted(reason))
            }
            None => Err(this.interrupted("provider closed the stream without finishing".into())),
        };

        Poll::Ready(Some(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use talkback_core::provider::StreamChunk;

    async fn receiver(items: Vec<Result<StreamChunk, ProviderError>>) -> ChunkReceiver {
        let (tx, rx) = tokio::sync::mpsc::channel(items.len().max(1));
        for item in items {
            tx.send(item).await.unwrap();
        }
        rx
    }

    #[tokio::test]
    async fn maps_chunks_to_fragments_in_order() {
        let rx = receiver(vec![
            Ok(StreamChunk::delta("He")),
            Ok(StreamChunk::default()),
            Ok(StreamChunk::delta("llo")),
            Ok(StreamChunk::finished(None)),
        ])
        .await;
        let fragments: Vec<_> = TokenStream::new(rx).collect().await;
        assert_eq!(
            fragments,
            vec![
                Ok(StreamFragment::text("He")),
                Ok(StreamFragment::text("")),
                Ok(StreamFragment::text("llo")),
                Ok(StreamFragment::terminal()),
            ]
        );
    }

    #[tokio::test]
    async fn exhausted_stream_yields_nothing() {
        let rx = receiver(vec![Ok(StreamChunk::delta("Hi")), Ok(StreamChunk::finished(None))]).await;
        let mut stream = TokenStream::new(rx);
        while stream.next().await.is_some() {}

        assert!(stream.is_exhausted());
        assert_eq!(stream.emitted(), "Hi");
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn transport_error_carries_emitted_text() {
        let rx = receiver(vec![
            Ok(StreamChunk::delta("Par")),
            Ok(StreamChunk::delta("t")),
            Err(ProviderError::StreamInterrupted("connection reset".into())),
        ])
        .await;
        let mut stream = TokenStream::new(rx);
        stream.next().await;
        stream.next().await;

        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.emitted, "Part");
        assert_eq!(err.reason, "connection reset");
        assert!(stream.is_exhausted());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn hang_up_without_terminal_is_an_interruption() {
        let rx = receiver(vec![Ok(StreamChunk::delta("half"))]).await;
        let mut stream = TokenStream::new(rx);
        assert_eq!(stream.next().await, Some(Ok(StreamFragment::text("half"))));

        let err = stream.next().await.unwrap().unwrap_err();
        assert_eq!(err.emitted, "half");
        assert!(stream.next().await.is_none());
    }
}
