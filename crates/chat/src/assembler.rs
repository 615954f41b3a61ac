//! Response assembly: accumulates fragments into the final reply text.

use futures::{Stream, StreamExt};
use tokio::time::Instant;

use crate::stream::{StreamFragment, StreamInterrupted};

/// Accumulator for one reply. Only non-empty fragments count.
#[derive(Debug, Default)]
pub struct ResponseAssembler {
    buffer: String,
    fragments: usize,
}

impl ResponseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment, returning the text it added (if any).
    pub fn push<'a>(&mut self, fragment: &'a StreamFragment) -> Option<&'a str> {
        if fragment.is_empty() {
            return None;
        }
        self.buffer.push_str(&fragment.text);
        self.fragments += 1;
        Some(&fragment.text)
    }

    pub fn text(&self) -> &str {
        &self.buffer
    }

    pub fn fragments(&self) -> usize {
        self.fragments
    }

    pub fn finish(self) -> String {
        self.buffer
    }
}

/// Batch mode: the ordered concatenation of every fragment's text.
pub fn assemble<I>(fragments: I) -> String
where
    I: IntoIterator<Item = StreamFragment>,
{
    let mut assembler = ResponseAssembler::new();
    for fragment in fragments {
        assembler.push(&fragment);
    }
    assembler.finish()
}

/// Incremental mode: like [`assemble`], calling `sink` once per non-empty
/// fragment as it arrives.
pub fn assemble_with<I, F>(fragments: I, mut sink: F) -> String
where
    I: IntoIterator<Item = StreamFragment>,
    F: FnMut(&str),
{
    let mut assembler = ResponseAssembler::new();
    for fragment in fragments {
        if let Some(text) = assembler.push(&fragment) {
            sink(text);
        }
    }
    assembler.finish()
}

/// How a driven stream stopped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEnding {
    Completed,
    Interrupted(String),
    TimedOut,
}

/// Result of [`drive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assembly {
    pub text: String,
    pub fragments: usize,
    pub ending: StreamEnding,
}

impl Assembly {
    pub fn is_complete(&self) -> bool {
        self.ending == StreamEnding::Completed
    }
}

/// Pull fragments until the terminal one, an interruption, or `deadline`.
///
/// Text accumulated before an interruption or timeout is kept in the
/// returned [`Assembly`]. A stream that simply ends counts as completed.
pub async fn drive<S, F>(stream: &mut S, deadline: Option<Instant>, mut sink: F) -> Assembly
where
    S: Stream<Item = Result<StreamFragment, StreamInterrupted>> + Unpin,
    F: FnMut(&str),
{
    let mut assembler = ResponseAssembler::new();

    let ending = loop {
        let next = match deadline {
            Some(deadline) => match tokio::time::timeout_at(deadline, stream.next()).await {
                Ok(next) => next,
                Err(_) => break StreamEnding::TimedOut,
            },
            None => stream.next().await,
        };

        match next {
            Some(Ok(fragment)) => {
                if let Some(text) = assembler.push(&fragment) {
                    sink(text);
                }
                if fragment.is_terminal {
                    break StreamEnding::Completed;
                }
            }
            Some(Err(interrupted)) => break StreamEnding::Interrupted(interrupted.reason),
            None => break StreamEnding::Completed,
        }
    };

    Assembly {
        fragments: assembler.fragments(),
        text: assembler.finish(),
        ending,
    }
}
