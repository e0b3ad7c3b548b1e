//! Server-sent event decoding for streamed completions.

use std::collections::VecDeque;
use std::fmt::Display;

use futures::stream::{self, Stream, StreamExt};

use crate::completion::TextStream;
use crate::error::{ChatError, ChatResult};

/// What a single `data:` payload means to the text stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseChunk {
    /// A text fragment
    Text(String),
    /// End of the completion
    Done,
    /// Bookkeeping event with no text
    Skip,
}

/// Splits a byte stream into `data:` payloads.
///
/// Bytes are buffered until a full line arrives, so multi-byte characters
/// split across network chunks decode correctly.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return every complete `data:` payload.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            payloads.extend(data_payload(&line));
        }
        payloads
    }

    /// Treat whatever is buffered at end of input as a final line.
    pub fn finish(&mut self) -> Option<String> {
        let line = std::mem::take(&mut self.buffer);
        data_payload(&line)
    }
}

fn data_payload(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\n', '\r']);
    line.strip_prefix("data:")
        .map(|data| data.strip_prefix(' ').unwrap_or(data).to_string())
}

struct SseState {
    bytes: std::pin::Pin<Box<dyn Stream<Item = Result<Vec<u8>, String>> + Send>>,
    decoder: SseDecoder,
    pending: VecDeque<String>,
    parse: fn(&str) -> ChatResult<SseChunk>,
    failure: Option<ChatError>,
    done: bool,
}

impl SseState {
    fn accept(&mut self, payloads: impl IntoIterator<Item = String>) {
        for data in payloads {
            match (self.parse)(&data) {
                Ok(SseChunk::Text(text)) => {
                    if !text.is_empty() {
                        self.pending.push_back(text);
                    }
                }
                Ok(SseChunk::Done) => {
                    self.done = true;
                    return;
                }
                Ok(SseChunk::Skip) => {}
                Err(e) => {
                    self.failure = Some(e);
                    self.done = true;
                    return;
                }
            }
        }
    }
}

/// Turn a raw event stream into a stream of text fragments.
pub fn sse_text_stream<S, E>(bytes: S, parse: fn(&str) -> ChatResult<SseChunk>) -> TextStream
where
    S: Stream<Item = Result<Vec<u8>, E>> + Send + 'static,
    E: Display + 'static,
{
    let state = SseState {
        bytes: Box::pin(bytes.map(|item| item.map_err(|e| e.to_string()))),
        decoder: SseDecoder::new(),
        pending: VecDeque::new(),
        parse,
        failure: None,
        done: false,
    };

    Box::pin(stream::unfold(state, |mut state| async move {
        loop {
            if let Some(text) = state.pending.pop_front() {
                return Some((Ok(text), state));
            }
            if let Some(e) = state.failure.take() {
                return Some((Err(e), state));
            }
            if state.done {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(bytes)) => {
                    let payloads = state.decoder.push(&bytes);
                    state.accept(payloads);
                }
                Some(Err(e)) => {
                    state.failure = Some(ChatError::LlmError(format!("Stream interrupted: {}", e)));
                    state.done = true;
                }
                None => {
                    let last = state.decoder.finish();
                    state.accept(last);
                    state.done = true;
                }
            }
        }
    }))
}
