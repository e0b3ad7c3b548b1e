//! Mock completion provider for testing.
//!
//! Provides a scripted implementation of the CompletionProvider trait so
//! routing and persona behavior can be verified without a live model.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::RwLock;

use crate::completion::{word_stream, CompletionProvider, CompletionRequest, TextStream};
use crate::error::{ChatError, ChatResult};

/// Which calls a simulated outage affects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureMode {
    /// Classification (`complete`) calls fail
    Complete,
    /// Reply (`stream`) calls fail
    Stream,
    /// Every call fails
    All,
}

impl FailureMode {
    fn affects_complete(&self) -> bool {
        matches!(self, Self::Complete | Self::All)
    }

    fn affects_stream(&self) -> bool {
        matches!(self, Self::Stream | Self::All)
    }
}

/// Captured call information for verification.
#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: &'static str,
    pub request: CompletionRequest,
}

/// Mock completion provider for testing.
///
/// `complete` answers with the scripted responses in order, cycling when
/// they run out; `stream` streams the reply text word by word. Every call is
/// captured, and open reply streams are counted until dropped.
#[derive(Clone)]
pub struct MockProvider {
    /// Scripted answers for complete calls.
    responses: Arc<RwLock<Vec<String>>>,
    /// Index of next response to return.
    response_index: Arc<AtomicUsize>,
    /// Text streamed by stream calls.
    reply: Arc<RwLock<String>>,
    /// Captured calls for verification.
    captured: Arc<RwLock<Vec<CapturedRequest>>>,
    /// Simulated outage.
    failure: Arc<RwLock<Option<(FailureMode, u16)>>>,
    /// Fragments streamed before an opened reply breaks off.
    interrupt_after: Arc<RwLock<Option<usize>>>,
    /// Reply streams handed out and not yet dropped.
    open_streams: Arc<AtomicUsize>,
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProvider")
            .field("responses", &*self.responses.read())
            .field("calls", &self.call_count())
            .field("open_streams", &self.open_streams())
            .finish()
    }
}

impl MockProvider {
    /// Create a new mock provider.
    pub fn new() -> Self {
        Self {
            responses: Arc::new(RwLock::new(Vec::new())),
            response_index: Arc::new(AtomicUsize::new(0)),
            reply: Arc::new(RwLock::new("mock reply".to_string())),
            captured: Arc::new(RwLock::new(Vec::new())),
            failure: Arc::new(RwLock::new(None)),
            interrupt_after: Arc::new(RwLock::new(None)),
            open_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Add a scripted answer for the next complete call.
    pub fn add_response(self, response: impl Into<String>) -> Self {
        self.responses.write().push(response.into());
        self
    }

    /// Set all scripted answers.
    pub fn with_responses<I, S>(self, responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        *self.responses.write() = responses.into_iter().map(Into::into).collect();
        self
    }

    /// Set the text streamed by reply calls.
    pub fn with_reply(self, reply: impl Into<String>) -> Self {
        *self.reply.write() = reply.into();
        self
    }

    /// Fail matching calls with the given HTTP status.
    pub fn simulate_failure(self, mode: FailureMode, status: u16) -> Self {
        *self.failure.write() = Some((mode, status));
        self
    }

    /// Open reply streams normally, then fail after `fragments` words.
    ///
    /// With `0` the stream opens and its first item is an error.
    pub fn interrupt_stream_after(self, fragments: usize) -> Self {
        *self.interrupt_after.write() = Some(fragments);
        self
    }

    /// Clear all captured calls.
    pub fn clear_calls(&self) {
        self.captured.write().clear();
    }

    /// Get all captured calls.
    pub fn get_calls(&self) -> Vec<CapturedRequest> {
        self.captured.read().clone()
    }

    /// Get the number of calls made.
    pub fn call_count(&self) -> usize {
        self.captured.read().len()
    }

    /// Get requests passed to one method.
    pub fn get_method_calls(&self, method: &str) -> Vec<CompletionRequest> {
        self.captured
            .read()
            .iter()
            .filter(|c| c.method == method)
            .map(|c| c.request.clone())
            .collect()
    }

    /// Number of classification calls.
    pub fn complete_calls(&self) -> usize {
        self.get_method_calls("complete").len()
    }

    /// Number of reply streams requested.
    pub fn stream_calls(&self) -> usize {
        self.get_method_calls("stream").len()
    }

    /// Reply streams handed out and not yet dropped.
    pub fn open_streams(&self) -> usize {
        self.open_streams.load(Ordering::SeqCst)
    }

    fn record_call(&self, method: &'static str, request: &CompletionRequest) {
        self.captured.write().push(CapturedRequest {
            method,
            request: request.clone(),
        });
    }

    fn next_response(&self) -> String {
        let responses = self.responses.read();
        if responses.is_empty() {
            return self.reply.read().clone();
        }
        let index = self.response_index.fetch_add(1, Ordering::SeqCst);
        responses
            .get(index % responses.len())
            .cloned()
            .unwrap_or_default()
    }

    fn check_failure(&self, applies: impl Fn(&FailureMode) -> bool) -> ChatResult<()> {
        match *self.failure.read() {
            Some((mode, status)) if applies(&mode) => Err(ChatError::LlmStatus {
                status,
                body: "simulated failure".to_string(),
            }),
            _ => Ok(()),
        }
    }
}

struct OpenStreamGuard(Arc<AtomicUsize>);

impl Drop for OpenStreamGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CompletionProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &CompletionRequest) -> ChatResult<String> {
        self.record_call("complete", request);
        self.check_failure(FailureMode::affects_complete)?;
        Ok(self.next_response())
    }

    async fn stream(&self, request: &CompletionRequest) -> ChatResult<TextStream> {
        self.record_call("stream", request);
        self.check_failure(FailureMode::affects_stream)?;

        self.open_streams.fetch_add(1, Ordering::SeqCst);
        let guard = OpenStreamGuard(self.open_streams.clone());
        let reply = self.reply.read().clone();
        let words: TextStream = match *self.interrupt_after.read() {
            Some(fragments) => Box::pin(word_stream(&reply).take(fragments).chain(stream::once(async {
                Err(ChatError::LlmError("Stream interrupted: connection reset".to_string()))
            }))),
            None => word_stream(&reply),
        };

        Ok(Box::pin(words.map(move |fragment| {
            let _held = &guard;
            fragment
        })))
    }
}
