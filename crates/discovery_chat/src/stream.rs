//! The reply stream handed back to callers.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::{Stream, StreamExt};
use tracing::debug;

use crate::completion::TextStream;
use crate::error::ChatResult;
use crate::router::RoutePlan;

/// Text fragments of one reply, tagged with the route that produced it.
///
/// Owns the underlying completion stream; dropping the reply, finished or
/// not, closes it.
pub struct ReplyStream {
    plan: RoutePlan,
    inner: TextStream,
    fragments: usize,
    finished: bool,
}

impl ReplyStream {
    pub fn new(plan: RoutePlan, inner: TextStream) -> Self {
        Self {
            plan,
            inner,
            fragments: 0,
            finished: false,
        }
    }

    /// The leaf agent answering.
    pub fn agent(&self) -> &str {
        &self.plan.leaf
    }

    pub fn plan(&self) -> &RoutePlan {
        &self.plan
    }

    /// Fragments yielded so far.
    pub fn fragments(&self) -> usize {
        self.fragments
    }

    /// Drain the stream into the full reply text.
    pub async fn collect_text(mut self) -> ChatResult<String> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(&fragment?);
        }
        Ok(text)
    }
}

impl Stream for ReplyStream {
    type Item = ChatResult<String>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        let polled = this.inner.as_mut().poll_next(cx);
        match &polled {
            Poll::Ready(Some(Ok(_))) => this.fragments += 1,
            Poll::Ready(Some(Err(_))) | Poll::Ready(None) => this.finished = true,
            Poll::Pending => {}
        }
        polled
    }
}

impl Drop for ReplyStream {
    fn drop(&mut self) {
        if !self.finished {
            debug!(
                agent = %self.plan.leaf,
                fragments = self.fragments,
                "Reply stream released before completion"
            );
        }
    }
}

impl std::fmt::Debug for ReplyStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReplyStream")
            .field("plan", &self.plan)
            .field("fragments", &self.fragments)
            .field("finished", &self.finished)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::word_stream;
    use crate::error::ChatError;
    use futures::stream;

    fn plan() -> RoutePlan {
        RoutePlan {
            start: "facilitator".to_string(),
            leaf: "facilitator".to_string(),
            hops: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_collect_text_concatenates() {
        let reply = ReplyStream::new(plan(), word_stream("Welcome to the workshop"));
        assert_eq!(reply.agent(), "facilitator");
        assert_eq!(reply.collect_text().await.unwrap(), "Welcome to the workshop");
    }

    #[tokio::test]
    async fn test_error_ends_the_stream() {
        let inner: TextStream = Box::pin(stream::iter(vec![
            Ok("partial".to_string()),
            Err(ChatError::LlmError("reset".to_string())),
            Ok("never".to_string()),
        ]));
        let mut reply = ReplyStream::new(plan(), inner);

        assert_eq!(reply.next().await.unwrap().unwrap(), "partial");
        assert!(reply.next().await.unwrap().is_err());
        assert!(reply.next().await.is_none());
        assert_eq!(reply.fragments(), 1);
    }
}
