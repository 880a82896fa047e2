//! The chunk stream a research run produces.
//!
//! A run pushes [`ResearchEvent`]s into an unbounded channel; the caller
//! drains them through [`ResearchStream`]. Dropping or cancelling the stream
//! closes the channel, which the producer observes as cancellation.

use deepresearch_core::error::AgentError;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// One chunk of research output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResearchEvent {
    /// Progress update
    Status { message: String },

    /// Something went wrong but the run continues
    Warning { message: String },

    /// The run failed; nothing follows
    Error { message: String },

    /// Final report markdown; always the last chunk of a successful run
    Report { markdown: String },
}

impl ResearchEvent {
    /// Event name for SSE framing.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Status { .. } => "status",
            Self::Warning { .. } => "warning",
            Self::Error { .. } => "error",
            Self::Report { .. } => "report",
        }
    }

    /// The chunk text as shown to the user.
    pub fn text(&self) -> &str {
        match self {
            Self::Status { message } | Self::Warning { message } | Self::Error { message } => message,
            Self::Report { markdown } => markdown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Error { .. } | Self::Report { .. })
    }
}

impl fmt::Display for ResearchEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

/// Receiving half of a research run.
pub struct ResearchStream {
    rx: mpsc::UnboundedReceiver<ResearchEvent>,
}

impl ResearchStream {
    pub fn channel() -> (ChunkSender, Self) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChunkSender { tx }, Self { rx })
    }

    /// A stream holding a single chunk.
    pub fn once(event: ResearchEvent) -> Self {
        let (tx, stream) = Self::channel();
        let _ = tx.send(event);
        stream
    }

    /// Stop the run. Chunks already produced can still be drained.
    pub fn cancel(&mut self) {
        self.rx.close();
    }

    /// Drain the whole run.
    pub async fn collect_all(mut self) -> Vec<ResearchEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}

impl Stream for ResearchStream {
    type Item = ResearchEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// Producing half of a research run.
#[derive(Clone)]
pub struct ChunkSender {
    tx: mpsc::UnboundedSender<ResearchEvent>,
}

impl ChunkSender {
    pub fn send(&self, event: ResearchEvent) -> Result<(), AgentError> {
        self.tx.send(event).map_err(|_| AgentError::Cancelled)
    }

    pub fn status(&self, message: impl Into<String>) -> Result<(), AgentError> {
        self.send(ResearchEvent::Status { message: message.into() })
    }

    pub fn warning(&self, message: impl Into<String>) -> Result<(), AgentError> {
        self.send(ResearchEvent::Warning { message: message.into() })
    }

    pub fn error(&self, message: impl Into<String>) -> Result<(), AgentError> {
        self.send(ResearchEvent::Error { message: message.into() })
    }

    pub fn report(&self, markdown: impl Into<String>) -> Result<(), AgentError> {
        self.send(ResearchEvent::Report { markdown: markdown.into() })
    }

    pub fn is_cancelled(&self) -> bool {
        self.tx.is_closed()
    }

    /// Resolves once the consumer has gone away.
    pub async fn cancelled(&self) {
        self.tx.closed().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn chunks_arrive_in_order() {
        let (tx, stream) = ResearchStream::channel();
        tx.status("one").unwrap();
        tx.warning("two").unwrap();
        tx.report("# three").unwrap();
        drop(tx);

        let texts: Vec<String> = stream.map(|e| e.to_string()).collect().await;
        assert_eq!(texts, vec!["one", "two", "# three"]);
    }

    #[tokio::test]
    async fn dropping_the_stream_cancels_the_sender() {
        let (tx, stream) = ResearchStream::channel();
        assert!(!tx.is_cancelled());
        drop(stream);
        assert!(tx.is_cancelled());
        assert!(matches!(tx.status("late"), Err(AgentError::Cancelled)));
        tx.cancelled().await;
    }

    #[tokio::test]
    async fn cancel_keeps_buffered_chunks() {
        let (tx, mut stream) = ResearchStream::channel();
        tx.status("before").unwrap();
        stream.cancel();
        assert!(tx.status("after").is_err());
        assert_eq!(
            stream.collect_all().await,
            vec![ResearchEvent::Status { message: "before".into() }]
        );
    }

    #[test]
    fn event_wire_format() {
        let json = serde_json::to_value(ResearchEvent::Report { markdown: "# R".into() }).unwrap();
        assert_eq!(json, serde_json::json!({"type": "report", "markdown": "# R"}));
        assert_eq!(ResearchEvent::Warning { message: "w".into() }.event_type(), "warning");
        assert!(ResearchEvent::Error { message: "e".into() }.is_terminal());
        assert!(!ResearchEvent::Status { message: "s".into() }.is_terminal());
    }

    #[tokio::test]
    async fn once_yields_a_single_chunk() {
        let events = ResearchStream::once(ResearchEvent::Warning { message: "w".into() })
            .collect_all()
            .await;
        assert_eq!(events.len(), 1);
    }
}
