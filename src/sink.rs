//! Consumers of status and content events.
//!
//! Sinks are called synchronously from the read loop, in arrival order. A
//! slow sink stalls further reads from the response body, so sinks should
//! return quickly; [`ChannelSink`] hands events off to another task.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::warn;

use crate::model::{StatusEvent, StreamEvent};

/// Receives lifecycle messages and streamed content from an [`AiClient`](crate::client::AiClient).
pub trait EventSink: Send + Sync {
    /// Advisory lifecycle message.
    fn on_status(&self, event: StatusEvent);

    /// Next piece of content, in the order it was decoded.
    fn on_content(&self, event: StreamEvent);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn on_status(&self, _event: StatusEvent) {}

    fn on_content(&self, _event: StreamEvent) {}
}

/// Either kind of event, for sinks that funnel both into one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkEvent {
    Status(StatusEvent),
    Content(StreamEvent),
}

/// Default queue length for [`ChannelSink::channel`].
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Forwards events to a bounded tokio channel consumed by another task.
///
/// Sending never blocks the read loop. When the queue is full the event is
/// dropped and a warning logged; events sent after the receiver is dropped
/// are discarded silently.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<SinkEvent>,
}

impl ChannelSink {
    /// A sink with [`DEFAULT_CHANNEL_CAPACITY`] and its receiver.
    pub fn channel() -> (Self, mpsc::Receiver<SinkEvent>) {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// A sink holding at most `capacity` undelivered events.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<SinkEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }

    fn forward(&self, event: SinkEvent) {
        match self.sender.try_send(event) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(event)) => {
                warn!(?event, "event sink queue full, dropping event");
            }
        }
    }
}

impl EventSink for ChannelSink {
    fn on_status(&self, event: StatusEvent) {
        self.forward(SinkEvent::Status(event));
    }

    fn on_content(&self, event: StreamEvent) {
        self.forward(SinkEvent::Content(event));
    }
}

/// Records every event it receives.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<SinkEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events in arrival order.
    pub fn events(&self) -> Vec<SinkEvent> {
        self.lock().clone()
    }

    /// Content events only.
    pub fn content_events(&self) -> Vec<StreamEvent> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Content(c) => Some(c.clone()),
                SinkEvent::Status(_) => None,
            })
            .collect()
    }

    /// Status messages only.
    pub fn statuses(&self) -> Vec<String> {
        self.lock()
            .iter()
            .filter_map(|e| match e {
                SinkEvent::Status(s) => Some(s.message.clone()),
                SinkEvent::Content(_) => None,
            })
            .collect()
    }

    /// Concatenation of every non-terminal delta.
    pub fn content(&self) -> String {
        self.content_events()
            .into_iter()
            .filter(|e| !e.is_complete)
            .map(|e| e.delta)
            .collect()
    }

    /// Whether a terminal content event was received.
    pub fn is_complete(&self) -> bool {
        self.content_events().iter().any(|e| e.is_complete)
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<SinkEvent>> {
        // push and clear leave the Vec consistent even if a holder panicked
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl EventSink for CollectingSink {
    fn on_status(&self, event: StatusEvent) {
        self.lock().push(SinkEvent::Status(event));
    }

    fn on_content(&self, event: StreamEvent) {
        self.lock().push(SinkEvent::Content(event));
    }
}

/// Adapts a pair of closures into a sink.
///
/// # Example
/// ```
/// use tabchat::sink::FnSink;
///
/// let sink = FnSink::new(
///     |status| eprintln!("[{}]", status.message),
///     |event| print!("{}", event.delta),
/// );
/// ```
pub struct FnSink<S, C> {
    status: S,
    content: C,
}

impl<S, C> FnSink<S, C>
where
    S: Fn(StatusEvent) + Send + Sync,
    C: Fn(StreamEvent) + Send + Sync,
{
    pub fn new(status: S, content: C) -> Self {
        Self { status, content }
    }
}

impl<S, C> EventSink for FnSink<S, C>
where
    S: Fn(StatusEvent) + Send + Sync,
    C: Fn(StreamEvent) + Send + Sync,
{
    fn on_status(&self, event: StatusEvent) {
        (self.status)(event)
    }

    fn on_content(&self, event: StreamEvent) {
        (self.content)(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_collecting_sink_joins_deltas() {
        let sink = CollectingSink::new();
        sink.on_status(StatusEvent::new("Sending request"));
        sink.on_content(StreamEvent::delta("Hel"));
        sink.on_content(StreamEvent::delta("lo"));
        sink.on_content(StreamEvent::complete());

        assert_eq!(sink.content(), "Hello");
        assert!(sink.is_complete());
        assert_eq!(sink.statuses(), vec!["Sending request".to_string()]);
        assert_eq!(sink.events().len(), 4);

        sink.clear();
        assert!(sink.events().is_empty());
    }

    #[tokio::test]
    async fn test_channel_sink_preserves_order() {
        let (sink, mut receiver) = ChannelSink::channel();
        sink.on_status(StatusEvent::new("start"));
        sink.on_content(StreamEvent::delta("a"));
        sink.on_content(StreamEvent::complete());
        drop(sink);

        let mut received = Vec::new();
        while let Some(event) = receiver.recv().await {
            received.push(event);
        }
        assert_eq!(
            received,
            vec![
                SinkEvent::Status(StatusEvent::new("start")),
                SinkEvent::Content(StreamEvent::delta("a")),
                SinkEvent::Content(StreamEvent::complete()),
            ]
        );
    }

    #[tokio::test]
    async fn test_channel_sink_drops_on_full_queue() {
        let (sink, mut receiver) = ChannelSink::with_capacity(2);
        sink.on_content(StreamEvent::delta("a"));
        sink.on_content(StreamEvent::delta("b"));
        sink.on_content(StreamEvent::delta("overflow"));
        drop(sink);

        let mut received = Vec::new();
        while let Some(event) = receiver.recv().await {
            received.push(event);
        }
        assert_eq!(
            received,
            vec![
                SinkEvent::Content(StreamEvent::delta("a")),
                SinkEvent::Content(StreamEvent::delta("b")),
            ]
        );
    }

    #[test]
    fn test_channel_sink_ignores_closed_receiver() {
        let (sink, receiver) = ChannelSink::channel();
        drop(receiver);
        sink.on_content(StreamEvent::delta("dropped"));
    }

    #[test]
    fn test_fn_sink_dispatch() {
        let statuses = Arc::new(AtomicUsize::new(0));
        let contents = Arc::new(AtomicUsize::new(0));
        let (s, c) = (statuses.clone(), contents.clone());

        let sink = FnSink::new(
            move |_| {
                s.fetch_add(1, Ordering::SeqCst);
            },
            move |_| {
                c.fetch_add(1, Ordering::SeqCst);
            },
        );
        sink.on_status(StatusEvent::new("x"));
        sink.on_content(StreamEvent::delta("y"));
        sink.on_content(StreamEvent::complete());

        assert_eq!(statuses.load(Ordering::SeqCst), 1);
        assert_eq!(contents.load(Ordering::SeqCst), 2);
    }
}
