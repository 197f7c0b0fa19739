//! Turning raw response lines into [`StreamEvent`]s.

use tracing::{debug, warn};

use crate::client::{ClientError, ProviderAdapter};
use crate::model::StreamEvent;
use crate::options::ProviderKind;

/// Decode one line for the given provider without any per-call state.
///
/// Returns `Err(ClientError::Protocol)` for a malformed frame; callers that
/// drive a live stream should go through [`FrameDecoder`], which absorbs it.
pub fn decode_frame(provider: ProviderKind, line: &str) -> Result<Vec<StreamEvent>, ClientError> {
    provider.adapter().decode_frame(line)
}

/// Per-call decoder that remembers whether the terminal event was seen.
///
/// Malformed frames are logged and skipped. Once a terminal event has been
/// produced every further line yields nothing.
pub struct FrameDecoder<'a> {
    adapter: &'a dyn ProviderAdapter,
    finished: bool,
}

impl<'a> FrameDecoder<'a> {
    pub fn new(adapter: &'a dyn ProviderAdapter) -> Self {
        Self {
            adapter,
            finished: false,
        }
    }

    /// Whether the terminal event has already been produced.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Decode one line into its events. Nothing past the terminal event is
    /// returned, on this line or any later one.
    pub fn decode(&mut self, line: &str) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }

        match self.adapter.decode_frame(line) {
            Ok(mut events) => {
                if let Some(end) = events.iter().position(|e| e.is_complete) {
                    events.truncate(end + 1);
                    self.finished = true;
                }
                events
            }
            Err(e) => {
                debug!(provider = %self.adapter.kind(), error = %e, "skipping malformed frame");
                Vec::new()
            }
        }
    }

    /// Called when the body ends. Synthesizes the terminal event if the
    /// backend closed the stream without its end marker.
    pub fn finish(&mut self) -> Option<StreamEvent> {
        if self.finished {
            return None;
        }
        warn!(
            provider = %self.adapter.kind(),
            "stream closed without end marker, treating as complete"
        );
        self.finished = true;
        Some(StreamEvent::complete())
    }
}
