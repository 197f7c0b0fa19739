//! Line framing over a live HTTP body, plus Server-Sent Events helpers.
//!
//! Both chat protocols are line oriented. OpenAI-style backends send SSE:
//! ```text
//! data: {"key": "value"}
//!
//! data: {"another": "event"}
//!
//! data: [DONE]
//! ```
//! while Ollama-style backends send one bare JSON object per line. This module
//! only splits the byte stream into lines; what a line means is left to the
//! provider adapter.

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

/// Extension trait for `reqwest::Response` to read the body line by line.
///
/// # Example
/// ```ignore
/// use tabchat::sse::ResponseLinesExt;
///
/// let response = client.post(url).send().await?;
/// let mut lines = std::pin::pin!(response.lines());
/// while let Some(line) = lines.next().await {
///     println!("frame: {}", line?);
/// }
/// ```
pub trait ResponseLinesExt {
    /// Convert the response into a stream of non-empty lines.
    ///
    /// Lines are yielded as soon as their terminating newline arrives; the
    /// body is never buffered as a whole.
    fn lines(self) -> impl Stream<Item = Result<String, reqwest::Error>> + Send;
}

impl ResponseLinesExt for reqwest::Response {
    fn lines(self) -> impl Stream<Item = Result<String, reqwest::Error>> + Send {
        frame_lines(self.bytes_stream())
    }
}

/// Split a byte stream into non-empty lines.
///
/// Bytes are buffered until a `\n` arrives, so multi-byte characters split
/// across chunks decode correctly. Trailing whitespace (including `\r`) is
/// removed. A final line without a newline is still yielded when the stream
/// ends. After an error the stream ends.
pub fn frame_lines<S, E>(byte_stream: S) -> impl Stream<Item = Result<String, E>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send,
    E: Send,
{
    stream::unfold(
        (Box::pin(byte_stream), Vec::<u8>::new(), false),
        |(mut byte_stream, mut buffer, mut stream_ended)| async move {
            loop {
                // Process complete lines from buffer
                if let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                    let raw: Vec<u8> = buffer.drain(..=pos).collect();
                    let line = decode_line(&raw[..pos]);

                    // Skip empty lines
                    if line.is_empty() {
                        continue;
                    }

                    return Some((Ok(line), (byte_stream, buffer, stream_ended)));
                }

                if stream_ended {
                    let line = decode_line(&std::mem::take(&mut buffer));
                    if line.is_empty() {
                        return None;
                    }
                    return Some((Ok(line), (byte_stream, buffer, stream_ended)));
                }

                match byte_stream.next().await {
                    Some(Ok(chunk)) => buffer.extend_from_slice(&chunk),
                    Some(Err(e)) => {
                        buffer.clear();
                        return Some((Err(e), (byte_stream, buffer, true)));
                    }
                    None => stream_ended = true,
                }
            }
        },
    )
}

fn decode_line(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).trim_end().to_string()
}

/// Parse an SSE line to extract the data portion.
///
/// SSE lines are in the format: `data: <content>`
///
/// # Example
/// ```
/// use tabchat::sse::parse_sse_line;
///
/// let line = "data: {\"key\": \"value\"}";
/// assert_eq!(parse_sse_line(line), Some("{\"key\": \"value\"}"));
///
/// let line = "invalid";
/// assert_eq!(parse_sse_line(line), None);
/// ```
pub fn parse_sse_line(line: &str) -> Option<&str> {
    line.strip_prefix("data: ").map(|s| s.trim())
}

/// Check if an SSE data line indicates the stream is done.
///
/// # Example
/// ```
/// use tabchat::sse::is_done_marker;
///
/// assert!(is_done_marker("[DONE]"));
/// assert!(!is_done_marker(""));
/// assert!(!is_done_marker("{\"data\": \"value\"}"));
/// ```
pub fn is_done_marker(data: &str) -> bool {
    data == "[DONE]"
}
