//! Client orchestration, the provider adapter seam and error types.

use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use reqwest::RequestBuilder;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::http::TransportSession;
use crate::model::{ChatRequest, ChatResponse, StatusEvent, StreamEvent};
use crate::options::{
    ConfigLookup, EnvLookup, ProviderConfig, ProviderKind, SecretString, TransportOptions,
};
use crate::sink::{EventSink, NoopSink};
use crate::sse::ResponseLinesExt;
use crate::stream::FrameDecoder;

/// Returned by [`AiClient::provider_info`] before any configuration.
pub const NOT_CONFIGURED: &str = "Not configured";

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    /// No provider has been configured yet.
    #[error("no AI provider configured")]
    NotConfigured,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The backend answered with a non-2xx status.
    #[error("HTTP {status}: {body}")]
    Network { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("request cancelled")]
    Cancelled,

    /// A frame that could not be decoded. Absorbed per line while streaming.
    #[error("malformed frame: {0}")]
    Protocol(String),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported provider: {0}")]
    UnsupportedProvider(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Everything that differs between backend protocols.
///
/// Adapters are stateless; all I/O happens in [`TransportSession`] and
/// [`AiClient`]. Adding a backend means adding an implementation and a
/// [`ProviderKind`] variant.
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Full URL for a streaming or non-streaming call.
    fn endpoint(&self, base_url: &str, streaming: bool) -> String;

    /// JSON body for the request; shape depends on `request.streaming`.
    fn request_body(&self, model: &str, request: &ChatRequest)
        -> Result<serde_json::Value, ClientError>;

    /// Decode one line of a streamed body into its events, in order.
    ///
    /// A line yields nothing, a delta, a terminal event, or a delta followed
    /// by the terminal event. Malformed frames return [`ClientError::Protocol`].
    fn decode_frame(&self, line: &str) -> Result<Vec<StreamEvent>, ClientError>;

    /// Extract the answer text from a non-streaming response body.
    fn parse_completion(&self, body: &str) -> Result<String, ClientError>;

    /// Attach credentials. Unauthenticated backends keep the default.
    fn authorize(&self, request: RequestBuilder, _api_key: Option<&SecretString>) -> RequestBuilder {
        request
    }
}

/// Streaming chat client over one configured provider.
///
/// `configure` takes `&mut self` while the `execute_*` calls take `&self`, so
/// a configuration can never be swapped under a call that is still running
/// on the same instance. Use one client per logical session for parallel
/// calls.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use tabchat::client::AiClient;
/// use tabchat::options::{ProviderConfig, ProviderKind};
/// use tabchat::sink::CollectingSink;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let sink = Arc::new(CollectingSink::new());
///     let mut client = AiClient::new(sink.clone());
///     client.configure(ProviderConfig::new(ProviderKind::Ollama).with_model("llama3.2"))?;
///
///     client
///         .execute_streaming(
///             "You explain DAX measures.",
///             "What does SUMX do?",
///             0.2,
///             512,
///             &CancellationToken::new(),
///         )
///         .await?;
///
///     println!("{}", sink.content());
///     Ok(())
/// }
/// ```
pub struct AiClient {
    sink: Arc<dyn EventSink>,
    lookup: Box<dyn ConfigLookup>,
    transport_options: TransportOptions,
    session: Option<TransportSession>,
}

impl Default for AiClient {
    fn default() -> Self {
        Self::new(Arc::new(NoopSink))
    }
}

impl AiClient {
    /// Create an unconfigured client reporting to `sink`.
    ///
    /// Missing base URLs and keys are looked up in the process environment
    /// unless [`with_lookup`](Self::with_lookup) replaces the source.
    pub fn new(sink: Arc<dyn EventSink>) -> Self {
        Self {
            sink,
            lookup: Box::new(EnvLookup),
            transport_options: TransportOptions::default(),
            session: None,
        }
    }

    /// Set the named lookup used to resolve base URLs and API keys.
    pub fn with_lookup(mut self, lookup: impl ConfigLookup + 'static) -> Self {
        self.lookup = Box::new(lookup);
        self
    }

    /// Set the transport options used by sessions opened from now on.
    pub fn with_transport_options(mut self, transport_options: TransportOptions) -> Self {
        self.transport_options = transport_options;
        self
    }

    /// Install a provider configuration, replacing any previous one.
    ///
    /// The new session is built first; only once that succeeds is the old
    /// one swapped out and dropped. On failure the previous configuration
    /// stays in place.
    pub fn configure(&mut self, config: ProviderConfig) -> Result<(), ClientError> {
        let provider = config.provider;
        self.status(format!("Configuring {} client...", provider));

        let resolved = config.resolve(&*self.lookup);
        if provider == ProviderKind::OpenAi && resolved.api_key.is_none() {
            warn!("no API key for OpenAI provider, requests will be sent without authorization");
        }

        let session = match TransportSession::open(resolved, &self.transport_options) {
            Ok(session) => session,
            Err(e) => {
                self.status(format!("Configuration failed: {}", e));
                return Err(e);
            }
        };

        info!(
            provider = %provider,
            model = %session.config().model,
            base_url = %session.base_url(),
            "AI provider configured"
        );
        let message = format!(
            "{} client configured with model {}",
            provider,
            session.config().model
        );

        drop(self.session.replace(session));
        self.status(message);
        Ok(())
    }

    /// Positional form of [`configure`](Self::configure).
    pub fn configure_provider(
        &mut self,
        provider: ProviderKind,
        api_key: Option<&str>,
        model: Option<&str>,
        base_url: Option<&str>,
    ) -> Result<(), ClientError> {
        let mut config = ProviderConfig::new(provider);
        if let Some(api_key) = api_key {
            config = config.with_api_key(api_key);
        }
        if let Some(model) = model {
            config = config.with_model(model);
        }
        if let Some(base_url) = base_url {
            config = config.with_base_url(base_url);
        }
        self.configure(config)
    }

    pub fn is_configured(&self) -> bool {
        self.session.is_some()
    }

    /// The installed, resolved configuration.
    pub fn config(&self) -> Option<&ProviderConfig> {
        self.session.as_ref().map(|s| s.config())
    }

    /// Human-readable summary of the current configuration.
    pub fn provider_info(&self) -> String {
        match self.config() {
            Some(config) => format!("provider: {}, model: {}", config.provider, config.model),
            None => NOT_CONFIGURED.to_string(),
        }
    }

    /// Stream a completion, forwarding every decoded event to the sink.
    ///
    /// Events arrive in body order; at most one terminal event is delivered
    /// and nothing follows it. If the backend closes the body without its end
    /// marker a terminal event is synthesized. On error or cancellation the
    /// error is returned after a status message and no terminal event is
    /// emitted for the failure itself.
    ///
    /// Cancellation is checked before connecting, before every line, and
    /// while waiting on the connection or the next chunk.
    pub async fn execute_streaming(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
        cancel: &CancellationToken,
    ) -> Result<(), ClientError> {
        let session = self.session()?;
        let request = build_request(system_prompt, user_prompt, temperature, max_tokens, true)?;

        let result = if cancel.is_cancelled() {
            Err(ClientError::Cancelled)
        } else {
            self.status(format!("Sending request to {}...", session.config().provider));
            self.stream_response(session, &request, cancel).await
        };

        match result {
            Ok(()) => {
                self.status("Response complete");
                Ok(())
            }
            Err(ClientError::Cancelled) => {
                self.status("Request cancelled");
                Err(ClientError::Cancelled)
            }
            Err(e) => {
                warn!(error = %e, "streaming chat request failed");
                self.status(format!("Request failed: {}", e));
                Err(e)
            }
        }
    }

    /// Non-streaming completion.
    ///
    /// Only [`ClientError::NotConfigured`] and [`ClientError::InvalidArgument`]
    /// are returned as errors; every other failure is folded into a
    /// `ChatResponse` with `success == false`.
    pub async fn execute_blocking(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<ChatResponse, ClientError> {
        let session = self.session()?;
        let request = build_request(system_prompt, user_prompt, temperature, max_tokens, false)?;

        self.status(format!("Sending request to {}...", session.config().provider));
        let response = match complete(session, &request).await {
            Ok(content) => {
                self.status("Response complete");
                ChatResponse::ok(content)
            }
            Err(e) => {
                warn!(error = %e, "chat request failed");
                self.status(format!("Request failed: {}", e));
                ChatResponse::failed(e.to_string())
            }
        };
        Ok(response)
    }

    /// Like [`execute_blocking`](Self::execute_blocking), but an unsuccessful
    /// response becomes [`ClientError::ProviderError`].
    pub async fn execute_blocking_checked(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, ClientError> {
        let response = self
            .execute_blocking(system_prompt, user_prompt, temperature, max_tokens)
            .await?;

        if response.success {
            Ok(response.content)
        } else {
            Err(ClientError::ProviderError(
                response.error.unwrap_or_else(|| "unknown error".to_string()),
            ))
        }
    }

    async fn stream_response(
        &self,
        session: &TransportSession,
        request: &ChatRequest,
        cancel: &CancellationToken,
    ) -> Result<(), ClientError> {
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Cancelled),
            response = session.send(request) => response?,
        };
        self.status("Receiving response...");

        let mut lines = pin!(response.lines());
        let mut decoder = FrameDecoder::new(session.adapter());

        loop {
            if cancel.is_cancelled() {
                return Err(ClientError::Cancelled);
            }

            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ClientError::Cancelled),
                next = lines.next() => next,
            };
            let Some(line) = next else {
                break;
            };
            let line = line.map_err(|e| session.classify(e))?;

            for event in decoder.decode(&line) {
                let done = event.is_complete;
                self.sink.on_content(event);
                if done {
                    return Ok(());
                }
            }
        }

        if let Some(event) = decoder.finish() {
            self.sink.on_content(event);
        }
        Ok(())
    }

    fn session(&self) -> Result<&TransportSession, ClientError> {
        self.session.as_ref().ok_or(ClientError::NotConfigured)
    }

    fn status(&self, message: impl Into<String>) {
        self.sink.on_status(StatusEvent::new(message));
    }
}

async fn complete(session: &TransportSession, request: &ChatRequest) -> Result<String, ClientError> {
    let response = session.send(request).await?;
    let body = response.text().await.map_err(|e| session.classify(e))?;
    session.adapter().parse_completion(&body)
}

fn build_request(
    system_prompt: &str,
    user_prompt: &str,
    temperature: f32,
    max_tokens: u32,
    streaming: bool,
) -> Result<ChatRequest, ClientError> {
    if user_prompt.trim().is_empty() {
        return Err(ClientError::InvalidArgument(
            "user prompt must not be blank".to_string(),
        ));
    }
    if max_tokens == 0 {
        return Err(ClientError::InvalidArgument(
            "max_tokens must be greater than zero".to_string(),
        ));
    }

    Ok(ChatRequest {
        system_prompt: system_prompt.to_string(),
        user_prompt: user_prompt.to_string(),
        temperature,
        max_tokens,
        streaming,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::CollectingSink;
    use std::collections::HashMap;

    fn client_with_sink() -> (AiClient, Arc<CollectingSink>) {
        let sink = Arc::new(CollectingSink::new());
        let client = AiClient::new(sink.clone()).with_lookup(HashMap::<String, String>::new());
        (client, sink)
    }

    #[test]
    fn test_provider_info_before_and_after_configure() {
        let (mut client, _) = client_with_sink();
        assert_eq!(client.provider_info(), NOT_CONFIGURED);
        assert!(!client.is_configured());

        client
            .configure_provider(ProviderKind::Ollama, None, Some("m"), None)
            .unwrap();
        assert_eq!(client.provider_info(), "provider: Ollama, model: m");
    }

    #[test]
    fn test_configure_emits_status_before_and_after() {
        let (mut client, sink) = client_with_sink();
        client
            .configure(ProviderConfig::new(ProviderKind::OpenAi).with_api_key("sk-test"))
            .unwrap();

        let statuses = sink.statuses();
        assert_eq!(statuses.len(), 2);
        assert!(statuses[0].contains("Configuring OpenAI"));
        assert!(statuses[1].contains("gpt-4o-mini"));
    }

    #[test]
    fn test_configure_replaces_previous_state() {
        let (mut client, _) = client_with_sink();
        client
            .configure(ProviderConfig::new(ProviderKind::OpenAi).with_model("gpt-4o"))
            .unwrap();
        client
            .configure(ProviderConfig::new(ProviderKind::Ollama))
            .unwrap();

        let config = client.config().unwrap();
        assert_eq!(config.provider, ProviderKind::Ollama);
        assert_eq!(config.model, "llama3.2");
        assert_eq!(config.base_url.as_deref(), Some("http://localhost:11434/api"));
    }

    #[tokio::test]
    async fn test_unconfigured_calls_fail_fast() {
        let (client, sink) = client_with_sink();

        let err = client.execute_blocking("", "hello", 0.5, 10).await.unwrap_err();
        assert!(matches!(err, ClientError::NotConfigured));

        let err = client
            .execute_streaming("", "hello", 0.5, 10, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::NotConfigured));
        assert!(sink.events().is_empty());
    }

    #[test]
    fn test_build_request_validation() {
        assert!(matches!(
            build_request("sys", "  \n\t", 0.5, 10, true),
            Err(ClientError::InvalidArgument(_))
        ));
        assert!(matches!(
            build_request("sys", "hi", 0.5, 0, true),
            Err(ClientError::InvalidArgument(_))
        ));

        let request = build_request("sys", "hi", 3.5, 10, false).unwrap();
        assert_eq!(request.temperature, 3.5);
        assert!(!request.streaming);
    }

    #[test]
    fn test_network_error_display() {
        let err = ClientError::Network {
            status: 401,
            body: "invalid api key".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP 401: invalid api key");
    }
}
