//! HTTP client construction and the per-configuration transport session.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder};
use tracing::{debug, warn};

use crate::client::{ClientError, ProviderAdapter};
use crate::model::ChatRequest;
use crate::options::{ProviderConfig, TransportOptions};

/// Sent as `User-Agent` on every request.
pub const USER_AGENT: &str = concat!("tabchat/", env!("CARGO_PKG_VERSION"));

/// Name of the fixed identifying header.
pub const CLIENT_NAME_HEADER: &str = "x-client-name";

/// Value of the fixed identifying header.
pub const CLIENT_NAME: &str = "tabchat";

/// Build a configured HTTP client from transport options.
///
/// This applies the connect timeout, the proxy and the identifying headers.
/// There is no client-wide request deadline; [`TransportSession::send`]
/// bounds each request.
pub fn build_http_client(transport_options: &TransportOptions) -> Result<Client, reqwest::Error> {
    let mut default_headers = HeaderMap::new();
    default_headers.insert(CLIENT_NAME_HEADER, HeaderValue::from_static(CLIENT_NAME));

    let mut builder = Client::builder()
        .connect_timeout(transport_options.timeout)
        .user_agent(USER_AGENT)
        .default_headers(default_headers);

    if let Some(proxy_url) = &transport_options.proxy {
        if let Ok(proxy) = reqwest::Proxy::all(proxy_url) {
            builder = builder.proxy(proxy);
        }
    }

    builder.build()
}

/// Add extra headers to a request if specified in transport options.
pub fn add_extra_headers(
    mut request: RequestBuilder,
    extra_headers: &Option<HashMap<String, String>>,
) -> RequestBuilder {
    if let Some(headers) = extra_headers {
        for (key, value) in headers {
            request = request.header(key, value);
        }
    }
    request
}

/// One HTTP transport bound to a resolved provider configuration.
///
/// Owned exclusively by the client that opened it. Dropping the session
/// releases the connection pool and the credential.
pub struct TransportSession {
    http: Client,
    config: ProviderConfig,
    base_url: String,
    timeout: Duration,
    extra_headers: Option<HashMap<String, String>>,
}

impl TransportSession {
    /// Open a session for an already resolved configuration.
    pub fn open(config: ProviderConfig, options: &TransportOptions) -> Result<Self, ClientError> {
        let base_url = config
            .base_url
            .clone()
            .unwrap_or_else(|| config.provider.default_base_url().to_string());

        let http = build_http_client(options)
            .map_err(|e| ClientError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http,
            config,
            base_url,
            timeout: options.timeout,
            extra_headers: options.extra_headers.clone(),
        })
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn adapter(&self) -> &'static dyn ProviderAdapter {
        self.config.provider.adapter()
    }

    /// Post the request and check the status.
    ///
    /// The timeout bounds the wait for response headers. Streaming bodies are
    /// then read without a deadline; non-streaming requests keep the timeout
    /// until the body has been read. A non-2xx status is turned into
    /// [`ClientError::Network`] carrying the status code and the response body.
    pub async fn send(&self, request: &ChatRequest) -> Result<reqwest::Response, ClientError> {
        let adapter = self.adapter();
        let url = adapter.endpoint(&self.base_url, request.streaming);
        let body = adapter.request_body(&self.config.model, request)?;

        debug!(
            url = %url,
            provider = %self.config.provider,
            model = %self.config.model,
            streaming = request.streaming,
            "sending chat request"
        );

        let mut req = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json");
        req = adapter.authorize(req, self.config.api_key.as_ref());
        req = add_extra_headers(req, &self.extra_headers);
        if !request.streaming {
            req = req.timeout(self.timeout);
        }

        let response = tokio::time::timeout(self.timeout, req.json(&body).send())
            .await
            .map_err(|_| ClientError::Timeout(self.timeout))?
            .map_err(|e| self.classify(e))?;
        let status = response.status();

        if !status.is_success() {
            let body = tokio::time::timeout(self.timeout, response.text())
                .await
                .ok()
                .and_then(Result::ok)
                .unwrap_or_default();
            warn!(status = status.as_u16(), url = %url, "backend returned error status");
            return Err(ClientError::Network {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    /// Map a transport error, surfacing timeouts as [`ClientError::Timeout`].
    pub fn classify(&self, error: reqwest::Error) -> ClientError {
        if error.is_timeout() {
            ClientError::Timeout(self.timeout)
        } else {
            ClientError::Http(error)
        }
    }
}

impl Drop for TransportSession {
    fn drop(&mut self) {
        debug!(provider = %self.config.provider, base_url = %self.base_url, "transport session closed");
    }
}

impl std::fmt::Debug for TransportSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportSession")
            .field("config", &self.config)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::ProviderKind;

    #[test]
    fn test_build_http_client() {
        let transport_options = TransportOptions::default().with_timeout(Duration::from_secs(30));
        assert!(build_http_client(&transport_options).is_ok());
    }

    #[test]
    fn test_build_http_client_with_proxy() {
        let transport_options =
            TransportOptions::default().with_proxy("http://proxy.example.com:8080".to_string());
        assert!(build_http_client(&transport_options).is_ok());
    }

    #[test]
    fn test_user_agent_carries_version() {
        assert!(USER_AGENT.starts_with("tabchat/"));
        assert!(USER_AGENT.len() > "tabchat/".len());
    }

    #[test]
    fn test_session_keeps_resolved_base_url() {
        let config = ProviderConfig::new(ProviderKind::Ollama)
            .with_base_url("http://127.0.0.1:9/api");
        let session = TransportSession::open(config, &TransportOptions::default()).unwrap();

        assert_eq!(session.base_url(), "http://127.0.0.1:9/api");
        assert_eq!(session.adapter().kind(), ProviderKind::Ollama);
        assert_eq!(session.config().model, "llama3.2");
    }

    #[test]
    fn test_session_debug_hides_key() {
        let config = ProviderConfig::new(ProviderKind::OpenAi).with_api_key("sk-secret");
        let session = TransportSession::open(config, &TransportOptions::default()).unwrap();
        assert!(!format!("{:?}", session).contains("sk-secret"));
    }
}
