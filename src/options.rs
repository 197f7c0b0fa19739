//! Provider selection, transport options and named configuration lookup.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::client::{ClientError, ProviderAdapter};
use crate::providers::{OllamaAdapter, OpenAiAdapter};

/// Lookup name for the OpenAI-style base URL.
pub const OPENAI_BASE_URL: &str = "OPENAI_BASE_URL";
/// Lookup name for the OpenAI-style API key.
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
/// Lookup name for the Ollama-style base URL.
pub const OLLAMA_BASE_URL: &str = "OLLAMA_BASE_URL";

/// Default request timeout applied to every call.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    /// Create a new secret string.
    pub fn new(s: String) -> Self {
        Self(s)
    }

    /// Get the underlying secret value.
    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// The backend family a client talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ProviderKind {
    /// `POST {base}/chat/completions`, SSE framing, bearer auth.
    OpenAi,
    /// `POST {base}/chat`, NDJSON framing, no auth.
    Ollama,
}

impl ProviderKind {
    /// The adapter that owns request construction and frame decoding for this kind.
    pub fn adapter(self) -> &'static dyn ProviderAdapter {
        match self {
            ProviderKind::OpenAi => &OpenAiAdapter,
            ProviderKind::Ollama => &OllamaAdapter,
        }
    }

    /// Lookup name consulted for the base URL when none is given explicitly.
    pub fn base_url_key(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => OPENAI_BASE_URL,
            ProviderKind::Ollama => OLLAMA_BASE_URL,
        }
    }

    /// Lookup name consulted for the API key, if this kind uses one.
    pub fn api_key_key(self) -> Option<&'static str> {
        match self {
            ProviderKind::OpenAi => Some(OPENAI_API_KEY),
            ProviderKind::Ollama => None,
        }
    }

    pub fn default_base_url(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "https://api.openai.com/v1",
            ProviderKind::Ollama => "http://localhost:11434/api",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Ollama => "llama3.2",
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::OpenAi => f.write_str("OpenAI"),
            ProviderKind::Ollama => f.write_str("Ollama"),
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "ollama" => Ok(ProviderKind::Ollama),
            _ => Err(ClientError::UnsupportedProvider(s.to_string())),
        }
    }
}

/// Provider configuration held by an [`AiClient`](crate::client::AiClient).
///
/// `api_key` and `base_url` are optional here; whatever is missing is resolved
/// through a [`ConfigLookup`] when the configuration is installed.
///
/// # Example
/// ```rust
/// use tabchat::options::{ProviderConfig, ProviderKind};
///
/// let config = ProviderConfig::new(ProviderKind::Ollama)
///     .with_model("mistral")
///     .with_base_url("http://gpu-box:11434/api");
/// assert_eq!(config.model, "mistral");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfig {
    pub provider: ProviderKind,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
}

impl ProviderConfig {
    /// Create a configuration with the provider's default model.
    pub fn new(provider: ProviderKind) -> Self {
        Self {
            provider,
            api_key: None,
            base_url: None,
            model: provider.default_model().to_string(),
        }
    }

    /// Set the API key.
    pub fn with_api_key(mut self, api_key: impl Into<SecretString>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Set the base URL.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Set the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Fill in base URL and API key: explicit value, then lookup, then default.
    pub fn resolve(mut self, lookup: &dyn ConfigLookup) -> Self {
        let base_url = self
            .base_url
            .take()
            .or_else(|| lookup.lookup(self.provider.base_url_key()))
            .unwrap_or_else(|| self.provider.default_base_url().to_string());
        self.base_url = Some(base_url.trim_end_matches('/').to_string());

        if self.api_key.is_none() {
            self.api_key = self
                .provider
                .api_key_key()
                .and_then(|key| lookup.lookup(key))
                .filter(|key| !key.is_empty())
                .map(SecretString::from);
        }
        self
    }
}

/// Transport configuration applied to every session a client opens.
#[derive(Debug, Clone)]
pub struct TransportOptions {
    /// Client-wide request timeout
    pub timeout: Duration,

    /// HTTP proxy URL
    pub proxy: Option<String>,

    /// Additional HTTP headers to include in requests
    pub extra_headers: Option<HashMap<String, String>>,
}

impl Default for TransportOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            proxy: None,
            extra_headers: None,
        }
    }
}

impl TransportOptions {
    /// Set the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the proxy URL.
    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Add a single extra header.
    pub fn with_header(mut self, key: String, value: String) -> Self {
        self.extra_headers
            .get_or_insert_with(HashMap::new)
            .insert(key, value);
        self
    }
}

/// Named key-value source for base URLs and API keys.
///
/// The client only needs `lookup(name)`; the backing store (settings file,
/// environment, registry) belongs to the embedding application.
pub trait ConfigLookup: Send + Sync {
    fn lookup(&self, name: &str) -> Option<String>;
}

/// Reads names straight from the process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvLookup;

impl ConfigLookup for EnvLookup {
    fn lookup(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl ConfigLookup for HashMap<String, String> {
    fn lookup(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

impl<F> ConfigLookup for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn lookup(&self, name: &str) -> Option<String> {
        self(name)
    }
}
