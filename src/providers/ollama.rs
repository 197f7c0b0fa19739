//! Ollama adapter.
//!
//! Streamed chat responses are newline-delimited JSON, one object per line:
//! ```text
//! {"model":"llama3.2","message":{"role":"assistant","content":"Hel"},"done":false}
//! {"model":"llama3.2","message":{"role":"assistant","content":"lo"},"done":false}
//! {"model":"llama3.2","message":{"role":"assistant","content":""},"done":true}
//! ```
//!
//! Non-streaming calls use the single-prompt `generate` endpoint instead.
//! Reference: <https://github.com/ollama/ollama/blob/main/docs/api.md>

use serde::{Deserialize, Serialize};

use crate::client::{ClientError, ProviderAdapter};
use crate::model::{ChatMessage, ChatRequest, StreamEvent};
use crate::options::ProviderKind;

/// Placeholder content when `generate` answers without a `response` field.
pub const NO_RESPONSE: &str = "No response received";

/// Adapter for Ollama's native HTTP API.
#[derive(Debug, Clone, Copy, Default)]
pub struct OllamaAdapter;

impl ProviderAdapter for OllamaAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Ollama
    }

    fn endpoint(&self, base_url: &str, streaming: bool) -> String {
        if streaming {
            format!("{}/chat", base_url)
        } else {
            format!("{}/generate", base_url)
        }
    }

    fn request_body(
        &self,
        model: &str,
        request: &ChatRequest,
    ) -> Result<serde_json::Value, ClientError> {
        let body = if request.streaming {
            serde_json::to_value(OllamaChatRequest {
                model: model.to_string(),
                messages: request.messages(),
                stream: true,
                options: OllamaOptions {
                    temperature: request.temperature,
                    num_predict: request.max_tokens,
                },
            })?
        } else {
            serde_json::to_value(OllamaGenerateRequest {
                model: model.to_string(),
                prompt: request.user_prompt.clone(),
                stream: false,
            })?
        };
        Ok(body)
    }

    /// Content and `done` are independent: the last line may carry both, in
    /// which case the delta comes before the terminal event.
    fn decode_frame(&self, line: &str) -> Result<Vec<StreamEvent>, ClientError> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Vec::new());
        }

        let chunk: OllamaChatChunk = serde_json::from_str(line)
            .map_err(|e| ClientError::Protocol(format!("{} | Input: {}", e, line)))?;

        let mut events: Vec<StreamEvent> = chunk
            .message
            .and_then(|m| m.content)
            .filter(|content| !content.is_empty())
            .map(StreamEvent::delta)
            .into_iter()
            .collect();
        if chunk.done {
            events.push(StreamEvent::complete());
        }
        Ok(events)
    }

    fn parse_completion(&self, body: &str) -> Result<String, ClientError> {
        let response: OllamaGenerateResponse = serde_json::from_str(body)?;
        Ok(response
            .response
            .unwrap_or_else(|| NO_RESPONSE.to_string()))
    }
}

// --- Ollama API Request/Response Types ---

#[derive(Debug, Clone, Serialize)]
struct OllamaChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Debug, Clone, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Debug, Clone, Serialize)]
struct OllamaGenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaGenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    message: Option<OllamaChunkMessage>,
    #[serde(default)]
    done: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct OllamaChunkMessage {
    #[serde(default)]
    content: Option<String>,
}
