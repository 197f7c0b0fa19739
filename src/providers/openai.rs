//! OpenAI Chat Completions adapter.
//!
//! Requests go to `{base}/chat/completions` with a bearer key. Streamed
//! responses arrive as server-sent events:
//! ```text
//! data: {"choices":[{"delta":{"content":"Hel"}}]}
//! data: {"choices":[{"delta":{"content":"lo"}}]}
//! data: [DONE]
//! ```
//! See: <https://platform.openai.com/docs/api-reference/chat/streaming>

use reqwest::header::AUTHORIZATION;
use reqwest::RequestBuilder;
use serde::{Deserialize, Serialize};

use crate::client::{ClientError, ProviderAdapter};
use crate::model::{ChatMessage, ChatRequest, StreamEvent};
use crate::options::{ProviderKind, SecretString};
use crate::sse::{is_done_marker, parse_sse_line};

/// Adapter for OpenAI-compatible chat completion endpoints.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiAdapter;

impl ProviderAdapter for OpenAiAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn endpoint(&self, base_url: &str, _streaming: bool) -> String {
        format!("{}/chat/completions", base_url)
    }

    fn request_body(
        &self,
        model: &str,
        request: &ChatRequest,
    ) -> Result<serde_json::Value, ClientError> {
        let body = OpenAiRequest {
            model: model.to_string(),
            messages: request.messages(),
            temperature: request.temperature,
            max_completion_tokens: request.max_tokens,
            stream: request.streaming,
        };
        Ok(serde_json::to_value(body)?)
    }

    fn decode_frame(&self, line: &str) -> Result<Vec<StreamEvent>, ClientError> {
        let Some(payload) = parse_sse_line(line) else {
            return Ok(Vec::new());
        };

        if is_done_marker(payload) {
            return Ok(vec![StreamEvent::complete()]);
        }

        let chunk: OpenAiStreamChunk = serde_json::from_str(payload)
            .map_err(|e| ClientError::Protocol(format!("{} | Input: {}", e, payload)))?;

        Ok(chunk
            .choices
            .into_iter()
            .find_map(|choice| {
                choice
                    .delta
                    .and_then(|d| d.content)
                    .filter(|content| !content.is_empty())
            })
            .map(StreamEvent::delta)
            .into_iter()
            .collect())
    }

    fn parse_completion(&self, body: &str) -> Result<String, ClientError> {
        let response: OpenAiResponse = serde_json::from_str(body)?;
        response
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content.unwrap_or_default())
            .ok_or_else(|| ClientError::Protocol("response contained no choices".to_string()))
    }

    fn authorize(&self, request: RequestBuilder, api_key: Option<&SecretString>) -> RequestBuilder {
        match api_key {
            Some(key) => request.header(AUTHORIZATION, format!("Bearer {}", key.expose_secret())),
            None => request,
        }
    }
}

// --- OpenAI API Request/Response Types ---

#[derive(Debug, Clone, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_completion_tokens: u32,
    stream: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiResponse {
    #[serde(default)]
    choices: Vec<OpenAiChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiMessage {
    #[serde(default)]
    content: Option<String>,
}

// --- OpenAI Streaming Response Types ---

#[derive(Debug, Clone, Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiStreamChoice {
    #[serde(default)]
    delta: Option<OpenAiDelta>,
}

#[derive(Debug, Clone, Deserialize)]
struct OpenAiDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(streaming: bool) -> ChatRequest {
        ChatRequest {
            system_prompt: "Explain measures.".to_string(),
            user_prompt: "SUM(Sales[Amount])".to_string(),
            temperature: 0.7,
            max_tokens: 256,
            streaming,
        }
    }

    #[test]
    fn test_request_body_shape() {
        let body = OpenAiAdapter.request_body("gpt-4o", &request(true)).unwrap();

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "Explain measures.");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "SUM(Sales[Amount])");
        assert_eq!(body["max_completion_tokens"], 256);
        assert_eq!(body["stream"], true);
        assert!((body["temperature"].as_f64().unwrap() - 0.7).abs() < 1e-6);
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn test_endpoint() {
        assert_eq!(
            OpenAiAdapter.endpoint("https://api.openai.com/v1", true),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_decode_content_frame() {
        let event = OpenAiAdapter
            .decode_frame(r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#)
            .unwrap();
        assert_eq!(event, vec![StreamEvent::delta("Hi")]);
    }

    #[test]
    fn test_decode_done_sentinel() {
        let event = OpenAiAdapter.decode_frame("data: [DONE]").unwrap();
        assert_eq!(event, vec![StreamEvent::complete()]);
    }

    #[test]
    fn test_decode_ignores_non_data_lines() {
        assert!(OpenAiAdapter.decode_frame(": keep-alive").unwrap().is_empty());
        assert!(OpenAiAdapter.decode_frame("event: message").unwrap().is_empty());
        assert!(OpenAiAdapter.decode_frame(r#"{"choices":[]}"#).unwrap().is_empty());
    }

    #[test]
    fn test_decode_empty_or_missing_content() {
        let role_only = r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert!(OpenAiAdapter.decode_frame(role_only).unwrap().is_empty());

        let empty = r#"data: {"choices":[{"delta":{"content":""}}]}"#;
        assert!(OpenAiAdapter.decode_frame(empty).unwrap().is_empty());

        let no_choices = r#"data: {"id":"chatcmpl-1","choices":[]}"#;
        assert!(OpenAiAdapter.decode_frame(no_choices).unwrap().is_empty());
    }

    #[test]
    fn test_decode_skips_choices_with_empty_content() {
        let frame = r#"data: {"choices":[{"delta":{"content":""}},{"delta":{"content":"x"}}]}"#;
        assert_eq!(
            OpenAiAdapter.decode_frame(frame).unwrap(),
            vec![StreamEvent::delta("x")]
        );
    }

    #[test]
    fn test_decode_malformed_payload_is_protocol_error() {
        let err = OpenAiAdapter.decode_frame("data: {not json").unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }

    #[test]
    fn test_parse_completion_first_choice() {
        let body = r#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"Total sales."}},{"index":1,"message":{"content":"other"}}]}"#;
        assert_eq!(OpenAiAdapter.parse_completion(body).unwrap(), "Total sales.");
    }

    #[test]
    fn test_parse_completion_without_choices() {
        let err = OpenAiAdapter.parse_completion(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, ClientError::Protocol(_)));
    }
}
