//! Data models shared by every provider: requests, responses and events.

use serde::{Deserialize, Serialize};

/// Role of the message sender.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// A single chat message as sent on the wire by both chat protocols.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// A single chat call, built once per call and never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    /// System instructions
    pub system_prompt: String,

    /// User prompt, never blank
    pub user_prompt: String,

    /// Sampling temperature, passed through unchecked
    pub temperature: f32,

    /// Maximum tokens to generate, always > 0
    pub max_tokens: u32,

    /// Whether the response is streamed
    pub streaming: bool,
}

impl ChatRequest {
    /// The two-message conversation every chat endpoint receives.
    pub fn messages(&self) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(self.system_prompt.clone()),
            ChatMessage::user(self.user_prompt.clone()),
        ]
    }
}

/// Terminal value of a non-streaming call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    pub fn ok(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            content: String::new(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// One incremental piece of streamed content.
///
/// A call produces zero or more non-terminal events followed by at most one
/// terminal event (`is_complete == true`, empty `delta`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamEvent {
    pub delta: String,
    pub is_complete: bool,
}

impl StreamEvent {
    pub fn delta(delta: impl Into<String>) -> Self {
        Self {
            delta: delta.into(),
            is_complete: false,
        }
    }

    pub fn complete() -> Self {
        Self {
            delta: String::new(),
            is_complete: true,
        }
    }
}

/// Advisory lifecycle message; not part of the content contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub message: String,
}

impl StatusEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_order() {
        let request = ChatRequest {
            system_prompt: "You explain DAX.".to_string(),
            user_prompt: "What is CALCULATE?".to_string(),
            temperature: 0.2,
            max_tokens: 64,
            streaming: true,
        };

        let messages = request.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert_eq!(messages[1], ChatMessage::user("What is CALCULATE?"));
    }

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_value(ChatMessage::system("x")).unwrap();
        assert_eq!(json["role"], "system");
    }

    #[test]
    fn test_failed_response_has_error() {
        let response = ChatResponse::failed("boom");
        assert!(!response.success);
        assert_eq!(response.error.as_deref(), Some("boom"));
        assert!(response.content.is_empty());
    }
}
