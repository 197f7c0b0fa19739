//! # tabchat - streaming chat client for model-analysis tools
//!
//! Talks to two structurally different chat backends behind one contract and
//! delivers partial results to a consumer while staying cancellable.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - OpenAI-style (`/chat/completions`, SSE) and Ollama-style (`/chat`, NDJSON) backends
//! - Incremental decoding of the live body, one line at a time
//! - Malformed frames are skipped, never fatal
//! - Cooperative cancellation via `CancellationToken`
//!
//! ## Architecture
//!
//! - **`ProviderAdapter`**: request shape and frame decoding per backend
//!   ([`OpenAiAdapter`](providers::OpenAiAdapter), [`OllamaAdapter`](providers::OllamaAdapter))
//! - **`FrameDecoder`**: turns lines into [`StreamEvent`]s and tracks the terminal event
//! - **`TransportSession`**: one HTTP client bound to a resolved configuration
//! - **`AiClient`**: validates calls, drives the read loop, reports to an [`EventSink`]
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use tabchat::{AiClient, ProviderConfig, ProviderKind};
//! use tabchat::sink::FnSink;
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sink = FnSink::new(
//!         |status| eprintln!("[{}]", status.message),
//!         |event| print!("{}", event.delta),
//!     );
//!
//!     let mut client = AiClient::new(Arc::new(sink));
//!     client.configure(
//!         ProviderConfig::new(ProviderKind::OpenAi)
//!             .with_api_key("your-api-key")
//!             .with_model("gpt-4o-mini"),
//!     )?;
//!     println!("{}", client.provider_info());
//!
//!     client
//!         .execute_streaming(
//!             "You explain DAX expressions.",
//!             "Explain: CALCULATE(SUM(Sales[Amount]), ALL(Date))",
//!             0.3,
//!             800,
//!             &CancellationToken::new(),
//!         )
//!         .await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod http;
pub mod model;
pub mod options;
pub mod providers;
pub mod sink;
pub mod sse;
pub mod stream;

// Re-exports for convenience
pub use client::{AiClient, ClientError, ProviderAdapter};
pub use model::{ChatRequest, ChatResponse, StatusEvent, StreamEvent};
pub use options::{ConfigLookup, ProviderConfig, ProviderKind};
pub use sink::EventSink;
pub use stream::FrameDecoder;
