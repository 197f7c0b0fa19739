//! Provider adapters.
//!
//! Each adapter owns its request shape and its response framing; the client
//! drives them through [`ProviderAdapter`](crate::client::ProviderAdapter).

pub mod ollama;
pub mod openai;

// Re-export for convenience
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;
