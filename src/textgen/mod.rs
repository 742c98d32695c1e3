//! Text generation collaborator.
//!
//! A trait-based abstraction over a chat completions endpoint, with an
//! OpenAI-compatible implementation that falls back across an ordered model list.

mod client;
mod error;
mod proposals;

pub use client::ChatCompletionsClient;
pub use error::{classify_http_status, TextGenError, TextGenErrorKind};
pub use proposals::{
    extract_json, RewriteProposal, StatusUpdate, TagSuggestion, TaskAssistant, TaskProposal, Tone,
    AVAILABLE_LABELS,
};

use async_trait::async_trait;

/// Anything that can answer a system + user prompt pair with text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String, TextGenError>;
}
