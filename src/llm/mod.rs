//! Text-completion layer.
//!
//! [`CompletionBackend`] is the seam to the remote model: it takes role-tagged
//! messages and yields a [`FragmentStream`] of partial text. [`LlmAgent`] wraps a
//! backend with a model name and system prompt, reassembles the fragments, strips
//! any reasoning trace, and records the exchange in a caller-owned [`History`].

pub mod agent;
pub mod history;
pub mod observed;
pub mod ollama;

pub use agent::LlmAgent;
pub use history::History;
pub use observed::{FragmentObserver, ObservedBackend};
pub use ollama::OllamaBackend;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};

/// Closing marker of a reasoning trace some models emit before their answer.
pub const THINK_CLOSE: &str = "</think>";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
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

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("backend returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("stream interrupted: {0}")]
    Stream(String),
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("backend reported an error: {0}")]
    Remote(String),
    #[error("backend returned an empty reply")]
    EmptyReply,
}

/// Lazy, finite sequence of text fragments. Dropping it cancels delivery.
pub type FragmentStream = BoxStream<'static, Result<String, BackendError>>;

#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Start a completion for `messages` with `model`. A non-streaming backend
    /// yields the whole reply as a single fragment.
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<FragmentStream, BackendError>;
}

/// Concatenate every fragment. The first error aborts collection.
pub async fn collect_reply(mut fragments: FragmentStream) -> Result<String, BackendError> {
    let mut reply = String::new();
    while let Some(fragment) = fragments.next().await {
        reply.push_str(&fragment?);
    }
    Ok(reply)
}

/// Drop everything up to and including the first [`THINK_CLOSE`], then trim.
pub fn strip_reasoning(text: &str) -> &str {
    match text.split_once(THINK_CLOSE) {
        Some((_, answer)) => answer.trim(),
        None => text.trim(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[test]
    fn strip_reasoning_removes_trace() {
        assert_eq!(
            strip_reasoning("<think>\nuser wants tags\n</think>\n\nhiking, outdoors"),
            "hiking, outdoors"
        );
    }

    #[test]
    fn strip_reasoning_without_trace_only_trims() {
        assert_eq!(strip_reasoning("  plain answer \n"), "plain answer");
    }

    #[test]
    fn strip_reasoning_cuts_at_first_marker() {
        assert_eq!(strip_reasoning("a</think>b</think>c"), "b</think>c");
    }

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&ChatMessage::assistant("ok")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"ok"}"#);
    }

    #[tokio::test]
    async fn collect_reply_concatenates_fragments() {
        let fragments: FragmentStream = stream::iter(vec![
            Ok("<thi".to_string()),
            Ok("nk>hm</think> Hel".to_string()),
            Ok("lo".to_string()),
        ])
        .boxed();

        let reply = collect_reply(fragments).await.unwrap();
        assert_eq!(strip_reasoning(&reply), "Hello");
    }

    #[tokio::test]
    async fn collect_reply_stops_at_first_error() {
        let fragments: FragmentStream = stream::iter(vec![
            Ok("partial".to_string()),
            Err(BackendError::Stream("connection reset".into())),
            Ok("never read".to_string()),
        ])
        .boxed();

        let err = collect_reply(fragments).await.unwrap_err();
        assert!(matches!(err, BackendError::Stream(_)));
    }
}
