use std::sync::Arc;

use super::{collect_reply, strip_reasoning, BackendError, ChatMessage, CompletionBackend, History};

/// A language-model-backed sub-agent: one model plus an optional system prompt.
///
/// The agent itself is stateless; conversational memory lives in the
/// [`History`] the caller passes to [`LlmAgent::chat`].
#[derive(Clone)]
pub struct LlmAgent {
    backend: Arc<dyn CompletionBackend>,
    model: String,
    system_prompt: Option<String>,
}

impl LlmAgent {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        model: impl Into<String>,
        system_prompt: Option<String>,
    ) -> Self {
        Self {
            backend,
            model: model.into(),
            system_prompt,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `input` after the system prompt and the retained history.
    ///
    /// `context` is appended to this request only; the history records the
    /// plain `input` and the cleaned reply. On error the history is untouched.
    pub async fn chat(
        &self,
        history: &mut History,
        input: &str,
        context: Option<&str>,
    ) -> Result<String, BackendError> {
        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        if let Some(prompt) = &self.system_prompt {
            messages.push(ChatMessage::system(prompt.as_str()));
        }
        messages.extend(history.messages());
        messages.push(ChatMessage::user(match context {
            Some(context) => format!("{input}\n\n{context}"),
            None => input.to_string(),
        }));

        let fragments = self.backend.complete(&self.model, &messages).await?;
        let raw = collect_reply(fragments).await?;
        let reply = strip_reasoning(&raw).to_string();

        tracing::debug!(model = %self.model, reply_len = reply.len(), "completion received");
        history.push(input, reply.as_str());
        Ok(reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{FragmentStream, Role};
    use async_trait::async_trait;
    use futures::{stream, StreamExt};
    use std::sync::Mutex;

    /// Echoes the last message back and remembers every request.
    #[derive(Default)]
    struct EchoBackend {
        seen: Mutex<Vec<Vec<ChatMessage>>>,
        fail: bool,
    }

    #[async_trait]
    impl CompletionBackend for EchoBackend {
        async fn complete(
            &self,
            _model: &str,
            messages: &[ChatMessage],
        ) -> Result<FragmentStream, BackendError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            if self.fail {
                return Err(BackendError::Remote("model not found".into()));
            }
            let last = messages.last().map(|m| m.content.clone()).unwrap_or_default();
            Ok(stream::iter(vec![Ok("<think>x</think>".to_string()), Ok(last)]).boxed())
        }
    }

    #[tokio::test]
    async fn context_is_sent_but_not_remembered() {
        let backend = Arc::new(EchoBackend::default());
        let agent = LlmAgent::new(backend.clone(), "m", Some("be brief".into()));
        let mut history = History::new(4);

        let reply = agent
            .chat(&mut history, "hello", Some("Current date and time: now"))
            .await
            .unwrap();
        assert_eq!(reply, "hello\n\nCurrent date and time: now");

        let sent = backend.seen.lock().unwrap()[0].clone();
        assert_eq!(sent[0], ChatMessage::system("be brief"));
        assert_eq!(sent[1].role, Role::User);

        let remembered: Vec<ChatMessage> = history.messages().collect();
        assert_eq!(remembered[0], ChatMessage::user("hello"));
    }

    #[tokio::test]
    async fn history_is_replayed_on_next_call() {
        let backend = Arc::new(EchoBackend::default());
        let agent = LlmAgent::new(backend.clone(), "m", None);
        let mut history = History::new(1);

        agent.chat(&mut history, "first", None).await.unwrap();
        agent.chat(&mut history, "second", None).await.unwrap();

        let sent = backend.seen.lock().unwrap()[1].clone();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0], ChatMessage::user("first"));
        assert_eq!(sent[2], ChatMessage::user("second"));
    }

    #[tokio::test]
    async fn failure_leaves_history_untouched() {
        let backend = Arc::new(EchoBackend {
            fail: true,
            ..Default::default()
        });
        let agent = LlmAgent::new(backend, "m", None);
        let mut history = History::new(2);

        assert!(agent.chat(&mut history, "hello", None).await.is_err());
        assert!(history.is_empty());
    }
}
