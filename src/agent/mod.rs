//! Per-turn conversation pipeline.
//!
//! [`MemoryAgent::chat`] runs one turn through these stages:
//!
//! 1. **ExtractFromInput**: update the running tag set from the user's text.
//! 2. **Retrieve**: rank stored content against the running tags.
//! 3. **Synthesize** (optional): collapse the retrieved texts into one summary.
//! 4. **GenerateResponse**: ask the expert model, with the current time and the
//!    retrieved memory attached to this request only.
//! 5. **ExtractFromResponse**: update the running tags again from the reply.
//! 6. **Persist**: store the user's text and the reply, each tagged with a
//!    marker plus the running tags, in one transaction.
//!
//! A turn works on a copy of [`ConversationState`] that replaces the agent's
//! state only after Persist commits. A failed, timed-out, or dropped turn leaves
//! the running tags and every sub-agent history as they were.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rusqlite::Connection;
use tracing::Instrument;

use crate::config::TagmemConfig;
use crate::llm::{BackendError, CompletionBackend, History, LlmAgent, OllamaBackend};
use crate::memory::search::query_related;
use crate::memory::store::{save_many, NewContent};
use crate::memory::types::RelatedContent;
use crate::tagging::{TagStrategy, Tagger};

/// Marker tag on every stored user utterance.
pub const USER_TAGS: &[&str] = &["user"];
/// Marker tags on every stored agent reply.
pub const AGENT_TAGS: &[&str] = &["agent", "ai"];
/// Synthesis input when retrieval found nothing.
pub const NO_DATA_PLACEHOLDER: &str = "no data yet";

const INTERPRETER_PROMPT: &str = "You are an AI agent that aims to take the information \
    presented by the user and give a short but concise, integrated and clear synthesis of \
    the given information.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnStage {
    ExtractFromInput,
    Retrieve,
    Synthesize,
    GenerateResponse,
    ExtractFromResponse,
    Persist,
}

impl fmt::Display for TurnStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ExtractFromInput => "extract from input",
            Self::Retrieve => "retrieve",
            Self::Synthesize => "synthesize",
            Self::GenerateResponse => "generate response",
            Self::ExtractFromResponse => "extract from response",
            Self::Persist => "persist",
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("{stage} failed: {source}")]
    Backend {
        stage: TurnStage,
        #[source]
        source: BackendError,
    },
    #[error("{stage} failed: storage error: {source}")]
    Storage {
        stage: TurnStage,
        #[source]
        source: rusqlite::Error,
    },
    #[error("turn timed out after {0:?}")]
    Timeout(Duration),
}

impl AgentError {
    /// Stage the turn was in when it failed. `None` for timeouts.
    pub fn stage(&self) -> Option<TurnStage> {
        match self {
            Self::Backend { stage, .. } | Self::Storage { stage, .. } => Some(*stage),
            Self::Timeout(_) => None,
        }
    }
}

fn backend_fault(stage: TurnStage) -> impl FnOnce(BackendError) -> AgentError {
    move |source| AgentError::Backend { stage, source }
}

fn storage_fault(stage: TurnStage) -> impl FnOnce(rusqlite::Error) -> AgentError {
    move |source| AgentError::Storage { stage, source }
}

/// Everything the agent remembers between turns, apart from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationState {
    /// The running tag set: the agent's notion of the current topic.
    pub context_tags: Vec<String>,
    pub tagger: History,
    pub interpreter: History,
    pub expert: History,
}

/// Construction parameters for [`MemoryAgent`].
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub system_prompt: String,
    pub expert_model: String,
    pub tagger_model: String,
    pub interpreter_model: String,
    pub tag_strategy: TagStrategy,
    pub synthesize: bool,
    pub max_context_tags: usize,
    pub short_term_memory_items: usize,
    pub tagger_memory_items: usize,
    pub interpreter_memory_items: usize,
    pub long_term_top_results: usize,
    pub turn_timeout: Option<Duration>,
}

impl From<&TagmemConfig> for AgentSettings {
    fn from(config: &TagmemConfig) -> Self {
        Self {
            system_prompt: config.agent.system_prompt.clone(),
            expert_model: config.models.expert.clone(),
            tagger_model: config.models.tagger.clone(),
            interpreter_model: config.models.interpreter.clone(),
            tag_strategy: config.agent.tag_strategy,
            synthesize: config.agent.synthesize,
            max_context_tags: config.memory.max_context_tags,
            short_term_memory_items: config.memory.short_term_memory_items,
            tagger_memory_items: config.memory.tagger_memory_items,
            interpreter_memory_items: config.memory.interpreter_memory_items,
            long_term_top_results: config.memory.long_term_top_results,
            turn_timeout: config.turn_timeout(),
        }
    }
}

/// A conversational agent with tag-indexed long-term memory.
///
/// Owns its database connection and conversation state; `chat` takes
/// `&mut self`, so turns on one agent never overlap.
pub struct MemoryAgent {
    conn: Connection,
    tagger: Tagger,
    interpreter: Option<LlmAgent>,
    expert: LlmAgent,
    state: ConversationState,
    top_k: usize,
    turn_timeout: Option<Duration>,
}

impl MemoryAgent {
    pub fn new(
        conn: Connection,
        backend: Arc<dyn CompletionBackend>,
        settings: &AgentSettings,
    ) -> Self {
        let tagger = Tagger::new(
            backend.clone(),
            &settings.tagger_model,
            settings.tag_strategy,
            settings.max_context_tags,
        );
        let interpreter = settings.synthesize.then(|| {
            LlmAgent::new(
                backend.clone(),
                settings.interpreter_model.as_str(),
                Some(INTERPRETER_PROMPT.to_string()),
            )
        });
        let expert = LlmAgent::new(
            backend,
            settings.expert_model.as_str(),
            Some(settings.system_prompt.clone()),
        );

        Self {
            conn,
            tagger,
            interpreter,
            expert,
            state: ConversationState {
                context_tags: Vec::new(),
                tagger: History::new(settings.tagger_memory_items),
                interpreter: History::new(settings.interpreter_memory_items),
                expert: History::new(settings.short_term_memory_items),
            },
            top_k: settings.long_term_top_results,
            turn_timeout: settings.turn_timeout,
        }
    }

    /// Open the agent's database and connect to the configured Ollama server.
    pub fn from_config(config: &TagmemConfig) -> anyhow::Result<Self> {
        let backend =
            OllamaBackend::new(&config.backend).context("failed to build backend client")?;
        Self::from_config_with_backend(config, Arc::new(backend))
    }

    /// Like [`from_config`](Self::from_config), with a caller-supplied backend.
    pub fn from_config_with_backend(
        config: &TagmemConfig,
        backend: Arc<dyn CompletionBackend>,
    ) -> anyhow::Result<Self> {
        let conn = crate::db::open_database(config.resolved_db_path())?;
        let agent = Self::new(conn, backend, &AgentSettings::from(config));
        tracing::info!(
            agent = %config.agent.name,
            backend = %config.backend.url,
            expert = agent.expert_model(),
            short_term = agent.state.expert.capacity(),
            strategy = ?agent.tagger.strategy(),
            "agent ready"
        );
        Ok(agent)
    }

    pub fn expert_model(&self) -> &str {
        self.expert.model()
    }

    pub fn context_tags(&self) -> &[String] {
        &self.state.context_tags
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Run one conversation turn and return the agent's reply.
    pub async fn chat(&mut self, user_text: &str) -> Result<String, AgentError> {
        let turn_id = uuid::Uuid::now_v7();
        let span = tracing::info_span!("turn", %turn_id);
        let mut working = self.state.clone();

        let limit = self.turn_timeout;
        let outcome = match limit {
            Some(limit) => tokio::time::timeout(
                limit,
                self.run_turn(&mut working, user_text).instrument(span),
            )
            .await
            .unwrap_or(Err(AgentError::Timeout(limit))),
            None => self.run_turn(&mut working, user_text).instrument(span).await,
        };

        match outcome {
            Ok(reply) => {
                self.state = working;
                Ok(reply)
            }
            Err(e) => {
                tracing::warn!(%turn_id, error = %e, "turn aborted");
                Err(e)
            }
        }
    }

    async fn run_turn(
        &mut self,
        state: &mut ConversationState,
        user_text: &str,
    ) -> Result<String, AgentError> {
        state.context_tags = self
            .tagger
            .update(&mut state.tagger, &state.context_tags, user_text)
            .await
            .map_err(backend_fault(TurnStage::ExtractFromInput))?;
        tracing::debug!(tags = ?state.context_tags, "tags from input");

        let related = query_related(&self.conn, &state.context_tags, self.top_k)
            .map_err(storage_fault(TurnStage::Retrieve))?;
        tracing::debug!(rows = related.len(), "memory retrieved");

        let memory_context = match &self.interpreter {
            Some(interpreter) => {
                let material = if related.is_empty() {
                    NO_DATA_PLACEHOLDER.to_string()
                } else {
                    related
                        .iter()
                        .map(|r| r.text.as_str())
                        .collect::<Vec<_>>()
                        .join("\n\n")
                };
                interpreter
                    .chat(&mut state.interpreter, &material, None)
                    .await
                    .map_err(backend_fault(TurnStage::Synthesize))?
            }
            None => render_memory(&related),
        };

        let context = format!(
            "Current date and time: {}\nCONTEXT FROM LONG TERM MEMORY: {memory_context}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
        );
        let reply = self
            .expert
            .chat(&mut state.expert, user_text, Some(&context))
            .await
            .map_err(backend_fault(TurnStage::GenerateResponse))?;
        if reply.is_empty() {
            return Err(backend_fault(TurnStage::GenerateResponse)(
                BackendError::EmptyReply,
            ));
        }

        state.context_tags = self
            .tagger
            .update(&mut state.tagger, &state.context_tags, &reply)
            .await
            .map_err(backend_fault(TurnStage::ExtractFromResponse))?;
        tracing::debug!(tags = ?state.context_tags, "tags from response");

        let items = [
            NewContent::new(
                format!("user said: {user_text}"),
                with_markers(USER_TAGS, &state.context_tags),
            ),
            NewContent::new(
                format!("agent said: {reply}"),
                with_markers(AGENT_TAGS, &state.context_tags),
            ),
        ];
        let ids = save_many(&mut self.conn, &items).map_err(storage_fault(TurnStage::Persist))?;
        tracing::info!(content_ids = ?ids, tags = ?state.context_tags, "turn persisted");

        Ok(reply)
    }
}

fn with_markers(markers: &[&str], tags: &[String]) -> Vec<String> {
    markers
        .iter()
        .map(|m| m.to_string())
        .chain(tags.iter().cloned())
        .collect()
}

/// Retrieved rows as the expert sees them, most relevant first.
fn render_memory(related: &[RelatedContent]) -> String {
    related
        .iter()
        .map(|r| format!("Created at: {}\nContent: {}", r.created_at, r.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_come_first() {
        let tags = vec!["hiking".to_string()];
        assert_eq!(with_markers(AGENT_TAGS, &tags), vec!["agent", "ai", "hiking"]);
    }

    #[test]
    fn render_memory_lists_rows_in_rank_order() {
        let row = |id: i64, text: &str| RelatedContent {
            id,
            text: text.to_string(),
            points: 0,
            tags: vec![],
            created_at: format!("2025-01-0{id}T00:00:00.000Z"),
            tag_match_count: 1,
        };
        let rendered = render_memory(&[row(2, "second"), row(1, "first")]);
        assert_eq!(
            rendered,
            "Created at: 2025-01-02T00:00:00.000Z\nContent: second\n\n\
             Created at: 2025-01-01T00:00:00.000Z\nContent: first"
        );
    }

    #[test]
    fn render_memory_of_nothing_is_empty() {
        assert_eq!(render_memory(&[]), "");
    }

    #[test]
    fn error_reports_stage() {
        let err = backend_fault(TurnStage::Synthesize)(BackendError::EmptyReply);
        assert_eq!(err.stage(), Some(TurnStage::Synthesize));
        assert_eq!(
            err.to_string(),
            "synthesize failed: backend returned an empty reply"
        );
        assert_eq!(AgentError::Timeout(Duration::from_secs(1)).stage(), None);
    }
}
