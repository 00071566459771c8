#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::{stream, StreamExt};
use rusqlite::Connection;
use tagmem::agent::{AgentSettings, MemoryAgent};
use tagmem::llm::{BackendError, ChatMessage, CompletionBackend, FragmentStream};
use tagmem::tagging::TagStrategy;

pub const EXPERT_REPLY: &str = "Hiking sounds lovely.";
pub const SYNTHESIS_REPLY: &str = "The user enjoys hiking.";

/// Open a fresh in-memory database with the schema applied.
pub fn test_db() -> Connection {
    tagmem::db::open_memory_database().unwrap()
}

/// Save one content item directly through the store. Returns its id.
pub fn insert_content(conn: &mut Connection, text: &str, tags: &[&str]) -> i64 {
    tagmem::memory::store::save_content_with_tags(conn, text, tags).unwrap()
}

pub fn set_points(conn: &Connection, id: i64, points: i64) {
    conn.execute(
        "UPDATE content SET points = ?1 WHERE id = ?2",
        rusqlite::params![points, id],
    )
    .unwrap();
}

pub fn points_of(conn: &Connection, id: i64) -> i64 {
    conn.query_row("SELECT points FROM content WHERE id = ?1", [id], |row| {
        row.get(0)
    })
    .unwrap()
}

pub fn count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

pub fn test_settings() -> AgentSettings {
    AgentSettings {
        system_prompt: "You are a helpful assistant.".into(),
        expert_model: "expert".into(),
        tagger_model: "tagger".into(),
        interpreter_model: "interpreter".into(),
        tag_strategy: TagStrategy::Merge,
        synthesize: false,
        max_context_tags: 12,
        short_term_memory_items: 8,
        tagger_memory_items: 1,
        interpreter_memory_items: 1,
        long_term_top_results: 8,
        turn_timeout: None,
    }
}

pub fn test_agent(backend: Arc<ScriptedBackend>, settings: &AgentSettings) -> MemoryAgent {
    MemoryAgent::new(test_db(), backend, settings)
}

/// A deterministic stand-in for the model server.
///
/// The `tagger` model answers with the existing keywords followed by every
/// word of five or more letters in the text; `expert` and `interpreter`
/// answer with constants. Every request is recorded.
#[derive(Default)]
pub struct ScriptedBackend {
    requests: Mutex<Vec<(String, Vec<ChatMessage>)>>,
    fail_model: Mutex<Option<String>>,
    slow_model: Mutex<Option<(String, Duration)>>,
    expert_reply: Mutex<Option<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail(&self, model: Option<&str>) {
        *self.fail_model.lock().unwrap() = model.map(str::to_string);
    }

    pub fn slow(&self, model: &str, delay: Duration) {
        *self.slow_model.lock().unwrap() = Some((model.to_string(), delay));
    }

    pub fn set_expert_reply(&self, reply: &str) {
        *self.expert_reply.lock().unwrap() = Some(reply.to_string());
    }

    /// Every request sent to `model`, oldest first.
    pub fn requests_for(&self, model: &str) -> Vec<Vec<ChatMessage>> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|(m, _)| m == model)
            .map(|(_, messages)| messages.clone())
            .collect()
    }

    /// Content of the last message of the most recent request to `model`.
    pub fn last_input(&self, model: &str) -> String {
        self.requests_for(model)
            .last()
            .and_then(|messages| messages.last())
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    fn reply_for(&self, model: &str, input: &str) -> String {
        match model {
            "tagger" => tagger_reply(input),
            "interpreter" => SYNTHESIS_REPLY.to_string(),
            _ => self
                .expert_reply
                .lock()
                .unwrap()
                .clone()
                .unwrap_or_else(|| EXPERT_REPLY.to_string()),
        }
    }
}

fn tagger_reply(input: &str) -> String {
    let (existing, text) = match input.split_once("\n\nText to integrate: ") {
        Some((head, text)) => (
            head.trim_start_matches("Existing keywords: ").to_string(),
            text,
        ),
        None => (String::new(), input.trim_start_matches("Text: ")),
    };
    let words: Vec<String> = text
        .split_whitespace()
        .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|w| w.chars().count() >= 5)
        .collect();

    let mut parts = Vec::new();
    if !existing.is_empty() {
        parts.push(existing);
    }
    parts.extend(words);
    format!("<think>picking keywords</think>{}", parts.join(", "))
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn complete(
        &self,
        model: &str,
        messages: &[ChatMessage],
    ) -> Result<FragmentStream, BackendError> {
        self.requests
            .lock()
            .unwrap()
            .push((model.to_string(), messages.to_vec()));

        let fail = self.fail_model.lock().unwrap().as_deref() == Some(model);
        if fail {
            return Err(BackendError::Remote(format!("model '{model}' not found")));
        }

        let delay = self
            .slow_model
            .lock()
            .unwrap()
            .as_ref()
            .filter(|(m, _)| m == model)
            .map(|(_, d)| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let input = messages.last().map(|m| m.content.as_str()).unwrap_or("");
        let reply = self.reply_for(model, input);
        // Two fragments, to exercise reassembly
        let mut mid = reply.len() / 2;
        while !reply.is_char_boundary(mid) {
            mid -= 1;
        }
        let (head, tail) = reply.split_at(mid);
        Ok(stream::iter(vec![Ok(head.to_string()), Ok(tail.to_string())]).boxed())
    }
}
