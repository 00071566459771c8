//! Text-to-tag extraction.
//!
//! Two strategies sit behind [`Tagger`]:
//!
//! - [`MergeTagger`] folds the tags of new text into an existing tag set, so the
//!   running topic evolves across turns.
//! - [`FreshTagger`] derives tags from one block of text alone.
//!
//! Both ask a language model for a comma-separated keyword list and clean the
//! reply with [`parse_tags`]. The model decides which concepts to keep or join
//! when there are too many; the parser only enforces the upper bound.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::llm::{BackendError, CompletionBackend, History, LlmAgent};

/// Longest accepted tag, in characters. Longer entries are sentences, not tags.
pub const MAX_TAG_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagStrategy {
    /// Merge new tags into the running set.
    #[default]
    Merge,
    /// Replace the running set with tags of the latest text.
    Fresh,
}

fn merge_prompt(max_tags: usize) -> String {
    format!(
        "You are an AI agent that extracts keywords representing the provided text and \
         combines them with the provided keywords to produce a single list of maximum \
         {max_tags} keywords representing both sets. If there are more keywords, prioritize \
         or join the concepts of the most important ones to meet the planned amount. \
         Keywords are single words or short phrases, never sentences. The resulting \
         keywords are returned separated by \",\" as plain text, not JSON, not XML."
    )
}

fn fresh_prompt(max_tags: usize) -> String {
    format!(
        "You are an AI agent that extracts a list of maximum {max_tags} keywords \
         representing the provided text. Keywords are single words or short phrases, \
         never sentences. The keywords are returned separated by \",\" as plain text, \
         not JSON, not XML."
    )
}

/// Split a model reply into clean, distinct tags, keeping at most `max_tags`.
///
/// Entries are separated by commas or newlines. Surrounding whitespace, quotes,
/// list bullets, and trailing periods are stripped; empty and overlong entries
/// are dropped; duplicates are compared case-insensitively and the first
/// spelling wins.
pub fn parse_tags(reply: &str, max_tags: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    reply
        .split(|c: char| c == ',' || c == '\n')
        .map(clean_tag)
        .filter(|tag| !tag.is_empty() && tag.chars().count() <= MAX_TAG_LEN)
        .filter(|tag| seen.insert(tag.to_lowercase()))
        .take(max_tags)
        .map(str::to_string)
        .collect()
}

fn clean_tag(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches(|c: char| matches!(c, '-' | '*' | '•') || c.is_whitespace())
        .trim_end_matches('.')
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`') || c.is_whitespace())
}

/// Folds the tags of new text into an existing set.
pub struct MergeTagger {
    agent: LlmAgent,
    max_tags: usize,
}

impl MergeTagger {
    pub fn new(backend: Arc<dyn CompletionBackend>, model: &str, max_tags: usize) -> Self {
        Self {
            agent: LlmAgent::new(backend, model, Some(merge_prompt(max_tags))),
            max_tags,
        }
    }

    pub async fn extract_and_merge(
        &self,
        history: &mut History,
        existing: &[String],
        text: &str,
    ) -> Result<Vec<String>, BackendError> {
        let request = format!(
            "Existing keywords: {}\n\nText to integrate: {text}",
            existing.join(",")
        );
        let reply = self.agent.chat(history, &request, None).await?;
        Ok(parse_tags(&reply, self.max_tags))
    }
}

/// Derives tags from one block of text alone.
pub struct FreshTagger {
    agent: LlmAgent,
    max_tags: usize,
}

impl FreshTagger {
    pub fn new(backend: Arc<dyn CompletionBackend>, model: &str, max_tags: usize) -> Self {
        Self {
            agent: LlmAgent::new(backend, model, Some(fresh_prompt(max_tags))),
            max_tags,
        }
    }

    pub async fn extract_tags(
        &self,
        history: &mut History,
        text: &str,
    ) -> Result<Vec<String>, BackendError> {
        let reply = self
            .agent
            .chat(history, &format!("Text: {text}"), None)
            .await?;
        Ok(parse_tags(&reply, self.max_tags))
    }
}

/// The extraction capability the orchestrator uses, in one of two strategies.
pub enum Tagger {
    Merge(MergeTagger),
    Fresh(FreshTagger),
}

impl Tagger {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        model: &str,
        strategy: TagStrategy,
        max_tags: usize,
    ) -> Self {
        match strategy {
            TagStrategy::Merge => Tagger::Merge(MergeTagger::new(backend, model, max_tags)),
            TagStrategy::Fresh => Tagger::Fresh(FreshTagger::new(backend, model, max_tags)),
        }
    }

    pub fn strategy(&self) -> TagStrategy {
        match self {
            Tagger::Merge(_) => TagStrategy::Merge,
            Tagger::Fresh(_) => TagStrategy::Fresh,
        }
    }

    /// Next running tag set after `text`.
    pub async fn update(
        &self,
        history: &mut History,
        running: &[String],
        text: &str,
    ) -> Result<Vec<String>, BackendError> {
        match self {
            Tagger::Merge(tagger) => tagger.extract_and_merge(history, running, text).await,
            Tagger::Fresh(tagger) => tagger.extract_tags(history, text).await,
        }
    }
}
