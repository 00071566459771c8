//! Record types for the tag store.
//!
//! [`ContentItem`] mirrors a `content` row together with its tags;
//! [`RelatedContent`] is one ranked row returned by the relevance ranker.

use serde::Serialize;

/// One stored utterance or synthesized fact, matching the `content` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentItem {
    pub id: i64,
    /// Raw text as saved; never normalized.
    pub text: String,
    /// Popularity counter, incremented each time the item is retrieved.
    pub points: i64,
    /// ISO 8601 creation timestamp.
    pub created_at: String,
    /// Every tag linked to this item, alphabetically.
    pub tags: Vec<String>,
}

/// A content row selected by [`query_related`](super::search::query_related).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelatedContent {
    pub id: i64,
    pub text: String,
    /// Points at ranking time, before this retrieval's increment.
    pub points: i64,
    /// The full tag set of the item, not only the tags that matched.
    pub tags: Vec<String>,
    pub created_at: String,
    /// Number of distinct query tags this item carries.
    pub tag_match_count: u32,
}
