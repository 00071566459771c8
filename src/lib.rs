//! Tag-indexed long-term memory for conversational agents.
//!
//! Every utterance an agent hears or produces is stored in SQLite together with
//! a small set of keyword tags. Before answering, the agent asks a tagger model
//! to refresh its running tag set, pulls the stored texts that share the most
//! tags, and hands them to the answering model as background. Content that is
//! retrieved gains a point, so often-used memories win ties.
//!
//! | Stage | Module |
//! |-------|--------|
//! | Tag extraction (merge or fresh) | [`tagging`] |
//! | Retrieval and popularity feedback | [`memory::search`] |
//! | Completion backends and short-term history | [`llm`] |
//! | Per-turn pipeline | [`agent`] |
//!
//! # Modules
//!
//! - [`config`]: configuration loading from TOML files and environment variables
//! - [`db`]: SQLite initialization, schema, additive migrations, and health checks
//! - [`memory`]: the tag store: save, rank, inspect, forget, stats

pub mod agent;
pub mod config;
pub mod db;
pub mod llm;
pub mod memory;
pub mod tagging;
