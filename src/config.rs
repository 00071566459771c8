use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

use crate::tagging::TagStrategy;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct TagmemConfig {
    pub agent: AgentConfig,
    pub models: ModelsConfig,
    pub backend: BackendConfig,
    pub memory: MemoryConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AgentConfig {
    pub name: String,
    pub system_prompt: String,
    pub tag_strategy: TagStrategy,
    /// Collapse retrieved memories into one summary before answering.
    pub synthesize: bool,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ModelsConfig {
    pub expert: String,
    pub tagger: String,
    pub interpreter: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BackendConfig {
    pub url: String,
    pub stream: bool,
    pub connect_timeout_secs: u64,
    /// Upper bound for a whole turn. `0` disables the limit.
    pub turn_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct MemoryConfig {
    pub max_context_tags: usize,
    pub short_term_memory_items: usize,
    pub tagger_memory_items: usize,
    pub interpreter_memory_items: usize,
    pub long_term_top_results: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: String,
    /// Explicit database file; when unset the file is derived from the agent name.
    pub db_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "my_agent".into(),
            system_prompt: "You are a helpful assistant".into(),
            tag_strategy: TagStrategy::Merge,
            synthesize: false,
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            expert: "deepseek-r1:latest".into(),
            tagger: "deepseek-r1:latest".into(),
            interpreter: "deepseek-r1:latest".into(),
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:11434".into(),
            stream: false,
            connect_timeout_secs: 10,
            turn_timeout_secs: 600,
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_context_tags: 12,
            short_term_memory_items: 8,
            tagger_memory_items: 1,
            interpreter_memory_items: 1,
            long_term_top_results: 8,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_tagmem_dir().to_string_lossy().into_owned(),
            db_path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
        }
    }
}

/// Returns `~/.tagmem/`, or `./.tagmem/` when no home directory is known.
pub fn default_tagmem_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".tagmem")
}

/// Returns the default config file path: `~/.tagmem/config.toml`
pub fn default_config_path() -> PathBuf {
    default_tagmem_dir().join("config.toml")
}

impl TagmemConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            TagmemConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (TAGMEM_AGENT, TAGMEM_DB, TAGMEM_BACKEND_URL, TAGMEM_LOG_LEVEL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TAGMEM_AGENT") {
            self.agent.name = val;
        }
        if let Ok(val) = std::env::var("TAGMEM_DB") {
            self.storage.db_path = Some(val);
        }
        if let Ok(val) = std::env::var("TAGMEM_BACKEND_URL") {
            self.backend.url = val;
        }
        if let Ok(val) = std::env::var("TAGMEM_LOG_LEVEL") {
            self.logging.level = val;
        }
    }

    /// One database file per agent: `<data_dir>/<agent>_db.sqlite`, unless
    /// `storage.db_path` names a file explicitly.
    pub fn resolved_db_path(&self) -> PathBuf {
        match &self.storage.db_path {
            Some(path) => expand_tilde(path),
            None => expand_tilde(&self.storage.data_dir)
                .join(format!("{}_db.sqlite", self.agent.name)),
        }
    }

    pub fn turn_timeout(&self) -> Option<Duration> {
        match self.backend.turn_timeout_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TagmemConfig::default();
        assert_eq!(config.agent.name, "my_agent");
        assert_eq!(config.agent.tag_strategy, TagStrategy::Merge);
        assert!(!config.agent.synthesize);
        assert_eq!(config.memory.max_context_tags, 12);
        assert_eq!(config.memory.short_term_memory_items, 8);
        assert_eq!(config.memory.long_term_top_results, 8);
        assert_eq!(config.logging.level, "info");
        assert!(config
            .resolved_db_path()
            .ends_with("my_agent_db.sqlite"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[agent]
name = "travel"
tag_strategy = "fresh"
synthesize = true

[models]
tagger = "gemma3:latest"

[memory]
long_term_top_results = 6

[storage]
data_dir = "/tmp/tagmem"
"#;
        let config: TagmemConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.agent.name, "travel");
        assert_eq!(config.agent.tag_strategy, TagStrategy::Fresh);
        assert!(config.agent.synthesize);
        assert_eq!(config.models.tagger, "gemma3:latest");
        assert_eq!(config.memory.long_term_top_results, 6);
        assert_eq!(
            config.resolved_db_path(),
            PathBuf::from("/tmp/tagmem/travel_db.sqlite")
        );
        // defaults still apply for unset fields
        assert_eq!(config.models.expert, "deepseek-r1:latest");
        assert_eq!(config.memory.max_context_tags, 12);
    }

    #[test]
    fn explicit_db_path_wins() {
        let mut config = TagmemConfig::default();
        config.storage.db_path = Some("/tmp/explicit.sqlite".into());
        assert_eq!(
            config.resolved_db_path(),
            PathBuf::from("/tmp/explicit.sqlite")
        );
    }

    #[test]
    fn zero_turn_timeout_disables_limit() {
        let mut config = TagmemConfig::default();
        assert_eq!(config.turn_timeout(), Some(Duration::from_secs(600)));
        config.backend.turn_timeout_secs = 0;
        assert_eq!(config.turn_timeout(), None);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = TagmemConfig::default();
        std::env::set_var("TAGMEM_AGENT", "env-agent");
        std::env::set_var("TAGMEM_BACKEND_URL", "http://10.0.0.2:11434");
        std::env::set_var("TAGMEM_LOG_LEVEL", "trace");

        config.apply_env_overrides();

        assert_eq!(config.agent.name, "env-agent");
        assert_eq!(config.backend.url, "http://10.0.0.2:11434");
        assert_eq!(config.logging.level, "trace");

        // Clean up
        std::env::remove_var("TAGMEM_AGENT");
        std::env::remove_var("TAGMEM_BACKEND_URL");
        std::env::remove_var("TAGMEM_LOG_LEVEL");
    }
}
