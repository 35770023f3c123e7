//! Agent configuration (layered: code > env > TOML file).

use std::path::Path;

use bon::Builder;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::types::{Message, State};

/// Environment variable overriding [`AgentConfig::agent_id`].
pub const ENV_AGENT_ID: &str = "CADENCE_AGENT_ID";
/// Environment variable overriding [`AgentConfig::thread_id`].
pub const ENV_THREAD_ID: &str = "CADENCE_THREAD_ID";
/// Environment variable enabling stream-transform debug logging.
pub const ENV_DEBUG: &str = "CADENCE_DEBUG";

/// Construction-time settings for an [`Agent`](crate::agent::Agent).
///
/// Unset identifiers are generated when the agent is built.
///
/// ```
/// use cadence::config::AgentConfig;
/// use serde_json::json;
///
/// let config = AgentConfig::builder()
///     .thread_id("thread-1".to_string())
///     .initial_state(json!({"count": 0}))
///     .build();
/// assert!(config.agent_id.is_none());
/// assert!(!config.debug);
/// ```
#[derive(Debug, Clone, Default, Builder, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AgentConfig {
    pub agent_id: Option<String>,
    pub description: Option<String>,
    pub thread_id: Option<String>,
    #[builder(default)]
    pub initial_messages: Vec<Message>,
    pub initial_state: Option<State>,
    /// Log every event passing through the stream transforms.
    #[builder(default)]
    pub debug: bool,
}

impl AgentConfig {
    /// Defaults overlaid with `CADENCE_*` environment variables (`.env` is loaded if present).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Parse a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, AgentError> {
        toml::from_str(raw)
            .map_err(|e| AgentError::Configuration(format!("invalid agent config: {e}")))
    }

    /// Read a TOML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, AgentError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AgentError::Configuration(format!("cannot read {}: {e}", path.display()))
        })?;
        let _ = dotenvy::dotenv();
        Ok(Self::from_toml_str(&raw)?.with_env_overrides(|key| std::env::var(key).ok()))
    }

    /// Overlay values returned by `lookup` for the `CADENCE_*` keys.
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(id) = lookup(ENV_AGENT_ID).filter(|v| !v.is_empty()) {
            self.agent_id = Some(id);
        }
        if let Some(id) = lookup(ENV_THREAD_ID).filter(|v| !v.is_empty()) {
            self.thread_id = Some(id);
        }
        if let Some(flag) = lookup(ENV_DEBUG) {
            self.debug = matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn parses_toml_with_initial_transcript() {
        let config = AgentConfig::from_toml_str(
            r#"
            agent_id = "support-bot"
            thread_id = "t-1"
            debug = true

            [initial_state]
            count = 0

            [[initial_messages]]
            id = "m0"
            role = "system"
            content = "Be brief."
            "#,
        )
        .unwrap();

        assert_eq!(config.agent_id.as_deref(), Some("support-bot"));
        assert_eq!(config.initial_state, Some(json!({"count": 0})));
        assert_eq!(config.initial_messages.len(), 1);
        assert_eq!(config.initial_messages[0].text(), "Be brief.");
        assert!(config.debug);
    }

    #[test]
    fn rejects_malformed_toml() {
        let err = AgentConfig::from_toml_str("agent_id = [").unwrap_err();
        assert!(matches!(err, AgentError::Configuration(_)));
    }

    #[test]
    fn env_overrides_replace_file_values() {
        let env: HashMap<&str, &str> =
            HashMap::from([(ENV_THREAD_ID, "from-env"), (ENV_DEBUG, "TRUE"), (ENV_AGENT_ID, "")]);
        let config = AgentConfig::builder()
            .agent_id("file-agent".to_string())
            .thread_id("file-thread".to_string())
            .build()
            .with_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.agent_id.as_deref(), Some("file-agent"));
        assert_eq!(config.thread_id.as_deref(), Some("from-env"));
        assert!(config.debug);
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("agent.toml");
        std::fs::write(&path, "description = \"replays fixtures\"\n").unwrap();
        let config = AgentConfig::load(&path).unwrap();
        assert_eq!(config.description.as_deref(), Some("replays fixtures"));

        let missing = AgentConfig::load(dir.path().join("nope.toml")).unwrap_err();
        assert!(missing.to_string().contains("cannot read"));
    }
}
