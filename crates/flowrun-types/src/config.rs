//! Global configuration types for flowrun.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! engine profiles, the text generation provider and the HTTP server.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
///
/// Loaded from `~/.flowrun/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GlobalConfig {
    /// Engine settings for regular runs.
    #[serde(default)]
    pub engine: EngineConfig,

    /// Engine settings for editor previews.
    #[serde(default = "EngineConfig::preview", deserialize_with = "preview_profile")]
    pub preview: EngineConfig,

    #[serde(default)]
    pub ai: AiConfig,

    #[serde(default)]
    pub server: ServerConfig,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Run-time bounds and start-data handling for the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum node transitions before a run is aborted.
    pub step_limit: u32,
    /// Per-node deadline in seconds. Unset means no deadline.
    pub node_timeout_secs: Option<u64>,
    /// Capacity of the progress event channel.
    pub event_buffer: usize,
    /// Build the start object from the start node's `fields` list.
    pub expand_start_fields: bool,
    /// Parse `fields[].value` strings as JSON when possible.
    pub parse_json_values: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            step_limit: 50,
            node_timeout_secs: None,
            event_buffer: 64,
            expand_start_fields: false,
            parse_json_values: true,
        }
    }
}

impl EngineConfig {
    /// The looser profile used for editor previews.
    pub fn preview() -> Self {
        Self {
            step_limit: 100,
            expand_start_fields: true,
            ..Self::default()
        }
    }

    /// Override the step bound.
    pub fn with_step_limit(mut self, step_limit: u32) -> Self {
        self.step_limit = step_limit;
        self
    }
}

/// `[preview]` keys as written; unset keys fall back to the preview profile.
#[derive(Deserialize)]
struct PreviewOverrides {
    step_limit: Option<u32>,
    node_timeout_secs: Option<u64>,
    event_buffer: Option<usize>,
    expand_start_fields: Option<bool>,
    parse_json_values: Option<bool>,
}

fn preview_profile<'de, D>(deserializer: D) -> Result<EngineConfig, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let overrides = PreviewOverrides::deserialize(deserializer)?;
    let base = EngineConfig::preview();
    Ok(EngineConfig {
        step_limit: overrides.step_limit.unwrap_or(base.step_limit),
        node_timeout_secs: overrides.node_timeout_secs.or(base.node_timeout_secs),
        event_buffer: overrides.event_buffer.unwrap_or(base.event_buffer),
        expand_start_fields: overrides.expand_start_fields.unwrap_or(base.expand_start_fields),
        parse_json_values: overrides.parse_json_values.unwrap_or(base.parse_json_values),
    })
}

// ---------------------------------------------------------------------------
// Text generation provider
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Provider name. Only `"gemini"` is built in.
    pub provider: String,
    pub model: String,
    pub base_url: String,
    /// Environment variable holding the API key.
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            provider: "gemini".to_string(),
            model: "gemini-2.5-flash".to_string(),
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            timeout_secs: 120,
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}
