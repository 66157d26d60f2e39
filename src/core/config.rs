//! # Configuration
//!
//! Centralizes all settings with a clear override hierarchy:
//! defaults → config file → env vars → CLI flags.
//!
//! Config lives at `~/.confab/config.toml`. If missing on first run, a
//! commented-out default is generated so users can discover all options.
//! Credentials are never embedded in source; they come from this file or
//! from the environment.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

// ============================================================================
// Config Structs (all fields Option<T> for sparse TOML)
// ============================================================================

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ConfabConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub openai: ProviderSection,
    #[serde(default)]
    pub gemini: ProviderSection,
    #[serde(default)]
    pub groq: ProviderSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct GeneralConfig {
    pub default_provider: Option<String>,
    pub tts_voice: Option<String>,
    pub tts_instructions: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct ProviderSection {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

// ============================================================================
// Defaults
// ============================================================================

pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

// ============================================================================
// Resolved Config (concrete values, no layering left)
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ResolvedConfig {
    pub provider: String,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub gemini_api_key: Option<String>,
    pub gemini_base_url: Option<String>,
    pub groq_api_key: Option<String>,
    pub groq_base_url: Option<String>,
    pub tts_voice: Option<String>,
    pub tts_instructions: Option<String>,
}

// ============================================================================
// Error Type
// ============================================================================

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "config I/O error: {e}"),
            ConfigError::Parse(e) => write!(f, "config parse error: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ============================================================================
// Loading
// ============================================================================

/// Returns the path to `~/.confab/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(".confab").join("config.toml"))
}

/// Load config from `~/.confab/config.toml`.
///
/// If the file doesn't exist, generates a commented-out default and returns
/// `ConfabConfig::default()`. If it exists but is malformed, returns
/// `ConfigError::Parse`.
pub fn load_config() -> Result<ConfabConfig, ConfigError> {
    let path = match config_path() {
        Some(p) => p,
        None => {
            warn!("Could not determine home directory, using default config");
            return Ok(ConfabConfig::default());
        }
    };

    if !path.exists() {
        info!("No config file found, generating default at {}", path.display());
        generate_default_config(&path);
        return Ok(ConfabConfig::default());
    }

    let contents = fs::read_to_string(&path).map_err(ConfigError::Io)?;
    let config: ConfabConfig = toml::from_str(&contents).map_err(ConfigError::Parse)?;
    info!("Loaded config from {}", path.display());
    debug!("Config sections present: openai={}, gemini={}, groq={}",
        config.openai.api_key.is_some(),
        config.gemini.api_key.is_some(),
        config.groq.api_key.is_some());
    Ok(config)
}

/// Generates a commented-out default config file at the given path.
fn generate_default_config(path: &PathBuf) {
    let default_content = r#"# Confab Configuration
# All settings are optional — defaults are used for anything not specified.
# Override hierarchy: defaults → this file → env vars → CLI flags.

# [general]
# default_provider = "openai"        # "openai", "gemini" or "groq"
# tts_voice = "verse"
# tts_instructions = "Speak in a neutral tone"

# [openai]
# api_key = "sk-..."                 # Or set OPENAI_API_KEY env var
# base_url = "https://api.openai.com/v1"

# [gemini]
# api_key = "AIza..."                # Or set GEMINI_API_KEY env var
# base_url = "https://generativelanguage.googleapis.com/v1beta"

# [groq]
# api_key = "gsk_..."                # Or set GROQ_API_KEY env var
# base_url = "https://api.groq.com/openai/v1"
"#;

    if let Some(parent) = path.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            warn!("Failed to create config directory: {}", e);
            return;
        }
    }
    if let Err(e) = fs::write(path, default_content) {
        warn!("Failed to write default config: {}", e);
    }
}

// ============================================================================
// Resolution
// ============================================================================

/// Resolve the final config by collapsing: defaults → config file → env vars
/// → CLI. `cli_provider` comes from the CLI flag (None = not specified).
///
/// Base URLs stay `Option` here; adapters apply their own defaults, which
/// keeps test construction trivial.
pub fn resolve(config: &ConfabConfig, cli_provider: Option<&str>) -> ResolvedConfig {
    // Provider: CLI → env → config → default
    let provider = cli_provider
        .map(|s| s.to_string())
        .or_else(|| std::env::var("CONFAB_PROVIDER").ok())
        .or_else(|| config.general.default_provider.clone())
        .unwrap_or_else(|| "openai".to_string());

    ResolvedConfig {
        provider,
        openai_api_key: std::env::var("OPENAI_API_KEY")
            .ok()
            .or_else(|| config.openai.api_key.clone()),
        openai_base_url: std::env::var("OPENAI_BASE_URL")
            .ok()
            .or_else(|| config.openai.base_url.clone()),
        gemini_api_key: std::env::var("GEMINI_API_KEY")
            .ok()
            .or_else(|| config.gemini.api_key.clone()),
        gemini_base_url: std::env::var("GEMINI_BASE_URL")
            .ok()
            .or_else(|| config.gemini.base_url.clone()),
        groq_api_key: std::env::var("GROQ_API_KEY")
            .ok()
            .or_else(|| config.groq.api_key.clone()),
        groq_base_url: std::env::var("GROQ_BASE_URL")
            .ok()
            .or_else(|| config.groq.base_url.clone()),
        tts_voice: config.general.tts_voice.clone(),
        tts_instructions: config.general.tts_instructions.clone(),
    }
}
