//! Application configuration for reviewforge.
//!
//! User config lives at `~/.reviewforge/reviewforge.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ReviewForgeError};
use crate::types::DEFAULT_MAX_ITEMS;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "reviewforge.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".reviewforge";

// ---------------------------------------------------------------------------
// Config structs (matching reviewforge.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Orchestrator limits.
    #[serde(default)]
    pub pipeline: PipelineSettings,

    /// OpenRouter settings.
    #[serde(default)]
    pub openrouter: OpenRouterConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// How many items discovery should return.
    #[serde(default = "default_max_items")]
    pub max_items: usize,

    /// Where finished reviews are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            output_dir: default_output_dir(),
        }
    }
}

fn default_max_items() -> usize {
    DEFAULT_MAX_ITEMS
}
fn default_output_dir() -> String {
    ".".into()
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    /// Maximum concurrent analysis calls.
    #[serde(default = "default_analysis_workers")]
    pub analysis_workers: usize,

    /// Deadline for a single item's analysis.
    #[serde(default = "default_analysis_timeout")]
    pub analysis_timeout_secs: u64,

    /// Deadline for discovery, synthesis, and each revision call.
    #[serde(default = "default_collaborator_timeout")]
    pub collaborator_timeout_secs: u64,

    /// Hard cap on refinement evaluations.
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,

    /// Score coverage against the analyzed titles.
    #[serde(default)]
    pub check_coverage: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            analysis_workers: default_analysis_workers(),
            analysis_timeout_secs: default_analysis_timeout(),
            collaborator_timeout_secs: default_collaborator_timeout(),
            max_iterations: default_max_iterations(),
            check_coverage: false,
        }
    }
}

fn default_analysis_workers() -> usize {
    4
}
fn default_analysis_timeout() -> u64 {
    120
}
fn default_collaborator_timeout() -> u64 {
    300
}
fn default_max_iterations() -> u32 {
    3
}

/// `[openrouter]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenRouterConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Model used for every collaborator role.
    #[serde(default = "default_model")]
    pub default_model: String,

    /// Chat-completions API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for OpenRouterConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_api_key_env(),
            default_model: default_model(),
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_model() -> String {
    "google/gemini-2.0-flash-001".into()
}
fn default_base_url() -> String {
    "https://openrouter.ai/api/v1".into()
}
fn default_temperature() -> f32 {
    0.4
}
fn default_max_tokens() -> u32 {
    4096
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime orchestrator configuration, merged from config file + CLI flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Bound on in-flight analysis tasks.
    pub analysis_workers: usize,
    /// Per-item analysis deadline.
    pub analysis_timeout: Duration,
    /// Deadline for discovery, synthesis, and revision calls.
    pub collaborator_timeout: Duration,
    /// Refinement iteration cap.
    pub max_iterations: u32,
    /// Pass analyzed titles to the evaluator's coverage check.
    pub check_coverage: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            analysis_workers: config.pipeline.analysis_workers,
            analysis_timeout: Duration::from_secs(config.pipeline.analysis_timeout_secs),
            collaborator_timeout: Duration::from_secs(config.pipeline.collaborator_timeout_secs),
            max_iterations: config.pipeline.max_iterations,
            check_coverage: config.pipeline.check_coverage,
        }
    }
}

impl PipelineConfig {
    /// Reject limits the orchestrator cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.analysis_workers == 0 {
            return Err(ReviewForgeError::validation(
                "analysis_workers must be at least 1",
            ));
        }
        if self.max_iterations == 0 {
            return Err(ReviewForgeError::validation(
                "max_iterations must be at least 1",
            ));
        }
        if self.analysis_timeout.is_zero() || self.collaborator_timeout.is_zero() {
            return Err(ReviewForgeError::validation("timeouts must be non-zero"));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.reviewforge/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ReviewForgeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.reviewforge/reviewforge.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ReviewForgeError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        ReviewForgeError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ReviewForgeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ReviewForgeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ReviewForgeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Read the OpenRouter API key from the configured env var.
pub fn resolve_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.openrouter.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(ReviewForgeError::config(format!(
            "OpenRouter API key not found. Set the {var_name} environment variable.\n\
             Get a key at https://openrouter.ai/keys"
        ))),
    }
}
