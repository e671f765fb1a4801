//! Application configuration for LeadConsole.
//!
//! User config lives at `~/.leadconsole/leadconsole.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{LeadConsoleError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "leadconsole.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".leadconsole";

/// Lead list scored when none is configured.
pub const DEFAULT_LEAD_LIST_NAME: &str = "Q4 2025 Expansion Accounts";

/// Business context used by the scoring pipeline until the user provides one.
pub const DEFAULT_BUSINESS_CONTEXT: &str = "We aim to strengthen our mid-market presence across the U.S. for Dedicated Fiber, Internet, \
Communication, and Security offerings. While coverage is strong, identifying accounts with the highest \
growth potential or urgent connectivity needs remains a challenge.\n\n\
As a result, sales teams lack actionable insights to prioritize and position the right products.\n\n\
Our goal is to enhance targeting, segmentation, and sales intelligence to deepen market penetration, \
accelerate revenue growth, and align execution with rising digital and connectivity demands.";

// ---------------------------------------------------------------------------
// Config structs (matching leadconsole.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Entity data source.
    #[serde(default)]
    pub records: RecordsConfig,

    /// Export destination.
    #[serde(default)]
    pub export: ExportConfig,

    /// Lead scoring inputs.
    #[serde(default)]
    pub scoring: ScoringConfig,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Path of the libSQL state database.
    #[serde(default = "default_store_path")]
    pub store_path: String,

    /// Session identifier; state of different sessions never mixes.
    #[serde(default = "default_session")]
    pub session: String,

    /// Pipeline used when a command does not name one.
    #[serde(default = "default_pipeline")]
    pub pipeline: String,

    /// Delay between streamed log lines, in milliseconds.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            store_path: default_store_path(),
            session: default_session(),
            pipeline: default_pipeline(),
            pacing_ms: default_pacing_ms(),
        }
    }
}

fn default_store_path() -> String {
    "~/.leadconsole/state.db".into()
}
fn default_session() -> String {
    "default".into()
}
fn default_pipeline() -> String {
    "ingest".into()
}
fn default_pacing_ms() -> u64 {
    600
}

/// `[records]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordsConfig {
    /// JSON tabular dataset; empty means the bundled demo dataset.
    #[serde(default)]
    pub path: String,
}

/// `[export]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Directory receiving exported artifacts.
    #[serde(default = "default_export_dir")]
    pub output_dir: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_export_dir(),
        }
    }
}

fn default_export_dir() -> String {
    ".".into()
}

/// `[scoring]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// Label of the lead list being prioritized.
    #[serde(default = "default_lead_list_name")]
    pub lead_list_name: String,

    /// Free-form business context; the first paragraph is the objective.
    #[serde(default = "default_business_context")]
    pub business_context: String,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            lead_list_name: default_lead_list_name(),
            business_context: default_business_context(),
        }
    }
}

fn default_lead_list_name() -> String {
    DEFAULT_LEAD_LIST_NAME.into()
}
fn default_business_context() -> String {
    DEFAULT_BUSINESS_CONTEXT.into()
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.leadconsole/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| LeadConsoleError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.leadconsole/leadconsole.toml`).
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
    let content = std::fs::read_to_string(path).map_err(|e| LeadConsoleError::io(path, e))?;

    toml::from_str(&content).map_err(|e| {
        LeadConsoleError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| LeadConsoleError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| LeadConsoleError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| LeadConsoleError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    } else if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("store_path"));
        assert!(toml_str.contains("pacing_ms = 600"));
    }

    #[test]
    fn config_roundtrip() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        let parsed: AppConfig = toml::from_str(&toml_str).expect("deserialize");
        assert_eq!(parsed.defaults.session, "default");
        assert_eq!(parsed.scoring.business_context, DEFAULT_BUSINESS_CONTEXT);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let toml_str = r#"
[defaults]
pacing_ms = 0

[records]
path = "/data/customer360.json"
"#;
        let config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.defaults.pacing_ms, 0);
        assert_eq!(config.defaults.pipeline, "ingest");
        assert_eq!(config.records.path, "/data/customer360.json");
        assert_eq!(config.export.output_dir, ".");
    }

    #[test]
    fn expand_home_leaves_plain_paths() {
        assert_eq!(expand_home("/tmp/state.db"), PathBuf::from("/tmp/state.db"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/state.db"), home.join("state.db"));
        }
    }
}
