use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rules: RulesConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RulesConfig {
    #[serde(default = "default_rules_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_true")]
    pub supplemental_enabled: bool,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            dir: default_rules_dir(),
            supplemental_enabled: default_true(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default-value functions used by serde
// ---------------------------------------------------------------------------

fn default_rules_dir() -> PathBuf {
    PathBuf::from("rules")
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

// ---------------------------------------------------------------------------
// Environment override for the supplemental toggle
// ---------------------------------------------------------------------------

/// Environment variable overriding the supplemental-rules toggle.
pub const SUPPLEMENTAL_ENV: &str = "SUPPLEMENTAL_RULES_ENABLED";

/// Read the supplemental toggle from the environment.  `None` when the
/// variable is unset, in which case the config file value applies.
pub fn supplemental_override_from_env() -> Option<bool> {
    std::env::var(SUPPLEMENTAL_ENV)
        .ok()
        .map(|value| is_truthy(&value))
}

/// Recognized truthy spellings, exactly `"true"` and `"1"`.  Anything else
/// disables the toggle.
fn is_truthy(value: &str) -> bool {
    value == "true" || value == "1"
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Load configuration from a YAML file.
///
/// If the file does not exist a default configuration is returned and a
/// warning is emitted, so threat-lens runs with sensible defaults before any
/// config file has been written.
pub fn load(path: &Path) -> anyhow::Result<Config> {
    if !path.exists() {
        warn!(
            path = %path.display(),
            "configuration file not found; using defaults"
        );
        return Ok(Config::default());
    }

    let contents = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;

    let config: Config = serde_yml::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?;

    Ok(config)
}
