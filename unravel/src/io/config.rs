//! Engine configuration, optionally loaded from a TOML file.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;

/// Engine configuration (TOML).
///
/// Missing fields default to the values the engine ships with.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct UnravelConfig {
    /// Maximum attempts per `achieve` call (each fix consumes one).
    pub max_retries: u32,

    pub exec: ExecConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExecConfig {
    /// Keep at most this many bytes of a child's stdout and of its stderr.
    pub output_limit_bytes: usize,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            output_limit_bytes: 1_000_000,
        }
    }
}

impl Default for UnravelConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            exec: ExecConfig::default(),
        }
    }
}

impl UnravelConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(anyhow!("max_retries must be > 0"));
        }
        if self.exec.output_limit_bytes == 0 {
            return Err(anyhow!("exec.output_limit_bytes must be > 0"));
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `UnravelConfig::default()`.
pub fn load_config(path: &Path) -> Result<UnravelConfig> {
    if !path.exists() {
        let cfg = UnravelConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: UnravelConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}
