//! TOML configuration parsing.
//!
//! A single file describes where the workspace database lives, which
//! workspace the CLI operates on, and the default inclusion options used
//! when exporting bundles.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub workspace: WorkspaceConfig,
    #[serde(default)]
    pub bundle: BundleConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    pub id: String,
    #[serde(default = "default_workspace_name")]
    pub name: String,
}

fn default_workspace_name() -> String {
    "My Workspace".to_string()
}

/// Export defaults. Every flag can be overridden on the command line.
#[derive(Debug, Deserialize, Clone)]
pub struct BundleConfig {
    #[serde(default = "default_true")]
    pub include_text: bool,
    #[serde(default = "default_true")]
    pub include_analysis: bool,
    #[serde(default = "default_true")]
    pub include_groupings: bool,
    #[serde(default = "default_true")]
    pub include_profiles: bool,
    #[serde(default)]
    pub include_source_files: bool,
    #[serde(default = "default_warn_size_mb")]
    pub warn_size_mb: u64,
}

impl Default for BundleConfig {
    fn default() -> Self {
        Self {
            include_text: true,
            include_analysis: true,
            include_groupings: true,
            include_profiles: true,
            include_source_files: false,
            warn_size_mb: 500,
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_warn_size_mb() -> u64 {
    500
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct StorageConfig {
    /// Directory that receives source files materialized from imported bundles.
    #[serde(default)]
    pub source_dir: Option<PathBuf>,
}

impl BundleConfig {
    pub fn warn_size_bytes(&self) -> u64 {
        self.warn_size_mb * 1024 * 1024
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config = parse_config(&content)?;
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;

    if config.workspace.id.trim().is_empty() {
        anyhow::bail!("workspace.id must not be empty");
    }

    if config.bundle.warn_size_mb == 0 {
        anyhow::bail!("bundle.warn_size_mb must be > 0");
    }

    Ok(config)
}
