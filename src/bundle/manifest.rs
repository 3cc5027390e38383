//! Bundle manifest (`manifest.json`) encoding and validation.
//!
//! The manifest is decoded in two steps: the raw JSON is checked for the
//! `format` and `version` fields first, and only a recognized manifest is
//! deserialized into [`Manifest`]. Nothing else in the archive is read until
//! [`decode`] succeeds.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{BundleError, BundleResult};

/// Literal `format` value of every bundle.
pub const FORMAT_NAME: &str = "lens-bundle";

/// Version written by this crate.
pub const FORMAT_VERSION: &str = "1.0";

/// Versions this importer understands.
pub const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub format: String,
    pub version: String,
    pub created_at: DateTime<Utc>,
    pub source: ManifestSource,
    pub contents: ManifestContents,
}

/// Workspace the bundle was exported from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestSource {
    pub workspace_id: String,
    pub workspace_name: String,
    pub app_version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ManifestContents {
    pub document_count: u64,
    pub grouping_count: u64,
    pub profile_count: u64,
    pub includes_text: bool,
    pub includes_analysis: bool,
    pub includes_source_files: bool,
    #[serde(default)]
    pub source_file_count: u64,
    /// Filenames whose source bytes were unreachable at export time.
    #[serde(default)]
    pub missing_source_files: Vec<String>,
}

impl Manifest {
    /// Skeleton manifest; counts are filled in once export has enumerated
    /// the workspace.
    pub fn new(source: ManifestSource) -> Self {
        Self {
            format: FORMAT_NAME.to_string(),
            version: FORMAT_VERSION.to_string(),
            created_at: Utc::now(),
            source,
            contents: ManifestContents::default(),
        }
    }
}

pub fn encode(manifest: &Manifest) -> BundleResult<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(manifest)?)
}

pub fn decode(bytes: &[u8]) -> BundleResult<Manifest> {
    let raw: serde_json::Value = serde_json::from_slice(bytes)
        .map_err(|e| BundleError::validation(format!("manifest is not valid JSON: {}", e)))?;

    let obj = raw
        .as_object()
        .ok_or_else(|| BundleError::validation("manifest must be a JSON object"))?;

    match obj.get("format").and_then(|v| v.as_str()) {
        Some(FORMAT_NAME) => {}
        Some(other) => {
            return Err(BundleError::UnsupportedFormat {
                found: other.to_string(),
            })
        }
        None => return Err(BundleError::validation("manifest has no 'format' field")),
    }

    let version = obj
        .get("version")
        .and_then(|v| v.as_str())
        .ok_or_else(|| BundleError::validation("manifest has no 'version' field"))?;
    if !SUPPORTED_VERSIONS.contains(&version) {
        return Err(BundleError::UnsupportedVersion {
            version: version.to_string(),
        });
    }

    serde_json::from_value(raw)
        .map_err(|e| BundleError::validation(format!("malformed manifest: {}", e)))
}
