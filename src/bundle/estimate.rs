//! Pre-flight export size estimate.
//!
//! Sums uncompressed payload sizes plus a fixed per-record overhead. The
//! result is an upper-bound-ish advisory number, not a prediction of the
//! compressed archive size.

use serde::Serialize;

use crate::store::Store;

use super::error::{BundleError, BundleResult};
use super::writer::ExportOptions;

/// JSON envelope and metadata fields of one archived document.
pub const DOCUMENT_OVERHEAD_BYTES: u64 = 1024;
/// Envelope of one archived grouping or profile.
pub const RECORD_OVERHEAD_BYTES: u64 = 256;
/// Approximate size of one member id inside a grouping record.
const MEMBER_ID_BYTES: u64 = 40;
const MANIFEST_BYTES: u64 = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SizeEstimate {
    pub size_bytes: u64,
    pub document_count: u64,
}

impl SizeEstimate {
    pub fn exceeds(&self, limit_bytes: u64) -> bool {
        self.size_bytes > limit_bytes
    }
}

fn json_len(value: &serde_json::Value) -> u64 {
    serde_json::to_vec(value).map(|v| v.len() as u64).unwrap_or(0)
}

/// Estimate the bundle size for exporting `workspace_id` with `options`.
pub async fn estimate_bundle_size(
    store: &dyn Store,
    workspace_id: &str,
    options: &ExportOptions,
) -> BundleResult<SizeEstimate> {
    if store.get_workspace(workspace_id).await?.is_none() {
        return Err(BundleError::WorkspaceNotFound(workspace_id.to_string()));
    }

    let mut size = MANIFEST_BYTES;
    let documents = store.list_documents(workspace_id).await?;

    for doc in &documents {
        size += DOCUMENT_OVERHEAD_BYTES + json_len(&doc.metadata);

        if options.include_text {
            size += doc.text.as_ref().map(|t| t.len() as u64).unwrap_or(0);
            size += doc
                .pages
                .as_ref()
                .map(|pages| pages.iter().map(|p| p.len() as u64).sum::<u64>())
                .unwrap_or(0);
        }

        if options.include_analysis {
            for analysis in store.list_analyses(&doc.id).await? {
                size += analysis.kind.len() as u64 + json_len(&analysis.payload);
            }
        }

        if options.include_source_files {
            // Unreachable files are skipped by the writer, so they add nothing
            if let Some(path) = &doc.file_path {
                if let Ok(meta) = tokio::fs::metadata(path).await {
                    size += meta.len();
                }
            }
        }
    }

    if options.include_groupings {
        for grouping in store.list_groupings(workspace_id).await? {
            size += RECORD_OVERHEAD_BYTES + MEMBER_ID_BYTES * grouping.document_ids.len() as u64;
        }
    }

    if options.include_profiles {
        for profile in store.list_profiles(workspace_id).await? {
            size += RECORD_OVERHEAD_BYTES + json_len(&profile.config);
        }
    }

    Ok(SizeEstimate {
        size_bytes: size,
        document_count: documents.len() as u64,
    })
}
