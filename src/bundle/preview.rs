//! Read-only inspection of a bundle against a target workspace.

use serde::Serialize;

use crate::identity::ContentIdentity;
use crate::store::Store;

use super::entity::{ArchivedDocument, ArchivedGrouping, ArchivedProfile};
use super::error::{BundleError, BundleResult};
use super::manifest::Manifest;
use super::reader::BundleArchive;

/// How an archived document relates to the target workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    /// No document with this content identity exists in the target.
    New,
    /// The target already holds this content under `existing_id`.
    Duplicate { existing_id: String },
    /// The bundle carries no source bytes and the original path is not
    /// reachable. Informational; import still works from the archived text.
    SourceUnavailable,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentPreview {
    pub archived_id: String,
    pub filename: String,
    pub content_hash: ContentIdentity,
    pub file_size: i64,
    #[serde(flatten)]
    pub status: DocumentStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct ImportPreview {
    pub manifest: Manifest,
    pub documents: Vec<DocumentPreview>,
    pub groupings: Vec<ArchivedGrouping>,
    pub profiles: Vec<ArchivedProfile>,
    /// Entries that could not be read or parsed.
    pub errors: Vec<String>,
}

impl ImportPreview {
    pub fn new_count(&self) -> usize {
        self.count(|s| matches!(s, DocumentStatus::New))
    }

    pub fn duplicate_count(&self) -> usize {
        self.count(|s| matches!(s, DocumentStatus::Duplicate { .. }))
    }

    pub fn unavailable_count(&self) -> usize {
        self.count(|s| matches!(s, DocumentStatus::SourceUnavailable))
    }

    fn count(&self, pred: impl Fn(&DocumentStatus) -> bool) -> usize {
        self.documents.iter().filter(|d| pred(&d.status)).count()
    }
}

async fn source_reachable(archive: &BundleArchive, doc: &ArchivedDocument) -> bool {
    if let Some(name) = &doc.source_file {
        if archive.has_entry(name) {
            return true;
        }
    }
    match &doc.file_path {
        Some(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
        None => false,
    }
}

/// Classify every archived document against `workspace_id` and surface the
/// archived groupings and profiles. Never writes to the store.
pub async fn preview_bundle(
    store: &dyn Store,
    archive: &mut BundleArchive,
    workspace_id: &str,
) -> BundleResult<ImportPreview> {
    if store.get_workspace(workspace_id).await?.is_none() {
        return Err(BundleError::WorkspaceNotFound(workspace_id.to_string()));
    }

    let mut errors = Vec::new();

    let mut documents = Vec::new();
    for item in archive.documents() {
        let doc = match item.record {
            Ok(doc) => doc,
            Err(e) => {
                errors.push(format!("{}: {}", item.entry, e));
                continue;
            }
        };

        let status = match store
            .find_document_by_hash(workspace_id, &doc.content_hash)
            .await?
        {
            Some(existing_id) => DocumentStatus::Duplicate { existing_id },
            None if source_reachable(archive, &doc).await => DocumentStatus::New,
            None => DocumentStatus::SourceUnavailable,
        };

        documents.push(DocumentPreview {
            archived_id: doc.id,
            filename: doc.filename,
            content_hash: doc.content_hash,
            file_size: doc.file_size,
            status,
        });
    }

    let mut groupings = Vec::new();
    for item in archive.groupings() {
        match item.record {
            Ok(g) => groupings.push(g),
            Err(e) => errors.push(format!("{}: {}", item.entry, e)),
        }
    }

    let mut profiles = Vec::new();
    for item in archive.profiles() {
        match item.record {
            Ok(p) => profiles.push(p),
            Err(e) => errors.push(format!("{}: {}", item.entry, e)),
        }
    }

    Ok(ImportPreview {
        manifest: archive.manifest().clone(),
        documents,
        groupings,
        profiles,
        errors,
    })
}
