//! Bundle import.
//!
//! Applies a validated bundle to a target workspace in fixed phases:
//!
//! ```text
//! Validating ──▶ Documents ──▶ Groupings ──▶ Profiles ──▶ Recording ──▶ Complete
//!     └──▶ Failed (manifest or workspace rejected, nothing written)
//! ```
//!
//! Items are processed strictly in archive order. A failing document,
//! grouping, or profile is recorded in [`ImportResult::errors`] and the
//! batch continues. Phases commit independently; there is no cross-phase
//! rollback, but each document is stored atomically with its analyses.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::identity::ContentIdentity;
use crate::models::{Grouping, ImportProvenance, Profile};
use crate::progress::{BundlePhase, BundleProgress, ProgressReporter};
use crate::store::Store;

use super::entity::{ArchivedDocument, EntityKind};
use super::error::{BundleError, BundleResult};
use super::idmap::IdentifierMap;
use super::reader::BundleArchive;

/// What to import and how to treat duplicates.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub import_documents: bool,
    pub import_groupings: bool,
    pub import_profiles: bool,
    /// Reuse an existing document with the same content identity instead of
    /// creating a second copy. Also skips groupings whose name and resolved
    /// members already exist, and profiles whose name and config do.
    pub skip_duplicates: bool,
    /// Where embedded source files are materialized. `None` keeps the
    /// archived original path.
    pub source_dir: Option<PathBuf>,
    pub cancel: CancellationToken,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            import_documents: true,
            import_groupings: true,
            import_profiles: true,
            skip_duplicates: true,
            source_dir: None,
            cancel: CancellationToken::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportResult {
    pub success: bool,
    pub documents_imported: u64,
    pub documents_skipped: u64,
    pub groupings_imported: u64,
    pub groupings_skipped: u64,
    pub profiles_imported: u64,
    pub profiles_skipped: u64,
    /// Grouping members dropped because they resolved to no target document.
    pub members_dropped: u64,
    pub errors: Vec<String>,
    pub provenance_id: Option<String>,
}

enum DocumentOutcome {
    Imported,
    Skipped,
    /// Match-only mode: mapped onto an existing document, nothing created.
    Matched,
    Unmatched,
}

struct ImportRun<'a> {
    store: &'a dyn Store,
    workspace_id: &'a str,
    options: &'a ImportOptions,
    progress: &'a dyn ProgressReporter,
    ids: IdentifierMap,
    result: ImportResult,
    now: i64,
}

impl ImportRun<'_> {
    fn report(&self, phase: BundlePhase, current: usize, total: usize, label: impl Into<String>) {
        self.progress.report(BundleProgress::new(
            phase,
            current as u64,
            total as u64,
            label,
        ));
    }

    fn cancelled(&mut self) -> bool {
        if self.options.cancel.is_cancelled() {
            if !self.result.errors.iter().any(|e| e == "import cancelled") {
                self.result.errors.push("import cancelled".to_string());
            }
            return true;
        }
        false
    }

    async fn documents(&mut self, archive: &mut BundleArchive) {
        let entries = archive.entry_names(EntityKind::Document);
        let total = entries.len();
        for (i, entry) in entries.iter().enumerate() {
            if self.cancelled() {
                return;
            }

            match archive.read_document(entry) {
                Ok(doc) => {
                    let label = doc.filename.clone();
                    match self.document(archive, doc).await {
                        Ok(DocumentOutcome::Imported) => self.result.documents_imported += 1,
                        Ok(DocumentOutcome::Skipped) => self.result.documents_skipped += 1,
                        Ok(DocumentOutcome::Matched) | Ok(DocumentOutcome::Unmatched) => {}
                        Err(e) => {
                            warn!(entry = %entry, error = %e, "document import failed");
                            self.result
                                .errors
                                .push(format!("document '{}' ({}): {:#}", label, entry, e));
                        }
                    }
                    self.report(BundlePhase::Documents, i + 1, total, label);
                }
                Err(e) if self.options.import_documents => {
                    warn!(entry = %entry, error = %e, "unreadable document record");
                    self.result.errors.push(format!("{}: {}", entry, e));
                    self.report(BundlePhase::Documents, i + 1, total, entry.as_str());
                }
                Err(e) => debug!(entry = %entry, error = %e, "unreadable document record ignored"),
            }
        }
    }

    async fn document(
        &mut self,
        archive: &mut BundleArchive,
        doc: ArchivedDocument,
    ) -> Result<DocumentOutcome> {
        let match_existing = self.options.skip_duplicates || !self.options.import_documents;
        if match_existing {
            if let Some(existing) = self
                .store
                .find_document_by_hash(self.workspace_id, &doc.content_hash)
                .await?
            {
                self.ids.insert(doc.id.clone(), existing);
                return Ok(if self.options.import_documents {
                    DocumentOutcome::Skipped
                } else {
                    DocumentOutcome::Matched
                });
            }
        }
        if !self.options.import_documents {
            return Ok(DocumentOutcome::Unmatched);
        }

        let new_id = Uuid::new_v4().to_string();

        let mut file_path = None;
        if let Some(entry) = &doc.source_file {
            match &self.options.source_dir {
                Some(dir) => file_path = Some(materialize(archive, entry, dir, &doc)?),
                None => verify_source(archive, entry, &doc.content_hash, &mut std::io::sink())?,
            }
        }

        let archived_id = doc.id.clone();
        let (live, analyses) = doc.into_live(&new_id, self.workspace_id, file_path, self.now);
        self.store.insert_document(&live, &analyses).await?;
        self.ids.insert(archived_id, new_id);
        Ok(DocumentOutcome::Imported)
    }

    /// Live records already in the target, used to recognise a re-import.
    /// Empty when duplicates are kept.
    async fn existing<T>(
        &mut self,
        kind: &str,
        list: impl std::future::Future<Output = Result<Vec<T>>>,
    ) -> Vec<T> {
        if !self.options.skip_duplicates {
            return Vec::new();
        }
        match list.await {
            Ok(items) => items,
            Err(e) => {
                warn!(error = %e, "could not list existing {}", kind);
                self.result
                    .errors
                    .push(format!("listing existing {}: {:#}", kind, e));
                Vec::new()
            }
        }
    }

    async fn groupings(&mut self, archive: &mut BundleArchive) {
        let entries = archive.entry_names(EntityKind::Grouping);
        let total = entries.len();
        let (store, workspace_id) = (self.store, self.workspace_id);
        let mut existing: Vec<Grouping> = self
            .existing("groupings", store.list_groupings(workspace_id))
            .await;

        for (i, entry) in entries.iter().enumerate() {
            if self.cancelled() {
                return;
            }

            let outcome = async {
                let grouping = archive.read_grouping(entry)?;
                let name = grouping.name.clone();
                let (members, dropped) = self.ids.remap_members(&grouping.document_ids);
                if existing
                    .iter()
                    .any(|g| g.name == name && g.document_ids == members)
                {
                    debug!(grouping = %name, "grouping already present");
                    return Ok::<(String, bool), anyhow::Error>((name, false));
                }
                if dropped > 0 {
                    debug!(grouping = %name, dropped, "grouping members without a target document");
                }

                let live = grouping.into_live(
                    &Uuid::new_v4().to_string(),
                    self.workspace_id,
                    members,
                    self.now,
                );
                self.store.insert_grouping(&live).await?;
                self.result.members_dropped += dropped as u64;
                if self.options.skip_duplicates {
                    existing.push(live);
                }
                Ok((name, true))
            }
            .await;

            match outcome {
                Ok((name, inserted)) => {
                    if inserted {
                        self.result.groupings_imported += 1;
                    } else {
                        self.result.groupings_skipped += 1;
                    }
                    self.report(BundlePhase::Groupings, i + 1, total, name);
                }
                Err(e) => {
                    warn!(entry = %entry, error = %e, "grouping import failed");
                    self.result.errors.push(format!("grouping {}: {:#}", entry, e));
                    self.report(BundlePhase::Groupings, i + 1, total, entry.as_str());
                }
            }
        }
    }

    async fn profiles(&mut self, archive: &mut BundleArchive) {
        let entries = archive.entry_names(EntityKind::Profile);
        let total = entries.len();
        let (store, workspace_id) = (self.store, self.workspace_id);
        let mut existing: Vec<Profile> = self
            .existing("profiles", store.list_profiles(workspace_id))
            .await;

        for (i, entry) in entries.iter().enumerate() {
            if self.cancelled() {
                return;
            }

            let outcome = async {
                let profile = archive.read_profile(entry)?;
                let name = profile.name.clone();
                if existing
                    .iter()
                    .any(|p| p.name == name && p.config == profile.config)
                {
                    debug!(profile = %name, "profile already present");
                    return Ok::<(String, bool), anyhow::Error>((name, false));
                }

                let live = profile.into_live(&Uuid::new_v4().to_string(), self.workspace_id, self.now);
                self.store.insert_profile(&live).await?;
                if self.options.skip_duplicates {
                    existing.push(live);
                }
                Ok((name, true))
            }
            .await;

            match outcome {
                Ok((name, inserted)) => {
                    if inserted {
                        self.result.profiles_imported += 1;
                    } else {
                        self.result.profiles_skipped += 1;
                    }
                    self.report(BundlePhase::Profiles, i + 1, total, name);
                }
                Err(e) => {
                    warn!(entry = %entry, error = %e, "profile import failed");
                    self.result.errors.push(format!("profile {}: {:#}", entry, e));
                    self.report(BundlePhase::Profiles, i + 1, total, entry.as_str());
                }
            }
        }
    }

    async fn record(&mut self, archive: &BundleArchive) {
        let manifest = archive.manifest();
        let record = ImportProvenance {
            id: Uuid::new_v4().to_string(),
            workspace_id: self.workspace_id.to_string(),
            source_path: archive.path().display().to_string(),
            source_workspace_id: manifest.source.workspace_id.clone(),
            source_workspace_name: manifest.source.workspace_name.clone(),
            bundle_created_at: manifest.created_at.timestamp(),
            documents_imported: self.result.documents_imported,
            documents_skipped: self.result.documents_skipped,
            groupings_imported: self.result.groupings_imported,
            profiles_imported: self.result.profiles_imported,
            error_count: self.result.errors.len() as u64,
            imported_at: self.now,
        };
        match self.store.insert_provenance(&record).await {
            Ok(()) => self.result.provenance_id = Some(record.id),
            Err(e) => {
                warn!(error = %e, "failed to record import provenance");
                self.result
                    .errors
                    .push(format!("recording import provenance: {:#}", e));
            }
        }
    }
}

/// Stream an embedded source file into `out` and check it against the
/// digest recorded for its document.
fn verify_source(
    archive: &mut BundleArchive,
    entry: &str,
    expected: &ContentIdentity,
    out: &mut dyn Write,
) -> Result<()> {
    let actual = archive
        .copy_source_file(entry, out)
        .with_context(|| format!("reading {}", entry))?;
    if actual != *expected {
        bail!(
            "source file digest mismatch: archived {}, actual {}",
            expected,
            actual
        );
    }
    Ok(())
}

/// Write an embedded source file under `dir` as `<short-hash>-<name>`.
///
/// Bytes go to a `.partial` sibling first and are renamed only once their
/// digest checks out. An existing file of the same name is left untouched.
fn materialize(
    archive: &mut BundleArchive,
    entry: &str,
    dir: &Path,
    doc: &ArchivedDocument,
) -> Result<String> {
    std::fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    let safe_name: String = doc
        .filename
        .chars()
        .map(|c| if matches!(c, '/' | '\\' | ':') { '_' } else { c })
        .collect();
    let name = format!("{}-{}", doc.content_hash.short(), safe_name);
    let path = dir.join(&name);

    if path.exists() {
        verify_source(archive, entry, &doc.content_hash, &mut std::io::sink())?;
        return Ok(path.display().to_string());
    }

    let partial = dir.join(format!("{}.partial", name));
    let mut file =
        File::create(&partial).with_context(|| format!("writing {}", partial.display()))?;
    let written = verify_source(archive, entry, &doc.content_hash, &mut file)
        .and_then(|()| file.sync_all().context("flushing source file"));
    drop(file);
    if let Err(e) = written {
        if let Err(rm) = std::fs::remove_file(&partial) {
            warn!(path = %partial.display(), error = %rm, "could not remove partial source file");
        }
        return Err(e);
    }
    std::fs::rename(&partial, &path).with_context(|| format!("writing {}", path.display()))?;
    Ok(path.display().to_string())
}

/// Open the bundle at `path` and import it. Manifest validation happens
/// before anything is read or written.
pub async fn import_bundle_file(
    store: &dyn Store,
    path: &Path,
    workspace_id: &str,
    options: &ImportOptions,
    progress: &dyn ProgressReporter,
) -> BundleResult<ImportResult> {
    progress.report(BundleProgress::new(
        BundlePhase::Validating,
        0,
        0,
        path.display().to_string(),
    ));
    let mut archive = match BundleArchive::open(path).await {
        Ok(a) => a,
        Err(e) => {
            progress.report(BundleProgress::new(BundlePhase::Failed, 0, 0, e.to_string()));
            return Err(e);
        }
    };
    import_bundle(store, &mut archive, workspace_id, options, progress).await
}

/// Import an opened bundle into `workspace_id`.
///
/// Returns `Err` only for fatal problems detected before any write (unknown
/// workspace). Everything else lands in [`ImportResult::errors`].
pub async fn import_bundle(
    store: &dyn Store,
    archive: &mut BundleArchive,
    workspace_id: &str,
    options: &ImportOptions,
    progress: &dyn ProgressReporter,
) -> BundleResult<ImportResult> {
    if store.get_workspace(workspace_id).await?.is_none() {
        let err = BundleError::WorkspaceNotFound(workspace_id.to_string());
        progress.report(BundleProgress::new(BundlePhase::Failed, 0, 0, err.to_string()));
        return Err(err);
    }

    let mut run = ImportRun {
        store,
        workspace_id,
        options,
        progress,
        ids: IdentifierMap::new(),
        result: ImportResult::default(),
        now: chrono::Utc::now().timestamp(),
    };

    // Match-only when documents are off, so groupings can still reach
    // documents the target already holds.
    run.documents(archive).await;
    if run.ids.is_empty() {
        debug!("no archived document resolved to a target document");
    } else {
        debug!(mapped = run.ids.len(), "archived documents resolved");
    }
    if options.import_groupings && !run.cancelled() {
        run.groupings(archive).await;
    }
    if options.import_profiles && !run.cancelled() {
        run.profiles(archive).await;
    }

    run.report(BundlePhase::Recording, 0, 0, "provenance");
    run.record(archive).await;

    let mut result = run.result;
    result.success = result.errors.is_empty();

    info!(
        imported = result.documents_imported,
        skipped = result.documents_skipped,
        groupings = result.groupings_imported,
        groupings_skipped = result.groupings_skipped,
        profiles = result.profiles_imported,
        profiles_skipped = result.profiles_skipped,
        errors = result.errors.len(),
        "bundle imported"
    );
    progress.report(BundleProgress::new(BundlePhase::Complete, 0, 0, "done"));

    Ok(result)
}
