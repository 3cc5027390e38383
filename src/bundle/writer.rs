//! Bundle export.
//!
//! Packages a workspace into a `.lens` archive. Export is read-only with
//! respect to the store. Entries are streamed straight into
//! `<output>.partial`, which is renamed into place only once the archive is
//! complete; a failed or cancelled export removes it.

use std::collections::HashMap;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::BundleConfig;
use crate::identity::{ContentHasher, ContentIdentity};
use crate::models::{Document, Workspace};
use crate::progress::{BundlePhase, BundleProgress, ProgressReporter};
use crate::store::Store;

use super::entity::{ArchivedDocument, ArchivedEntity, ArchivedGrouping, ArchivedProfile};
use super::error::{BundleError, BundleResult};
use super::manifest::{self, Manifest, ManifestSource};
use super::{MANIFEST_ENTRY, SOURCE_FILES_DIR};

const COPY_BUF_BYTES: usize = 64 * 1024;

/// What to include in an export.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub include_text: bool,
    pub include_analysis: bool,
    pub include_groupings: bool,
    pub include_profiles: bool,
    pub include_source_files: bool,
    pub cancel: CancellationToken,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_text: true,
            include_analysis: true,
            include_groupings: true,
            include_profiles: true,
            include_source_files: false,
            cancel: CancellationToken::new(),
        }
    }
}

impl ExportOptions {
    /// Everything, including source file bytes.
    pub fn all() -> Self {
        Self {
            include_source_files: true,
            ..Self::default()
        }
    }
}

impl From<&BundleConfig> for ExportOptions {
    fn from(cfg: &BundleConfig) -> Self {
        Self {
            include_text: cfg.include_text,
            include_analysis: cfg.include_analysis,
            include_groupings: cfg.include_groupings,
            include_profiles: cfg.include_profiles,
            include_source_files: cfg.include_source_files,
            cancel: CancellationToken::new(),
        }
    }
}

/// Result of a successful export.
#[derive(Debug, Clone, Serialize)]
pub struct BundleSummary {
    pub path: PathBuf,
    pub manifest: Manifest,
    pub bytes_written: u64,
}

/// Tracks which `sourcefiles/` entries have been written.
#[derive(Default)]
struct SourceFileIndex {
    by_name: HashMap<String, ContentIdentity>,
    by_hash: HashMap<ContentIdentity, String>,
}

impl SourceFileIndex {
    /// Entry name for a document's bytes, and whether it still has to be written.
    fn claim(&mut self, filename: &str, hash: &ContentIdentity) -> (String, bool) {
        if let Some(existing) = self.by_hash.get(hash) {
            return (existing.clone(), false);
        }
        let base = sanitize_filename(filename);
        let plain = format!("{}/{}", SOURCE_FILES_DIR, base);
        let name = if self.by_name.contains_key(&plain) {
            format!("{}/{}-{}", SOURCE_FILES_DIR, hash.short(), base)
        } else {
            plain
        };
        self.by_name.insert(name.clone(), hash.clone());
        self.by_hash.insert(hash.clone(), name.clone());
        (name, true)
    }

    /// Undo a claim whose bytes never made it into the archive.
    fn release(&mut self, hash: &ContentIdentity) {
        if let Some(name) = self.by_hash.remove(hash) {
            self.by_name.remove(&name);
        }
    }
}

fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = cleaned.trim_start_matches('.');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

fn entry_options() -> SimpleFileOptions {
    SimpleFileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .large_file(true)
}

fn add_entry<W: Write + std::io::Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    bytes: &[u8],
) -> BundleResult<()> {
    zip.start_file(name, entry_options())?;
    zip.write_all(bytes)?;
    Ok(())
}

/// Copy a document's source file into the archive in fixed-size chunks.
///
/// Returns `false`, with no entry left behind, when the file is unreachable
/// or no longer matches the digest recorded when it was added. Failures on
/// the archive side are errors.
fn embed_source<W: Write + std::io::Seek>(
    zip: &mut ZipWriter<W>,
    name: &str,
    doc: &Document,
) -> BundleResult<bool> {
    let Some(path) = doc.file_path.as_deref() else {
        return Ok(false);
    };
    let mut file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!(file = %path, error = %e, "source file unreachable; not embedding");
            return Ok(false);
        }
    };

    zip.start_file(name, entry_options())?;
    let mut hasher = ContentHasher::default();
    let mut buf = vec![0u8; COPY_BUF_BYTES];
    loop {
        let n = match file.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(file = %path, error = %e, "source file unreadable; not embedding");
                zip.abort_file()?;
                return Ok(false);
            }
        };
        hasher.update(&buf[..n]);
        zip.write_all(&buf[..n])?;
    }

    let copied = hasher.len();
    if hasher.finish() != doc.content_hash {
        warn!(file = %path, "source file changed since it was added; not embedding");
        zip.abort_file()?;
        return Ok(false);
    }
    debug!(file = %path, entry = name, bytes = copied, "embedded source file");
    Ok(true)
}

fn partial_path(output: &Path) -> PathBuf {
    let mut partial = output.as_os_str().to_owned();
    partial.push(".partial");
    PathBuf::from(partial)
}

/// Export `workspace_id` into a bundle at `output`.
///
/// A workspace with no documents still produces a valid (empty) bundle.
pub async fn write_bundle(
    store: &dyn Store,
    workspace_id: &str,
    output: &Path,
    options: &ExportOptions,
    progress: &dyn ProgressReporter,
) -> BundleResult<BundleSummary> {
    let workspace = store
        .get_workspace(workspace_id)
        .await?
        .ok_or_else(|| BundleError::WorkspaceNotFound(workspace_id.to_string()))?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let partial = partial_path(output);
    let manifest = match write_archive(store, &workspace, &partial, options, progress).await {
        Ok(manifest) => manifest,
        Err(e) => {
            if let Err(rm) = tokio::fs::remove_file(&partial).await {
                if rm.kind() != ErrorKind::NotFound {
                    warn!(path = %partial.display(), error = %rm, "could not remove partial bundle");
                }
            }
            return Err(e);
        }
    };
    tokio::fs::rename(&partial, output).await?;
    let bytes_written = tokio::fs::metadata(output).await?.len();

    debug!(
        missing = manifest.contents.missing_source_files.len(),
        "source files not embedded"
    );
    info!(
        path = %output.display(),
        documents = manifest.contents.document_count,
        groupings = manifest.contents.grouping_count,
        profiles = manifest.contents.profile_count,
        bytes = bytes_written,
        "bundle written"
    );

    let total = manifest.contents.document_count
        + manifest.contents.grouping_count
        + manifest.contents.profile_count;
    progress.report(BundleProgress::new(
        BundlePhase::Complete,
        total,
        total,
        output.display().to_string(),
    ));

    Ok(BundleSummary {
        path: output.to_path_buf(),
        manifest,
        bytes_written,
    })
}

/// Stream every entry into `partial` and return the manifest written last.
async fn write_archive(
    store: &dyn Store,
    workspace: &Workspace,
    partial: &Path,
    options: &ExportOptions,
    progress: &dyn ProgressReporter,
) -> BundleResult<Manifest> {
    let mut manifest = Manifest::new(ManifestSource {
        workspace_id: workspace.id.clone(),
        workspace_name: workspace.name.clone(),
        app_version: env!("CARGO_PKG_VERSION").to_string(),
    });
    manifest.contents.includes_text = options.include_text;
    manifest.contents.includes_analysis = options.include_analysis;
    manifest.contents.includes_source_files = options.include_source_files;

    let documents = store.list_documents(&workspace.id).await?;
    let groupings = if options.include_groupings {
        store.list_groupings(&workspace.id).await?
    } else {
        Vec::new()
    };
    let profiles = if options.include_profiles {
        store.list_profiles(&workspace.id).await?
    } else {
        Vec::new()
    };
    let total = (documents.len() + groupings.len() + profiles.len()) as u64;
    let mut done = 0u64;

    let mut zip = ZipWriter::new(File::create(partial)?);
    let mut sources = SourceFileIndex::default();

    for doc in &documents {
        if options.cancel.is_cancelled() {
            return Err(BundleError::Cancelled);
        }

        let analyses = if options.include_analysis {
            Some(store.list_analyses(&doc.id).await?)
        } else {
            None
        };
        let mut archived = ArchivedDocument::from_live(doc, analyses.as_deref(), options.include_text);

        if options.include_source_files {
            let (name, fresh) = sources.claim(&doc.filename, &doc.content_hash);
            if !fresh {
                archived.source_file = Some(name);
            } else if embed_source(&mut zip, &name, doc)? {
                manifest.contents.source_file_count += 1;
                archived.source_file = Some(name);
            } else {
                sources.release(&doc.content_hash);
                manifest.contents.missing_source_files.push(doc.filename.clone());
            }
        }

        let entity = ArchivedEntity::Document(archived);
        add_entry(&mut zip, &entity.entry_name(), &entity.to_json()?)?;
        manifest.contents.document_count += 1;

        done += 1;
        progress.report(BundleProgress::new(
            BundlePhase::Packaging,
            done,
            total,
            doc.filename.clone(),
        ));
    }

    for grouping in &groupings {
        if options.cancel.is_cancelled() {
            return Err(BundleError::Cancelled);
        }
        let entity = ArchivedEntity::Grouping(ArchivedGrouping::from_live(grouping));
        add_entry(&mut zip, &entity.entry_name(), &entity.to_json()?)?;
        manifest.contents.grouping_count += 1;

        done += 1;
        progress.report(BundleProgress::new(
            BundlePhase::Packaging,
            done,
            total,
            format!("grouping {}", grouping.name),
        ));
    }

    for profile in &profiles {
        if options.cancel.is_cancelled() {
            return Err(BundleError::Cancelled);
        }
        let entity = ArchivedEntity::Profile(ArchivedProfile::from_live(profile));
        add_entry(&mut zip, &entity.entry_name(), &entity.to_json()?)?;
        manifest.contents.profile_count += 1;

        done += 1;
        progress.report(BundleProgress::new(
            BundlePhase::Packaging,
            done,
            total,
            format!("profile {}", profile.name),
        ));
    }

    if options.cancel.is_cancelled() {
        return Err(BundleError::Cancelled);
    }

    add_entry(&mut zip, MANIFEST_ENTRY, &manifest::encode(&manifest)?)?;
    let file = zip.finish()?;
    file.sync_all()?;
    Ok(manifest)
}
