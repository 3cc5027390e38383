//! `lens preview`, `lens import`, and `lens history`.

use anyhow::Result;
use std::path::Path;

use crate::bundle::{import_bundle_file, preview_bundle, BundleArchive, DocumentStatus, ImportOptions};
use crate::config::Config;
use crate::db;
use crate::progress::ProgressMode;
use crate::store::{SqliteStore, Store};

/// How many per-item errors the CLI prints before summarizing the rest.
const MAX_ERRORS_SHOWN: usize = 10;

pub async fn run_preview(config: &Config, archive_path: &Path, json: bool) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let mut archive = BundleArchive::open(archive_path).await?;
    let preview = preview_bundle(&store, &mut archive, &config.workspace.id).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
    } else {
        let source = &preview.manifest.source;
        println!("preview {}", archive_path.display());
        println!(
            "  from: {} ({}), lens {}",
            source.workspace_name, source.workspace_id, source.app_version
        );
        println!("  created: {}", preview.manifest.created_at.to_rfc3339());
        for doc in &preview.documents {
            let status = match &doc.status {
                DocumentStatus::New => "new".to_string(),
                DocumentStatus::Duplicate { existing_id } => format!("duplicate of {}", existing_id),
                DocumentStatus::SourceUnavailable => "source unavailable".to_string(),
            };
            println!("  document {}  {}", doc.filename, status);
        }
        for grouping in &preview.groupings {
            println!(
                "  grouping {}  {} members",
                grouping.name,
                grouping.document_ids.len()
            );
        }
        for profile in &preview.profiles {
            println!("  profile {}", profile.name);
        }
        println!("  new: {}", preview.new_count());
        println!("  duplicates: {}", preview.duplicate_count());
        println!("  source unavailable: {}", preview.unavailable_count());
        for err in &preview.errors {
            println!("  unreadable: {}", err);
        }
        println!("ok");
    }

    pool.close().await;
    Ok(())
}

pub async fn run_import(
    config: &Config,
    archive_path: &Path,
    options: &ImportOptions,
    progress: ProgressMode,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let reporter = progress.reporter();
    let result = import_bundle_file(
        &store,
        archive_path,
        &config.workspace.id,
        options,
        reporter.as_ref(),
    )
    .await?;

    println!("import {}", archive_path.display());
    println!("  documents imported: {}", result.documents_imported);
    println!("  documents skipped: {}", result.documents_skipped);
    println!("  groupings imported: {}", result.groupings_imported);
    println!("  groupings skipped: {}", result.groupings_skipped);
    println!("  profiles imported: {}", result.profiles_imported);
    println!("  profiles skipped: {}", result.profiles_skipped);
    if result.members_dropped > 0 {
        println!("  grouping members dropped: {}", result.members_dropped);
    }
    for err in result.errors.iter().take(MAX_ERRORS_SHOWN) {
        println!("  error: {}", err);
    }
    if result.errors.len() > MAX_ERRORS_SHOWN {
        println!(
            "  ... and {} more errors",
            result.errors.len() - MAX_ERRORS_SHOWN
        );
    }
    println!("{}", if result.success { "ok" } else { "partial" });

    pool.close().await;
    Ok(())
}

pub async fn run_history(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let records = store.list_provenance(&config.workspace.id).await?;
    println!("history {}", config.workspace.id);
    for r in &records {
        let when = chrono::DateTime::from_timestamp(r.imported_at, 0)
            .map(|dt| dt.format("%Y-%m-%dT%H:%M:%SZ").to_string())
            .unwrap_or_else(|| r.imported_at.to_string());
        println!(
            "  {}  {}  from {}  imported {} skipped {} errors {}",
            when,
            r.source_path,
            r.source_workspace_name,
            r.documents_imported,
            r.documents_skipped,
            r.error_count
        );
    }
    println!("  imports: {}", records.len());
    println!("ok");

    pool.close().await;
    Ok(())
}
