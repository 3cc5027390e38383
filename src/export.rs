//! `lens estimate` and `lens export`.
//!
//! Thin CLI wrappers over [`crate::bundle`]: open the configured database,
//! run the operation against the configured workspace, print a summary.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::bundle::{estimate_bundle_size, write_bundle, ExportOptions, BUNDLE_EXTENSION};
use crate::config::Config;
use crate::db;
use crate::progress::ProgressMode;
use crate::store::SqliteStore;

fn format_size(bytes: u64) -> String {
    const MB: f64 = 1024.0 * 1024.0;
    if bytes as f64 >= MB {
        format!("{:.1} MB", bytes as f64 / MB)
    } else {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    }
}

/// `output` with the bundle extension added when it has none.
fn bundle_path(output: &Path) -> PathBuf {
    if output.extension().is_some() {
        output.to_path_buf()
    } else {
        output.with_extension(BUNDLE_EXTENSION)
    }
}

pub async fn run_estimate(config: &Config, options: &ExportOptions) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let estimate = estimate_bundle_size(&store, &config.workspace.id, options).await?;

    println!("estimate {}", config.workspace.id);
    println!("  documents: {}", estimate.document_count);
    println!("  estimated size: {}", format_size(estimate.size_bytes));
    if estimate.exceeds(config.bundle.warn_size_bytes()) {
        println!(
            "  warning: exceeds {} MB; consider exporting without source files",
            config.bundle.warn_size_mb
        );
    }
    println!("ok");

    pool.close().await;
    Ok(())
}

/// Export the configured workspace to `output`.
///
/// Runs the size estimate first and warns on stderr when the bundle is
/// likely to exceed `bundle.warn_size_mb`.
pub async fn run_export(
    config: &Config,
    output: &Path,
    options: &ExportOptions,
    progress: ProgressMode,
) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let estimate = estimate_bundle_size(&store, &config.workspace.id, options).await?;
    if estimate.exceeds(config.bundle.warn_size_bytes()) {
        eprintln!(
            "warning: estimated bundle size {} exceeds {} MB",
            format_size(estimate.size_bytes),
            config.bundle.warn_size_mb
        );
    }

    let output = bundle_path(output);
    let reporter = progress.reporter();
    let summary = write_bundle(
        &store,
        &config.workspace.id,
        &output,
        options,
        reporter.as_ref(),
    )
    .await?;

    let contents = &summary.manifest.contents;
    println!("export {}", config.workspace.id);
    println!("  documents: {}", contents.document_count);
    println!("  groupings: {}", contents.grouping_count);
    println!("  profiles: {}", contents.profile_count);
    if contents.includes_source_files {
        println!("  source files: {}", contents.source_file_count);
        for missing in &contents.missing_source_files {
            println!("  missing source file: {}", missing);
        }
    }
    println!(
        "  written: {} ({})",
        summary.path.display(),
        format_size(summary.bytes_written)
    );
    println!("ok");

    pool.close().await;
    Ok(())
}
