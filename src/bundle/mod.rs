//! Portable workspace bundles.
//!
//! A bundle (`*.lens`) is a ZIP archive with this layout:
//!
//! ```text
//! manifest.json                     Manifest (format, version, provenance, counts)
//! documents/<archived-id>.json      ArchivedDocument, one per document
//! groupings/<archived-id>.json      ArchivedGrouping, one per grouping
//! profiles/<archived-id>.json       ArchivedProfile, one per profile
//! sourcefiles/<original-filename>   raw source bytes (optional)
//! ```
//!
//! ## Flow
//!
//! ```text
//! export:  estimate (advisory) ──▶ entity snapshots ──▶ writer ──▶ .lens
//! import:  .lens ──▶ reader (manifest check) ──▶ preview (read-only)
//!                                          └──▶ import ──▶ Store
//! ```
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`manifest`] | Manifest encode/decode and version gate |
//! | [`entity`] | Archived record types per entity kind |
//! | [`writer`] | Assemble a bundle from a workspace |
//! | [`reader`] | Open a bundle and read its entries |
//! | [`preview`] | Classify archived documents against a target workspace |
//! | [`import`] | Apply a bundle to a target workspace |
//! | [`estimate`] | Pre-flight export size estimate |

pub mod entity;
pub mod error;
pub mod estimate;
pub mod idmap;
pub mod import;
pub mod manifest;
pub mod preview;
pub mod reader;
pub mod writer;

pub use error::{BundleError, BundleResult};
pub use estimate::{estimate_bundle_size, SizeEstimate};
pub use import::{import_bundle, import_bundle_file, ImportOptions, ImportResult};
pub use manifest::Manifest;
pub use preview::{preview_bundle, DocumentStatus, ImportPreview};
pub use reader::BundleArchive;
pub use writer::{write_bundle, BundleSummary, ExportOptions};

/// Archive entry holding the manifest.
pub const MANIFEST_ENTRY: &str = "manifest.json";

/// Archive directory holding embedded source files.
pub const SOURCE_FILES_DIR: &str = "sourcefiles";

/// Conventional bundle file extension.
pub const BUNDLE_EXTENSION: &str = "lens";
