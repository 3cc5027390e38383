//! Live workspace records.
//!
//! These are the rows the [`Store`](crate::store::Store) persists. Bundle
//! entities in [`crate::bundle::entity`] are snapshots of these types.

use serde::{Deserialize, Serialize};

use crate::identity::ContentIdentity;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub id: String,
    pub name: String,
    pub created_at: i64,
}

/// A document admitted into a workspace.
///
/// `text` and `pages` are `None` when no text has been extracted (or when the
/// document came from a bundle exported without text).
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub workspace_id: String,
    pub content_hash: ContentIdentity,
    pub filename: String,
    pub file_path: Option<String>,
    pub file_size: i64,
    pub mime_type: String,
    pub title: Option<String>,
    pub organization: Option<String>,
    pub year: Option<i64>,
    pub domain: Option<String>,
    pub country: Option<String>,
    pub report_type: Option<String>,
    pub metadata: serde_json::Value,
    pub text: Option<String>,
    pub pages: Option<Vec<String>>,
    pub created_at: i64,
}

/// Derived analysis result attached to a document, one per kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub document_id: String,
    pub kind: String,
    pub payload: serde_json::Value,
    pub created_at: i64,
}

/// A named collection of documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub description: Option<String>,
    pub color: Option<String>,
    /// Member document ids in display order.
    pub document_ids: Vec<String>,
    pub created_at: i64,
}

/// A named set of analysis preferences. At most one per workspace is active.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub id: String,
    pub workspace_id: String,
    pub name: String,
    pub description: Option<String>,
    pub config: serde_json::Value,
    pub is_active: bool,
    pub created_at: i64,
}

/// Audit record written once per completed bundle import.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportProvenance {
    pub id: String,
    pub workspace_id: String,
    pub source_path: String,
    pub source_workspace_id: String,
    pub source_workspace_name: String,
    pub bundle_created_at: i64,
    pub documents_imported: u64,
    pub documents_skipped: u64,
    pub groupings_imported: u64,
    pub profiles_imported: u64,
    pub error_count: u64,
    pub imported_at: i64,
}
