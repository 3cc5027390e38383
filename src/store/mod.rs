//! Storage abstraction for workspaces.
//!
//! The [`Store`] trait is the only way the bundle engine touches persisted
//! state. It is deliberately append-only: there is no update or delete, so
//! neither export nor import can destroy existing records.
//!
//! Implementations must be `Send + Sync` to work with async runtimes.

pub mod memory;
pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;

use crate::identity::ContentIdentity;
use crate::models::{Analysis, Document, Grouping, ImportProvenance, Profile, Workspace};

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

/// Abstract storage backend.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`create_workspace`](Store::create_workspace) | Register a workspace |
/// | [`find_document_by_hash`](Store::find_document_by_hash) | Duplicate lookup by content identity |
/// | [`insert_document`](Store::insert_document) | Add a document and its analyses atomically |
/// | [`insert_grouping`](Store::insert_grouping) | Add a grouping with its membership |
/// | [`insert_profile`](Store::insert_profile) | Add an analysis profile |
/// | [`insert_provenance`](Store::insert_provenance) | Append an import audit record |
#[async_trait]
pub trait Store: Send + Sync {
    async fn create_workspace(&self, workspace: &Workspace) -> Result<()>;

    async fn get_workspace(&self, id: &str) -> Result<Option<Workspace>>;

    /// All documents of a workspace, in admission order.
    async fn list_documents(&self, workspace_id: &str) -> Result<Vec<Document>>;

    /// Id of a document in `workspace_id` with the given content identity.
    async fn find_document_by_hash(
        &self,
        workspace_id: &str,
        hash: &ContentIdentity,
    ) -> Result<Option<String>>;

    /// Insert a document together with its analysis records.
    ///
    /// Either everything is stored or nothing is.
    async fn insert_document(&self, doc: &Document, analyses: &[Analysis]) -> Result<()>;

    async fn list_analyses(&self, document_id: &str) -> Result<Vec<Analysis>>;

    async fn list_groupings(&self, workspace_id: &str) -> Result<Vec<Grouping>>;

    async fn insert_grouping(&self, grouping: &Grouping) -> Result<()>;

    async fn list_profiles(&self, workspace_id: &str) -> Result<Vec<Profile>>;

    async fn insert_profile(&self, profile: &Profile) -> Result<()>;

    async fn insert_provenance(&self, record: &ImportProvenance) -> Result<()>;

    async fn list_provenance(&self, workspace_id: &str) -> Result<Vec<ImportProvenance>>;
}
