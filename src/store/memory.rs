//! In-memory [`Store`] implementation for tests and embedding.
//!
//! Uses `Vec`s behind `std::sync::RwLock`; insertion order is preserved so
//! listing matches the SQLite backend's rowid order.

use std::sync::RwLock;

use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::identity::ContentIdentity;
use crate::models::{Analysis, Document, Grouping, ImportProvenance, Profile, Workspace};

use super::Store;

/// In-memory store for testing.
pub struct InMemoryStore {
    workspaces: RwLock<Vec<Workspace>>,
    documents: RwLock<Vec<Document>>,
    analyses: RwLock<Vec<Analysis>>,
    groupings: RwLock<Vec<Grouping>>,
    profiles: RwLock<Vec<Profile>>,
    provenance: RwLock<Vec<ImportProvenance>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            workspaces: RwLock::new(Vec::new()),
            documents: RwLock::new(Vec::new()),
            analyses: RwLock::new(Vec::new()),
            groupings: RwLock::new(Vec::new()),
            profiles: RwLock::new(Vec::new()),
            provenance: RwLock::new(Vec::new()),
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn create_workspace(&self, workspace: &Workspace) -> Result<()> {
        let mut workspaces = self.workspaces.write().unwrap();
        if workspaces.iter().any(|w| w.id == workspace.id) {
            bail!("workspace already exists: {}", workspace.id);
        }
        workspaces.push(workspace.clone());
        Ok(())
    }

    async fn get_workspace(&self, id: &str) -> Result<Option<Workspace>> {
        let workspaces = self.workspaces.read().unwrap();
        Ok(workspaces.iter().find(|w| w.id == id).cloned())
    }

    async fn list_documents(&self, workspace_id: &str) -> Result<Vec<Document>> {
        let docs = self.documents.read().unwrap();
        Ok(docs
            .iter()
            .filter(|d| d.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn find_document_by_hash(
        &self,
        workspace_id: &str,
        hash: &ContentIdentity,
    ) -> Result<Option<String>> {
        let docs = self.documents.read().unwrap();
        Ok(docs
            .iter()
            .find(|d| d.workspace_id == workspace_id && &d.content_hash == hash)
            .map(|d| d.id.clone()))
    }

    async fn insert_document(&self, doc: &Document, analyses: &[Analysis]) -> Result<()> {
        let mut docs = self.documents.write().unwrap();
        if docs.iter().any(|d| d.id == doc.id) {
            bail!("document already exists: {}", doc.id);
        }
        if let Some(stray) = analyses.iter().find(|a| a.document_id != doc.id) {
            bail!(
                "analysis '{}' belongs to {}, not {}",
                stray.kind,
                stray.document_id,
                doc.id
            );
        }
        docs.push(doc.clone());
        self.analyses
            .write()
            .unwrap()
            .extend(analyses.iter().cloned());
        Ok(())
    }

    async fn list_analyses(&self, document_id: &str) -> Result<Vec<Analysis>> {
        let analyses = self.analyses.read().unwrap();
        Ok(analyses
            .iter()
            .filter(|a| a.document_id == document_id)
            .cloned()
            .collect())
    }

    async fn list_groupings(&self, workspace_id: &str) -> Result<Vec<Grouping>> {
        let groupings = self.groupings.read().unwrap();
        Ok(groupings
            .iter()
            .filter(|g| g.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn insert_grouping(&self, grouping: &Grouping) -> Result<()> {
        {
            let docs = self.documents.read().unwrap();
            for member in &grouping.document_ids {
                if !docs
                    .iter()
                    .any(|d| &d.id == member && d.workspace_id == grouping.workspace_id)
                {
                    bail!("grouping member not in workspace: {}", member);
                }
            }
        }
        self.groupings.write().unwrap().push(grouping.clone());
        Ok(())
    }

    async fn list_profiles(&self, workspace_id: &str) -> Result<Vec<Profile>> {
        let profiles = self.profiles.read().unwrap();
        Ok(profiles
            .iter()
            .filter(|p| p.workspace_id == workspace_id)
            .cloned()
            .collect())
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<()> {
        self.profiles.write().unwrap().push(profile.clone());
        Ok(())
    }

    async fn insert_provenance(&self, record: &ImportProvenance) -> Result<()> {
        self.provenance.write().unwrap().push(record.clone());
        Ok(())
    }

    async fn list_provenance(&self, workspace_id: &str) -> Result<Vec<ImportProvenance>> {
        let records = self.provenance.read().unwrap();
        Ok(records
            .iter()
            .filter(|r| r.workspace_id == workspace_id)
            .cloned()
            .collect())
    }
}
