//! Admission of local source files into a workspace.
//!
//! Computes the content identity of each file and stores a new document
//! unless the workspace already holds identical bytes. Text is kept for
//! UTF-8 files only; binary formats are stored without text.

use anyhow::{Context, Result};
use std::path::Path;
use uuid::Uuid;

use crate::config::Config;
use crate::db;
use crate::identity::ContentIdentity;
use crate::models::Document;
use crate::store::{SqliteStore, Store};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    Added(String),
    /// Identical bytes already present under this document id.
    Duplicate(String),
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => "application/pdf",
        Some("md") | Some("markdown") => "text/markdown",
        Some("txt") => "text/plain",
        Some("html") | Some("htm") => "text/html",
        Some("csv") => "text/csv",
        Some("json") => "application/json",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => "application/octet-stream",
    }
}

pub async fn admit_file(store: &dyn Store, workspace_id: &str, path: &Path) -> Result<Admission> {
    let hash = ContentIdentity::compute_file(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if let Some(existing) = store.find_document_by_hash(workspace_id, &hash).await? {
        return Ok(Admission::Duplicate(existing));
    }

    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "unnamed".to_string());
    let absolute = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
    let mime_type = mime_for(path);
    let file_size = tokio::fs::metadata(path)
        .await
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();
    let text = if mime_type == "application/pdf" || mime_type.contains("openxmlformats") {
        None
    } else {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        String::from_utf8(bytes).ok()
    };

    let doc = Document {
        id: Uuid::new_v4().to_string(),
        workspace_id: workspace_id.to_string(),
        content_hash: hash,
        title: path.file_stem().map(|s| s.to_string_lossy().to_string()),
        filename,
        file_path: Some(absolute.display().to_string()),
        file_size: file_size as i64,
        mime_type: mime_type.to_string(),
        organization: None,
        year: None,
        domain: None,
        country: None,
        report_type: None,
        metadata: serde_json::json!({}),
        text,
        pages: None,
        created_at: chrono::Utc::now().timestamp(),
    };
    store.insert_document(&doc, &[]).await?;
    Ok(Admission::Added(doc.id))
}

/// `lens add`: admit each file, reporting duplicates instead of failing.
pub async fn run_add(config: &Config, paths: &[std::path::PathBuf]) -> Result<()> {
    let pool = db::connect(config).await?;
    let store = SqliteStore::new(pool.clone());

    let mut added = 0u64;
    let mut duplicates = 0u64;
    for path in paths {
        match admit_file(&store, &config.workspace.id, path).await? {
            Admission::Added(id) => {
                added += 1;
                println!("  added {}  {}", id, path.display());
            }
            Admission::Duplicate(id) => {
                duplicates += 1;
                println!("  duplicate of {}  {}", id, path.display());
            }
        }
    }

    println!("add");
    println!("  added: {}", added);
    println!("  duplicates: {}", duplicates);
    println!("ok");

    pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Workspace;
    use crate::store::InMemoryStore;
    use tempfile::TempDir;

    async fn store_with_workspace() -> InMemoryStore {
        let store = InMemoryStore::new();
        store
            .create_workspace(&Workspace {
                id: "ws".into(),
                name: "WS".into(),
                created_at: 0,
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn identical_bytes_under_new_name_are_duplicates() {
        let tmp = TempDir::new().unwrap();
        let a = tmp.path().join("notes.md");
        let b = tmp.path().join("notes-copy.txt");
        std::fs::write(&a, "# Notes\n\nsame body").unwrap();
        std::fs::write(&b, "# Notes\n\nsame body").unwrap();

        let store = store_with_workspace().await;
        let id = match admit_file(&store, "ws", &a).await.unwrap() {
            Admission::Added(id) => id,
            other => panic!("expected Added, got {:?}", other),
        };
        assert_eq!(
            admit_file(&store, "ws", &b).await.unwrap(),
            Admission::Duplicate(id)
        );
        assert_eq!(store.list_documents("ws").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn text_kept_for_utf8_and_dropped_for_pdf() {
        let tmp = TempDir::new().unwrap();
        let md = tmp.path().join("a.md");
        let pdf = tmp.path().join("b.pdf");
        std::fs::write(&md, "hello").unwrap();
        std::fs::write(&pdf, b"%PDF-1.7 binary").unwrap();

        let store = store_with_workspace().await;
        admit_file(&store, "ws", &md).await.unwrap();
        admit_file(&store, "ws", &pdf).await.unwrap();

        let docs = store.list_documents("ws").await.unwrap();
        assert_eq!(docs[0].text.as_deref(), Some("hello"));
        assert_eq!(docs[0].mime_type, "text/markdown");
        assert_eq!(docs[1].text, None);
        assert_eq!(docs[1].mime_type, "application/pdf");
        assert_eq!(docs[1].file_size, 15);
    }
}
