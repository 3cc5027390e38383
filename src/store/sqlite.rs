//! SQLite-backed [`Store`] implementation.
//!
//! Maps each [`Store`] operation onto the schema created by
//! [`migrate::apply`](crate::migrate::apply). Only `INSERT` and `SELECT`
//! statements are issued.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::identity::ContentIdentity;
use crate::models::{Analysis, Document, Grouping, ImportProvenance, Profile, Workspace};

use super::Store;

/// SQLite implementation of the [`Store`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

const DOCUMENT_COLUMNS: &str = "id, workspace_id, content_hash, filename, file_path, file_size, \
     mime_type, title, organization, year, domain, country, report_type, metadata_json, text, \
     pages_json, created_at";

fn document_from_row(row: &SqliteRow) -> Result<Document> {
    let id: String = row.get("id");
    let hash: String = row.get("content_hash");
    let metadata_json: String = row.get("metadata_json");
    let pages_json: Option<String> = row.get("pages_json");

    let pages = match pages_json {
        Some(json) => Some(
            serde_json::from_str::<Vec<String>>(&json)
                .with_context(|| format!("corrupt pages_json for document {}", id))?,
        ),
        None => None,
    };

    Ok(Document {
        content_hash: ContentIdentity::parse(&hash).map_err(|e| anyhow!(e))?,
        workspace_id: row.get("workspace_id"),
        filename: row.get("filename"),
        file_path: row.get("file_path"),
        file_size: row.get("file_size"),
        mime_type: row.get("mime_type"),
        title: row.get("title"),
        organization: row.get("organization"),
        year: row.get("year"),
        domain: row.get("domain"),
        country: row.get("country"),
        report_type: row.get("report_type"),
        metadata: serde_json::from_str(&metadata_json)
            .with_context(|| format!("corrupt metadata_json for document {}", id))?,
        text: row.get("text"),
        pages,
        created_at: row.get("created_at"),
        id,
    })
}

#[async_trait]
impl Store for SqliteStore {
    async fn create_workspace(&self, workspace: &Workspace) -> Result<()> {
        sqlx::query("INSERT INTO workspaces (id, name, created_at) VALUES (?, ?, ?)")
            .bind(&workspace.id)
            .bind(&workspace.name)
            .bind(workspace.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn get_workspace(&self, id: &str) -> Result<Option<Workspace>> {
        let row = sqlx::query("SELECT id, name, created_at FROM workspaces WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Workspace {
            id: r.get("id"),
            name: r.get("name"),
            created_at: r.get("created_at"),
        }))
    }

    async fn list_documents(&self, workspace_id: &str) -> Result<Vec<Document>> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM documents WHERE workspace_id = ? ORDER BY rowid",
            DOCUMENT_COLUMNS
        ))
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(document_from_row).collect()
    }

    async fn find_document_by_hash(
        &self,
        workspace_id: &str,
        hash: &ContentIdentity,
    ) -> Result<Option<String>> {
        let id: Option<String> = sqlx::query_scalar(
            "SELECT id FROM documents WHERE workspace_id = ? AND content_hash = ? ORDER BY rowid LIMIT 1",
        )
        .bind(workspace_id)
        .bind(hash.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    async fn insert_document(&self, doc: &Document, analyses: &[Analysis]) -> Result<()> {
        let pages_json = doc.pages.as_ref().map(serde_json::to_string).transpose()?;
        let metadata_json = serde_json::to_string(&doc.metadata)?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(&format!(
            "INSERT INTO documents ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            DOCUMENT_COLUMNS
        ))
        .bind(&doc.id)
        .bind(&doc.workspace_id)
        .bind(doc.content_hash.as_str())
        .bind(&doc.filename)
        .bind(&doc.file_path)
        .bind(doc.file_size)
        .bind(&doc.mime_type)
        .bind(&doc.title)
        .bind(&doc.organization)
        .bind(doc.year)
        .bind(&doc.domain)
        .bind(&doc.country)
        .bind(&doc.report_type)
        .bind(&metadata_json)
        .bind(&doc.text)
        .bind(&pages_json)
        .bind(doc.created_at)
        .execute(&mut *tx)
        .await?;

        for analysis in analyses {
            if analysis.document_id != doc.id {
                bail!(
                    "analysis '{}' belongs to {}, not {}",
                    analysis.kind,
                    analysis.document_id,
                    doc.id
                );
            }
            sqlx::query(
                "INSERT INTO analyses (document_id, kind, payload_json, created_at) VALUES (?, ?, ?, ?)",
            )
            .bind(&analysis.document_id)
            .bind(&analysis.kind)
            .bind(serde_json::to_string(&analysis.payload)?)
            .bind(analysis.created_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_analyses(&self, document_id: &str) -> Result<Vec<Analysis>> {
        let rows = sqlx::query(
            "SELECT document_id, kind, payload_json, created_at FROM analyses \
             WHERE document_id = ? ORDER BY kind",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let kind: String = row.get("kind");
                let payload_json: String = row.get("payload_json");
                let payload = serde_json::from_str(&payload_json)
                    .with_context(|| format!("corrupt '{}' analysis for {}", kind, document_id))?;
                Ok(Analysis {
                    document_id: row.get("document_id"),
                    kind,
                    payload,
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }

    async fn list_groupings(&self, workspace_id: &str) -> Result<Vec<Grouping>> {
        let rows = sqlx::query(
            "SELECT id, workspace_id, name, description, color, created_at FROM groupings \
             WHERE workspace_id = ? ORDER BY rowid",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        let mut groupings = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.get("id");
            let document_ids: Vec<String> = sqlx::query_scalar(
                "SELECT document_id FROM grouping_documents WHERE grouping_id = ? ORDER BY position",
            )
            .bind(&id)
            .fetch_all(&self.pool)
            .await?;

            groupings.push(Grouping {
                workspace_id: row.get("workspace_id"),
                name: row.get("name"),
                description: row.get("description"),
                color: row.get("color"),
                created_at: row.get("created_at"),
                document_ids,
                id,
            });
        }
        Ok(groupings)
    }

    async fn insert_grouping(&self, grouping: &Grouping) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO groupings (id, workspace_id, name, description, color, created_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&grouping.id)
        .bind(&grouping.workspace_id)
        .bind(&grouping.name)
        .bind(&grouping.description)
        .bind(&grouping.color)
        .bind(grouping.created_at)
        .execute(&mut *tx)
        .await?;

        // Members must be documents of the same workspace
        for (position, document_id) in grouping.document_ids.iter().enumerate() {
            let inserted = sqlx::query(
                "INSERT INTO grouping_documents (grouping_id, document_id, position) \
                 SELECT ?, id, ? FROM documents WHERE id = ? AND workspace_id = ?",
            )
            .bind(&grouping.id)
            .bind(position as i64)
            .bind(document_id)
            .bind(&grouping.workspace_id)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if inserted != 1 {
                bail!("grouping member not in workspace: {}", document_id);
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn list_profiles(&self, workspace_id: &str) -> Result<Vec<Profile>> {
        let rows = sqlx::query(
            "SELECT id, workspace_id, name, description, config_json, is_active, created_at \
             FROM profiles WHERE workspace_id = ? ORDER BY rowid",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let config_json: String = row.get("config_json");
                let config = serde_json::from_str(&config_json)
                    .with_context(|| format!("corrupt config_json for profile {}", id))?;
                Ok(Profile {
                    id,
                    workspace_id: row.get("workspace_id"),
                    name: row.get("name"),
                    description: row.get("description"),
                    config,
                    is_active: row.get("is_active"),
                    created_at: row.get("created_at"),
                })
            })
            .collect()
    }

    async fn insert_profile(&self, profile: &Profile) -> Result<()> {
        sqlx::query(
            "INSERT INTO profiles (id, workspace_id, name, description, config_json, is_active, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&profile.id)
        .bind(&profile.workspace_id)
        .bind(&profile.name)
        .bind(&profile.description)
        .bind(serde_json::to_string(&profile.config)?)
        .bind(profile.is_active)
        .bind(profile.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn insert_provenance(&self, record: &ImportProvenance) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO import_provenance (id, workspace_id, source_path, source_workspace_id,
                                           source_workspace_name, bundle_created_at,
                                           documents_imported, documents_skipped,
                                           groupings_imported, profiles_imported,
                                           error_count, imported_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.workspace_id)
        .bind(&record.source_path)
        .bind(&record.source_workspace_id)
        .bind(&record.source_workspace_name)
        .bind(record.bundle_created_at)
        .bind(record.documents_imported as i64)
        .bind(record.documents_skipped as i64)
        .bind(record.groupings_imported as i64)
        .bind(record.profiles_imported as i64)
        .bind(record.error_count as i64)
        .bind(record.imported_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_provenance(&self, workspace_id: &str) -> Result<Vec<ImportProvenance>> {
        let rows = sqlx::query(
            "SELECT * FROM import_provenance WHERE workspace_id = ? ORDER BY imported_at, rowid",
        )
        .bind(workspace_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| ImportProvenance {
                id: row.get("id"),
                workspace_id: row.get("workspace_id"),
                source_path: row.get("source_path"),
                source_workspace_id: row.get("source_workspace_id"),
                source_workspace_name: row.get("source_workspace_name"),
                bundle_created_at: row.get("bundle_created_at"),
                documents_imported: row.get::<i64, _>("documents_imported") as u64,
                documents_skipped: row.get::<i64, _>("documents_skipped") as u64,
                groupings_imported: row.get::<i64, _>("groupings_imported") as u64,
                profiles_imported: row.get::<i64, _>("profiles_imported") as u64,
                error_count: row.get::<i64, _>("error_count") as u64,
                imported_at: row.get("imported_at"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store(tmp: &TempDir) -> SqliteStore {
        let pool = crate::db::connect_path(&tmp.path().join("lens.sqlite"))
            .await
            .unwrap();
        crate::migrate::apply(&pool).await.unwrap();
        let store = SqliteStore::new(pool);
        store
            .create_workspace(&Workspace {
                id: "w".into(),
                name: "W".into(),
                created_at: 0,
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn corrupt_profile_config_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        sqlx::query(
            "INSERT INTO profiles (id, workspace_id, name, config_json, is_active, created_at) \
             VALUES ('p', 'w', 'Broken', '{ not json', 0, 0)",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let err = store.list_profiles("w").await.unwrap_err();
        assert!(err.to_string().contains("corrupt config_json for profile p"));
    }

    #[tokio::test]
    async fn profile_config_roundtrips() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        let profile = Profile {
            id: "p".into(),
            workspace_id: "w".into(),
            name: "Lens".into(),
            description: Some("d".into()),
            config: serde_json::json!({"focus": ["water"]}),
            is_active: false,
            created_at: 5,
        };
        store.insert_profile(&profile).await.unwrap();
        assert_eq!(store.list_profiles("w").await.unwrap(), vec![profile]);
    }

    #[tokio::test]
    async fn corrupt_document_metadata_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp).await;
        sqlx::query(
            "INSERT INTO documents (id, workspace_id, content_hash, filename, file_size, \
             mime_type, metadata_json, created_at) VALUES (?, 'w', ?, 'a.txt', 1, 'text/plain', '[oops', 0)",
        )
        .bind("d")
        .bind(ContentIdentity::from_bytes(b"a").as_str())
        .execute(&store.pool)
        .await
        .unwrap();

        let err = store.list_documents("w").await.unwrap_err();
        assert!(err.to_string().contains("corrupt metadata_json for document d"));
    }
}
