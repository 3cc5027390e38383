use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;

/// Create the database (if needed), apply the schema, and make sure the
/// configured workspace row exists.
pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;
    apply(&pool).await?;

    sqlx::query("INSERT OR IGNORE INTO workspaces (id, name, created_at) VALUES (?, ?, ?)")
        .bind(&config.workspace.id)
        .bind(&config.workspace.name)
        .bind(chrono::Utc::now().timestamp())
        .execute(&pool)
        .await?;

    pool.close().await;
    Ok(())
}

/// Apply the schema to an open pool. Idempotent.
pub async fn apply(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS workspaces (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            created_at INTEGER NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL,
            content_hash TEXT NOT NULL,
            filename TEXT NOT NULL,
            file_path TEXT,
            file_size INTEGER NOT NULL,
            mime_type TEXT NOT NULL,
            title TEXT,
            organization TEXT,
            year INTEGER,
            domain TEXT,
            country TEXT,
            report_type TEXT,
            metadata_json TEXT NOT NULL DEFAULT '{}',
            text TEXT,
            pages_json TEXT,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (workspace_id) REFERENCES workspaces(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS analyses (
            document_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            payload_json TEXT NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (document_id, kind),
            FOREIGN KEY (document_id) REFERENCES documents(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS groupings (
            id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            color TEXT,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (workspace_id) REFERENCES workspaces(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS grouping_documents (
            grouping_id TEXT NOT NULL,
            document_id TEXT NOT NULL,
            position INTEGER NOT NULL,
            PRIMARY KEY (grouping_id, document_id),
            FOREIGN KEY (grouping_id) REFERENCES groupings(id),
            FOREIGN KEY (document_id) REFERENCES documents(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS profiles (
            id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL,
            name TEXT NOT NULL,
            description TEXT,
            config_json TEXT NOT NULL DEFAULT '{}',
            is_active INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (workspace_id) REFERENCES workspaces(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS import_provenance (
            id TEXT PRIMARY KEY,
            workspace_id TEXT NOT NULL,
            source_path TEXT NOT NULL,
            source_workspace_id TEXT NOT NULL,
            source_workspace_name TEXT NOT NULL,
            bundle_created_at INTEGER NOT NULL,
            documents_imported INTEGER NOT NULL,
            documents_skipped INTEGER NOT NULL,
            groupings_imported INTEGER NOT NULL,
            profiles_imported INTEGER NOT NULL,
            error_count INTEGER NOT NULL,
            imported_at INTEGER NOT NULL,
            FOREIGN KEY (workspace_id) REFERENCES workspaces(id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create indexes
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_documents_content_hash ON documents(workspace_id, content_hash)",
    )
    .execute(pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_groupings_workspace ON groupings(workspace_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_profiles_workspace ON profiles(workspace_id)")
        .execute(pool)
        .await?;

    Ok(())
}
