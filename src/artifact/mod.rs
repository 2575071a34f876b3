/// Artifact store: binary payloads by reference
///
/// Executors that produce audio, images, or large JSON persist the bytes
/// here and pass `{artifactId, type}` through the graph instead of the
/// payload itself. Artifacts outlive a single run; they are created by
/// executors, never mutated, and removed only through explicit deletion.

pub mod mime;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use uuid::Uuid;

use crate::error::{EngineError, Result};

/// Metadata row for an artifact (no blob).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactMetadata {
    pub id: String,
    pub mime_type: String,
    pub category: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A stored artifact: metadata plus the payload.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub metadata: ArtifactMetadata,
    pub blob: Vec<u8>,
}

/// Aggregate store statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactStats {
    pub count: u64,
    pub total_size: u64,
}

/// Sqlite-backed artifact store with secondary indexes on category and
/// creation time.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    pool: SqlitePool,
}

impl ArtifactStore {
    /// Create a store over an existing pool and ensure the schema exists.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS artifacts (
                id TEXT PRIMARY KEY,
                mime_type TEXT NOT NULL,
                category TEXT NOT NULL,
                size INTEGER NOT NULL,
                blob BLOB NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_artifacts_category ON artifacts(category)")
            .execute(&pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_artifacts_created_at ON artifacts(created_at)")
            .execute(&pool)
            .await?;

        Ok(Self { pool })
    }

    /// Create a store backed by an in-memory database.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(SqliteConnectOptions::new().in_memory(true))
            .await?;
        Self::new(pool).await
    }

    /// Store a blob and return its fresh id.
    ///
    /// The MIME type is sniffed from magic bytes with the caller's hint as
    /// fallback. Empty input is rejected.
    pub async fn save(
        &self,
        blob: Vec<u8>,
        category: &str,
        mime_hint: Option<&str>,
    ) -> Result<String> {
        if blob.is_empty() {
            return Err(EngineError::InvalidInput(
                "cannot store an empty artifact".to_string(),
            ));
        }

        let id = Uuid::new_v4().to_string();
        let mime_type = mime::detect(&blob, mime_hint, None);
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO artifacts (id, mime_type, category, size, blob, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&mime_type)
        .bind(category)
        .bind(blob.len() as i64)
        .bind(&blob)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        tracing::debug!("💾 Stored artifact {} ({}, {} bytes)", id, mime_type, blob.len());
        Ok(id)
    }

    /// Fetch an artifact with its payload.
    pub async fn get(&self, id: &str) -> Result<Option<Artifact>> {
        let row = sqlx::query(
            "SELECT id, mime_type, category, size, blob, created_at, updated_at \
             FROM artifacts WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| Artifact {
            metadata: metadata_from_row(&row),
            blob: row.get::<Vec<u8>, _>("blob"),
        }))
    }

    /// Delete an artifact. Returns false when it was absent.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM artifacts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// List artifact metadata, optionally filtered by category. Blobs are
    /// never loaded for listings.
    pub async fn list(&self, category: Option<&str>) -> Result<Vec<ArtifactMetadata>> {
        let rows = match category {
            Some(category) => {
                sqlx::query(
                    "SELECT id, mime_type, category, size, created_at, updated_at \
                     FROM artifacts WHERE category = ? ORDER BY created_at DESC",
                )
                .bind(category)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, mime_type, category, size, created_at, updated_at \
                     FROM artifacts ORDER BY created_at DESC",
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        Ok(rows.iter().map(metadata_from_row).collect())
    }

    /// Aggregate count and byte total.
    pub async fn stats(&self) -> Result<ArtifactStats> {
        let row = sqlx::query(
            "SELECT COUNT(*) AS count, COALESCE(SUM(size), 0) AS total_size FROM artifacts",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(ArtifactStats {
            count: row.get::<i64, _>("count") as u64,
            total_size: row.get::<i64, _>("total_size") as u64,
        })
    }

    /// Remove every artifact.
    pub async fn clear_all(&self) -> Result<()> {
        sqlx::query("DELETE FROM artifacts").execute(&self.pool).await?;
        Ok(())
    }
}

fn metadata_from_row(row: &sqlx::sqlite::SqliteRow) -> ArtifactMetadata {
    ArtifactMetadata {
        id: row.get("id"),
        mime_type: row.get("mime_type"),
        category: row.get("category"),
        size: row.get::<i64, _>("size") as u64,
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}
