/// Sqlite persistence for the workflow document
///
/// The canonical JSON document lives in a small key-value table under the
/// key "iosans-workflow". Persistence is optional: the in-memory store is
/// authoritative and this layer only loads at startup and saves on change.

use sqlx::{sqlite::SqlitePool, Row};

use crate::error::Result;
use crate::workflow::types::Workflow;

/// Document key the editor and engine agree on.
pub const WORKFLOW_DOCUMENT_KEY: &str = "iosans-workflow";

/// Sqlite-backed storage for the workflow document
#[derive(Debug, Clone)]
pub struct WorkflowStorage {
    pool: SqlitePool,
}

impl WorkflowStorage {
    /// Create a storage instance and ensure the schema exists.
    pub async fn new(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                key TEXT PRIMARY KEY,
                body JSON NOT NULL,
                updated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Store the workflow document, replacing any previous revision.
    pub async fn save(&self, workflow: &Workflow) -> Result<()> {
        let body = serde_json::to_string(workflow)
            .map_err(|e| crate::error::EngineError::StorageFailure(e.to_string()))?;

        sqlx::query(
            r#"
            INSERT INTO documents (key, body, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT(key) DO UPDATE SET
                body = excluded.body,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(WORKFLOW_DOCUMENT_KEY)
        .bind(&body)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Load the persisted workflow document, if one exists.
    pub async fn load(&self) -> Result<Option<Workflow>> {
        let row = sqlx::query("SELECT body FROM documents WHERE key = ?")
            .bind(WORKFLOW_DOCUMENT_KEY)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => {
                let body: String = row.get("body");
                let workflow: Workflow = serde_json::from_str(&body)
                    .map_err(|e| crate::error::EngineError::StorageFailure(e.to_string()))?;
                Ok(Some(workflow))
            }
            None => Ok(None),
        }
    }
}
