//! Postgres persistence (upsert-by-natural-key) and the raw export archive.

use sqlx::PgPool;
use thiserror::Error;
use tracing::info;

use cxsync_core::{AgentDirectoryEntry, ConversationRecord};

pub mod archive;

pub use archive::ExportArchive;

pub const CRATE_NAME: &str = "cxsync-storage";

/// Upsert batch size; keeps individual transactions small on large backfills.
const UPSERT_BATCH_SIZE: usize = 100;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Write-side store for the conversation-metrics and agent-roster tables.
/// The pipeline only ever upserts; reads belong to the dashboard, not here.
#[derive(Debug, Clone)]
pub struct MetricsStore {
    pool: PgPool,
}

impl MetricsStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(database_url).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Create the sink tables when absent. Safe to re-run.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS qa_metrics (
                conversation_id   TEXT PRIMARY KEY,
                agent_id          TEXT NOT NULL,
                agent_name        TEXT NOT NULL,
                metric_date       DATE NOT NULL,
                ai_score          DOUBLE PRECISION,
                ai_feedback       TEXT,
                resolution_status TEXT NOT NULL,
                rating_source     TEXT NOT NULL DEFAULT 'none',
                tags              JSONB NOT NULL DEFAULT '[]'::jsonb,
                workspace         TEXT NOT NULL DEFAULT 'Unknown',
                is_360_queue      BOOLEAN NOT NULL DEFAULT FALSE,
                queue_type_360    TEXT,
                updated_at        TIMESTAMPTZ NOT NULL DEFAULT NOW()
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS agents (
                agent_id   TEXT PRIMARY KEY,
                agent_name TEXT NOT NULL,
                active     BOOLEAN NOT NULL DEFAULT TRUE
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Idempotent upsert of conversation records on `conversation_id`.
    /// Re-running with identical input rewrites rows to identical values.
    pub async fn upsert_conversations(
        &self,
        records: &[ConversationRecord],
    ) -> Result<u64, StoreError> {
        let mut written = 0u64;
        for (batch_no, batch) in records.chunks(UPSERT_BATCH_SIZE).enumerate() {
            for record in batch {
                let tags = serde_json::to_value(&record.tags).unwrap_or_default();
                sqlx::query(
                    r#"
                    INSERT INTO qa_metrics (
                        conversation_id, agent_id, agent_name, metric_date,
                        ai_score, ai_feedback, resolution_status, rating_source,
                        tags, workspace, is_360_queue, queue_type_360, updated_at
                    ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
                    ON CONFLICT (conversation_id) DO UPDATE SET
                        agent_id          = excluded.agent_id,
                        agent_name        = excluded.agent_name,
                        metric_date       = excluded.metric_date,
                        ai_score          = excluded.ai_score,
                        ai_feedback       = excluded.ai_feedback,
                        resolution_status = excluded.resolution_status,
                        rating_source     = excluded.rating_source,
                        tags              = excluded.tags,
                        workspace         = excluded.workspace,
                        is_360_queue      = excluded.is_360_queue,
                        queue_type_360    = excluded.queue_type_360,
                        updated_at        = NOW()
                    "#,
                )
                .bind(&record.conversation_id)
                .bind(&record.agent_id)
                .bind(&record.agent_name)
                .bind(record.metric_date)
                .bind(record.ai_score)
                .bind(&record.ai_feedback)
                .bind(&record.resolution_status)
                .bind(&record.rating_source)
                .bind(&tags)
                .bind(record.workspace.as_str())
                .bind(record.is_360_queue)
                .bind(record.queue_type_360.map(|q| q.as_str()))
                .execute(&self.pool)
                .await?;
                written += 1;
            }
            info!(
                batch = batch_no + 1,
                rows = batch.len(),
                "upserted conversation batch"
            );
        }
        Ok(written)
    }

    /// Idempotent upsert of the derived agent roster on `agent_id`.
    pub async fn upsert_agents(&self, agents: &[AgentDirectoryEntry]) -> Result<u64, StoreError> {
        let mut written = 0u64;
        for agent in agents {
            sqlx::query(
                r#"
                INSERT INTO agents (agent_id, agent_name, active)
                VALUES ($1, $2, $3)
                ON CONFLICT (agent_id) DO UPDATE SET
                    agent_name = excluded.agent_name,
                    active     = excluded.active
                "#,
            )
            .bind(&agent.agent_id)
            .bind(&agent.agent_name)
            .bind(agent.active)
            .execute(&self.pool)
            .await?;
            written += 1;
        }
        Ok(written)
    }
}
