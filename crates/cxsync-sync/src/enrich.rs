//! Per-conversation enrichment over the Conversations API.
//!
//! The export feed carries tags and source timestamps unreliably, so each
//! normalized record gets a second pass against the detail endpoint. Batches
//! run concurrently with a pause between them to stay under rate limits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinSet;
use tokio::time::sleep;
use tracing::{debug, warn};

use cxsync_core::classify::{determine_360_queue, determine_workspace};
use cxsync_core::{ConversationRecord, DateSource};
use cxsync_intercom::{ConversationDetail, IntercomClient};

/// Source of per-conversation detail, abstracted so the enricher can be
/// exercised without a live API.
#[async_trait]
pub trait DetailSource: Send + Sync {
    async fn fetch_detail(&self, conversation_id: &str) -> anyhow::Result<ConversationDetail>;
}

#[async_trait]
impl DetailSource for IntercomClient {
    async fn fetch_detail(&self, conversation_id: &str) -> anyhow::Result<ConversationDetail> {
        Ok(self.fetch_conversation(conversation_id).await?)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EnrichConfig {
    /// Conversations fetched concurrently per batch.
    pub batch_size: usize,
    /// Pause between batches.
    pub batch_delay: Duration,
}

impl Default for EnrichConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_delay: Duration::from_millis(500),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichmentOutcome {
    pub enriched: usize,
    pub failed: usize,
}

/// Enriches records in place. A failed fetch is non-fatal: the record keeps
/// its export-derived values and the failure counter increments.
pub async fn enrich_records(
    source: Arc<dyn DetailSource>,
    records: &mut [ConversationRecord],
    config: &EnrichConfig,
) -> EnrichmentOutcome {
    let mut outcome = EnrichmentOutcome::default();
    let batch_size = config.batch_size.max(1);
    let total_batches = records.len().div_ceil(batch_size);

    for (batch_no, chunk) in records.chunks_mut(batch_size).enumerate() {
        let mut tasks = JoinSet::new();
        for (slot, record) in chunk.iter().enumerate() {
            let source = Arc::clone(&source);
            let conversation_id = record.conversation_id.clone();
            tasks.spawn(async move { (slot, source.fetch_detail(&conversation_id).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((slot, Ok(detail))) => {
                    apply_detail(&mut chunk[slot], detail);
                    outcome.enriched += 1;
                }
                Ok((slot, Err(err))) => {
                    debug!(
                        conversation_id = %chunk[slot].conversation_id,
                        error = %err,
                        "detail fetch failed, keeping export values"
                    );
                    outcome.failed += 1;
                }
                Err(err) => {
                    warn!(error = %err, "enrichment task panicked");
                    outcome.failed += 1;
                }
            }
        }

        if batch_no + 1 < total_batches {
            sleep(config.batch_delay).await;
        }
    }

    outcome
}

fn apply_detail(record: &mut ConversationRecord, detail: ConversationDetail) {
    if let Some(real_date) = detail.created_date {
        if real_date != record.metric_date {
            debug!(
                conversation_id = %record.conversation_id,
                export_date = %record.metric_date,
                detail_date = %real_date,
                "detail date overrides export date"
            );
        }
        record.metric_date = real_date;
        record.date_source = DateSource::Detail;
    }

    let (is_360, queue_type) = determine_360_queue(&detail.tags);
    record.workspace = determine_workspace(&detail.tags);
    record.is_360_queue = is_360;
    record.queue_type_360 = queue_type;
    record.tags = detail.tags;
}
