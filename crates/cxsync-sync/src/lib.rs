//! Orchestration: one pipeline run pulls a reporting-data export from
//! Intercom, normalizes and enriches the rows, and upserts the results into
//! Postgres. Also hosts the optional cron scheduler for unattended runs.

pub mod enrich;

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use uuid::Uuid;

use cxsync_core::{AgentDirectoryEntry, ConversationRecord, UNASSIGNED_AGENT_NAME, UNKNOWN_AGENT_ID};
use cxsync_intercom::export::DEFAULT_ATTRIBUTE_IDS;
use cxsync_intercom::{IntercomClient, IntercomConfig, PollConfig};
use cxsync_storage::{ExportArchive, MetricsStore};

pub use enrich::{enrich_records, DetailSource, EnrichConfig, EnrichmentOutcome};

pub const CRATE_NAME: &str = "cxsync-sync";

const SECONDS_PER_DAY: i64 = 86_400;

/// Runtime configuration, sourced from the environment in deployments.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub database_url: String,
    pub intercom_token: String,
    pub intercom_app_id: Option<String>,
    pub archive_dir: PathBuf,
    /// How many days back from now the export window starts.
    pub lookback_days: i64,
    /// Whether to run the per-conversation enrichment pass.
    pub enrich: bool,
    pub poll: PollConfig,
    pub enrich_config: EnrichConfig,
    pub scheduler_enabled: bool,
    pub morning_cron: String,
    pub evening_cron: String,
}

impl SyncConfig {
    pub fn from_env() -> Result<Self> {
        let intercom_token =
            std::env::var("INTERCOM_TOKEN").context("INTERCOM_TOKEN must be set")?;
        let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;

        let intercom_app_id = std::env::var("INTERCOM_APP_ID")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let archive_dir = std::env::var("CXSYNC_ARCHIVE_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("archive"));

        let lookback_days = std::env::var("CXSYNC_LOOKBACK_DAYS")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .filter(|d| *d > 0)
            .unwrap_or(1);
        let enrich = std::env::var("CXSYNC_SKIP_ENRICH").is_err();

        let scheduler_enabled = std::env::var("CXSYNC_SCHEDULER_ENABLED")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false);
        let morning_cron =
            std::env::var("CXSYNC_MORNING_CRON").unwrap_or_else(|_| "0 0 6 * * *".to_string());
        let evening_cron =
            std::env::var("CXSYNC_EVENING_CRON").unwrap_or_else(|_| "0 0 18 * * *".to_string());

        Ok(Self {
            database_url,
            intercom_token,
            intercom_app_id,
            archive_dir,
            lookback_days,
            enrich,
            poll: PollConfig::default(),
            enrich_config: EnrichConfig::default(),
            scheduler_enabled,
            morning_cron,
            evening_cron,
        })
    }
}

/// Outcome of one full pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct SyncRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub window_start: i64,
    pub window_end: i64,
    pub rows_parsed: usize,
    pub rows_skipped: usize,
    pub records: usize,
    pub enriched: usize,
    pub enrich_failed: usize,
    pub conversations_upserted: u64,
    pub agents_upserted: u64,
}

pub struct SyncPipeline {
    config: SyncConfig,
    intercom: IntercomClient,
    store: MetricsStore,
    archive: ExportArchive,
}

impl SyncPipeline {
    pub async fn from_config(config: SyncConfig) -> Result<Self> {
        let intercom_config = IntercomConfig::new(config.intercom_token.clone())
            .with_app_id(config.intercom_app_id.clone());
        let intercom = IntercomClient::new(intercom_config).context("building Intercom client")?;

        let store = MetricsStore::connect(&config.database_url)
            .await
            .context("connecting to Postgres")?;
        store.ensure_schema().await.context("ensuring schema")?;

        let archive = ExportArchive::new(config.archive_dir.clone());

        Ok(Self {
            config,
            intercom,
            store,
            archive,
        })
    }

    /// Run the pipeline once over the configured lookback window.
    pub async fn run_once(&self) -> Result<SyncRunSummary> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let window_end = started_at.timestamp();
        let window_start = window_end - self.config.lookback_days * SECONDS_PER_DAY;
        info!(%run_id, window_start, window_end, "starting sync run");

        let admins = self.intercom.fetch_admins_map().await;
        info!(%run_id, admins = admins.len(), "admin directory loaded");

        let job = self
            .intercom
            .enqueue_export(window_start, window_end, DEFAULT_ATTRIBUTE_IDS)
            .await
            .context("enqueueing export job")?;
        let job = self
            .intercom
            .poll_export(&job.job_identifier, &self.config.poll)
            .await
            .context("waiting for export job")?;
        let payload = self
            .intercom
            .download_export(&job)
            .await
            .context("downloading export payload")?;

        let extension = if payload.starts_with(&[0x1f, 0x8b]) {
            "csv.gz"
        } else {
            "csv"
        };
        let archived = self
            .archive
            .save(started_at, &job.job_identifier, extension, &payload)
            .await
            .context("archiving export payload")?;
        info!(%run_id, path = %archived.display(), "export payload archived");

        let text = cxsync_intercom::csv::decode_export_bytes(&payload)
            .context("decoding export payload")?;

        let mut rows_parsed = 0usize;
        let mut rows_skipped = 0usize;
        let mut records: Vec<ConversationRecord> = Vec::new();
        for row in cxsync_intercom::csv::parse_csv(&text) {
            rows_parsed += 1;
            match cxsync_intercom::normalize::normalize_row(&row, &admins) {
                Some(record) => records.push(record),
                None => rows_skipped += 1,
            }
        }
        info!(%run_id, rows_parsed, rows_skipped, records = records.len(), "export rows normalized");

        let outcome = if self.config.enrich && !records.is_empty() {
            let source: Arc<dyn DetailSource> = Arc::new(self.intercom.clone());
            let outcome = enrich_records(source, &mut records, &self.config.enrich_config).await;
            info!(%run_id, enriched = outcome.enriched, failed = outcome.failed, "enrichment finished");
            outcome
        } else {
            if !self.config.enrich {
                warn!(%run_id, "enrichment disabled, keeping export-derived values");
            }
            EnrichmentOutcome::default()
        };

        let conversations_upserted = self
            .store
            .upsert_conversations(&records)
            .await
            .context("upserting conversation metrics")?;

        let roster = derive_agent_roster(&records);
        let agents_upserted = self
            .store
            .upsert_agents(&roster)
            .await
            .context("upserting agent roster")?;

        let summary = SyncRunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            window_start,
            window_end,
            rows_parsed,
            rows_skipped,
            records: records.len(),
            enriched: outcome.enriched,
            enrich_failed: outcome.failed,
            conversations_upserted,
            agents_upserted,
        };
        info!(
            %run_id,
            records = summary.records,
            conversations = summary.conversations_upserted,
            agents = summary.agents_upserted,
            "sync run complete"
        );
        Ok(summary)
    }

    /// Build the cron scheduler when enabled; returns `None` otherwise.
    pub async fn maybe_build_scheduler(self: &Arc<Self>) -> Result<Option<JobScheduler>> {
        if !self.config.scheduler_enabled {
            return Ok(None);
        }

        let scheduler = JobScheduler::new()
            .await
            .context("creating job scheduler")?;
        for cron in [&self.config.morning_cron, &self.config.evening_cron] {
            let pipeline = Arc::clone(self);
            let job = Job::new_async(cron.as_str(), move |_id, _lock| {
                let pipeline = Arc::clone(&pipeline);
                Box::pin(async move {
                    if let Err(err) = pipeline.run_once().await {
                        error!(error = %err, "scheduled sync run failed");
                    }
                })
            })
            .with_context(|| format!("parsing cron expression {cron:?}"))?;
            scheduler.add(job).await.context("registering sync job")?;
        }
        Ok(Some(scheduler))
    }
}

/// Distinct `(agent_id, agent_name)` pairs observed in a batch, with the
/// placeholder sentinels excluded. Order-independent and deduplicated.
pub fn derive_agent_roster(records: &[ConversationRecord]) -> Vec<AgentDirectoryEntry> {
    let mut seen: BTreeSet<(String, String)> = BTreeSet::new();
    for record in records {
        if record.agent_id == UNKNOWN_AGENT_ID || record.agent_name == UNASSIGNED_AGENT_NAME {
            continue;
        }
        if record.agent_id.is_empty() {
            continue;
        }
        seen.insert((record.agent_id.clone(), record.agent_name.clone()));
    }
    seen.into_iter()
        .map(|(agent_id, agent_name)| AgentDirectoryEntry {
            agent_id,
            agent_name,
            active: true,
        })
        .collect()
}

/// Convenience entry point used by the CLI: config from the environment,
/// one run, summary back.
pub async fn run_sync_once_from_env(
    lookback_days: Option<i64>,
    enrich: Option<bool>,
) -> Result<SyncRunSummary> {
    let mut config = SyncConfig::from_env()?;
    if let Some(days) = lookback_days {
        config.lookback_days = days;
    }
    if let Some(enrich) = enrich {
        config.enrich = enrich;
    }
    let pipeline = SyncPipeline::from_config(config).await?;
    pipeline.run_once().await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, name: &str) -> ConversationRecord {
        ConversationRecord {
            conversation_id: format!("c-{id}-{name}"),
            agent_id: id.to_string(),
            agent_name: name.to_string(),
            ..ConversationRecord::default()
        }
    }

    #[test]
    fn roster_dedupes_and_drops_sentinels() {
        let records = vec![
            record("1", "Amy"),
            record("1", "Amy"),
            record("2", UNASSIGNED_AGENT_NAME),
            record(UNKNOWN_AGENT_ID, "Ghost"),
        ];

        let roster = derive_agent_roster(&records);

        assert_eq!(
            roster,
            vec![AgentDirectoryEntry {
                agent_id: "1".to_string(),
                agent_name: "Amy".to_string(),
                active: true,
            }]
        );
    }

    #[test]
    fn roster_is_order_independent() {
        let mut forward = vec![record("3", "Cara"), record("1", "Amy"), record("2", "Bo")];
        let roster_forward = derive_agent_roster(&forward);
        forward.reverse();
        let roster_reverse = derive_agent_roster(&forward);

        assert_eq!(roster_forward, roster_reverse);
        assert_eq!(roster_forward.len(), 3);
    }

    #[test]
    fn roster_keeps_name_variants_for_same_id() {
        let records = vec![record("1", "Amy"), record("1", "Amy L.")];
        let roster = derive_agent_roster(&records);
        assert_eq!(roster.len(), 2);
    }
}
