//! Export row → `ConversationRecord` normalization.

use std::collections::HashMap;

use chrono::Utc;
use tracing::warn;

use cxsync_core::redact::anonymize_text;
use cxsync_core::timestamp::resolve_date;
use cxsync_core::{
    parse_ai_score, resolve_agent_name, ConversationRecord, DateSource, Workspace,
    UNKNOWN_AGENT_ID,
};

use crate::csv::RawRow;

/// Date source fields, highest priority first: when the conversation actually
/// started, falling back to when it was last closed.
const DATE_FIELDS: &[&str] = &["conversation_started_at", "conversation_last_closed_at"];

const AGENT_FIELDS: &[&str] = &[
    "currently_assigned_teammate_id",
    "currently_assigned_teammate_raw_id",
    "assignee_id",
];

const SCORE_FIELDS: &[&str] = &[
    "ai_cx_score_rating",
    "conversation_rating",
    "fin_ai_agent_rating",
];

fn first_present<'a>(row: &'a RawRow, fields: &[&str]) -> Option<&'a str> {
    fields
        .iter()
        .find_map(|field| row.get(*field).map(String::as_str).filter(|v| !v.is_empty()))
}

/// Normalize one export row. Rows without a conversation id are dropped here
/// (returns `None`); every other degradation has a defined fallback.
pub fn normalize_row(row: &RawRow, admins: &HashMap<String, String>) -> Option<ConversationRecord> {
    let conversation_id = row
        .get("conversation_id")
        .filter(|id| !id.is_empty())?
        .clone();

    let (metric_date, date_source) = match DATE_FIELDS
        .iter()
        .filter_map(|field| row.get(*field))
        .find_map(|value| resolve_date(value))
    {
        Some(date) => (date, DateSource::Export),
        None => {
            warn!(%conversation_id, "no parseable timestamp; falling back to today");
            (Utc::now().date_naive(), DateSource::Fallback)
        }
    };

    let agent_id = first_present(row, AGENT_FIELDS)
        .unwrap_or(UNKNOWN_AGENT_ID)
        .to_string();
    let agent_name = resolve_agent_name(&agent_id, admins);

    let ai_score = first_present(row, SCORE_FIELDS).and_then(parse_ai_score);
    let rating_source = if ai_score.is_some() { "ai" } else { "none" }.to_string();

    let ai_feedback = row
        .get("ai_cx_score_explanation")
        .filter(|text| !text.is_empty())
        .map(|text| anonymize_text(text));

    let resolution_status = row
        .get("conversation_state")
        .filter(|state| !state.is_empty())
        .cloned()
        .unwrap_or_else(|| "completed".to_string());

    Some(ConversationRecord {
        conversation_id,
        agent_id,
        agent_name,
        metric_date,
        ai_score,
        ai_feedback,
        resolution_status,
        rating_source,
        tags: Vec::new(),
        workspace: Workspace::Unknown,
        is_360_queue: false,
        queue_type_360: None,
        date_source,
    })
}
