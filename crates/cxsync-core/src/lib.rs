//! Core domain model and pure normalization logic for the CX metrics sync.

use std::collections::HashMap;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

pub mod classify;
pub mod redact;
pub mod timestamp;

pub use classify::{determine_360_queue, determine_workspace, QueueType360, Workspace};

pub const CRATE_NAME: &str = "cxsync-core";

/// Sentinel agent id emitted when the export row carries no assignee at all.
pub const UNKNOWN_AGENT_ID: &str = "Unknown";
/// Sentinel display name for ids that resolve to nothing in the admin map.
pub const UNASSIGNED_AGENT_NAME: &str = "Unassigned";

/// Where a record's `metric_date` came from. Diagnostic only; never persisted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateSource {
    /// One of the export feed's date columns parsed.
    #[default]
    Export,
    /// No export column parsed; the run date stood in.
    Fallback,
    /// The conversation-detail endpoint answered and overrode the export.
    Detail,
}

/// Canonical per-conversation metrics record, keyed by `conversation_id`.
///
/// `workspace`, `tags`, `is_360_queue` and `queue_type_360` hold placeholder
/// defaults until enrichment has run; the export feed does not carry tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    pub conversation_id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub metric_date: NaiveDate,
    pub ai_score: Option<f64>,
    pub ai_feedback: Option<String>,
    pub resolution_status: String,
    pub rating_source: String,
    pub tags: Vec<String>,
    pub workspace: Workspace,
    pub is_360_queue: bool,
    pub queue_type_360: Option<QueueType360>,
    #[serde(skip)]
    pub date_source: DateSource,
}

/// Roster projection derived from a batch of records, keyed by `agent_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDirectoryEntry {
    pub agent_id: String,
    pub agent_name: String,
    pub active: bool,
}

static ALL_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").expect("digit pattern"));
static HEX_LIKE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[0-9a-fA-F-]{8,}$").expect("hex pattern"));

/// True when the value reads like an opaque teammate identifier (numeric or
/// uuid/hex-like) rather than an already-resolved display name.
pub fn looks_like_agent_id(value: &str) -> bool {
    let value = value.trim();
    ALL_DIGITS.is_match(value) || HEX_LIKE.is_match(value)
}

/// Resolve a raw assignee value to a display name via the admin directory.
///
/// Values that do not look like ids pass through unchanged; ids missing from
/// the map resolve to the `"Unassigned"` sentinel.
pub fn resolve_agent_name(agent_id: &str, admins: &HashMap<String, String>) -> String {
    if agent_id.is_empty() || agent_id == UNKNOWN_AGENT_ID {
        return UNASSIGNED_AGENT_NAME.to_string();
    }
    let trimmed = agent_id.trim();
    if !looks_like_agent_id(trimmed) {
        return agent_id.to_string();
    }
    admins
        .get(trimmed)
        .cloned()
        .unwrap_or_else(|| UNASSIGNED_AGENT_NAME.to_string())
}

/// Parse an AI CX score. Only values inside [1, 5] are meaningful; anything
/// else (including the 0 placeholder the export emits) is treated as absent.
pub fn parse_ai_score(raw: &str) -> Option<f64> {
    let value: f64 = raw.trim().parse().ok()?;
    if (1.0..=5.0).contains(&value) {
        Some((value * 100.0).round() / 100.0)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn admins() -> HashMap<String, String> {
        HashMap::from([
            ("12345".to_string(), "Amy Chen".to_string()),
            ("deadbeef-0001".to_string(), "Bogdan Ilie".to_string()),
        ])
    }

    #[test]
    fn numeric_id_resolves_via_map() {
        assert_eq!(resolve_agent_name("12345", &admins()), "Amy Chen");
    }

    #[test]
    fn hex_like_id_resolves_via_map() {
        assert_eq!(resolve_agent_name("deadbeef-0001", &admins()), "Bogdan Ilie");
    }

    #[test]
    fn display_name_passes_through() {
        assert_eq!(resolve_agent_name("Amy Chen", &admins()), "Amy Chen");
    }

    #[test]
    fn unknown_sentinel_maps_to_unassigned() {
        assert_eq!(resolve_agent_name("Unknown", &admins()), "Unassigned");
        assert_eq!(resolve_agent_name("", &admins()), "Unassigned");
    }

    #[test]
    fn unmapped_id_maps_to_unassigned() {
        assert_eq!(resolve_agent_name("99999", &admins()), "Unassigned");
    }

    #[test]
    fn ai_score_rounds_to_two_decimals() {
        assert_eq!(parse_ai_score("4.567"), Some(4.57));
        assert_eq!(parse_ai_score("3"), Some(3.0));
    }

    #[test]
    fn ai_score_outside_range_is_absent() {
        assert_eq!(parse_ai_score("6"), None);
        assert_eq!(parse_ai_score("0"), None);
        assert_eq!(parse_ai_score("not-a-number"), None);
    }
}
