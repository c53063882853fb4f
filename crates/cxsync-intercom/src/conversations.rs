//! Single-conversation detail fetch: the authoritative source for creation
//! dates and tags. The bulk export is known to carry the wrong date, so the
//! detail endpoint always wins when it answers.

use chrono::NaiveDate;
use serde_json::Value;

use cxsync_core::timestamp::resolve_date;

use crate::{status_error, IntercomClient, IntercomError};

/// Extracted view over one conversation-detail response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConversationDetail {
    pub created_date: Option<NaiveDate>,
    pub tags: Vec<String>,
}

fn value_to_date(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Number(n) => resolve_date(&n.to_string()),
        Value::String(s) => resolve_date(s),
        _ => None,
    }
}

fn source_created_at(body: &Value) -> Option<&Value> {
    body.get("source").and_then(|s| s.get("created_at"))
}

fn first_part_created_at(body: &Value) -> Option<&Value> {
    body.get("conversation_parts")
        .and_then(|p| p.get("conversation_parts"))
        .and_then(|p| p.as_array())
        .and_then(|parts| parts.first())
        .and_then(|part| part.get("created_at"))
}

fn conversation_created_at(body: &Value) -> Option<&Value> {
    body.get("created_at")
}

/// Priority chain for the authoritative creation date: the first message,
/// then the first reply part, then the conversation-level timestamp.
fn extract_created_date(body: &Value) -> Option<NaiveDate> {
    let extractors: &[fn(&Value) -> Option<&Value>] = &[
        source_created_at,
        first_part_created_at,
        conversation_created_at,
    ];
    extractors
        .iter()
        .filter_map(|extract| extract(body))
        .find_map(value_to_date)
}

fn tag_name(entry: &Value) -> Option<String> {
    match entry {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Object(_) => entry
            .get("name")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        _ => None,
    }
}

/// Tags arrive either nested (`{tags: {tags: [...]}}`) or flat
/// (`{tags: [...]}`), with entries as strings or `{name}` objects.
fn extract_tags(body: &Value) -> Vec<String> {
    let tags = body.get("tags");
    let list = tags
        .and_then(|t| t.get("tags"))
        .and_then(|t| t.as_array())
        .or_else(|| tags.and_then(|t| t.as_array()));
    list.map(|entries| entries.iter().filter_map(tag_name).collect())
        .unwrap_or_default()
}

/// Parse a conversation-detail body into the fields the pipeline consumes.
pub fn extract_detail(body: &Value) -> ConversationDetail {
    ConversationDetail {
        created_date: extract_created_date(body),
        tags: extract_tags(body),
    }
}

impl IntercomClient {
    /// Fetch one conversation's detail. Callers treat failures as non-fatal.
    pub async fn fetch_conversation(
        &self,
        conversation_id: &str,
    ) -> Result<ConversationDetail, IntercomError> {
        let url = self.url(&format!("/conversations/{conversation_id}"));
        let resp = self
            .http()
            .get(&url)
            .headers(self.auth_headers("application/json"))
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(status_error(&resp));
        }
        let body: Value = resp.json().await?;
        Ok(extract_detail(&body))
    }
}
