//! Tag-based workspace and 360-queue classification.
//!
//! Matching is substring containment over one lowercase space-joined string
//! built from all tags, not exact tag equality; production tags carry free
//! prefixes like `"# SkyPrivate"` or `"Billing - top-up-issue"`.

use serde::{Deserialize, Serialize};

/// Coarse platform/tenant classification derived from conversation tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Workspace {
    SkyPrivate,
    CamModelDirectory,
    #[default]
    Unknown,
}

impl Workspace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Workspace::SkyPrivate => "SkyPrivate",
            Workspace::CamModelDirectory => "CamModelDirectory",
            Workspace::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cross-cutting triage category, independent of workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueType360 {
    Billing,
    Ceq,
    Both,
}

impl QueueType360 {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueType360::Billing => "billing",
            QueueType360::Ceq => "ceq",
            QueueType360::Both => "both",
        }
    }
}

/// Workspace keyword sets, checked in order; first containment match wins.
const SKYPRIVATE_KEYWORDS: &[&str] = &["skyprivate", "sky private", "sky-private"];
const CMD_KEYWORDS: &[&str] = &[
    "cmd",
    "cammodeldirectory",
    "cam model directory",
    "cam-model-directory",
];

const BILLING_360_KEYWORDS: &[&str] =
    &["payment", "billing", "top-up", "topup", "top up", "verification"];
const CEQ_360_KEYWORDS: &[&str] =
    &["report", "scammer", "ceq", "publicprofile", "public profile"];

fn joined_lowercase(tags: &[String]) -> String {
    tags.iter()
        .map(|t| t.to_lowercase())
        .collect::<Vec<_>>()
        .join(" ")
}

fn contains_any(haystack: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|kw| haystack.contains(kw))
}

/// Determine workspace membership from a conversation's tag list.
pub fn determine_workspace(tags: &[String]) -> Workspace {
    if tags.is_empty() {
        return Workspace::Unknown;
    }
    let joined = joined_lowercase(tags);
    if contains_any(&joined, SKYPRIVATE_KEYWORDS) {
        Workspace::SkyPrivate
    } else if contains_any(&joined, CMD_KEYWORDS) {
        Workspace::CamModelDirectory
    } else {
        Workspace::Unknown
    }
}

/// Determine 360-queue membership. Billing and CEQ keyword sets are evaluated
/// independently over the same joined tag string; both matching yields `Both`.
pub fn determine_360_queue(tags: &[String]) -> (bool, Option<QueueType360>) {
    if tags.is_empty() {
        return (false, None);
    }
    let joined = joined_lowercase(tags);
    let billing = contains_any(&joined, BILLING_360_KEYWORDS);
    let ceq = contains_any(&joined, CEQ_360_KEYWORDS);
    match (billing, ceq) {
        (true, true) => (true, Some(QueueType360::Both)),
        (true, false) => (true, Some(QueueType360::Billing)),
        (false, true) => (true, Some(QueueType360::Ceq)),
        (false, false) => (false, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn workspace_skyprivate_from_prefixed_tag() {
        assert_eq!(
            determine_workspace(&tags(&["1 - Member", "# SkyPrivate"])),
            Workspace::SkyPrivate
        );
    }

    #[test]
    fn workspace_cmd_from_substring() {
        assert_eq!(
            determine_workspace(&tags(&["CMD onboarding"])),
            Workspace::CamModelDirectory
        );
    }

    #[test]
    fn workspace_skyprivate_takes_precedence_over_cmd() {
        assert_eq!(
            determine_workspace(&tags(&["cmd billing", "skyprivate member"])),
            Workspace::SkyPrivate
        );
    }

    #[test]
    fn workspace_unknown_without_match() {
        assert_eq!(determine_workspace(&tags(&["random"])), Workspace::Unknown);
        assert_eq!(determine_workspace(&[]), Workspace::Unknown);
    }

    #[test]
    fn queue_both_when_billing_and_ceq_match() {
        assert_eq!(
            determine_360_queue(&tags(&["payment issue", "scammer report"])),
            (true, Some(QueueType360::Both))
        );
    }

    #[test]
    fn queue_billing_only() {
        assert_eq!(
            determine_360_queue(&tags(&["Billing - top-up-issue"])),
            (true, Some(QueueType360::Billing))
        );
    }

    #[test]
    fn queue_ceq_only() {
        assert_eq!(
            determine_360_queue(&tags(&["publicprofile takedown"])),
            (true, Some(QueueType360::Ceq))
        );
    }

    #[test]
    fn queue_absent_without_match() {
        assert_eq!(determine_360_queue(&tags(&["member chat"])), (false, None));
        assert_eq!(determine_360_queue(&[]), (false, None));
    }
}
