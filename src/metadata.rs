use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Tool-call counter for one project.
/// Stored as `<state dir>/<slug>/state.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CounterState {
    #[serde(default)]
    pub count: u64,
    /// Epoch seconds of the last launched review, 0 if none.
    #[serde(default)]
    pub last_run: f64,
}

/// What the review worker remembers between runs.
/// Stored as `<state dir>/<slug>/memory.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewMemory {
    /// Timestamp of the newest transcript message already reviewed.
    #[serde(default)]
    pub last_timestamp: Option<String>,
    #[serde(default)]
    pub long_term_summary: String,
    /// SHA-256 of the last nudge written, so the same advice is not repeated.
    #[serde(default)]
    pub last_nudge_hash: String,
}

/// A nudge waiting to be shown by the nudge hook.
/// Stored as `<state dir>/<slug>/pending_feedback.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingFeedback {
    /// Kept as a string so a malformed value does not hide the nudge.
    #[serde(default)]
    pub created_at: String,
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    #[serde(default)]
    pub nudge_markdown: String,
    #[serde(default)]
    pub commands: Vec<String>,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub reason: String,
}

fn default_ttl_seconds() -> u64 {
    600
}

impl PendingFeedback {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.created_at)
            .ok()
            .map(|t| t.with_timezone(&Utc))
    }
}

/// Hand-off from the counter hook to a detached review worker.
/// Stored as `<state dir>/<slug>/review-<stamp>.json` and deleted by the
/// worker on pickup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub cwd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}
