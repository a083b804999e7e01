//! Background review of a session: condense what happened since the last
//! review, ask a [`Reviewer`] for a verdict, and leave a nudge for the
//! nudge hook when the verdict clears the gate.

mod reviewer;
mod sanitize;

pub use reviewer::{OpenAiReviewer, Reviewer};
pub use sanitize::{read_project_policy, sanitize};

use crate::extract::read_transcript;
use crate::metadata::{PendingFeedback, ReviewMemory, ReviewRequest};
use crate::preferences::ReviewPrefs;
use crate::project::{ProjectState, read_json_file, remove_if_exists};
use crate::transcript::{ContentBlock, MessageContent, Transcript};
use anyhow::Result;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// Long-term memory is cut to this many characters.
const MEMORY_CAP: usize = 4000;
/// Memory excerpt sent along with each review.
const MEMORY_EXCERPT: usize = 2000;
/// Tool-use inputs worth showing the reviewer.
const TOOL_INPUT_KEYS: [&str; 4] = ["command", "file_path", "paths", "query"];

const SYSTEM_PROMPT: &str = "\
You are an expert code reviewer observing a developer working with an AI coding assistant.
Identify subtle patterns, potential issues, and non-obvious improvements.
Intervene when you detect: repeated patterns indicating confusion, missing tests after risky changes,
violations of the project policy, security or performance issues, architectural concerns,
or a significantly better approach the developer might be missing.
Be precise and actionable, and provide copy-pasteable commands.
If nothing valuable would be added, set should_intervene=false and a low score.";

const SCHEMA_HINT: &str = r#"Return ONLY compact JSON (no markdown) with this schema:
{
  "should_intervene": boolean,
  "score": number,            // 0..1 confidence that the nudge is useful
  "reason": string,           // <120 chars
  "nudge_markdown": string,   // actionable, <= 700 chars, include copy/paste commands in ```bash
  "commands": string[],       // 0..5 raw commands (no comments)
  "memory_update": string|null // <300 chars summary to append to long-term memory if helpful
}"#;

/// Trailing JSON object of a reply, tolerating prose or fences before it.
static TRAILING_OBJECT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\{.*\}\s*$").expect("valid verdict regex"));

// ===================================================================
// Messages since the last review
// ===================================================================

/// One transcript message flattened for review.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewMessage {
    pub role: String,
    pub text: String,
    pub timestamp: Option<String>,
}

/// The request's transcript if it exists, else the most recently modified
/// `*.jsonl` under `<cwd>/.claude`.
pub fn find_transcript(request: &ReviewRequest) -> Option<PathBuf> {
    if let Some(path) = request.transcript_path.as_deref().map(PathBuf::from) {
        if path.is_file() {
            return Some(path);
        }
    }
    let root = glob::Pattern::escape(&Path::new(&request.cwd).join(".claude").to_string_lossy());
    glob::glob(&format!("{root}/**/*.jsonl"))
        .ok()?
        .filter_map(|entry| entry.ok())
        .filter_map(|path| {
            let modified = path.metadata().and_then(|m| m.modified()).ok()?;
            Some((modified, path))
        })
        .max_by(|a, b| a.0.cmp(&b.0))
        .map(|(_, path)| path)
}

fn first_lines(text: &str, n: usize) -> String {
    text.lines().take(n).collect::<Vec<_>>().join("\n")
}

fn flatten_content(content: &MessageContent, tool_result_lines: usize) -> String {
    let blocks = match content {
        MessageContent::Text(text) => return text.trim().to_string(),
        MessageContent::Blocks(blocks) => blocks,
    };
    let mut parts: Vec<String> = Vec::new();
    for block in blocks {
        match block {
            ContentBlock::Text(t) => parts.push(t.text.clone()),
            ContentBlock::ToolUse(tu) => {
                let kept: serde_json::Map<String, serde_json::Value> = TOOL_INPUT_KEYS
                    .iter()
                    .filter_map(|key| tu.input.get(*key).map(|v| (key.to_string(), v.clone())))
                    .collect();
                parts.push(format!(
                    "[TOOL USE {}] {}",
                    tu.name,
                    serde_json::Value::Object(kept)
                ));
            }
            ContentBlock::ToolResult(r) => {
                parts.push(format!("[TOOL RESULT] {}", first_lines(&r.text(), tool_result_lines)));
            }
            ContentBlock::Thinking | ContentBlock::Unknown => {}
        }
    }
    parts.join("\n").trim().to_string()
}

/// Conversation messages strictly newer than `last_timestamp`. Messages
/// without a timestamp are always included; empty ones are dropped.
pub fn messages_since(
    transcript: &Transcript,
    last_timestamp: Option<&str>,
    tool_result_lines: usize,
) -> Vec<ReviewMessage> {
    transcript
        .entries()
        .iter()
        .filter_map(|entry| {
            let conv = entry.conversation()?;
            let timestamp = entry.timestamp();
            if let (Some(last), Some(ts)) = (last_timestamp, timestamp) {
                if ts <= last {
                    return None;
                }
            }
            let text = flatten_content(&conv.message.content, tool_result_lines);
            if text.is_empty() {
                return None;
            }
            Some(ReviewMessage {
                role: entry.role().unwrap_or("user").to_string(),
                text,
                timestamp: timestamp.map(String::from),
            })
        })
        .collect()
}

// ===================================================================
// Verdict
// ===================================================================

/// The reviewer's answer. Missing fields take neutral defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Verdict {
    pub should_intervene: bool,
    pub score: f64,
    pub reason: Option<String>,
    pub nudge_markdown: Option<String>,
    pub commands: Option<Vec<String>>,
    pub memory_update: Option<String>,
}

impl Verdict {
    pub fn nudge(&self) -> &str {
        self.nudge_markdown.as_deref().unwrap_or_default().trim()
    }
}

/// Parse the trailing JSON object of a reply.
pub fn parse_verdict(raw: &str) -> Option<Verdict> {
    let raw = raw.trim();
    let json = TRAILING_OBJECT.find(raw).map_or(raw, |m| m.as_str());
    match serde_json::from_str(json) {
        Ok(verdict) => Some(verdict),
        Err(err) => {
            tracing::debug!(%err, "unparseable review verdict");
            None
        }
    }
}

/// Hex SHA-256, used to recognise a repeated nudge.
pub fn nudge_hash(nudge: &str) -> String {
    if nudge.is_empty() {
        return String::new();
    }
    hex::encode(Sha256::digest(nudge.as_bytes()))
}

/// What a review changes on disk.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewOutcome {
    pub memory: ReviewMemory,
    pub pending: Option<PendingFeedback>,
}

/// Fold a verdict into memory and decide whether it becomes a pending
/// nudge. `newest_timestamp` is the timestamp of the last reviewed message.
pub fn apply_verdict(
    mut memory: ReviewMemory,
    verdict: &Verdict,
    newest_timestamp: Option<&str>,
    prefs: &ReviewPrefs,
    now: DateTime<Utc>,
) -> ReviewOutcome {
    if let Some(update) = verdict.memory_update.as_deref().map(str::trim).filter(|u| !u.is_empty()) {
        let combined = format!("{}\n{update}", memory.long_term_summary);
        memory.long_term_summary = combined.trim().chars().take(MEMORY_CAP).collect();
    }
    if let Some(ts) = newest_timestamp {
        memory.last_timestamp = Some(ts.to_string());
    }

    let nudge = verdict.nudge();
    let hash = nudge_hash(nudge);
    let passes = verdict.should_intervene
        && verdict.score >= prefs.threshold
        && !nudge.is_empty()
        && hash != memory.last_nudge_hash;
    tracing::debug!(
        should_intervene = verdict.should_intervene,
        score = verdict.score,
        passes,
        "review verdict"
    );
    if !passes {
        return ReviewOutcome {
            memory,
            pending: None,
        };
    }

    memory.last_nudge_hash = hash;
    ReviewOutcome {
        memory,
        pending: Some(PendingFeedback {
            created_at: now.to_rfc3339(),
            ttl_seconds: prefs.nudge_ttl_seconds,
            nudge_markdown: nudge.to_string(),
            commands: verdict.commands.clone().unwrap_or_default(),
            score: verdict.score,
            reason: verdict.reason.clone().unwrap_or_default(),
        }),
    }
}

fn build_payload(policy: &str, memory: &ReviewMemory, recent_events: &str) -> String {
    let summary: String = memory.long_term_summary.chars().take(MEMORY_EXCERPT).collect();
    serde_json::json!({
        "context": {
            "project_policy": policy,
            "long_term_summary": summary,
            "recent_events": recent_events,
        },
        "request": {
            "goal": "Detect if the developer would benefit from a brief, actionable nudge right now.",
            "output": "JSON",
            "schema": "see SCHEMA below",
        },
        "SCHEMA": SCHEMA_HINT,
    })
    .to_string()
}

// ===================================================================
// Worker entry point
// ===================================================================

/// Run one review for the request in `request_file`, which is consumed.
/// Returns without error when there is nothing to review.
pub fn run(
    request_file: &Path,
    prefs: &ReviewPrefs,
    base: &Path,
    reviewer: &dyn Reviewer,
    now: DateTime<Utc>,
) -> Result<()> {
    let request: Result<Option<ReviewRequest>> = read_json_file(request_file);
    remove_if_exists(request_file)?;
    let Some(request) = request? else {
        tracing::debug!(file = %request_file.display(), "review request already gone");
        return Ok(());
    };

    let project = ProjectState::open(base, &request.cwd)?;
    let memory = project.read_memory();

    let Some(transcript_path) = find_transcript(&request) else {
        tracing::debug!(cwd = %request.cwd, "no transcript to review");
        return Ok(());
    };
    let transcript = read_transcript(&transcript_path)?;
    let messages = messages_since(
        &transcript,
        memory.last_timestamp.as_deref(),
        prefs.tool_result_lines,
    );
    let Some(newest) = messages.last() else {
        tracing::debug!("nothing new since last review");
        return Ok(());
    };

    let policy = read_project_policy(Path::new(&request.cwd), prefs.project_fingerprint.as_deref());
    let payload = build_payload(&policy, &memory, &sanitize(&messages, prefs));
    let raw = reviewer.review(SYSTEM_PROMPT, &payload)?;
    let Some(verdict) = parse_verdict(&raw) else {
        return Ok(());
    };

    let outcome = apply_verdict(memory, &verdict, newest.timestamp.as_deref(), prefs, now);
    if let Some(pending) = &outcome.pending {
        project.write_pending(pending)?;
    }
    project.write_memory(&outcome.memory)?;
    Ok(())
}
