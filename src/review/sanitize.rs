use super::ReviewMessage;
use crate::preferences::ReviewPrefs;
use regex::{Captures, Regex};
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

static ID_NOISE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(uuid|request_id|trace_id)\b[:=]\s*[a-f0-9-]+").expect("valid id regex")
});

static ANSI: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("valid ansi regex"));

static FENCED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("valid fence regex"));

const FENCE: &str = "```";

/// Keep the first `max_lines` lines of `text`, noting how many were dropped.
pub fn truncate_block_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().collect();
    if lines.len() <= max_lines {
        return text.to_string();
    }
    format!(
        "{}\n... [truncated {} lines]",
        lines[..max_lines].join("\n"),
        lines.len() - max_lines
    )
}

fn trim_fenced_block(block: &str, max_lines: usize) -> String {
    let body = block
        .strip_prefix(FENCE)
        .and_then(|b| b.strip_suffix(FENCE))
        .unwrap_or_default();
    format!("{FENCE}{}{FENCE}", truncate_block_lines(body, max_lines))
}

/// Strip identifier noise and colour codes, and cap fenced code blocks.
pub fn clean_text(text: &str, max_block_lines: usize) -> String {
    let text = ID_NOISE.replace_all(text, "");
    let text = ANSI.replace_all(&text, "");
    FENCED
        .replace_all(&text, |caps: &Captures| trim_fenced_block(&caps[0], max_block_lines))
        .into_owned()
}

/// Condense the most recent messages into one bounded text for review.
pub fn sanitize(messages: &[ReviewMessage], prefs: &ReviewPrefs) -> String {
    let start = messages.len().saturating_sub(prefs.max_events);
    let chunks: Vec<String> = messages[start..]
        .iter()
        .map(|m| {
            format!(
                "{} @ {}\n{}\n",
                m.role.to_uppercase(),
                m.timestamp.as_deref().unwrap_or_default(),
                clean_text(&m.text, prefs.max_block_lines)
            )
        })
        .collect();
    let rule = format!("\n{}\n", "-".repeat(60));
    truncate_block_lines(&chunks.join(&rule), prefs.max_lines_total)
}

/// The "Package Manager" section of the project's `CLAUDE.md` (or
/// `.claude/CLAUDE.md`), followed by the configured fingerprint.
pub fn read_project_policy(cwd: &Path, fingerprint: Option<&str>) -> String {
    let contents = [cwd.join("CLAUDE.md"), cwd.join(".claude").join("CLAUDE.md")]
        .iter()
        .find_map(|path| fs::read(path).ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default();

    let mut keep: Vec<&str> = Vec::new();
    let mut capturing = false;
    for line in contents.lines() {
        if line.trim_start().starts_with("## ") {
            capturing = line.contains("Package Manager");
        }
        if capturing {
            keep.push(line);
        }
    }

    let mut policy = keep.join("\n");
    if let Some(fingerprint) = fingerprint.filter(|f| !f.trim().is_empty()) {
        policy.push_str(&format!("\n\nProject fingerprint: {}\n", fingerprint.trim()));
    }
    policy.trim().to_string()
}
