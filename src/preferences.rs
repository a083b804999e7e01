use crate::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const FILENAME: &str = "sidekick.toml";

const DEFAULT_HEADER_TEMPLATE: &str =
    "─ Session {{ session_id }} (last {{ turns }} turns) ────────────────────";

/// Where the truncation marker goes relative to the cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerPlacement {
    /// On its own line after the kept text.
    Appended,
    /// Directly after the last kept character.
    Inline,
}

/// Settings for `last-messages`.
///
/// In TOML:
///
/// ```toml
/// [transcript]
/// default_turns = 10
/// result_limit = 2000
/// marker_placement = "inline"
/// output_dir = "~/copyq"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptPrefs {
    /// Turns to extract when no count is given on the command line.
    pub default_turns: usize,
    /// Tool-result bodies longer than this many characters are truncated.
    pub result_limit: usize,
    pub marker: String,
    pub marker_placement: MarkerPlacement,
    /// Overridden by `$COPYQ_DIR`.
    pub output_dir: Option<String>,
    /// Minijinja template for the first line of the artifact file.
    /// Variables: `session_id`, `turns`, `records`.
    pub header_template: String,
}

impl Default for TranscriptPrefs {
    fn default() -> Self {
        Self {
            default_turns: 10,
            result_limit: 2000,
            marker: "... [truncated]".into(),
            marker_placement: MarkerPlacement::Appended,
            output_dir: None,
            header_template: DEFAULT_HEADER_TEMPLATE.into(),
        }
    }
}

/// Settings for the counter hook and the review worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewPrefs {
    /// Launch a review every N tool calls.
    pub interval: u64,
    /// Minimum seconds between two launched reviews.
    pub cooldown_seconds: u64,
    pub model: String,
    pub api_url: String,
    pub timeout_seconds: u64,
    pub reasoning_effort: Option<String>,
    pub temperature: Option<f32>,
    pub max_completion_tokens: Option<u32>,
    /// Last N transcript messages sent for review.
    pub max_events: usize,
    pub max_lines_total: usize,
    /// Cap for fenced code blocks inside a message.
    pub max_block_lines: usize,
    /// Lines kept from each tool result.
    pub tool_result_lines: usize,
    /// Minimum reviewer score for a nudge to be shown.
    pub threshold: f64,
    pub nudge_ttl_seconds: u64,
    /// One-line description of the project appended to the policy excerpt.
    pub project_fingerprint: Option<String>,
}

impl Default for ReviewPrefs {
    fn default() -> Self {
        Self {
            interval: 10,
            cooldown_seconds: 120,
            model: "gpt-5".into(),
            api_url: "https://api.openai.com/v1/chat/completions".into(),
            timeout_seconds: 40,
            reasoning_effort: Some("high".into()),
            temperature: None,
            max_completion_tokens: Some(10_000),
            max_events: 60,
            max_lines_total: 1200,
            max_block_lines: 500,
            tool_result_lines: 40,
            threshold: 0.2,
            nudge_ttl_seconds: 900,
            project_fingerprint: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PnpmPrefs {
    pub enabled: bool,
}

impl Default for PnpmPrefs {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// User preferences stored in `<state dir>/sidekick.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub transcript: TranscriptPrefs,
    pub review: ReviewPrefs,
    pub pnpm: PnpmPrefs,
}

impl Preferences {
    /// Load preferences from `dir/sidekick.toml` and apply environment
    /// overrides. A missing file means defaults; missing keys in an
    /// existing file are filled in with defaults via serde.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut prefs = Self::from_file(&dir.join(FILENAME))?;
        prefs.apply_env(|key| std::env::var(key).ok());
        Ok(prefs)
    }

    fn from_file(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(contents) => {
                toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Override settings from environment variables, looked up through
    /// `lookup`. Values that fail to parse are ignored.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("COPYQ_DIR").filter(|d| !d.is_empty()) {
            self.transcript.output_dir = Some(dir);
        }

        let review = &mut self.review;
        env_parse(&lookup, "SIDEKICK_INTERVAL", &mut review.interval);
        env_parse(&lookup, "SIDEKICK_COOLDOWN_SECONDS", &mut review.cooldown_seconds);
        env_parse(&lookup, "SIDEKICK_MAX_EVENTS", &mut review.max_events);
        env_parse(&lookup, "SIDEKICK_MAX_LINES_TOTAL", &mut review.max_lines_total);
        env_parse(&lookup, "SIDEKICK_MAX_BLOCK_LINES", &mut review.max_block_lines);
        env_parse(&lookup, "SIDEKICK_THRESHOLD", &mut review.threshold);
        env_parse(&lookup, "SIDEKICK_NUDGE_TTL_SECONDS", &mut review.nudge_ttl_seconds);
        if let Some(model) = lookup("SIDEKICK_MODEL") {
            review.model = model;
        }
        if let Some(url) = lookup("SIDEKICK_API_URL") {
            review.api_url = url;
        }
    }

    /// Directory that receives `last-messages` artifacts.
    pub fn output_dir(&self) -> PathBuf {
        match &self.transcript.output_dir {
            Some(dir) => paths::expand_tilde(dir),
            None => paths::home().join("copyq"),
        }
    }
}

fn env_parse<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str, slot: &mut T) {
    if let Some(raw) = lookup(key) {
        match raw.trim().parse() {
            Ok(v) => *slot = v,
            Err(_) => tracing::warn!(key, value = %raw, "ignoring unparseable environment override"),
        }
    }
}
