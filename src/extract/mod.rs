use crate::preferences::{MarkerPlacement, TranscriptPrefs};
use crate::transcript::{Record, Transcript, last_turns};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use minijinja::{Environment, context};
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

/// Blocks in the rendered body are separated by this rule.
pub const SEPARATOR: &str = "\n───\n";

/// UTC, fixed width, so byte order is time order.
const STAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

// ===================================================================
// Errors the CLI reports specially
// ===================================================================

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("no transcript {session_id}.jsonl found beneath {}", .root.display())]
    SessionNotFound { session_id: String, root: PathBuf },

    #[error("--path {} does not exist", .path.display())]
    PathNotFound { path: PathBuf },

    #[error("no user/assistant messages found in {}", .path.display())]
    NoMessages { path: PathBuf },
}

// ===================================================================
// Configuration — explicit, passed into the formatter
// ===================================================================

/// How long tool-result bodies are cut.
#[derive(Debug, Clone, PartialEq)]
pub struct Truncation {
    /// Maximum characters kept from a body.
    pub limit: usize,
    pub marker: String,
    pub placement: MarkerPlacement,
}

impl Default for Truncation {
    fn default() -> Self {
        Self::from(&TranscriptPrefs::default())
    }
}

impl From<&TranscriptPrefs> for Truncation {
    fn from(prefs: &TranscriptPrefs) -> Self {
        Self {
            limit: prefs.result_limit,
            marker: prefs.marker.clone(),
            placement: prefs.marker_placement,
        }
    }
}

/// Everything the formatter needs, with the defaults documented on
/// [`TranscriptPrefs`].
#[derive(Debug, Clone, PartialEq)]
pub struct FormatConfig {
    /// Number of trailing turns to keep.
    pub turns: usize,
    pub truncation: Truncation,
}

impl FormatConfig {
    pub fn from_prefs(prefs: &TranscriptPrefs, turns: Option<usize>) -> Self {
        Self {
            turns: turns.unwrap_or(prefs.default_turns),
            truncation: Truncation::from(prefs),
        }
    }
}

impl Default for FormatConfig {
    fn default() -> Self {
        Self::from_prefs(&TranscriptPrefs::default(), None)
    }
}

// ===================================================================
// Rendering
// ===================================================================

/// Cut `body` to `truncation.limit` characters and mark the cut. Bodies
/// within the limit are returned unchanged.
pub fn truncate<'a>(body: &'a str, truncation: &Truncation) -> Cow<'a, str> {
    match body.char_indices().nth(truncation.limit) {
        None => Cow::Borrowed(body),
        Some((byte_idx, _)) => {
            let kept = &body[..byte_idx];
            Cow::Owned(match truncation.placement {
                MarkerPlacement::Appended => format!("{kept}\n{}", truncation.marker),
                MarkerPlacement::Inline => format!("{kept}{}", truncation.marker),
            })
        }
    }
}

/// Render one record as a tagged block.
pub fn render_record(record: &Record, truncation: &Truncation) -> String {
    match record {
        Record::User { text } => format!("<User>\n{text}\n</User>"),
        Record::Assistant { text } => format!("<Assistant>\n{text}\n</Assistant>"),
        Record::ToolUse { name, input } => {
            let pretty = serde_json::to_string_pretty(input).unwrap_or_else(|_| input.to_string());
            format!("<ToolUse name=\"{name}\">\n{pretty}\n</ToolUse>")
        }
        Record::ToolResult { content, is_error } => {
            let tag = if *is_error {
                "<ToolResult error=\"true\">"
            } else {
                "<ToolResult>"
            };
            format!("{tag}\n{}\n</ToolResult>", truncate(content, truncation))
        }
    }
}

/// The rendered window of a transcript.
#[derive(Debug, Clone, PartialEq)]
pub struct FormattedTranscript {
    pub blocks: Vec<String>,
    /// Number of turns actually included (≤ the requested count).
    pub turns: usize,
}

impl FormattedTranscript {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Blocks joined in chronological order.
    pub fn body(&self) -> String {
        self.blocks.join(SEPARATOR)
    }

    /// What goes into the artifact file.
    pub fn file_text(&self, header: &str) -> String {
        format!("{header}\n{}\n", self.body())
    }

    /// What goes onto the clipboard.
    pub fn clipboard_text(&self) -> String {
        format!("<ai-transcript>\n{}\n</ai-transcript>", self.body())
    }
}

/// Select the last `config.turns` turns and render every record in them.
pub fn format_transcript(transcript: &Transcript, config: &FormatConfig) -> FormattedTranscript {
    let turns = transcript.turns();
    let window = last_turns(&turns, config.turns);
    let blocks = window
        .iter()
        .flat_map(|turn| turn.records.iter())
        .map(|record| render_record(record, &config.truncation))
        .collect();
    FormattedTranscript {
        blocks,
        turns: window.len(),
    }
}

/// Render the artifact header from its minijinja template.
pub fn render_header(template: &str, session_id: &str, formatted: &FormattedTranscript) -> Result<String> {
    let env = Environment::new();
    let tmpl = env
        .template_from_str(template)
        .context("parsing header template")?;
    tmpl.render(context! {
        session_id,
        turns => formatted.turns,
        records => formatted.blocks.len(),
    })
    .context("rendering header template")
}

// ===================================================================
// Session lookup
// ===================================================================

/// Find `<session_id>.jsonl` anywhere beneath `projects_root`, or verify
/// an explicit path. When several projects hold the same id, the first in
/// path order wins.
pub fn locate_session(
    projects_root: &Path,
    session_id: &str,
    explicit: Option<&Path>,
) -> Result<PathBuf, ExtractError> {
    if let Some(path) = explicit {
        return if path.is_file() {
            Ok(path.to_path_buf())
        } else {
            Err(ExtractError::PathNotFound {
                path: path.to_path_buf(),
            })
        };
    }

    let not_found = || ExtractError::SessionNotFound {
        session_id: session_id.to_string(),
        root: projects_root.to_path_buf(),
    };

    let root = glob::Pattern::escape(&projects_root.to_string_lossy());
    let name = glob::Pattern::escape(session_id);
    let pattern = format!("{root}/**/{name}.jsonl");
    let mut matches: Vec<PathBuf> = glob::glob(&pattern)
        .map_err(|_| not_found())?
        .filter_map(|entry| entry.ok())
        .filter(|p| p.is_file())
        .collect();
    matches.sort();

    match matches.len() {
        0 => Err(not_found()),
        1 => Ok(matches.remove(0)),
        n => {
            tracing::warn!(count = n, using = %matches[0].display(), "multiple transcripts found");
            Ok(matches.remove(0))
        }
    }
}

/// Read and parse a transcript file; corrupt lines are skipped.
pub fn read_transcript(path: &Path) -> Result<Transcript> {
    let contents = fs::read(path).with_context(|| format!("reading transcript {}", path.display()))?;
    let (transcript, errors) = Transcript::parse_bytes(&contents);
    for (line, err) in &errors {
        tracing::debug!(line, %err, "skipping unparseable transcript line");
    }
    Ok(transcript)
}

// ===================================================================
// File sink
// ===================================================================

/// Artifact file name: a UTC timestamp plus the session prefix. Sorting
/// names in descending order lists the newest artifact first.
pub fn artifact_name(session_id: &str, at: DateTime<Utc>) -> String {
    let prefix: String = session_id.chars().take(8).collect();
    format!("{}_{prefix}.txt", at.format(STAMP_FORMAT))
}

/// Write `text` into `out_dir` under [`artifact_name`], creating the
/// directory if needed.
pub fn write_artifact(out_dir: &Path, session_id: &str, text: &str, at: DateTime<Utc>) -> Result<PathBuf> {
    fs::create_dir_all(out_dir).with_context(|| format!("creating {}", out_dir.display()))?;
    let dest = out_dir.join(artifact_name(session_id, at));
    fs::write(&dest, text).with_context(|| format!("writing {}", dest.display()))?;
    Ok(dest)
}
