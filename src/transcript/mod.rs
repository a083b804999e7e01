use serde::Deserialize;

// ===================================================================
// Top-level transcript entry — one per JSONL line
// ===================================================================

/// A single line in a Claude Code `.jsonl` transcript file.
///
/// Discriminated by the `type` field. Only conversation lines are typed;
/// progress, snapshot, queue and system lines all collapse into `Other`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum TranscriptEntry {
    #[serde(rename = "user")]
    User(ConversationEntry),
    #[serde(rename = "assistant")]
    Assistant(ConversationEntry),
    #[serde(other)]
    Other,
}

/// User and assistant lines share the same shape.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationEntry {
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub message: Message,
}

#[derive(Debug, Default, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: MessageContent,
}

/// `message.content` can be a plain string (user text) or an array of
/// content blocks (assistant responses, tool results).
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

// ===================================================================
// Content blocks inside message.content[]
// ===================================================================

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
pub enum ContentBlock {
    #[serde(rename = "text")]
    Text(TextBlock),
    /// Private reasoning; never rendered.
    #[serde(rename = "thinking")]
    Thinking,
    #[serde(rename = "tool_use")]
    ToolUse(ToolUseBlock),
    #[serde(rename = "tool_result")]
    ToolResult(ToolResultBlock),
    /// Images, documents and any block kind added later.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Deserialize)]
pub struct TextBlock {
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Deserialize)]
pub struct ToolUseBlock {
    #[serde(default = "unknown_tool")]
    pub name: String,
    #[serde(default)]
    pub input: serde_json::Value,
}

fn unknown_tool() -> String {
    "unknown".into()
}

#[derive(Debug, Deserialize)]
pub struct ToolResultBlock {
    #[serde(default)]
    pub content: serde_json::Value,
    #[serde(default)]
    pub is_error: Option<bool>,
}

impl ToolResultBlock {
    /// Flatten the result payload to text. Results arrive either as a
    /// string or as an array of `{"type": "text", "text": ...}` blocks.
    pub fn text(&self) -> String {
        match &self.content {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Array(items) => items
                .iter()
                .filter_map(|item| match item {
                    serde_json::Value::String(s) => Some(s.as_str()),
                    other => other.get("text").and_then(|t| t.as_str()),
                })
                .collect::<Vec<_>>()
                .join("\n"),
            other => other.to_string(),
        }
    }
}

impl TranscriptEntry {
    /// The conversation payload for user/assistant lines.
    pub fn conversation(&self) -> Option<&ConversationEntry> {
        match self {
            Self::User(e) | Self::Assistant(e) => Some(e),
            Self::Other => None,
        }
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.conversation().and_then(|e| e.timestamp.as_deref())
    }

    /// `"user"` / `"assistant"`, preferring the message's own role.
    pub fn role(&self) -> Option<&str> {
        match self {
            Self::User(e) => Some(e.message.role.as_deref().unwrap_or("user")),
            Self::Assistant(e) => Some(e.message.role.as_deref().unwrap_or("assistant")),
            Self::Other => None,
        }
    }
}

// ===================================================================
// Line parsing — a corrupt line is a value, not an error
// ===================================================================

/// Outcome of parsing one JSONL line.
#[derive(Debug)]
pub enum ParsedLine {
    Entry(TranscriptEntry),
    /// Empty or whitespace-only line.
    Blank,
    /// Valid JSON object without a `type` tag: not a transcript event.
    Untyped,
    Unparseable(String),
}

/// Parse a single transcript line.
pub fn parse_line(line: &str) -> ParsedLine {
    let line = line.trim();
    if line.is_empty() {
        return ParsedLine::Blank;
    }
    let val = match serde_json::from_str::<serde_json::Value>(line) {
        Ok(v) => v,
        Err(e) => return ParsedLine::Unparseable(e.to_string()),
    };
    if val.get("type").is_none() {
        return if val.is_object() {
            ParsedLine::Untyped
        } else {
            ParsedLine::Unparseable("expected a JSON object".into())
        };
    }
    match serde_json::from_value::<TranscriptEntry>(val) {
        Ok(entry) => ParsedLine::Entry(entry),
        Err(e) => ParsedLine::Unparseable(e.to_string()),
    }
}

// ===================================================================
// Records — the atomic events rendered into a formatted transcript
// ===================================================================

/// Which kind of event a record is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    User,
    Assistant,
    ToolUse,
    ToolResult,
}

/// One atomic conversation event.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    User { text: String },
    Assistant { text: String },
    ToolUse { name: String, input: serde_json::Value },
    ToolResult { content: String, is_error: bool },
}

impl Record {
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::User { .. } => RecordKind::User,
            Self::Assistant { .. } => RecordKind::Assistant,
            Self::ToolUse { .. } => RecordKind::ToolUse,
            Self::ToolResult { .. } => RecordKind::ToolResult,
        }
    }

    /// Whether this record starts a new logical turn.
    pub fn starts_turn(&self) -> bool {
        self.kind() == RecordKind::User
    }
}

/// A run of consecutive records starting at a user-authored message.
/// The first turn of a transcript may start with something else when the
/// log opens mid-conversation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Turn {
    pub records: Vec<Record>,
}

/// Group records into turns: a new turn begins at each user message.
pub fn group_turns(records: Vec<Record>) -> Vec<Turn> {
    let mut turns: Vec<Turn> = Vec::new();
    for record in records {
        if record.starts_turn() || turns.is_empty() {
            turns.push(Turn {
                records: vec![record],
            });
        } else if let Some(turn) = turns.last_mut() {
            turn.records.push(record);
        }
    }
    turns
}

/// The last `n` turns, oldest first.
pub fn last_turns(turns: &[Turn], n: usize) -> &[Turn] {
    &turns[turns.len().saturating_sub(n)..]
}

fn push_text(out: &mut Vec<Record>, text: &str, make: fn(String) -> Record) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        out.push(make(trimmed.to_string()));
    }
}

fn user_record(text: String) -> Record {
    Record::User { text }
}

fn assistant_record(text: String) -> Record {
    Record::Assistant { text }
}

// ===================================================================
// Transcript — parsed JSONL with typed entries
// ===================================================================

/// A parsed Claude Code JSONL transcript.
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    /// Parse a JSONL transcript string. Returns the transcript and the
    /// lines that failed to parse (with 1-based line number and error).
    pub fn parse(contents: &str) -> (Self, Vec<(usize, String)>) {
        Self::parse_bytes(contents.as_bytes())
    }

    /// Like [`Transcript::parse`], for raw file contents. A line that is
    /// not valid UTF-8 is reported as unparseable instead of failing the
    /// whole transcript.
    pub fn parse_bytes(contents: &[u8]) -> (Self, Vec<(usize, String)>) {
        let mut entries = Vec::new();
        let mut errors = Vec::new();

        for (i, raw) in contents.split(|&b| b == b'\n').enumerate() {
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            let parsed = match std::str::from_utf8(raw) {
                Ok(line) => parse_line(line),
                Err(e) => ParsedLine::Unparseable(e.to_string()),
            };
            match parsed {
                ParsedLine::Entry(entry) => entries.push(entry),
                ParsedLine::Blank | ParsedLine::Untyped => {}
                ParsedLine::Unparseable(e) => errors.push((i + 1, e)),
            }
        }

        (Self { entries }, errors)
    }

    /// All typed entries in parse order.
    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// Flatten every conversation entry into records, in log order.
    pub fn records(&self) -> Vec<Record> {
        let mut out = Vec::new();
        for entry in &self.entries {
            match entry {
                TranscriptEntry::User(conv) => match &conv.message.content {
                    MessageContent::Text(t) => push_text(&mut out, t, user_record),
                    MessageContent::Blocks(blocks) => {
                        for block in blocks {
                            match block {
                                ContentBlock::Text(t) => push_text(&mut out, &t.text, user_record),
                                ContentBlock::ToolResult(r) => out.push(Record::ToolResult {
                                    content: r.text(),
                                    is_error: r.is_error.unwrap_or(false),
                                }),
                                _ => {}
                            }
                        }
                    }
                },
                TranscriptEntry::Assistant(conv) => match &conv.message.content {
                    MessageContent::Text(t) => push_text(&mut out, t, assistant_record),
                    MessageContent::Blocks(blocks) => {
                        for block in blocks {
                            match block {
                                ContentBlock::Text(t) => {
                                    push_text(&mut out, &t.text, assistant_record)
                                }
                                ContentBlock::ToolUse(tu) => out.push(Record::ToolUse {
                                    name: tu.name.clone(),
                                    input: tu.input.clone(),
                                }),
                                _ => {}
                            }
                        }
                    }
                },
                TranscriptEntry::Other => {}
            }
        }
        out
    }

    /// Records grouped into logical turns.
    pub fn turns(&self) -> Vec<Turn> {
        group_turns(self.records())
    }
}

#[cfg(test)]
mod tests;
