use serde::Deserialize;

// ===================================================================
// Hook Input Types (received via stdin, snake_case JSON)
// ===================================================================

/// Fields shared by all hook event inputs. Every field is optional so a
/// hook can still act on a partial event.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommonInput {
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub transcript_path: Option<String>,
    #[serde(default)]
    pub cwd: Option<String>,
}

impl CommonInput {
    /// The event's working directory, falling back to the process's own.
    pub fn cwd_or_current(&self) -> String {
        match &self.cwd {
            Some(cwd) if !cwd.is_empty() => cwd.clone(),
            _ => std::env::current_dir()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_else(|_| ".".into()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PreToolUseInput {
    #[serde(flatten)]
    pub common: CommonInput,
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct PostToolUseInput {
    #[serde(flatten)]
    pub common: CommonInput,
    #[serde(default)]
    pub tool_name: String,
    #[serde(default)]
    pub tool_input: serde_json::Value,
}

/// Top-level hook input, deserialized from stdin JSON.
///
/// Tagged by the `hook_event_name` field to determine which event fired.
/// Events these hooks never act on parse as `Other`.
#[derive(Debug, Deserialize)]
#[serde(tag = "hook_event_name")]
pub enum HookInput {
    PreToolUse(PreToolUseInput),
    PostToolUse(PostToolUseInput),
    #[serde(other)]
    Other,
}

impl HookInput {
    pub fn parse(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    /// Access the common fields, if this event carries them.
    pub fn common(&self) -> Option<&CommonInput> {
        match self {
            Self::PreToolUse(e) => Some(&e.common),
            Self::PostToolUse(e) => Some(&e.common),
            Self::Other => None,
        }
    }

    /// The tool call this event is about, if any.
    pub fn tool_call(&self) -> Option<Result<ToolCall, serde_json::Error>> {
        match self {
            Self::PreToolUse(e) => Some(ToolCall::parse(&e.tool_name, &e.tool_input)),
            Self::PostToolUse(e) => Some(ToolCall::parse(&e.tool_name, &e.tool_input)),
            Self::Other => None,
        }
    }
}

// ===================================================================
// Tool-Specific Input Types
// ===================================================================

/// Parsed tool call, matching `tool_name` to a typed `tool_input`.
#[derive(Debug)]
pub enum ToolCall {
    Bash(BashToolInput),
    /// Any other tool; keeps the raw JSON.
    Other {
        tool_name: String,
        tool_input: serde_json::Value,
    },
}

impl ToolCall {
    pub fn parse(
        tool_name: &str,
        tool_input: &serde_json::Value,
    ) -> Result<Self, serde_json::Error> {
        match tool_name {
            "Bash" => Ok(Self::Bash(serde_json::from_value(tool_input.clone())?)),
            other => Ok(Self::Other {
                tool_name: other.to_string(),
                tool_input: tool_input.clone(),
            }),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BashToolInput {
    #[serde(default)]
    pub command: String,
}
