//! Best-effort copy of text to the system clipboard.

mod tools;

pub use tools::platform_tools;

/// Which mechanism performed a copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyMethod {
    /// In-process clipboard access via `arboard`.
    Native,
    Pbcopy,
    WlCopy,
    Xclip,
    Xsel,
    /// WSL helper that handles UTF-8 correctly.
    SafeClip,
    /// Windows `clip.exe`, fed UTF-16LE.
    ClipExe,
}

impl CopyMethod {
    /// Tool name for display/logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Native => "native clipboard",
            Self::Pbcopy => "pbcopy",
            Self::WlCopy => "wl-copy",
            Self::Xclip => "xclip",
            Self::Xsel => "xsel",
            Self::SafeClip => "safe-clip",
            Self::ClipExe => "clip.exe",
        }
    }
}

/// A way of putting text on the clipboard.
pub trait CopyTool {
    fn method(&self) -> CopyMethod;

    /// Cheap check, typically whether the binary is on `PATH`.
    fn is_available(&self) -> bool;

    fn copy_text(&self, text: &str) -> Result<(), String>;
}

#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    #[error("no clipboard tool available (install xclip, xsel or wl-copy)")]
    NoToolAvailable,

    #[error("every clipboard tool failed; last was {tool}: {message}")]
    AllFailed { tool: &'static str, message: String },
}

/// Tries each tool in priority order until one succeeds.
pub struct Clipboard {
    tools: Vec<Box<dyn CopyTool>>,
}

impl Clipboard {
    /// Create with platform-appropriate tools.
    pub fn new() -> Self {
        Self {
            tools: platform_tools(),
        }
    }

    pub fn with_tools(tools: Vec<Box<dyn CopyTool>>) -> Self {
        Self { tools }
    }

    pub fn copy_text(&self, text: &str) -> Result<CopyMethod, ClipboardError> {
        let mut last_failure: Option<(&'static str, String)> = None;
        for tool in self.tools.iter().filter(|t| t.is_available()) {
            match tool.copy_text(text) {
                Ok(()) => return Ok(tool.method()),
                Err(message) => {
                    tracing::debug!(tool = tool.method().name(), %message, "clipboard tool failed");
                    last_failure = Some((tool.method().name(), message));
                }
            }
        }
        match last_failure {
            Some((tool, message)) => Err(ClipboardError::AllFailed { tool, message }),
            None => Err(ClipboardError::NoToolAvailable),
        }
    }
}

impl Default for Clipboard {
    fn default() -> Self {
        Self::new()
    }
}
