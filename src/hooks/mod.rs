//! Host callbacks. Each hook turns one parsed event into a [`HookAction`];
//! reading stdin and mapping actions to exit codes happens in `main`.

pub mod counter;
pub mod nudge;
pub mod pnpm;

/// What a hook tells the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookAction {
    /// Let the tool call proceed silently.
    Continue,
    /// Show `text` to the user without blocking.
    Notify(String),
    /// Block the tool call and show `text` to the assistant.
    Block(String),
}

impl HookAction {
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Continue => 0,
            Self::Notify(_) => 1,
            Self::Block(_) => 2,
        }
    }

    /// Text for stderr, if any.
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Continue => None,
            Self::Notify(text) | Self::Block(text) => Some(text),
        }
    }
}
