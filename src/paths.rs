//! Filesystem locations shared by every subcommand.

use std::path::PathBuf;

/// The user's home directory, falling back to the current directory.
pub fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Root of per-project sidekick state and of `sidekick.toml`.
///
/// Returns `$SIDEKICK_HOME` if set, otherwise `~/.claude/sidekick`.
pub fn sidekick_dir() -> PathBuf {
    match std::env::var_os("SIDEKICK_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => home().join(".claude").join("sidekick"),
    }
}

/// Where Claude Code keeps per-project session transcripts.
pub fn projects_dir() -> PathBuf {
    home().join(".claude").join("projects")
}

/// Expand a leading `~` or `~/` to the home directory.
pub fn expand_tilde(path: &str) -> PathBuf {
    if path == "~" {
        home()
    } else if let Some(rest) = path.strip_prefix("~/") {
        home().join(rest)
    } else {
        PathBuf::from(path)
    }
}
