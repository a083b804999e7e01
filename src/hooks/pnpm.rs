use super::HookAction;
use crate::preferences::PnpmPrefs;
use crate::types::{HookInput, ToolCall};
use regex::Regex;
use std::fs;
use std::path::Path;
use std::sync::LazyLock;

/// Splits a shell command line into the commands it chains or pipes.
static SEGMENT_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"&&|\|\||[;|]").expect("valid segment regex"));

const GUIDANCE: &str = "\
⚠️ This project uses PNPM as its package manager.
Please use 'pnpm' instead of 'npm' or 'bun'.

Examples:
  • pnpm install (instead of npm install)
  • pnpm add <package> (instead of npm install <package>)
  • pnpm run <script> (instead of npm run <script>)
  • pnpm exec <command> (instead of npx <command>)

Note: 'bun test' is allowed for running tests.";

/// A directory is a pnpm project if it has a `pnpm-lock.yaml`, or its
/// `package.json` declares a `pnpm@` package manager.
pub fn is_pnpm_project(dir: &Path) -> bool {
    if dir.join("pnpm-lock.yaml").exists() {
        return true;
    }
    let Ok(contents) = fs::read_to_string(dir.join("package.json")) else {
        return false;
    };
    serde_json::from_str::<serde_json::Value>(&contents)
        .ok()
        .and_then(|meta| {
            meta.get("packageManager")
                .and_then(|pm| pm.as_str())
                .map(|pm| pm.starts_with("pnpm@"))
        })
        .unwrap_or(false)
}

/// Whether one command segment runs a package manager other than pnpm.
fn is_forbidden(segment: &str) -> bool {
    let mut words = segment.split_whitespace();
    match (words.next(), words.next()) {
        (Some("npm" | "npx"), Some(_)) => true,
        (Some("bun"), Some(sub)) => sub != "test",
        _ => false,
    }
}

/// The first segment of `command` that should be blocked, if any.
pub fn offending_segment(command: &str) -> Option<&str> {
    SEGMENT_SPLIT
        .split(command)
        .map(str::trim)
        .find(|segment| is_forbidden(segment))
}

/// Decide on a Bash `command` given whether the project uses pnpm.
pub fn decide(command: &str, pnpm_project: bool) -> HookAction {
    if !pnpm_project {
        return HookAction::Continue;
    }
    match offending_segment(command) {
        Some(segment) => {
            tracing::debug!(segment, "blocking non-pnpm package manager");
            HookAction::Block(GUIDANCE.to_string())
        }
        None => HookAction::Continue,
    }
}

/// PreToolUse entry point.
pub fn run(input: &HookInput, prefs: &PnpmPrefs) -> HookAction {
    if !prefs.enabled {
        return HookAction::Continue;
    }
    let (Some(Ok(ToolCall::Bash(bash))), Some(common)) = (input.tool_call(), input.common()) else {
        return HookAction::Continue;
    };
    let cwd = common.cwd_or_current();
    decide(&bash.command, is_pnpm_project(Path::new(&cwd)))
}
