use super::HookAction;
use crate::metadata::PendingFeedback;
use crate::project::ProjectState;
use crate::types::CommonInput;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::Path;

const HEADER: &str = "🤖 Sidekick suggestion";

/// What to do with the pending nudge file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NudgeDecision {
    pub action: HookAction,
    /// Delete the pending file.
    pub consume: bool,
}

/// Render a pending nudge for stderr.
pub fn render(pending: &PendingFeedback) -> String {
    let mut text = String::from(HEADER);
    text.push('\n');
    if !pending.reason.trim().is_empty() {
        text.push_str(&format!("_Why_: {}\n\n", pending.reason.trim()));
    }
    text.push_str(pending.nudge_markdown.trim());
    text
}

/// Decide what to do with `pending` at time `now`. An unparseable
/// `created_at` counts as fresh.
pub fn decide(pending: Option<&PendingFeedback>, now: DateTime<Utc>) -> NudgeDecision {
    let Some(pending) = pending else {
        return NudgeDecision {
            action: HookAction::Continue,
            consume: false,
        };
    };

    let created = pending.created_at().unwrap_or(now);
    let age = (now - created).num_seconds();
    if age > pending.ttl_seconds as i64 {
        tracing::debug!(age, ttl = pending.ttl_seconds, "dropping stale nudge");
        return NudgeDecision {
            action: HookAction::Continue,
            consume: true,
        };
    }

    if pending.nudge_markdown.trim().is_empty() {
        return NudgeDecision {
            action: HookAction::Continue,
            consume: false,
        };
    }

    NudgeDecision {
        action: HookAction::Notify(render(pending)),
        consume: true,
    }
}

/// PreToolUse entry point.
pub fn run(common: &CommonInput, base: &Path, now: DateTime<Utc>) -> Result<HookAction> {
    let project = ProjectState::open(base, &common.cwd_or_current())?;
    let decision = decide(project.read_pending().as_ref(), now);
    if decision.consume {
        project.clear_pending()?;
    }
    Ok(decision.action)
}
