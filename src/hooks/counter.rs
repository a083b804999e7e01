use super::HookAction;
use crate::metadata::{CounterState, ReviewRequest};
use crate::preferences::ReviewPrefs;
use crate::project::ProjectState;
use crate::types::CommonInput;
use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Command, Stdio};

/// Result of counting one tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct Tick {
    pub state: CounterState,
    /// Whether a review should be launched now.
    pub launch: bool,
}

/// Count one tool call at time `now` (epoch seconds). A review is due on
/// every `interval`-th call, provided `cooldown_seconds` have passed since
/// the last one. `last_run` is left for the caller to set once a launch
/// actually succeeds.
pub fn tick(state: CounterState, now: f64, prefs: &ReviewPrefs) -> Tick {
    let count = state.count.saturating_add(1);
    let interval = prefs.interval.max(1);
    let launch = count % interval == 0 && now - state.last_run >= prefs.cooldown_seconds as f64;
    Tick {
        state: CounterState {
            count,
            last_run: state.last_run,
        },
        launch,
    }
}

/// PostToolUse entry point. `launch` starts a worker for the request file
/// it is given.
pub fn run(
    common: &CommonInput,
    prefs: &ReviewPrefs,
    base: &Path,
    now: f64,
    launch: impl FnOnce(&Path) -> Result<()>,
) -> Result<HookAction> {
    let cwd = common.cwd_or_current();
    let project = ProjectState::open(base, &cwd)?;

    let Tick { mut state, launch: due } = tick(project.read_counter(), now, prefs);
    project.write_counter(&state)?;
    tracing::debug!(count = state.count, due, "counted tool call");
    if !due {
        return Ok(HookAction::Continue);
    }

    let request = ReviewRequest {
        cwd,
        transcript_path: common.transcript_path.clone(),
        session_id: common.session_id.clone(),
    };
    let request_file = project.write_review_request(&request)?;
    match launch(&request_file) {
        Ok(()) => {
            state.last_run = now;
            project.write_counter(&state)?;
        }
        Err(err) => {
            tracing::warn!("{err:#}; review not launched");
            let _ = std::fs::remove_file(&request_file);
        }
    }
    Ok(HookAction::Continue)
}

/// Start `<this executable> review-worker --event-file <request>` detached
/// from the hook's session, with no stdio.
pub fn spawn_worker(request_file: &Path) -> Result<()> {
    let exe = std::env::current_exe().context("locating sidekick executable")?;
    let mut cmd = Command::new(&exe);
    cmd.arg("review-worker")
        .arg("--event-file")
        .arg(request_file)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    cmd.spawn()
        .with_context(|| format!("spawning {} review-worker", exe.display()))?;
    Ok(())
}
