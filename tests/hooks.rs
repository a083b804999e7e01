mod common;

use common::{Sandbox, event};
use serde_json::json;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};

fn project_state_dir(sandbox: &Sandbox, cwd: &Path) -> PathBuf {
    let digest = hex::encode(Sha256::digest(cwd.to_string_lossy().as_bytes()));
    sandbox.state_dir().join(&digest[..12])
}

fn pnpm_project(sandbox: &Sandbox) -> PathBuf {
    let cwd = sandbox.root().join("web");
    fs::create_dir_all(&cwd).unwrap();
    fs::write(cwd.join("pnpm-lock.yaml"), "lockfileVersion: '9.0'\n").unwrap();
    cwd
}

// ===================================================================
// enforce-pnpm
// ===================================================================

#[test]
fn npm_install_is_blocked_in_a_pnpm_project() {
    let sandbox = Sandbox::new();
    let cwd = pnpm_project(&sandbox);
    let input = event("PreToolUse", &cwd, "Bash", "npm install");

    let (code, stdout, stderr) = sandbox.run(&["hook", "enforce-pnpm"], &input);
    assert_eq!(code, 2);
    assert!(stdout.is_empty());
    assert!(stderr.contains("This project uses PNPM"));
}

#[test]
fn bun_test_is_allowed_in_a_pnpm_project() {
    let sandbox = Sandbox::new();
    let cwd = pnpm_project(&sandbox);
    let input = event("PreToolUse", &cwd, "Bash", "bun test");

    let (code, _, stderr) = sandbox.run(&["hook", "enforce-pnpm"], &input);
    assert_eq!(code, 0);
    assert!(stderr.is_empty());
}

#[test]
fn npm_is_fine_outside_pnpm_projects() {
    let sandbox = Sandbox::new();
    let cwd = sandbox.root().join("plain");
    fs::create_dir_all(&cwd).unwrap();
    let input = event("PreToolUse", &cwd, "Bash", "npm install");

    let (code, _, _) = sandbox.run(&["hook", "enforce-pnpm"], &input);
    assert_eq!(code, 0);
}

#[test]
fn config_can_disable_the_pnpm_policy() {
    let sandbox = Sandbox::new();
    let cwd = pnpm_project(&sandbox);
    fs::create_dir_all(sandbox.state_dir()).unwrap();
    fs::write(sandbox.state_dir().join("sidekick.toml"), "[pnpm]\nenabled = false\n").unwrap();

    let input = event("PreToolUse", &cwd, "Bash", "npm install");
    let (code, _, _) = sandbox.run(&["hook", "enforce-pnpm"], &input);
    assert_eq!(code, 0);
}

// ===================================================================
// counter
// ===================================================================

#[test]
fn counter_persists_the_call_count() {
    let sandbox = Sandbox::new();
    let cwd = sandbox.root().join("proj");
    fs::create_dir_all(&cwd).unwrap();
    let input = event("PostToolUse", &cwd, "Read", "");

    for _ in 0..3 {
        let (code, stdout, stderr) = sandbox.run(&["hook", "counter"], &input);
        assert_eq!(code, 0);
        assert!(stdout.is_empty());
        assert!(stderr.is_empty(), "stderr: {stderr}");
    }

    let state: serde_json::Value = serde_json::from_str(
        &fs::read_to_string(project_state_dir(&sandbox, &cwd).join("state.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(state["count"], 3);
    assert_eq!(state["last_run"], 0.0);
}

#[test]
fn counter_launches_a_review_on_the_interval() {
    let mut sandbox = Sandbox::new();
    sandbox.set_env("SIDEKICK_INTERVAL", "2");
    sandbox.set_env("SIDEKICK_COOLDOWN_SECONDS", "0");
    let cwd = sandbox.root().join("proj");
    fs::create_dir_all(&cwd).unwrap();
    let input = event("PostToolUse", &cwd, "Bash", "ls");

    let state_file = project_state_dir(&sandbox, &cwd).join("state.json");
    let read_state = || -> serde_json::Value {
        serde_json::from_str(&fs::read_to_string(&state_file).unwrap()).unwrap()
    };

    assert_eq!(sandbox.run(&["hook", "counter"], &input).0, 0);
    assert_eq!(read_state()["last_run"], 0.0);

    assert_eq!(sandbox.run(&["hook", "counter"], &input).0, 0);
    let state = read_state();
    assert_eq!(state["count"], 2);
    assert!(state["last_run"].as_f64().unwrap() > 0.0);
}

#[test]
fn counter_ignores_unreadable_input() {
    let sandbox = Sandbox::new();
    let (code, stdout, stderr) = sandbox.run(&["hook", "counter"], "not json");
    assert_eq!(code, 0);
    assert!(stdout.is_empty());
    assert!(stderr.is_empty());
}

// ===================================================================
// nudge
// ===================================================================

fn write_pending(sandbox: &Sandbox, cwd: &Path, created_at: &str) -> PathBuf {
    let dir = project_state_dir(sandbox, cwd);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join("pending_feedback.json");
    fs::write(
        &path,
        json!({
            "created_at": created_at,
            "ttl_seconds": 900,
            "nudge_markdown": "Run `pnpm test` before committing.",
            "commands": ["pnpm test"],
            "score": 0.7,
            "reason": "tests were skipped"
        })
        .to_string(),
    )
    .unwrap();
    path
}

#[test]
fn fresh_nudge_is_shown_once() {
    let sandbox = Sandbox::new();
    let cwd = sandbox.root().join("proj");
    let now = chrono::Utc::now().to_rfc3339();
    let pending = write_pending(&sandbox, &cwd, &now);
    let input = event("PreToolUse", &cwd, "Bash", "git commit");

    let (code, _, stderr) = sandbox.run(&["hook", "nudge"], &input);
    assert_eq!(code, 1);
    assert!(stderr.contains("Sidekick suggestion"));
    assert!(stderr.contains("_Why_: tests were skipped"));
    assert!(stderr.contains("Run `pnpm test` before committing."));
    assert!(!pending.exists());

    let (code, _, stderr) = sandbox.run(&["hook", "nudge"], &input);
    assert_eq!(code, 0);
    assert!(stderr.is_empty());
}

#[test]
fn stale_nudge_is_discarded() {
    let sandbox = Sandbox::new();
    let cwd = sandbox.root().join("proj");
    let pending = write_pending(&sandbox, &cwd, "2020-01-01T00:00:00Z");
    let input = event("PreToolUse", &cwd, "Bash", "ls");

    let (code, _, stderr) = sandbox.run(&["hook", "nudge"], &input);
    assert_eq!(code, 0);
    assert!(stderr.is_empty());
    assert!(!pending.exists());
}

#[test]
fn unrelated_events_pass_through() {
    let sandbox = Sandbox::new();
    let cwd = sandbox.root().join("proj");
    let input = event("SessionStart", &cwd, "", "");
    for hook in ["enforce-pnpm", "counter", "nudge"] {
        let (code, stdout, stderr) = sandbox.run(&["hook", hook], &input);
        assert_eq!(code, 0, "{hook}");
        assert!(stdout.is_empty());
        assert!(stderr.is_empty());
    }
}
