#![allow(dead_code)]

use serde_json::json;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// An isolated home for one test: `HOME`, the sidekick state dir and the
/// artifact dir all live in a temp dir, and `PATH` holds no clipboard tools.
pub struct Sandbox {
    dir: tempfile::TempDir,
    env: Vec<(String, String)>,
}

impl Sandbox {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        for sub in ["home", "bin"] {
            fs::create_dir_all(dir.path().join(sub)).unwrap();
        }
        let mut sandbox = Self {
            dir,
            env: Vec::new(),
        };
        let home = sandbox.home();
        let state = sandbox.state_dir();
        let copyq = sandbox.copyq_dir();
        let bin = sandbox.dir.path().join("bin");
        sandbox.set_env("HOME", &home.to_string_lossy());
        sandbox.set_env("SIDEKICK_HOME", &state.to_string_lossy());
        sandbox.set_env("COPYQ_DIR", &copyq.to_string_lossy());
        sandbox.set_env("PATH", &bin.to_string_lossy());
        sandbox
    }

    pub fn set_env(&mut self, key: &str, value: &str) {
        self.env.retain(|(k, _)| k != key);
        self.env.push((key.to_string(), value.to_string()));
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn home(&self) -> PathBuf {
        self.dir.path().join("home")
    }

    pub fn state_dir(&self) -> PathBuf {
        self.dir.path().join("state")
    }

    pub fn copyq_dir(&self) -> PathBuf {
        self.dir.path().join("copyq")
    }

    /// Write a transcript where the host keeps it and return its path.
    pub fn write_session(&self, session_id: &str, lines: &[String]) -> PathBuf {
        let project = self.home().join(".claude").join("projects").join("-home-me-proj");
        fs::create_dir_all(&project).unwrap();
        let path = project.join(format!("{session_id}.jsonl"));
        fs::write(&path, lines.join("\n")).unwrap();
        path
    }

    /// Files written to the artifact dir.
    pub fn artifacts(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(self.copyq_dir()) else {
            return Vec::new();
        };
        let mut files: Vec<PathBuf> = entries.map(|e| e.unwrap().path()).collect();
        files.sort();
        files
    }

    /// Run the binary with `args`, feeding `stdin`. Returns (exit code, stdout, stderr).
    pub fn run(&self, args: &[&str], stdin: &str) -> (i32, String, String) {
        let mut child = Command::new(env!("CARGO_BIN_EXE_sidekick"))
            .args(args)
            .env_clear()
            .envs(self.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .current_dir(self.dir.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .expect("failed to spawn binary");

        child
            .stdin
            .as_mut()
            .unwrap()
            .write_all(stdin.as_bytes())
            .unwrap();

        let output = child.wait_with_output().unwrap();
        (
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout).to_string(),
            String::from_utf8_lossy(&output.stderr).to_string(),
        )
    }
}

pub fn user_line(text: &str) -> String {
    json!({ "type": "user", "message": { "role": "user", "content": text } }).to_string()
}

pub fn assistant_line(text: &str) -> String {
    json!({
        "type": "assistant",
        "message": { "role": "assistant", "content": [{ "type": "text", "text": text }] }
    })
    .to_string()
}

/// `n` turns of "prompt i" / "reply i".
pub fn conversation(n: usize) -> Vec<String> {
    (1..=n)
        .flat_map(|i| [user_line(&format!("prompt {i}")), assistant_line(&format!("reply {i}"))])
        .collect()
}

/// A hook event for `cwd`.
pub fn event(hook_event_name: &str, cwd: &Path, tool_name: &str, command: &str) -> String {
    json!({
        "session_id": "test-session",
        "transcript_path": "/nonexistent/t.jsonl",
        "cwd": cwd.to_string_lossy(),
        "permission_mode": "default",
        "hook_event_name": hook_event_name,
        "tool_name": tool_name,
        "tool_input": { "command": command },
        "tool_use_id": "toolu_001"
    })
    .to_string()
}
