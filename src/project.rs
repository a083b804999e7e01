use crate::metadata::{CounterState, PendingFeedback, ReviewMemory, ReviewRequest};
use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Name of a project's state directory: the first 12 hex characters of the
/// SHA-256 of its working directory.
pub fn project_slug(cwd: &str) -> String {
    let digest = Sha256::digest(cwd.as_bytes());
    hex::encode(digest)[..12].to_string()
}

/// Read and deserialize a JSON file, returning `None` if it doesn't exist.
pub fn read_json_file<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path) {
        Ok(s) => {
            let val = serde_json::from_str(&s)
                .with_context(|| format!("parsing {}", path.display()))?;
            Ok(Some(val))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("reading {}", path.display())),
    }
}

/// Remove a file, ignoring "not found" errors.
pub fn remove_if_exists(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
    }
}

/// Serialize `value` to a temp file beside `path`, then rename it into place.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .with_context(|| format!("{} has no parent directory", path.display()))?;
    let json = serde_json::to_string_pretty(value)
        .with_context(|| format!("serializing {}", path.display()))?;
    let mut tmp = tempfile::Builder::new()
        .prefix(".tmp-")
        .suffix(".json")
        .tempfile_in(dir)
        .with_context(|| format!("creating temp file in {}", dir.display()))?;
    tmp.write_all(json.as_bytes())
        .with_context(|| format!("writing temp file for {}", path.display()))?;
    tmp.persist(path)
        .with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

/// Read a state file, treating a corrupt one as absent.
fn read_or_default<T: DeserializeOwned + Default>(path: &Path) -> T {
    match read_json_file(path) {
        Ok(value) => value.unwrap_or_default(),
        Err(err) => {
            tracing::warn!("{err:#}; starting from defaults");
            T::default()
        }
    }
}

/// Per-project state directory shared by the hooks and the review worker.
pub struct ProjectState {
    dir: PathBuf,
}

impl ProjectState {
    /// Open (creating if needed) the state directory for `cwd` under `base`.
    pub fn open(base: &Path, cwd: &str) -> Result<Self> {
        let dir = base.join(project_slug(cwd));
        fs::create_dir_all(&dir).with_context(|| format!("creating {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    // ---------------------------------------------------------------
    // Private path helpers
    // ---------------------------------------------------------------

    fn counter_path(&self) -> PathBuf {
        self.dir.join("state.json")
    }

    fn memory_path(&self) -> PathBuf {
        self.dir.join("memory.json")
    }

    fn pending_path(&self) -> PathBuf {
        self.dir.join("pending_feedback.json")
    }

    // ---------------------------------------------------------------
    // Counter
    // ---------------------------------------------------------------

    pub fn read_counter(&self) -> CounterState {
        read_or_default(&self.counter_path())
    }

    pub fn write_counter(&self, state: &CounterState) -> Result<()> {
        write_json_atomic(&self.counter_path(), state)
    }

    // ---------------------------------------------------------------
    // Review memory
    // ---------------------------------------------------------------

    pub fn read_memory(&self) -> ReviewMemory {
        read_or_default(&self.memory_path())
    }

    pub fn write_memory(&self, memory: &ReviewMemory) -> Result<()> {
        write_json_atomic(&self.memory_path(), memory)
    }

    // ---------------------------------------------------------------
    // Pending nudge
    // ---------------------------------------------------------------

    /// A corrupt pending file is logged and reported as absent.
    pub fn read_pending(&self) -> Option<PendingFeedback> {
        match read_json_file(&self.pending_path()) {
            Ok(pending) => pending,
            Err(err) => {
                tracing::warn!("{err:#}; ignoring pending nudge");
                None
            }
        }
    }

    pub fn write_pending(&self, pending: &PendingFeedback) -> Result<()> {
        write_json_atomic(&self.pending_path(), pending)
    }

    pub fn clear_pending(&self) -> Result<()> {
        remove_if_exists(&self.pending_path())
    }

    // ---------------------------------------------------------------
    // Review requests
    // ---------------------------------------------------------------

    /// Write a one-shot request file for the review worker and return its path.
    pub fn write_review_request(&self, request: &ReviewRequest) -> Result<PathBuf> {
        let json = serde_json::to_string_pretty(request).context("serializing review request")?;
        let file = tempfile::Builder::new()
            .prefix("review-")
            .suffix(".json")
            .tempfile_in(&self.dir)
            .with_context(|| format!("creating review request in {}", self.dir.display()))?;
        let (mut handle, path) = file
            .keep()
            .context("keeping review request file")?;
        handle
            .write_all(json.as_bytes())
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }
}
