use crate::preferences::ReviewPrefs;
use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::blocking::Client;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Something that reads a condensed session and answers with a verdict.
pub trait Reviewer {
    /// Send `payload` under `system_prompt`; returns the raw reply text.
    fn review(&self, system_prompt: &str, payload: &str) -> Result<String>;
}

/// OpenAI-compatible chat completions endpoint.
pub struct OpenAiReviewer {
    api_key: Option<String>,
    prefs: ReviewPrefs,
    /// Where `api_key_missing.log` goes.
    state_dir: PathBuf,
}

impl OpenAiReviewer {
    pub fn new(api_key: Option<String>, prefs: ReviewPrefs, state_dir: PathBuf) -> Self {
        Self {
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            prefs,
            state_dir,
        }
    }

    /// Reads the key from `$OPENAI_API_KEY`.
    pub fn from_env(prefs: ReviewPrefs, state_dir: PathBuf) -> Self {
        Self::new(std::env::var("OPENAI_API_KEY").ok(), prefs, state_dir)
    }

    /// Leave a note for the user explaining why no nudges appear.
    fn record_missing_key(&self) {
        let path = self.state_dir.join("api_key_missing.log");
        let note = format!(
            "API key missing at {}\nSet OPENAI_API_KEY environment variable\n",
            Utc::now().to_rfc3339()
        );
        if let Err(err) = fs::create_dir_all(&self.state_dir).and_then(|()| fs::write(&path, note)) {
            tracing::warn!(path = %path.display(), %err, "could not write missing-key note");
        }
    }

    fn request_body(&self, system_prompt: &str, payload: &str) -> Value {
        let mut body = serde_json::json!({
            "model": self.prefs.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": payload }
            ]
        });
        if let Some(effort) = &self.prefs.reasoning_effort {
            body["reasoning_effort"] = Value::from(effort.as_str());
        }
        if let Some(temperature) = self.prefs.temperature {
            body["temperature"] = Value::from(temperature);
        }
        if let Some(tokens) = self.prefs.max_completion_tokens {
            body["max_completion_tokens"] = Value::from(tokens);
        }
        body
    }
}

/// Text of the first choice; array content parts are joined by newlines.
pub fn extract_reply_text(json: &Value) -> Option<String> {
    let content = json
        .get("choices")?
        .as_array()?
        .first()?
        .get("message")?
        .get("content")?;
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let chunks: Vec<&str> = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect();
            (!chunks.is_empty()).then(|| chunks.join("\n"))
        }
        _ => None,
    }
}

impl Reviewer for OpenAiReviewer {
    fn review(&self, system_prompt: &str, payload: &str) -> Result<String> {
        let Some(api_key) = &self.api_key else {
            self.record_missing_key();
            anyhow::bail!("OPENAI_API_KEY not set");
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(self.prefs.timeout_seconds))
            .build()
            .context("building HTTP client")?;
        let response = client
            .post(&self.prefs.api_url)
            .bearer_auth(api_key)
            .json(&self.request_body(system_prompt, payload))
            .send()
            .with_context(|| format!("calling {}", self.prefs.api_url))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            anyhow::bail!("review call failed with status {status}: {body}");
        }

        let json: Value = response.json().context("decoding review response")?;
        extract_reply_text(&json).context("review response missing message content")
    }
}
