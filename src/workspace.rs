//! Workspace layout and persisted state: the README spec, the managed-file
//! registry, the spec snapshot and the append-only generation audit log.
//!
//! All state lives under a `.appforge/` metadata directory at the workspace
//! root. A single process is assumed to operate on a workspace at a time.

use anyhow::{Context, Result};
use chrono::Utc;
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use std::collections::BTreeSet;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::llm::Message;

pub const META_DIR: &str = ".appforge";
pub const MANAGED_FILE: &str = "managed.json";
pub const LOG_FILE: &str = "generation_log.jsonl";
pub const SPEC_SNAPSHOT_FILE: &str = "spec_snapshot.md";

const REDACTED: &str = "***REDACTED***";

/// Specification file problems. Fatal; never retried.
#[derive(Debug)]
pub enum SpecError {
    Missing(PathBuf),
    Empty(PathBuf),
    Unreadable(PathBuf, std::io::Error),
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SpecError::Missing(path) => {
                write!(f, "missing README spec at {}", path.display())
            }
            SpecError::Empty(path) => {
                write!(
                    f,
                    "{} is empty; describe the app you want generated",
                    path.display()
                )
            }
            SpecError::Unreadable(path, err) => {
                write!(f, "failed to read spec at {}: {}", path.display(), err)
            }
        }
    }
}

impl std::error::Error for SpecError {}

/// One attempt's request/response pair, written to the audit log after
/// secret redaction.
#[derive(Debug, Serialize)]
pub struct GenerationLogEntry<'a> {
    pub provider: &'a str,
    pub model: &'a str,
    pub messages: &'a [Message],
    pub response_raw: &'a str,
    pub attempt: usize,
}

#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub project_dir: String,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, project_dir: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            project_dir: project_dir.into(),
        }
    }

    pub fn readme_path(&self) -> PathBuf {
        self.root.join("README.md")
    }

    pub fn project_path(&self) -> PathBuf {
        self.root.join(&self.project_dir)
    }

    pub fn meta_dir(&self) -> PathBuf {
        self.root.join(META_DIR)
    }

    pub fn managed_path(&self) -> PathBuf {
        self.meta_dir().join(MANAGED_FILE)
    }

    pub fn log_path(&self) -> PathBuf {
        self.meta_dir().join(LOG_FILE)
    }

    pub fn spec_snapshot_path(&self) -> PathBuf {
        self.meta_dir().join(SPEC_SNAPSHOT_FILE)
    }

    pub fn ensure_meta(&self) -> Result<()> {
        fs::create_dir_all(self.meta_dir())
            .with_context(|| format!("failed to create {}", self.meta_dir().display()))
    }

    /// Reads the README spec. Absent or blank specs are fatal.
    pub fn read_spec(&self) -> Result<String, SpecError> {
        let path = self.readme_path();
        if !path.exists() {
            return Err(SpecError::Missing(path));
        }
        let text = fs::read_to_string(&path).map_err(|e| SpecError::Unreadable(path.clone(), e))?;
        if text.trim().is_empty() {
            return Err(SpecError::Empty(path));
        }
        if looks_like_secrets(&text) {
            eprintln!(
                "warning: {} may contain secrets; they are scrubbed from logs but not from prompts",
                path.display()
            );
        }
        Ok(text)
    }

    /// Copies the spec text into the metadata directory for later reference.
    pub fn save_spec_snapshot(&self, text: &str) -> Result<()> {
        self.ensure_meta()?;
        fs::write(self.spec_snapshot_path(), text)
            .with_context(|| format!("failed to write {}", self.spec_snapshot_path().display()))
    }

    /// Loads the managed-file registry. An absent, corrupt or non-list file
    /// reads as an empty registry.
    pub fn load_managed(&self) -> Vec<String> {
        let Ok(content) = fs::read_to_string(self.managed_path()) else {
            return Vec::new();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Persists the registry: forward slashes, sorted, deduplicated.
    pub fn save_managed(&self, paths: &[String]) -> Result<()> {
        self.ensure_meta()?;
        let unique: BTreeSet<String> = paths.iter().map(|p| p.replace('\\', "/")).collect();
        let serialized = serde_json::to_string_pretty(&unique)
            .context("failed to serialize managed-file registry")?;
        fs::write(self.managed_path(), serialized)
            .with_context(|| format!("failed to write {}", self.managed_path().display()))
    }

    /// Appends one redacted, timestamped record to the audit log.
    pub fn log_generation(&self, entry: &GenerationLogEntry) -> Result<()> {
        self.ensure_meta()?;
        let serialized =
            serde_json::to_string(entry).context("failed to serialize generation log entry")?;
        let env_secret = std::env::var("OPENAI_API_KEY").ok();
        let redacted = redact_text(&serialized, env_secret.as_deref());
        let mut record: serde_json::Value = serde_json::from_str(&redacted)
            .context("generation log entry no longer valid JSON after redaction")?;
        if let serde_json::Value::Object(map) = &mut record {
            map.insert("ts".to_string(), json!(Utc::now().to_rfc3339()));
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.log_path())
            .with_context(|| format!("failed to open {}", self.log_path().display()))?;
        writeln!(file, "{record}")
            .with_context(|| format!("failed to append to {}", self.log_path().display()))
    }
}

fn secret_name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)api[_-]?key|secret|token|password").expect("valid pattern"))
}

fn key_shape_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"sk-[A-Za-z0-9]{20,}").expect("valid pattern"))
}

fn secret_field_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"("(?i:api[_-]?key|secret|token|password)"\s*:\s*")([^"]+)"#)
            .expect("valid pattern")
    })
}

fn looks_like_secrets(text: &str) -> bool {
    secret_name_pattern().is_match(text)
}

/// Best-effort textual scrub of a serialized payload: provider key shapes,
/// JSON fields with secret-like names, and the literal environment credential.
/// Pattern-based, not a structural guarantee.
pub fn redact_text(text: &str, extra_secret: Option<&str>) -> String {
    let mut redacted = key_shape_pattern().replace_all(text, REDACTED).to_string();
    redacted = secret_field_pattern()
        .replace_all(&redacted, format!("${{1}}{REDACTED}"))
        .to_string();
    if let Some(secret) = extra_secret {
        if !secret.is_empty() {
            redacted = redacted.replace(secret, REDACTED);
        }
    }
    redacted
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_spec_missing_and_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "app");

        assert!(matches!(ws.read_spec(), Err(SpecError::Missing(_))));

        fs::write(ws.readme_path(), "   \n  \n").unwrap();
        assert!(matches!(ws.read_spec(), Err(SpecError::Empty(_))));

        fs::write(ws.readme_path(), "# My App\n").unwrap();
        assert!(ws.read_spec().unwrap().contains("My App"));
    }

    #[test]
    fn test_managed_registry_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "app");

        assert!(ws.load_managed().is_empty());

        ws.save_managed(&[
            "b.tsx".to_string(),
            "a\\nested\\c.ts".to_string(),
            "b.tsx".to_string(),
        ])
        .unwrap();
        assert_eq!(ws.load_managed(), vec!["a/nested/c.ts", "b.tsx"]);
    }

    #[test]
    fn test_corrupt_registry_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "app");
        ws.ensure_meta().unwrap();

        fs::write(ws.managed_path(), "{not json").unwrap();
        assert!(ws.load_managed().is_empty());

        fs::write(ws.managed_path(), r#"{"a": 1}"#).unwrap();
        assert!(ws.load_managed().is_empty());
    }

    #[test]
    fn test_redact_key_shapes_and_fields() {
        let text = r#"{"api_key": "super-secret", "note": "sk-abcdefghijklmnopqrstuvwx"}"#;
        let redacted = redact_text(text, None);
        assert!(!redacted.contains("super-secret"));
        assert!(!redacted.contains("sk-abcdefghijklmnopqrstuvwx"));
        assert!(redacted.contains(r#""api_key": "***REDACTED***""#));
    }

    #[test]
    fn test_redact_env_credential_literal() {
        let redacted = redact_text("the key is hunter2-value here", Some("hunter2-value"));
        assert_eq!(redacted, "the key is ***REDACTED*** here");
    }

    #[test]
    fn test_redact_is_case_insensitive_on_field_names() {
        let text = r#"{"API_KEY": "x", "Password": "y"}"#;
        let redacted = redact_text(text, None);
        assert!(!redacted.contains(r#""API_KEY": "x""#));
        assert!(!redacted.contains(r#""Password": "y""#));
    }

    #[test]
    fn test_log_generation_appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "app");
        let messages = vec![Message::system("s"), Message::user("u")];

        for attempt in 1..=2 {
            ws.log_generation(&GenerationLogEntry {
                provider: "scripted",
                model: "test-model",
                messages: &messages,
                response_raw: "raw output",
                attempt,
            })
            .unwrap();
        }

        let content = fs::read_to_string(ws.log_path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        for (idx, line) in lines.iter().enumerate() {
            let record: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(record["attempt"], json!(idx + 1));
            assert_eq!(record["provider"], json!("scripted"));
            assert!(record["ts"].is_string());
            assert_eq!(record["messages"][0]["role"], json!("system"));
        }
    }
}
