//! The generation loop: prompt assembly, provider invocation, validation and
//! bounded corrective retry. Every attempt is logged to the audit trail
//! before validation so failed replies are still inspectable.

use std::fmt;
use std::fs;
use std::path::Path;

use crate::llm::{LlmProvider, Message, ProviderError};
use crate::schema::{self, GenerationOutput, ParseError, ValidationError};
use crate::spec;
use crate::workspace::{GenerationLogEntry, META_DIR, LOG_FILE, SpecError, Workspace};

pub const MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_TEMPERATURE: f32 = 0.2;

const SYSTEM_PROMPT: &str = r#"You are an expert Expo + React Native engineer.
Generate a minimal, working Expo app that runs on web.
Use only built-in React Native components (no extra UI kits).
Avoid native-only APIs unless necessary.
Prefer a single-screen or minimal navigation unless explicitly requested.

Baseline UI styling rules (mandatory):
1) Every screen must have safe-area handling and consistent padding (16-20) with vertical spacing (12-16).
2) Every screen must render a top header bar with title on the left, optional right action, and a subtle bottom divider.
3) Always include and use shared UI baseline files:
   - src/ui/theme.ts
   - src/ui/Screen.tsx
   - src/ui/AppHeader.tsx
4) No content flush to screen edges.
5) Inputs/buttons must be at least 44pt height with comfortable spacing.
6) Lists must use visually separated rows/cards (padding 12-16, radius ~12, subtle border/shadow).
7) Provide a friendly empty state with spacing.
8) Must work in Expo Web preview and iOS/Android.

Output MUST be strict JSON matching the schema provided.
"#;

const JSON_SCHEMA_DESC: &str = r#"Return JSON with:
- files: array of { "path": "relative/path", "content": "..." }
- managed_paths: array of strings
- notes: optional string
"#;

/// Whether this run scaffolds a fresh project or regenerates managed files
/// inside an existing one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    New,
    Iterate,
}

/// A validated generation plus the raw text it was parsed from.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub output: GenerationOutput,
    pub raw: String,
}

/// Terminal generation failures.
#[derive(Debug)]
pub enum GenerationError {
    Spec(SpecError),
    Provider(ProviderError),
    Audit(anyhow::Error),
    Exhausted { attempts: usize, last_error: String },
}

impl fmt::Display for GenerationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            GenerationError::Spec(err) => write!(f, "{err}"),
            GenerationError::Provider(err) => write!(f, "LLM provider call failed: {err}"),
            GenerationError::Audit(err) => {
                write!(f, "failed to append generation audit log: {err:#}")
            }
            GenerationError::Exhausted {
                attempts,
                last_error,
            } => write!(
                f,
                "model output was still invalid after {attempts} attempt(s): {last_error}. \
                 Check {META_DIR}/{LOG_FILE} for the full exchange."
            ),
        }
    }
}

impl std::error::Error for GenerationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            GenerationError::Spec(err) => Some(err),
            GenerationError::Provider(err) => Some(err),
            GenerationError::Audit(_) => None,
            GenerationError::Exhausted { .. } => None,
        }
    }
}

impl From<SpecError> for GenerationError {
    fn from(err: SpecError) -> Self {
        GenerationError::Spec(err)
    }
}

impl From<ProviderError> for GenerationError {
    fn from(err: ProviderError) -> Self {
        GenerationError::Provider(err)
    }
}

enum AttemptError {
    Parse(ParseError),
    Validation(ValidationError),
}

/// Runs the full generation loop against `provider`.
///
/// Up to [`MAX_ATTEMPTS`] sequential calls; parse and validation failures
/// append a corrective user message and retry, provider failures propagate
/// immediately. The message sequence only ever grows, so later attempts see
/// the whole correction history.
pub fn generate(
    ws: &Workspace,
    provider: &dyn LlmProvider,
    model: &str,
    mode: Mode,
    temperature: f32,
) -> Result<GenerationResult, GenerationError> {
    let spec_text = ws.read_spec()?;
    let summary = spec::summarize(&spec_text);
    let summary_json =
        serde_json::to_string_pretty(&summary).unwrap_or_else(|_| "{}".to_string());

    let mut managed_contents: Vec<(String, String)> = Vec::new();
    if mode == Mode::Iterate {
        for path in ws.load_managed() {
            let file_path = ws.project_path().join(&path);
            if !file_path.exists() {
                continue;
            }
            if let Ok(content) = fs::read_to_string(&file_path) {
                managed_contents.push((path, content));
            }
        }
    }

    let mut messages = vec![
        Message::system(SYSTEM_PROMPT),
        Message::user(build_user_prompt(
            &spec_text,
            &summary_json,
            &managed_contents,
        )),
    ];

    let project_path = ws.project_path();
    let disk_root = match mode {
        Mode::Iterate => Some(project_path.as_path()),
        Mode::New => None,
    };

    let mut last_error = String::new();
    for attempt in 1..=MAX_ATTEMPTS {
        let raw = provider.generate(&messages, model, temperature)?;
        ws.log_generation(&GenerationLogEntry {
            provider: provider.name(),
            model,
            messages: &messages,
            response_raw: &raw,
            attempt,
        })
        .map_err(GenerationError::Audit)?;

        match check_output(&raw, disk_root) {
            Ok(output) => return Ok(GenerationResult { output, raw }),
            Err(AttemptError::Parse(err)) => {
                last_error = err.to_string();
                if attempt == MAX_ATTEMPTS {
                    break;
                }
                messages.push(Message::user(format!(
                    "Your previous response was invalid. \
                     Return ONLY strict JSON that matches the schema. \
                     Do not include markdown or explanations.\n\
                     Invalid output:\n{raw}"
                )));
            }
            Err(AttemptError::Validation(err)) => {
                last_error = err.to_string();
                if attempt == MAX_ATTEMPTS {
                    break;
                }
                messages.push(Message::user(format!(
                    "Your previous response is invalid. \
                     Return ONLY strict JSON that matches the schema, includes ALL required files, \
                     and ensures all imported files/assets exist.\n\
                     Error: {err}\n\
                     Invalid output:\n{raw}"
                )));
            }
        }
    }

    Err(GenerationError::Exhausted {
        attempts: MAX_ATTEMPTS,
        last_error,
    })
}

fn check_output(raw: &str, disk_root: Option<&Path>) -> Result<GenerationOutput, AttemptError> {
    let output = schema::parse_output(raw).map_err(AttemptError::Parse)?;
    schema::validate_required_files(&output).map_err(AttemptError::Validation)?;
    schema::validate_references(&output, disk_root).map_err(AttemptError::Validation)?;
    Ok(output)
}

fn build_user_prompt(
    spec_text: &str,
    summary_json: &str,
    managed_contents: &[(String, String)],
) -> String {
    let managed_block = if managed_contents.is_empty() {
        "(none)".to_string()
    } else {
        managed_contents
            .iter()
            .map(|(path, content)| format!("- {path}:\n```\n{content}\n```"))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "App spec (README.md):\n```\n{spec_text}\n```\n\n\
         Structured summary:\n{summary_json}\n\n\
         Currently managed files and contents:\n{managed_block}\n\n\
         Constraints:\n\
         - Output strict JSON only\n\
         - Keep code minimal and runnable\n\
         - Ensure App.tsx uses functional components\n\n\
         {JSON_SCHEMA_DESC}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_prompt_without_managed_files() {
        let prompt = build_user_prompt("# App", "{}", &[]);
        assert!(prompt.contains("# App"));
        assert!(prompt.contains("(none)"));
        assert!(prompt.contains("managed_paths"));
    }

    #[test]
    fn test_user_prompt_embeds_managed_contents() {
        let managed = vec![("App.tsx".to_string(), "old body".to_string())];
        let prompt = build_user_prompt("# App", "{}", &managed);
        assert!(prompt.contains("- App.tsx:"));
        assert!(prompt.contains("old body"));
    }

    #[test]
    fn test_system_prompt_demands_baseline_files() {
        for path in schema::REQUIRED_UI_FILES {
            assert!(SYSTEM_PROMPT.contains(path));
        }
    }
}
