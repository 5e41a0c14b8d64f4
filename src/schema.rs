//! Wire schema for model output plus the two validation passes that decide
//! whether a generation attempt is acceptable: the required-files check and
//! the import/reference closure check.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// One file the model wants written, path relative to the project root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedFile {
    pub path: String,
    pub content: String,
}

/// The only accepted shape for a model reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOutput {
    pub files: Vec<GeneratedFile>,
    pub managed_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Shared UI scaffolding every generation must include and declare managed.
pub const REQUIRED_UI_FILES: [&str; 3] = [
    "src/ui/theme.ts",
    "src/ui/Screen.tsx",
    "src/ui/AppHeader.tsx",
];

const CODE_EXTS: [&str; 4] = [".ts", ".tsx", ".js", ".jsx"];
const ASSET_EXTS: [&str; 7] = [".png", ".jpg", ".jpeg", ".svg", ".gif", ".webp", ".json"];

/// Raw model text was not well-formed JSON matching [`GenerationOutput`].
#[derive(Debug)]
pub struct ParseError(serde_json::Error);

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "output is not valid generation JSON: {}", self.0)
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// Structurally valid output that is semantically incomplete or inconsistent.
#[derive(Debug)]
pub struct ValidationError(String);

impl ValidationError {
    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ValidationError {}

/// Deserializes a raw model reply into a [`GenerationOutput`].
pub fn parse_output(raw: &str) -> Result<GenerationOutput, ParseError> {
    serde_json::from_str(raw).map_err(ParseError)
}

/// Checks that every baseline UI file appears both in `files` and in
/// `managed_paths`, reporting all absences together.
pub fn validate_required_files(output: &GenerationOutput) -> Result<(), ValidationError> {
    let file_paths: HashSet<&str> = output.files.iter().map(|f| f.path.as_str()).collect();
    let managed_paths: HashSet<&str> = output.managed_paths.iter().map(String::as_str).collect();

    let missing_files: Vec<&str> = REQUIRED_UI_FILES
        .iter()
        .copied()
        .filter(|p| !file_paths.contains(p))
        .collect();
    let missing_managed: Vec<&str> = REQUIRED_UI_FILES
        .iter()
        .copied()
        .filter(|p| !managed_paths.contains(p))
        .collect();

    if missing_files.is_empty() && missing_managed.is_empty() {
        return Ok(());
    }

    let mut details = Vec::new();
    if !missing_files.is_empty() {
        details.push(format!("missing files: {:?}", missing_files));
    }
    if !missing_managed.is_empty() {
        details.push(format!("missing managed_paths: {:?}", missing_managed));
    }
    Err(ValidationError(format!(
        "required UI baseline files not included: {}",
        details.join("; ")
    )))
}

/// Checks that every local import or asset reference in the generated files
/// resolves to a generated file or, when `project_root` is given, to a file
/// already on disk under it. Lists every unresolved `file -> reference` pair.
pub fn validate_references(
    output: &GenerationOutput,
    project_root: Option<&Path>,
) -> Result<(), ValidationError> {
    let mut available: HashSet<String> =
        output.files.iter().map(|f| f.path.clone()).collect();
    if let Some(root) = project_root {
        if root.exists() {
            available.extend(collect_disk_paths(root));
        }
    }

    let mut missing: BTreeSet<String> = BTreeSet::new();
    for file in &output.files {
        let base_dir = parent_dir(&file.path);
        for reference in collect_local_references(&file.content) {
            let satisfied = candidate_paths(base_dir, &reference)
                .iter()
                .any(|candidate| available.contains(candidate));
            if !satisfied {
                missing.insert(format!("{} -> {}", file.path, reference));
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        let listing: Vec<String> = missing.into_iter().collect();
        Err(ValidationError(format!(
            "missing referenced files for imports/assets: {}",
            listing.join("; ")
        )))
    }
}

fn import_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?:import\s+[^'"]*from\s+|import\s+|require\()\s*['"]([^'"]+)['"]"#)
            .expect("import pattern is valid")
    })
}

/// Extracts import/require targets that point at local files. Only targets
/// beginning with `.` or `/` count; bare package names are left to npm.
fn collect_local_references(content: &str) -> Vec<String> {
    let mut seen = BTreeSet::new();
    for captures in import_pattern().captures_iter(content) {
        let target = &captures[1];
        if target.starts_with('.') || target.starts_with('/') {
            seen.insert(target.to_string());
        }
    }
    seen.into_iter().collect()
}

fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[..idx],
        None => "",
    }
}

/// Expands a reference into the set of concrete paths that would satisfy it.
/// References with an explicit extension yield exactly one candidate; bare
/// references try every code and asset extension plus a directory `index`
/// file per code extension.
fn candidate_paths(base_dir: &str, reference: &str) -> Vec<String> {
    let resolved = resolve_reference(base_dir, reference);
    if has_extension(&resolved) {
        return vec![resolved];
    }

    let mut candidates = Vec::new();
    for ext in CODE_EXTS.iter().chain(ASSET_EXTS.iter()) {
        candidates.push(format!("{resolved}{ext}"));
    }
    for ext in CODE_EXTS {
        candidates.push(format!("{resolved}/index{ext}"));
    }
    candidates
}

/// Resolves a reference against the referencing file's directory, POSIX
/// style. A leading `/` means project-root-relative; `.` and `..` segments
/// are folded away.
fn resolve_reference(base_dir: &str, reference: &str) -> String {
    let joined = if let Some(rooted) = reference.strip_prefix('/') {
        rooted.to_string()
    } else if base_dir.is_empty() {
        reference.to_string()
    } else {
        format!("{base_dir}/{reference}")
    };

    let mut parts: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

fn has_extension(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or(path);
    match name.rfind('.') {
        Some(idx) => idx > 0 && idx + 1 < name.len(),
        None => false,
    }
}

/// Recursively collects file paths under `root`, relative, forward-slashed.
fn collect_disk_paths(root: &Path) -> HashSet<String> {
    let mut paths = HashSet::new();
    let mut stack: Vec<PathBuf> = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let Ok(entries) = fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if let Ok(relative) = path.strip_prefix(root) {
                paths.insert(relative.to_string_lossy().replace('\\', "/"));
            }
        }
    }
    paths
}
