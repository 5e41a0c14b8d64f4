//! Applies validated generation output to disk. In iterate mode only files
//! declared managed (or not yet present) are written; everything else is the
//! user's and stays untouched.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;

use crate::generator::Mode;
use crate::schema::GenerationOutput;
use crate::workspace::Workspace;

const MARKER_FILE: &str = "GENERATED.md";

const MARKER_CONTENT: &str = "\
# Generated project

This project was scaffolded by appforge from the README spec at the
workspace root. Files listed in .appforge/managed.json are regenerated by
`appforge iterate`; everything else is yours to edit freely.
";

/// Writes `output.files` under the project root and persists the updated
/// managed-file registry.
///
/// Mode `New` writes every file. Mode `Iterate` writes a file only when its
/// path is in `output.managed_paths` or it does not exist on disk yet.
pub fn apply_generation(ws: &Workspace, output: &GenerationOutput, mode: Mode) -> Result<()> {
    let project_root = ws.project_path();
    let managed: HashSet<String> = output
        .managed_paths
        .iter()
        .map(|p| normalize_path(p))
        .collect();

    for file in &output.files {
        let relative = normalize_path(&file.path);
        let target = project_root.join(&relative);

        if mode == Mode::Iterate && target.exists() && !managed.contains(&relative) {
            continue;
        }

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&target, &file.content)
            .with_context(|| format!("failed to write {}", target.display()))?;
    }

    let mut registry = ws.load_managed();
    registry.extend(output.managed_paths.iter().cloned());
    ws.save_managed(&registry)?;

    Ok(())
}

/// Drops a marker readme into the project, only if absent. Never overwritten,
/// so user edits to it survive regeneration.
pub fn ensure_generated_readme(ws: &Workspace) -> Result<()> {
    let marker = ws.project_path().join(MARKER_FILE);
    if marker.exists() {
        return Ok(());
    }
    if let Some(parent) = marker.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&marker, MARKER_CONTENT)
        .with_context(|| format!("failed to write {}", marker.display()))
}

fn normalize_path(path: &str) -> String {
    path.replace('\\', "/").trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::GeneratedFile;

    fn output_with(files: Vec<(&str, &str)>, managed: Vec<&str>) -> GenerationOutput {
        GenerationOutput {
            files: files
                .into_iter()
                .map(|(path, content)| GeneratedFile {
                    path: path.to_string(),
                    content: content.to_string(),
                })
                .collect(),
            managed_paths: managed.into_iter().map(String::from).collect(),
            notes: None,
        }
    }

    #[test]
    fn test_new_mode_writes_everything() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "app");
        let output = output_with(
            vec![("App.tsx", "root"), ("src/ui/theme.ts", "theme")],
            vec!["App.tsx", "src/ui/theme.ts"],
        );

        apply_generation(&ws, &output, Mode::New).unwrap();

        let project = ws.project_path();
        assert_eq!(fs::read_to_string(project.join("App.tsx")).unwrap(), "root");
        assert_eq!(
            fs::read_to_string(project.join("src/ui/theme.ts")).unwrap(),
            "theme"
        );
        assert_eq!(ws.load_managed(), vec!["App.tsx", "src/ui/theme.ts"]);
    }

    #[test]
    fn test_new_mode_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "app");
        let output = output_with(vec![("App.tsx", "body")], vec!["App.tsx"]);

        apply_generation(&ws, &output, Mode::New).unwrap();
        apply_generation(&ws, &output, Mode::New).unwrap();

        assert_eq!(
            fs::read_to_string(ws.project_path().join("App.tsx")).unwrap(),
            "body"
        );
        assert_eq!(ws.load_managed(), vec!["App.tsx"]);
    }

    #[test]
    fn test_iterate_only_overwrites_managed() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "app");
        let project = ws.project_path();
        fs::create_dir_all(&project).unwrap();
        fs::write(project.join("App.tsx"), "old").unwrap();
        fs::write(project.join("Extra.tsx"), "keep").unwrap();

        let output = output_with(
            vec![("App.tsx", "new-content"), ("Extra.tsx", "overwrite")],
            vec!["App.tsx"],
        );

        apply_generation(&ws, &output, Mode::Iterate).unwrap();

        assert_eq!(
            fs::read_to_string(project.join("App.tsx")).unwrap(),
            "new-content"
        );
        assert_eq!(fs::read_to_string(project.join("Extra.tsx")).unwrap(), "keep");
    }

    #[test]
    fn test_iterate_writes_files_not_yet_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "app");

        let output = output_with(vec![("Fresh.tsx", "hello")], vec![]);
        apply_generation(&ws, &output, Mode::Iterate).unwrap();

        assert_eq!(
            fs::read_to_string(ws.project_path().join("Fresh.tsx")).unwrap(),
            "hello"
        );
    }

    #[test]
    fn test_registry_grows_as_a_union() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "app");
        ws.save_managed(&["Old.tsx".to_string()]).unwrap();

        let output = output_with(vec![("New.tsx", "x")], vec!["New.tsx"]);
        apply_generation(&ws, &output, Mode::Iterate).unwrap();

        assert_eq!(ws.load_managed(), vec!["New.tsx", "Old.tsx"]);
    }

    #[test]
    fn test_marker_readme_created_once() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "app");

        ensure_generated_readme(&ws).unwrap();
        let marker = ws.project_path().join("GENERATED.md");
        assert!(marker.exists());

        fs::write(&marker, "user edited").unwrap();
        ensure_generated_readme(&ws).unwrap();
        assert_eq!(fs::read_to_string(&marker).unwrap(), "user edited");
    }

    #[test]
    fn test_paths_are_normalized_before_matching() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path(), "app");
        let project = ws.project_path();
        fs::create_dir_all(&project).unwrap();
        fs::write(project.join("App.tsx"), "old").unwrap();

        // Managed declared with a leading slash still matches the file path.
        let output = output_with(vec![("App.tsx", "new")], vec!["/App.tsx"]);
        apply_generation(&ws, &output, Mode::Iterate).unwrap();
        assert_eq!(fs::read_to_string(project.join("App.tsx")).unwrap(), "new");
    }
}
