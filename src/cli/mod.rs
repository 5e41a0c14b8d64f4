use anyhow::{bail, Result};
use std::path::PathBuf;

mod doctor;
mod runner;

pub use doctor::run_doctor;

use appforge::generator::{self, Mode};
use appforge::llm::{LlmProvider, OpenAiProvider};
use appforge::patcher;
use appforge::workspace::Workspace;

#[derive(Clone, Copy)]
pub struct Config {
    pub verbose: bool,
    pub dry_run: bool,
}

/// Shared options for the generation commands.
pub struct GenerateArgs {
    pub workspace: PathBuf,
    pub provider: String,
    pub model: String,
    pub project_dir: String,
}

pub fn new_app(args: GenerateArgs, no_install: bool, config: &Config) -> Result<()> {
    let ws = Workspace::new(args.workspace, args.project_dir);
    let spec = ws.read_spec()?;
    ws.save_spec_snapshot(&spec)?;

    let llm = resolve_provider(&args.provider)?;

    if config.dry_run {
        println!("Dry run: skipping Expo bootstrap");
    } else {
        println!("Bootstrapping Expo app...");
        runner::bootstrap_expo(&ws.root, &ws.project_dir, no_install)?;
    }

    println!("Generating app code...");
    let result = generator::generate(
        &ws,
        llm.as_ref(),
        &args.model,
        Mode::New,
        generator::DEFAULT_TEMPERATURE,
    )?;
    report_result(&result, config);

    if config.dry_run {
        println!("Dry run: not writing generated files");
        return Ok(());
    }

    patcher::apply_generation(&ws, &result.output, Mode::New)?;
    patcher::ensure_generated_readme(&ws)?;
    println!("✓ Generation complete");
    Ok(())
}

pub fn iterate_app(args: GenerateArgs, config: &Config) -> Result<()> {
    let ws = Workspace::new(args.workspace, args.project_dir);
    let spec = ws.read_spec()?;
    ws.save_spec_snapshot(&spec)?;

    let llm = resolve_provider(&args.provider)?;

    println!("Regenerating managed files...");
    let result = generator::generate(
        &ws,
        llm.as_ref(),
        &args.model,
        Mode::Iterate,
        generator::DEFAULT_TEMPERATURE,
    )?;
    report_result(&result, config);

    if config.dry_run {
        println!("Dry run: not writing generated files");
        return Ok(());
    }

    patcher::apply_generation(&ws, &result.output, Mode::Iterate)?;
    patcher::ensure_generated_readme(&ws)?;
    println!("✓ Iteration complete");
    Ok(())
}

pub fn run_preview(
    workspace: PathBuf,
    project_dir: String,
    port: Option<u16>,
    _config: &Config,
) -> Result<()> {
    let ws = Workspace::new(workspace, project_dir);
    if !ws.project_path().exists() {
        bail!("project directory not found; run `appforge new` first");
    }

    println!("Starting Expo web preview...");
    match runner::run_expo_web(&ws.project_path(), port)? {
        Some(url) => println!("✓ Preview URL: {url}"),
        None => println!("Could not detect a preview URL; check the Expo output above"),
    }
    Ok(())
}

fn resolve_provider(name: &str) -> Result<Box<dyn LlmProvider>> {
    match name {
        "openai" => Ok(Box::new(OpenAiProvider::from_env()?)),
        other => bail!("unknown provider '{other}'; only 'openai' is supported"),
    }
}

fn report_result(result: &generator::GenerationResult, config: &Config) {
    if config.verbose {
        println!(
            "Model returned {} file(s), {} managed path(s)",
            result.output.files.len(),
            result.output.managed_paths.len()
        );
        if let Some(notes) = &result.output.notes {
            println!("Model notes: {notes}");
        }
    }
}
