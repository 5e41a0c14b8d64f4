use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod cli;

#[derive(Parser)]
#[command(name = "appforge")]
#[command(about = "Generate and iterate on Expo app scaffolds from a README spec", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Enable verbose debug output")]
    verbose: bool,

    #[arg(long, global = true, help = "Skip bootstrap and file writes")]
    dry_run: bool,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Check system dependencies")]
    Doctor {
        #[arg(long, help = "Skip the Expo CLI check")]
        no_expo: bool,
    },

    #[command(about = "Create a new Expo app from the README spec")]
    New {
        #[arg(long, help = "Workspace root containing README.md")]
        workspace: PathBuf,

        #[arg(long, default_value = "openai")]
        provider: String,

        #[arg(long, default_value = "gpt-4o-mini")]
        model: String,

        #[arg(long, default_value = "app")]
        project_dir: String,

        #[arg(long, help = "Pass --no-install to create-expo-app")]
        no_install: bool,
    },

    #[command(about = "Regenerate managed files in an existing app from the README spec")]
    Iterate {
        #[arg(long, help = "Workspace root containing README.md")]
        workspace: PathBuf,

        #[arg(long, default_value = "openai")]
        provider: String,

        #[arg(long, default_value = "gpt-4o-mini")]
        model: String,

        #[arg(long, default_value = "app")]
        project_dir: String,
    },

    #[command(about = "Run the Expo web preview")]
    Run {
        #[arg(long, help = "Workspace root containing README.md")]
        workspace: PathBuf,

        #[arg(long, default_value = "app")]
        project_dir: String,

        #[arg(long)]
        port: Option<u16>,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = cli::Config {
        verbose: cli.verbose,
        dry_run: cli.dry_run,
    };

    match cli.command {
        Commands::Doctor { no_expo } => {
            let code = cli::run_doctor(!no_expo);
            std::process::exit(code);
        }
        Commands::New {
            workspace,
            provider,
            model,
            project_dir,
            no_install,
        } => {
            cli::new_app(
                cli::GenerateArgs {
                    workspace,
                    provider,
                    model,
                    project_dir,
                },
                no_install,
                &config,
            )?;
        }
        Commands::Iterate {
            workspace,
            provider,
            model,
            project_dir,
        } => {
            cli::iterate_app(
                cli::GenerateArgs {
                    workspace,
                    provider,
                    model,
                    project_dir,
                },
                &config,
            )?;
        }
        Commands::Run {
            workspace,
            project_dir,
            port,
        } => {
            cli::run_preview(workspace, project_dir, port, &config)?;
        }
    }

    Ok(())
}
