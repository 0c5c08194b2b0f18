//! # devx CLI Entry Point
//!
//! Parses arguments with clap and routes `project` subcommands to the library.

use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use colored::*;
use inquire::Text;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};

use devx::cache;
use devx::deps::{self, FetchOptions, Fetcher, GitTransport, Updater, credentials};
use devx::logging;
use devx::project;

#[derive(Parser)]
#[command(name = "devx")]
#[command(about = "Package manager for CUE stack projects", version = env!("CARGO_PKG_VERSION"))]
#[command(propagate_version = true)]
struct Cli {
    /// Project directory containing cue.mod/
    #[arg(short = 'c', long, global = true, default_value = ".")]
    config_dir: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the project module and its packages
    Project {
        #[command(subcommand)]
        op: ProjectOp,
    },
    /// Generate shell completion scripts
    Completion { shell: Shell },
}

#[derive(Subcommand)]
enum ProjectOp {
    /// Create cue.mod/ with a default module.cue
    Init {
        /// Module name written to module.cue
        #[arg(long)]
        module: Option<String>,
    },
    /// Fetch and install every package declared in module.cue
    Update {
        /// Clone full history (needed for short hashes off branch tips)
        #[arg(long)]
        full: bool,
    },
    /// Write starter stack.cue and builder.cue files
    Gen,
    /// List installed packages
    Packages,
    /// Remove all installed packages
    Clean,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match cli.command {
        Some(Commands::Project { op }) => run_project(op, &cli.config_dir),
        Some(Commands::Completion { shell }) => {
            let mut cmd = Cli::command();
            let bin_name = cmd.get_name().to_string();
            generate(shell, &mut cmd, bin_name, &mut std::io::stdout());
            Ok(())
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

fn run_project(op: ProjectOp, dir: &Path) -> Result<()> {
    match op {
        ProjectOp::Init { module } => init_project(dir, module),
        ProjectOp::Update { full } => update_project(dir, full),
        ProjectOp::Gen => gen_project(dir),
        ProjectOp::Packages => cache::list(dir),
        ProjectOp::Clean => cache::clean(dir),
    }
}

fn init_project(dir: &Path, module: Option<String>) -> Result<()> {
    let module = match module {
        Some(module) => module,
        None if std::io::stdin().is_terminal() => {
            let dir_name = std::path::absolute(dir)?
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Text::new("Module name?").with_default(&dir_name).prompt()?
        }
        None => String::new(),
    };

    let outcome = project::init(dir, &module)
        .with_context(|| format!("Failed to initialize {}", dir.display()))?;

    if outcome.manifest_created {
        println!(
            "{} Initialized {}. Run {} to fetch packages.",
            "✓".green(),
            outcome.module_dir.display(),
            "devx project update".bold()
        );
    } else {
        println!(
            "{} {} already has a module.cue; left unchanged.",
            "!".yellow(),
            outcome.module_dir.display()
        );
    }
    Ok(())
}

fn update_project(dir: &Path, full: bool) -> Result<()> {
    let summary = if full {
        let fetcher = Fetcher::new(GitTransport, FetchOptions { depth: None });
        Updater::new(fetcher, credentials::resolve()).run(dir)
    } else {
        deps::update(dir)
    };

    match summary {
        Ok(_) => Ok(()),
        Err(err) => {
            if err.is_credentials_required() {
                println!(
                    "{} Set {} (and optionally {}) for private repositories.",
                    "!".yellow(),
                    credentials::PASSWORD_VAR,
                    credentials::USERNAME_VAR
                );
            }
            Err(err).context("Update failed")
        }
    }
}

fn gen_project(dir: &Path) -> Result<()> {
    for (path, written) in project::generate(dir)? {
        if written {
            println!("{} Created {}", "✓".green(), path.display());
        } else {
            println!("{} Skipped {} (already exists)", "!".yellow(), path.display());
        }
    }
    Ok(())
}
