//! `devx project update`: install every package declared in the manifest.
//!
//! Packages are processed in manifest order, one at a time. The first error
//! from any package stops the run.

use crate::deps::coordinate::{Coordinate, ParseError};
use crate::deps::credentials::{self, Credentials};
use crate::deps::fetch::{FetchError, Fetcher, GitTransport, Transport, short_hash};
use crate::deps::sync::{self, SyncError};
use crate::manifest::{MODULE_DIR, Manifest, ManifestError};
use colored::*;
use git2::Oid;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("invalid manifest")]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("failed to fetch {package}")]
    Fetch {
        package: String,
        #[source]
        source: FetchError,
    },

    #[error("failed to install {package}")]
    Sync {
        package: String,
        #[source]
        source: SyncError,
    },
}

impl UpdateError {
    pub fn is_credentials_required(&self) -> bool {
        matches!(self, UpdateError::Fetch { source, .. } if source.is_credentials_required())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageUpdate {
    pub declaration: String,
    pub commit: Oid,
    pub destination: PathBuf,
    pub files: usize,
}

#[derive(Debug, Default)]
pub struct UpdateSummary {
    pub packages: Vec<PackageUpdate>,
}

/// Update all packages of the project in `project_dir`, with credentials
/// taken from the environment.
pub fn update(project_dir: &Path) -> Result<UpdateSummary, UpdateError> {
    Updater::new(Fetcher::default(), credentials::resolve()).run(project_dir)
}

pub struct Updater<T = GitTransport> {
    fetcher: Fetcher<T>,
    credentials: Option<Credentials>,
}

impl<T: Transport> Updater<T> {
    pub fn new(fetcher: Fetcher<T>, credentials: Option<Credentials>) -> Self {
        Self {
            fetcher,
            credentials,
        }
    }

    pub fn fetcher(&self) -> &Fetcher<T> {
        &self.fetcher
    }

    pub fn run(&self, project_dir: &Path) -> Result<UpdateSummary, UpdateError> {
        let manifest = Manifest::load(project_dir)?;
        let cache_root = project_dir.join(MODULE_DIR);

        if manifest.packages.is_empty() {
            println!(
                "{} No packages declared in {}",
                "!".yellow(),
                Manifest::path(project_dir).display()
            );
            return Ok(UpdateSummary::default());
        }
        println!(
            "{} Updating {} packages...",
            "📦".blue(),
            manifest.packages.len()
        );

        let mut summary = UpdateSummary::default();
        for declaration in &manifest.packages {
            let coord = Coordinate::parse(declaration)?;
            let update = self.update_package(declaration, &coord, &cache_root)?;
            summary.packages.push(update);
        }

        println!("{} Packages updated.", "✓".green());
        Ok(summary)
    }

    fn update_package(
        &self,
        declaration: &str,
        coord: &Coordinate,
        cache_root: &Path,
    ) -> Result<PackageUpdate, UpdateError> {
        let pb = spinner(format!("Fetching {}...", declaration));
        let fetched = self.fetcher.fetch(coord, self.credentials.as_ref());
        pb.finish_and_clear();

        let snapshot = fetched.map_err(|source| UpdateError::Fetch {
            package: declaration.to_string(),
            source,
        })?;
        let commit = snapshot.commit_id();
        println!("Downloading {} @ {}", declaration, commit);

        let report = sync::sync(&snapshot, &coord.subpath(), cache_root).map_err(|source| {
            UpdateError::Sync {
                package: declaration.to_string(),
                source,
            }
        })?;

        if let Err(err) = snapshot.close() {
            warn!(error = %err, "failed to remove fetched working tree");
        }

        info!(package = declaration, %commit, files = report.files, "package installed");
        println!(
            "   {} {} ({} files, {})",
            "✓".green(),
            coord.subpath,
            report.files,
            short_hash(commit).dimmed()
        );

        Ok(PackageUpdate {
            declaration: declaration.to_string(),
            commit,
            destination: report.destination,
            files: report.files,
        })
    }
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::with_draw_target(None, ProgressDrawTarget::stdout());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⣾⣽⣻⢿⡿⣟⣯⣷ "),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
