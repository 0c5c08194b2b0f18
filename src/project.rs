//! Project scaffolding: the `cue.mod` module layout and starter stack files.

use crate::manifest::{MODULE_DIR, MODULE_FILE};
use crate::templates;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// Directory under `cue.mod` holding fetched packages.
pub const PACKAGE_DIR: &str = "pkg";

#[derive(Debug, Error)]
pub enum InitError {
    #[error("failed to resolve project directory {path}")]
    Resolve {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create {path}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitOutcome {
    pub module_dir: PathBuf,
    pub manifest_created: bool,
}

/// Create `cue.mod/`, a default `cue.mod/module.cue` and `cue.mod/pkg/`.
///
/// Safe to run repeatedly: an existing manifest is never touched.
pub fn init(project_dir: &Path, module: &str) -> Result<InitOutcome, InitError> {
    let project_dir = std::path::absolute(project_dir).map_err(|source| InitError::Resolve {
        path: project_dir.to_path_buf(),
        source,
    })?;

    let module_dir = project_dir.join(MODULE_DIR);
    create_dir(&module_dir)?;

    let manifest = module_dir.join(MODULE_FILE);
    let manifest_created = write_new(&manifest, &templates::module_manifest(module))?;
    if manifest_created {
        debug!(path = %manifest.display(), "wrote manifest");
    }

    create_dir(&module_dir.join(PACKAGE_DIR))?;

    Ok(InitOutcome {
        module_dir,
        manifest_created,
    })
}

/// Write `stack.cue` and `builder.cue` into the project directory.
///
/// Returns each file with whether it was written; existing files are kept.
pub fn generate(project_dir: &Path) -> Result<Vec<(PathBuf, bool)>, InitError> {
    create_dir(project_dir)?;
    templates::stack_files()
        .into_iter()
        .map(|(name, contents)| {
            let path = project_dir.join(name);
            let written = write_new(&path, contents)?;
            Ok((path, written))
        })
        .collect()
}

fn create_dir(path: &Path) -> Result<(), InitError> {
    fs::create_dir_all(path).map_err(|source| InitError::CreateDir {
        path: path.to_path_buf(),
        source,
    })
}

/// Create `path` with `contents` unless it already exists.
fn write_new(path: &Path, contents: &str) -> Result<bool, InitError> {
    let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(source) => {
            return Err(InitError::Write {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    file.write_all(contents.as_bytes()).map_err(|source| InitError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(true)
}
