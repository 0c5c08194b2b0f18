//! The project's package cache under `cue.mod/pkg`.
//!
//! ## Commands
//!
//! - `devx project packages` - List installed package directories
//! - `devx project clean` - Remove every installed package

use crate::manifest::MODULE_DIR;
use crate::project::PACKAGE_DIR;
use crate::ui;
use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// A directory under `cue.mod` that directly contains files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstalledPackage {
    /// Relative to `cue.mod`, e.g. `pkg/guku.io`.
    pub path: PathBuf,
    pub files: usize,
}

pub fn cache_dir(project_dir: &Path) -> PathBuf {
    project_dir.join(MODULE_DIR).join(PACKAGE_DIR)
}

/// Installed package directories, sorted by path.
pub fn installed(project_dir: &Path) -> Result<Vec<InstalledPackage>> {
    let module_dir = project_dir.join(MODULE_DIR);
    let cache = cache_dir(project_dir);
    if !cache.is_dir() {
        return Ok(Vec::new());
    }

    let mut packages = Vec::new();
    for entry in WalkDir::new(&cache).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to read {}", cache.display()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let files = fs::read_dir(entry.path())
            .with_context(|| format!("Failed to read {}", entry.path().display()))?
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_ok_and(|ft| ft.is_file()))
            .count();
        if files > 0 {
            let path = entry
                .path()
                .strip_prefix(&module_dir)
                .unwrap_or(entry.path())
                .to_path_buf();
            packages.push(InstalledPackage { path, files });
        }
    }
    Ok(packages)
}

pub fn list(project_dir: &Path) -> Result<()> {
    let packages = installed(project_dir)?;
    if packages.is_empty() {
        println!(
            "{} No packages installed. Run `devx project update`.",
            "ℹ".blue()
        );
        return Ok(());
    }

    let mut table = ui::Table::new(&["Package", "Files"]);
    for pkg in &packages {
        table.add_row(vec![pkg.path.display().to_string(), pkg.files.to_string()]);
    }
    table.print();
    Ok(())
}

/// Remove `cue.mod/pkg` and recreate it empty.
pub fn clean(project_dir: &Path) -> Result<()> {
    let cache = cache_dir(project_dir);

    if cache.exists() {
        println!("{} Cleaning {}...", "🧹".yellow(), cache.display());
        fs::remove_dir_all(&cache)
            .with_context(|| format!("Failed to remove {}", cache.display()))?;
        fs::create_dir_all(&cache)
            .with_context(|| format!("Failed to create {}", cache.display()))?;
        println!("{} Package cache cleaned.", "✓".green());
    } else {
        println!("{} Package cache already empty.", "✓".green());
    }
    Ok(())
}
