//! Module cache synchronization.
//!
//! Copies a package's subtree from a fetched snapshot into
//! `<config-dir>/cue.mod/<subpath>`. The new tree is staged in a sibling
//! directory and swapped in with a rename once every file is written, so the
//! cache holds either the previous complete tree or the new one.

use crate::deps::fetch::Snapshot;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

#[cfg(unix)]
const DIR_MODE: u32 = 0o755;
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("'{0}' does not exist at the fetched revision")]
    MissingSubpath(PathBuf),

    #[error("'{0}' is a symbolic link in the fetched revision")]
    SymlinkedSubpath(PathBuf),

    #[error("failed to read {path}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to create directory {path}")]
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

    #[error("failed to replace {path}")]
    Replace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub destination: PathBuf,
    pub files: usize,
}

/// Replace `cache_root/subpath` with the snapshot's `subpath`.
pub fn sync(
    snapshot: &Snapshot,
    subpath: &Path,
    cache_root: &Path,
) -> Result<SyncReport, SyncError> {
    sync_tree(snapshot.path(), subpath, cache_root)
}

/// Replace `cache_root/subpath` with `worktree/subpath`.
pub fn sync_tree(
    worktree: &Path,
    subpath: &Path,
    cache_root: &Path,
) -> Result<SyncReport, SyncError> {
    let source = source_dir(worktree, subpath)?;

    let destination = cache_root.join(subpath);
    let parent = destination
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| cache_root.to_path_buf());
    create_dir(&parent).map_err(|source| SyncError::CreateDir {
        path: parent.clone(),
        source,
    })?;

    // Staged beside the destination: the swap is a same-filesystem rename.
    let staging = stage_dir(&parent, ".devx-stage-")?;
    let files = copy_tree(&source, staging.path())?;

    replace_dir(staging.path(), &destination, &parent)?;
    debug!(destination = %destination.display(), files, "synced package");

    Ok(SyncReport { destination, files })
}

/// `worktree/subpath`, provided it is a real directory inside the worktree.
///
/// Every component is checked without following links, so a package path that
/// is (or passes through) a symlink is rejected.
fn source_dir(worktree: &Path, subpath: &Path) -> Result<PathBuf, SyncError> {
    let missing = || SyncError::MissingSubpath(subpath.to_path_buf());
    let mut current = worktree.to_path_buf();
    let mut rel = PathBuf::new();
    for component in subpath.components() {
        current.push(component);
        rel.push(component);
        let meta = match fs::symlink_metadata(&current) {
            Ok(meta) => meta,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(missing()),
            Err(source) => {
                return Err(SyncError::Read {
                    path: current,
                    source,
                });
            }
        };
        if meta.file_type().is_symlink() {
            return Err(SyncError::SymlinkedSubpath(rel));
        }
        if !meta.is_dir() {
            return Err(missing());
        }
    }
    Ok(current)
}

fn stage_dir(parent: &Path, prefix: &str) -> Result<TempDir, SyncError> {
    let dir = tempfile::Builder::new()
        .prefix(prefix)
        .tempdir_in(parent)
        .map_err(|source| SyncError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(dir.path(), fs::Permissions::from_mode(DIR_MODE)).map_err(
            |source| SyncError::CreateDir {
                path: dir.path().to_path_buf(),
                source,
            },
        )?;
    }

    Ok(dir)
}

fn copy_tree(source: &Path, target: &Path) -> Result<usize, SyncError> {
    let mut files = 0;
    let walker = WalkDir::new(source)
        .min_depth(1)
        .follow_links(false)
        .follow_root_links(false)
        .into_iter()
        .filter_entry(|e| e.file_name() != ".git");

    for entry in walker {
        let entry = entry.map_err(|source_err| SyncError::Walk {
            path: source.to_path_buf(),
            source: source_err,
        })?;
        let Ok(rel) = entry.path().strip_prefix(source) else {
            continue;
        };
        let out = target.join(rel);
        let ty = entry.file_type();

        if ty.is_dir() {
            create_dir(&out).map_err(|e| SyncError::CreateDir {
                path: out.clone(),
                source: e,
            })?;
        } else if ty.is_file() {
            let contents = fs::read(entry.path()).map_err(|e| SyncError::Read {
                path: entry.path().to_path_buf(),
                source: e,
            })?;
            if let Some(dir) = out.parent() {
                create_dir(dir).map_err(|e| SyncError::CreateDir {
                    path: dir.to_path_buf(),
                    source: e,
                })?;
            }
            write_file(&out, &contents).map_err(|e| SyncError::Write {
                path: out.clone(),
                source: e,
            })?;
            files += 1;
        } else {
            warn!(path = %entry.path().display(), "skipping symlink in package");
        }
    }

    Ok(files)
}

/// Swap `staged` into `destination`, restoring the old tree if the swap fails.
fn replace_dir(staged: &Path, destination: &Path, parent: &Path) -> Result<(), SyncError> {
    let replace_failed = |source: io::Error| SyncError::Replace {
        path: destination.to_path_buf(),
        source,
    };

    if !destination.exists() {
        return fs::rename(staged, destination).map_err(replace_failed);
    }

    // Dropping `backup` deletes the previous tree.
    let backup = stage_dir(parent, ".devx-old-")?;
    let old = backup.path().join("tree");
    fs::rename(destination, &old).map_err(replace_failed)?;

    if let Err(err) = fs::rename(staged, destination) {
        if let Err(restore) = fs::rename(&old, destination) {
            warn!(path = %destination.display(), error = %restore, "could not restore previous package tree");
        }
        return Err(replace_failed(err));
    }

    Ok(())
}

fn create_dir(path: &Path) -> io::Result<()> {
    let mut builder = fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::DirBuilderExt;
        builder.mode(DIR_MODE);
    }
    builder.create(path)
}

fn write_file(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(FILE_MODE);
    }
    options.open(path)?.write_all(contents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn listing(root: &Path) -> Vec<(String, String)> {
        let mut out: Vec<(String, String)> = WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| {
                let rel = e.path().strip_prefix(root).unwrap();
                let rel = rel.to_string_lossy().replace('\\', "/");
                (rel, fs::read_to_string(e.path()).unwrap())
            })
            .collect();
        out.sort();
        out
    }

    #[test]
    fn test_sync_copies_subtree_only() {
        let worktree = TempDir::new().unwrap();
        let cache = TempDir::new().unwrap();
        write(worktree.path(), "pkg/widgets/a.cue", "a: 1");
        write(worktree.path(), "pkg/widgets/nested/b.cue", "b: 2");
        write(worktree.path(), "pkg/other/c.cue", "c: 3");
        write(worktree.path(), "README.md", "readme");

        let report = sync_tree(worktree.path(), Path::new("pkg/widgets"), cache.path()).unwrap();

        assert_eq!(report.files, 2);
        assert_eq!(report.destination, cache.path().join("pkg/widgets"));
        assert_eq!(
            listing(cache.path()),
            vec![
                ("pkg/widgets/a.cue".to_string(), "a: 1".to_string()),
                ("pkg/widgets/nested/b.cue".to_string(), "b: 2".to_string()),
            ]
        );
    }

    #[test]
    fn test_sync_removes_stale_files() {
        let cache = TempDir::new().unwrap();

        let old = TempDir::new().unwrap();
        write(old.path(), "pkg/widgets/a.cue", "a: 1");
        write(old.path(), "pkg/widgets/removed.cue", "gone: true");
        sync_tree(old.path(), Path::new("pkg/widgets"), cache.path()).unwrap();

        let new = TempDir::new().unwrap();
        write(new.path(), "pkg/widgets/a.cue", "a: 2");
        sync_tree(new.path(), Path::new("pkg/widgets"), cache.path()).unwrap();

        assert_eq!(
            listing(cache.path()),
            vec![("pkg/widgets/a.cue".to_string(), "a: 2".to_string())]
        );
    }

    #[test]
    fn test_sync_is_idempotent() {
        let worktree = TempDir::new().unwrap();
        write(worktree.path(), "pkg/widgets/a.cue", "a: 1");
        write(worktree.path(), "pkg/widgets/x/y.cue", "y: 1");

        let cache = TempDir::new().unwrap();
        sync_tree(worktree.path(), Path::new("pkg/widgets"), cache.path()).unwrap();
        let once = listing(cache.path());
        sync_tree(worktree.path(), Path::new("pkg/widgets"), cache.path()).unwrap();
        assert_eq!(listing(cache.path()), once);
    }

    #[test]
    fn test_sync_leaves_siblings_and_no_staging_dirs() {
        let cache = TempDir::new().unwrap();
        write(cache.path(), "pkg/other/keep.cue", "keep: true");
        write(cache.path(), "module.cue", "module: \"x\"");

        let worktree = TempDir::new().unwrap();
        write(worktree.path(), "pkg/widgets/a.cue", "a: 1");
        sync_tree(worktree.path(), Path::new("pkg/widgets"), cache.path()).unwrap();
        sync_tree(worktree.path(), Path::new("pkg/widgets"), cache.path()).unwrap();

        let names: Vec<String> = fs::read_dir(cache.path().join("pkg"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert!(names.iter().all(|n| !n.starts_with(".devx-")), "{names:?}");
        assert!(cache.path().join("pkg/other/keep.cue").exists());
        assert!(cache.path().join("module.cue").exists());
    }

    #[test]
    fn test_missing_subpath_leaves_cache_untouched() {
        let cache = TempDir::new().unwrap();
        write(cache.path(), "pkg/widgets/a.cue", "a: 1");

        let worktree = TempDir::new().unwrap();
        write(worktree.path(), "pkg/elsewhere/a.cue", "a: 2");

        let err = sync_tree(worktree.path(), Path::new("pkg/widgets"), cache.path()).unwrap_err();
        assert!(matches!(err, SyncError::MissingSubpath(_)));
        assert_eq!(
            listing(cache.path()),
            vec![("pkg/widgets/a.cue".to_string(), "a: 1".to_string())]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_subpath_is_rejected() {
        use std::os::unix::fs::symlink;

        let host = TempDir::new().unwrap();
        write(host.path(), "id_rsa", "secret");

        let worktree = TempDir::new().unwrap();
        fs::create_dir_all(worktree.path().join("pkg")).unwrap();
        symlink(host.path(), worktree.path().join("pkg/widgets")).unwrap();

        let cache = TempDir::new().unwrap();
        let err = sync_tree(worktree.path(), Path::new("pkg/widgets"), cache.path()).unwrap_err();
        assert!(matches!(err, SyncError::SymlinkedSubpath(p) if p == Path::new("pkg/widgets")));
        assert!(listing(cache.path()).is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinked_ancestor_is_rejected() {
        use std::os::unix::fs::symlink;

        let host = TempDir::new().unwrap();
        write(host.path(), "widgets/id_rsa", "secret");

        let worktree = TempDir::new().unwrap();
        symlink(host.path(), worktree.path().join("pkg")).unwrap();

        let cache = TempDir::new().unwrap();
        let err = sync_tree(worktree.path(), Path::new("pkg/widgets"), cache.path()).unwrap_err();
        assert!(matches!(err, SyncError::SymlinkedSubpath(p) if p == Path::new("pkg")));
        assert!(listing(cache.path()).is_empty());
    }

    #[test]
    fn test_file_at_subpath_is_missing() {
        let worktree = TempDir::new().unwrap();
        write(worktree.path(), "pkg/widgets", "not a dir");

        let cache = TempDir::new().unwrap();
        let err = sync_tree(worktree.path(), Path::new("pkg/widgets"), cache.path()).unwrap_err();
        assert!(matches!(err, SyncError::MissingSubpath(_)));
    }

    #[test]
    fn test_git_dir_is_never_copied() {
        let worktree = TempDir::new().unwrap();
        write(worktree.path(), "pkg/.git/HEAD", "ref: refs/heads/main");
        write(worktree.path(), "pkg/a.cue", "a: 1");

        let cache = TempDir::new().unwrap();
        sync_tree(worktree.path(), Path::new("pkg"), cache.path()).unwrap();
        assert_eq!(
            listing(cache.path()),
            vec![("pkg/a.cue".to_string(), "a: 1".to_string())]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_written_files_are_not_executable() {
        use std::os::unix::fs::PermissionsExt;

        let worktree = TempDir::new().unwrap();
        write(worktree.path(), "pkg/widgets/a.cue", "a: 1");
        let cache = TempDir::new().unwrap();
        sync_tree(worktree.path(), Path::new("pkg/widgets"), cache.path()).unwrap();

        let file_mode = fs::metadata(cache.path().join("pkg/widgets/a.cue"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(file_mode & 0o111, 0);
        let dir_mode = fs::metadata(cache.path().join("pkg/widgets"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(dir_mode & 0o700, 0o700);
    }
}
