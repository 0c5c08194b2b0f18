//! Shared fixtures: local git repositories standing in for remote hosts.

#![allow(dead_code)]

use devx::deps::{CloneError, Credentials, GitTransport, Transport};
use devx::manifest::quote;
use git2::{Oid, Repository, RepositoryInitOptions, Signature};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use walkdir::WalkDir;

/// A local repository with helpers to commit file sets and tag them.
pub struct FixtureRepo {
    dir: TempDir,
    repo: Repository,
}

impl FixtureRepo {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(dir.path(), &opts).unwrap();
        Self { dir, repo }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Commit exactly `files` as the whole tree on top of HEAD.
    pub fn commit(&self, files: &[(&str, &str)], message: &str) -> Oid {
        let mut index = self.repo.index().unwrap();
        index.clear().unwrap();
        self.commit_staged(&mut index, files, message)
    }

    fn commit_staged(
        &self,
        index: &mut git2::Index,
        files: &[(&str, &str)],
        message: &str,
    ) -> Oid {
        for (rel, content) in files {
            let path = self.path().join(rel);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            index.add_path(Path::new(rel)).unwrap();
        }
        index.write().unwrap();
        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("devx", "devx@example.com").unwrap();
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
    }

    /// Commit `files` plus a symlink at `link` pointing to `target`.
    #[cfg(unix)]
    pub fn commit_with_symlink(
        &self,
        files: &[(&str, &str)],
        link: &str,
        target: &Path,
        message: &str,
    ) -> Oid {
        let path = self.path().join(link);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::os::unix::fs::symlink(target, &path).unwrap();
        let mut index = self.repo.index().unwrap();
        index.clear().unwrap();
        index.add_path(Path::new(link)).unwrap();
        index.write().unwrap();
        self.commit_staged(&mut index, files, message)
    }

    pub fn tag(&self, name: &str, commit: Oid) {
        let object = self.repo.find_object(commit, None).unwrap();
        self.repo.tag_lightweight(name, &object, false).unwrap();
    }
}

/// Serves `https://<host>/<org>/<repo>` URLs from local fixture repositories.
///
/// Repositories marked private refuse anonymous clones.
#[derive(Default)]
pub struct MirrorTransport {
    mirrors: HashMap<String, PathBuf>,
    private: HashSet<String>,
    calls: RefCell<Vec<(String, Option<Credentials>)>>,
}

impl MirrorTransport {
    pub fn public(mut self, url: &str, repo: &FixtureRepo) -> Self {
        self.mirrors.insert(url.to_string(), repo.path().to_path_buf());
        self
    }

    pub fn private(mut self, url: &str, repo: &FixtureRepo) -> Self {
        self.private.insert(url.to_string());
        self.public(url, repo)
    }

    pub fn calls(&self) -> Vec<(String, Option<Credentials>)> {
        self.calls.borrow().clone()
    }
}

impl Transport for MirrorTransport {
    fn clone_repo(
        &self,
        url: &str,
        dest: &Path,
        credentials: Option<&Credentials>,
        _depth: Option<u32>,
    ) -> Result<git2::Repository, CloneError> {
        self.calls
            .borrow_mut()
            .push((url.to_string(), credentials.cloned()));
        if self.private.contains(url) && credentials.is_none() {
            return Err(CloneError::AuthenticationRequired);
        }
        let Some(source) = self.mirrors.get(url) else {
            return Err(git2::Error::from_str("repository not found").into());
        };
        GitTransport.clone_repo(&source.to_string_lossy(), dest, None, None)
    }
}

/// A project directory whose manifest declares `packages`.
pub fn project(packages: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    write_manifest(dir.path(), packages);
    dir
}

pub fn write_manifest(project_dir: &Path, packages: &[&str]) {
    let mut src = format!("module: {}\npackages: [\n", quote("guku.io/test"));
    for pkg in packages {
        src.push_str(&format!("\t{},\n", quote(pkg)));
    }
    src.push_str("]\n");
    fs::create_dir_all(project_dir.join("cue.mod")).unwrap();
    fs::write(project_dir.join("cue.mod/module.cue"), src).unwrap();
}

/// Every regular file under `root`, keyed by its relative path.
pub fn files_under(root: &Path) -> BTreeMap<String, String> {
    WalkDir::new(root)
        .into_iter()
        .map(|e| e.unwrap())
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(root).unwrap();
            let rel = rel.to_string_lossy().replace('\\', "/");
            (rel, fs::read_to_string(e.path()).unwrap())
        })
        .collect()
}
