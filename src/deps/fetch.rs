//! Remote package fetching.
//!
//! A package is fetched by cloning its repository into a throwaway working
//! tree, resolving the pinned revision to a commit and checking it out. The
//! result is a [`Snapshot`] that owns the working tree and removes it from disk
//! when dropped.
//!
//! ## Authentication
//!
//! The first clone is always anonymous. When the remote asks for credentials
//! the clone is retried exactly once with basic auth, into a fresh working
//! tree. Whether a failure means "authentication required" is decided by the
//! [`Transport`], which reports it as [`CloneError::AuthenticationRequired`].

use crate::deps::coordinate::Coordinate;
use crate::deps::credentials::Credentials;
use git2::build::{CheckoutBuilder, RepoBuilder};
use git2::{
    AutotagOption, CredentialType, Cred, ErrorClass, ErrorCode, Oid, ProxyOptions,
    RemoteCallbacks, Repository,
};
use std::cell::Cell;
use std::io;
use std::path::Path;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{debug, instrument};

/// Outcome of a single clone attempt that did not produce a repository.
#[derive(Debug, Error)]
pub enum CloneError {
    #[error("authentication required")]
    AuthenticationRequired,

    #[error(transparent)]
    Git(#[from] git2::Error),

    #[error("failed to create working tree: {0}")]
    Workspace(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to clone {url}")]
    CloneFailed {
        url: String,
        #[source]
        source: CloneError,
    },

    #[error(
        "{url} requires authentication; set GIT_PASSWORD and GIT_USERNAME to access private repositories"
    )]
    CredentialsRequired { url: String },

    #[error("revision '{revision}' not found in {url}")]
    RevisionNotFound {
        url: String,
        revision: String,
        #[source]
        source: git2::Error,
    },

    #[error("failed to checkout {commit} from {url}")]
    CheckoutFailed {
        url: String,
        commit: Oid,
        #[source]
        source: git2::Error,
    },
}

impl FetchError {
    pub fn is_credentials_required(&self) -> bool {
        matches!(self, FetchError::CredentialsRequired { .. })
    }
}

/// Clones a repository into an existing empty directory.
pub trait Transport {
    fn clone_repo(
        &self,
        url: &str,
        dest: &Path,
        credentials: Option<&Credentials>,
        depth: Option<u32>,
    ) -> Result<Repository, CloneError>;
}

/// libgit2-backed transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct GitTransport;

impl Transport for GitTransport {
    fn clone_repo(
        &self,
        url: &str,
        dest: &Path,
        credentials: Option<&Credentials>,
        depth: Option<u32>,
    ) -> Result<Repository, CloneError> {
        let asked = Cell::new(false);

        let mut callbacks = RemoteCallbacks::new();
        callbacks.credentials(|_url, _username, allowed| {
            // libgit2 calls back again after a rejection; answer only once.
            if asked.replace(true) {
                return Err(auth_error("credentials rejected"));
            }
            match credentials {
                Some(creds) if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) => {
                    Cred::userpass_plaintext(&creds.username, &creds.password)
                }
                Some(_) => Err(auth_error("remote does not accept basic authentication")),
                None => Err(auth_error("authentication required")),
            }
        });

        let mut proxy = ProxyOptions::new();
        proxy.auto();

        let mut fetch_options = git2::FetchOptions::new();
        fetch_options
            .remote_callbacks(callbacks)
            .proxy_options(proxy)
            .download_tags(AutotagOption::All);
        if let Some(depth) = depth {
            fetch_options.depth(i32::try_from(depth).unwrap_or(i32::MAX));
        }

        let result = RepoBuilder::new()
            .fetch_options(fetch_options)
            .clone(url, dest);

        result.map_err(|err| {
            let err = classify(err, credentials.is_none(), asked.get());
            if matches!(err, CloneError::AuthenticationRequired) {
                debug!(url, "anonymous clone needs authentication");
            }
            err
        })
    }
}

/// Decide whether a failed clone asked for authentication.
///
/// Only an anonymous attempt can report [`CloneError::AuthenticationRequired`]:
/// either the credential callback was invoked, or libgit2 tagged the error
/// with [`ErrorCode::Auth`]. A credentialed failure stays a plain git error.
fn classify(err: git2::Error, anonymous: bool, asked: bool) -> CloneError {
    if anonymous && (asked || err.code() == ErrorCode::Auth) {
        CloneError::AuthenticationRequired
    } else {
        CloneError::Git(err)
    }
}

fn auth_error(message: &str) -> git2::Error {
    git2::Error::new(ErrorCode::Auth, ErrorClass::Http, message)
}

/// Fetch configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FetchOptions {
    /// Clone depth; `None` fetches full history.
    pub depth: Option<u32>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self { depth: Some(1) }
    }
}

/// A checked-out working tree pinned to one commit.
///
/// The working tree lives in a temporary directory that is removed when the
/// snapshot is dropped.
#[derive(Debug)]
pub struct Snapshot {
    workdir: TempDir,
    commit: Oid,
}

impl Snapshot {
    pub fn path(&self) -> &Path {
        self.workdir.path()
    }

    pub fn commit_id(&self) -> Oid {
        self.commit
    }

    /// Release the working tree now, reporting any cleanup failure.
    pub fn close(self) -> io::Result<()> {
        self.workdir.close()
    }
}

pub struct Fetcher<T = GitTransport> {
    transport: T,
    options: FetchOptions,
}

impl Default for Fetcher<GitTransport> {
    fn default() -> Self {
        Self::new(GitTransport, FetchOptions::default())
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: T, options: FetchOptions) -> Self {
        Self { transport, options }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Clone `coord`'s repository and check out its pinned revision.
    #[instrument(skip(self, credentials), fields(url = %coord.repository_url, rev = %coord.revision))]
    pub fn fetch(
        &self,
        coord: &Coordinate,
        credentials: Option<&Credentials>,
    ) -> Result<Snapshot, FetchError> {
        let url = &coord.repository_url;
        let (workdir, repo) = self.clone_with_fallback(url, credentials)?;

        let commit = resolve_revision(&repo, &coord.revision).map_err(|source| {
            FetchError::RevisionNotFound {
                url: url.clone(),
                revision: coord.revision.clone(),
                source,
            }
        })?;
        debug!(%commit, "resolved revision");

        checkout_commit(&repo, commit).map_err(|source| FetchError::CheckoutFailed {
            url: url.clone(),
            commit,
            source,
        })?;
        drop(repo);

        Ok(Snapshot { workdir, commit })
    }

    fn clone_with_fallback(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<(TempDir, Repository), FetchError> {
        let clone_failed = |source: CloneError| FetchError::CloneFailed {
            url: url.to_string(),
            source,
        };

        match self.try_clone(url, None) {
            Ok(cloned) => Ok(cloned),
            Err(CloneError::AuthenticationRequired) => {
                let creds = credentials.ok_or_else(|| FetchError::CredentialsRequired {
                    url: url.to_string(),
                })?;
                debug!(url, "retrying clone with credentials");
                self.try_clone(url, Some(creds)).map_err(clone_failed)
            }
            Err(other) => Err(clone_failed(other)),
        }
    }

    fn try_clone(
        &self,
        url: &str,
        credentials: Option<&Credentials>,
    ) -> Result<(TempDir, Repository), CloneError> {
        let workdir = tempfile::Builder::new().prefix("devx-fetch-").tempdir()?;
        let repo = self
            .transport
            .clone_repo(url, workdir.path(), credentials, self.options.depth)?;
        Ok((workdir, repo))
    }
}

/// Resolve a branch, tag or (short) commit hash to a commit id.
///
/// Branches other than the default one only exist as `origin/<name>` after a
/// clone, so that form is tried second.
pub fn resolve_revision(repo: &Repository, revision: &str) -> Result<Oid, git2::Error> {
    let object = match repo.revparse_single(revision) {
        Ok(object) => object,
        Err(first) => repo
            .revparse_single(&format!("origin/{}", revision))
            .map_err(|_| first)?,
    };
    Ok(object.peel_to_commit()?.id())
}

/// Files of the cloned default branch that are absent at `oid` are removed, so
/// HEAD is moved only after the tree is checked out.
fn checkout_commit(repo: &Repository, oid: Oid) -> Result<(), git2::Error> {
    let obj = repo.find_object(oid, None)?;
    let mut checkout_opts = CheckoutBuilder::new();
    checkout_opts.force().remove_untracked(true);
    repo.checkout_tree(&obj, Some(&mut checkout_opts))?;
    repo.set_head_detached(oid)
}

pub fn short_hash(oid: Oid) -> String {
    let full = oid.to_string();
    full.chars().take(7).collect()
}
