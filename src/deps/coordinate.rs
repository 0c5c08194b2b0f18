//! Package coordinate parsing.
//!
//! A package declaration in `cue.mod/module.cue` has the shape
//! `<host>/<org>/<repo>@<revision>/<subpath>`, e.g.
//! `github.com/acme/pkgs@v1.0.0/pkg/widgets`. Parsing is all-or-nothing: a
//! malformed declaration never yields a partial [`Coordinate`].

use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

/// Every package subpath must live under this root inside `cue.mod/`.
pub const PACKAGE_ROOT: &str = "pkg";

/// Reasons a package declaration is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no revision specified in '{0}' (expected <repo>@<revision>/<path>)")]
    MissingRevision(String),

    #[error("no path specified in '{0}' (expected <repo>@<revision>/<path>)")]
    MissingSubpath(String),

    #[error("path in '{0}' must start with 'pkg'")]
    InvalidSubpathRoot(String),

    #[error("path in '{0}' must be relative and may not contain '.' or '..' segments")]
    UnsafeSubpath(String),
}

/// A parsed package declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Coordinate {
    pub repository_url: String,
    pub revision: String,
    pub subpath: String,
}

impl Coordinate {
    /// Parse a single manifest declaration.
    pub fn parse(declaration: &str) -> Result<Self, ParseError> {
        let declaration = declaration.trim();
        let owned = || declaration.to_string();

        let Some((repo, rest)) = declaration.split_once('@') else {
            return Err(ParseError::MissingRevision(owned()));
        };
        let Some((revision, subpath)) = rest.split_once('/') else {
            return Err(ParseError::MissingSubpath(owned()));
        };

        if revision.is_empty() {
            return Err(ParseError::MissingRevision(owned()));
        }
        if subpath.is_empty() {
            return Err(ParseError::MissingSubpath(owned()));
        }
        if !subpath.starts_with(PACKAGE_ROOT) {
            return Err(ParseError::InvalidSubpathRoot(owned()));
        }
        if !is_safe_subpath(subpath) {
            return Err(ParseError::UnsafeSubpath(owned()));
        }

        Ok(Self {
            repository_url: format!("https://{}", repo),
            revision: revision.to_string(),
            subpath: subpath.trim_end_matches('/').to_string(),
        })
    }

    /// The subpath as a relative filesystem path.
    pub fn subpath(&self) -> PathBuf {
        self.subpath.split('/').collect()
    }
}

/// Rejects absolute paths, `.`/`..` and empty segments so that a subpath can
/// never escape the module cache.
fn is_safe_subpath(subpath: &str) -> bool {
    let trimmed = subpath.trim_end_matches('/');
    if trimmed.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..") {
        return false;
    }
    Path::new(trimmed)
        .components()
        .all(|c| matches!(c, Component::Normal(_)))
}

impl FromStr for Coordinate {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let repo = self
            .repository_url
            .strip_prefix("https://")
            .unwrap_or(&self.repository_url);
        write!(f, "{}@{}/{}", repo, self.revision, self.subpath)
    }
}
