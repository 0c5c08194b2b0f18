//! Package dependency resolution and fetching.
//!
//! Packages are declared in `cue.mod/module.cue` as
//! `<host>/<org>/<repo>@<revision>/<subpath>` and installed into
//! `cue.mod/<subpath>`.
//!
//! - [`coordinate`] - Parse a declaration into a [`Coordinate`]
//! - [`credentials`] - `GIT_USERNAME` / `GIT_PASSWORD` lookup
//! - [`fetch`] - Clone and pin a repository into a [`Snapshot`]
//! - [`sync`] - Replace a package's subtree in the module cache
//! - [`update`] - Run the whole pipeline for every declared package

pub mod coordinate;
pub mod credentials;
pub mod fetch;
pub mod sync;
pub mod update;

pub use coordinate::{Coordinate, ParseError};
pub use credentials::Credentials;
pub use fetch::{CloneError, FetchError, FetchOptions, Fetcher, GitTransport, Snapshot, Transport};
pub use sync::{SyncError, SyncReport};
pub use update::{PackageUpdate, UpdateError, UpdateSummary, Updater, update};
