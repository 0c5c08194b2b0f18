//! # devx - CUE project package manager
//!
//! Resolves the packages declared in a project's `cue.mod/module.cue`, fetches
//! each one from its git repository at a pinned revision, and installs the
//! declared subtree into the project's module cache.
//!
//! ## Quick Start
//!
//! ```bash
//! # Scaffold cue.mod/ with the default package
//! devx project init --module guku.io/demo
//!
//! # Fetch and install every declared package
//! devx project update
//! ```
//!
//! ## Module Organization
//!
//! - [`deps`] - Package declarations, fetching and cache synchronization
//! - [`manifest`] - `cue.mod/module.cue` decoding
//! - [`project`] - `init` and `gen` scaffolding
//! - [`cache`] - Installed package listing and cleanup

/// Installed package listing and cleanup (`cue.mod/pkg`).
pub mod cache;

/// Package fetching and installation.
pub mod deps;

/// `tracing` subscriber setup.
pub mod logging;

/// Module manifest (`cue.mod/module.cue`) decoding.
pub mod manifest;

/// Project scaffolding.
pub mod project;

/// Starter file contents.
pub mod templates;

/// Terminal UI utilities (tables).
pub mod ui;
