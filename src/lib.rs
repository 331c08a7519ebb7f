//! Crate entry point for **gist-mirror**.
//!
//! This library provides the implementation behind the `gist-mirror` CLI,
//! which mirrors every gist of a user into one bare git repository, one
//! branch per gist.
//! Each submodule encapsulates one responsibility (listing, naming, git
//! reconciliation, configuration, the run driver).
//! The `pub use` re-exports make the pieces the binary needs reachable from
//! the crate root.

mod config;
mod gist;
mod git;
mod mirror;
mod naming;
mod paths;

/// Re-export commonly used types and commands so they can be accessed from `gist_mirror::*`.
pub use config::{FileConfig, MirrorArgs, Settings, load_config};
pub use gist::{Credentials, GistLister, GistRecord, ListError};
pub use git::{
    BranchChange, BranchRemoval, ReconcileError, Reconciliation, RemoteOutcome, open_mirror,
    reconcile,
};
pub use mirror::{Summary, cmd_mirror, run};
pub use naming::{BranchNameMode, branch_name};
