//! Git integration layer.
//!
//! This module wraps the actual backend implementation (`git2_backend`)
//! and re-exports the operations the mirror run needs: opening the target
//! repository and reconciling one gist into it.
//!
//! Callers stay on this surface rather than reaching into the `git2`-based
//! backend directly.

mod git2_backend;

pub use git2_backend::{
    BranchChange, BranchRemoval, ReconcileError, Reconciliation, RemoteOutcome, open_mirror,
    reconcile,
};
