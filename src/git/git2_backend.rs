use anyhow::{Context, Result, bail};
use git2::{
    CredentialType, Cred, ErrorCode, FetchOptions, Oid, RemoteCallbacks, Repository,
};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::gist::{Credentials, GistRecord};

/// libgit2 keeps asking for credentials while the server rejects them.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Result of registering the gist remote. Both variants are success.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteOutcome {
    Added,
    AlreadyExists,
}

/// Result of clearing the target branch before it is recreated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchRemoval {
    /// The branch existed and pointed at this commit.
    Deleted(Oid),
    Absent,
}

/// What a reconciliation did to the mirror for one gist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reconciliation {
    pub remote: RemoteOutcome,
    pub previous: BranchRemoval,
    /// Commit the branch points at now (the gist's `HEAD`).
    pub commit: Oid,
}

/// How the branch moved, derived from a [`Reconciliation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchChange {
    Created,
    Updated { from: Oid },
    Unchanged,
}

impl Reconciliation {
    pub fn change(&self) -> BranchChange {
        match self.previous {
            BranchRemoval::Absent => BranchChange::Created,
            BranchRemoval::Deleted(old) if old == self.commit => BranchChange::Unchanged,
            BranchRemoval::Deleted(old) => BranchChange::Updated { from: old },
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("failed to add remote {name} ({url})")]
    Remote {
        name: String,
        url: String,
        #[source]
        source: git2::Error,
    },
    #[error("failed to fetch {url}")]
    Fetch {
        url: String,
        #[source]
        source: git2::Error,
    },
    #[error("{url} did not advertise a HEAD commit")]
    MissingHead { url: String },
    #[error("failed to delete branch {branch}")]
    BranchDelete {
        branch: String,
        #[source]
        source: git2::Error,
    },
    #[error("failed to create branch {branch} at {commit}")]
    BranchCreate {
        branch: String,
        commit: Oid,
        #[source]
        source: git2::Error,
    },
}

/// Open the bare mirror repository at `path`.
///
/// With `init`, a missing repository is created as an empty bare repository.
///
/// # Errors
/// Returns an error if the path cannot be opened as a repository or is not
/// bare.
pub fn open_mirror(path: &Path, init: bool) -> Result<Repository> {
    if init && !path.exists() {
        info!(path = %path.display(), "initialising bare mirror repository");
        return Repository::init_bare(path)
            .with_context(|| format!("git init --bare {}", path.display()));
    }
    let repo = Repository::open(path)
        .with_context(|| format!("cannot open repository: {}", path.display()))?;
    if !repo.is_bare() {
        bail!("not a bare repository: {}", path.display());
    }
    Ok(repo)
}

/// Build `FetchOptions` answering credential requests with `credentials`.
///
/// Without credentials the fetch is anonymous, which is enough for public
/// gists.
fn fetch_opts(credentials: Option<&Credentials>) -> FetchOptions<'_> {
    let mut cb = RemoteCallbacks::new();
    if let Some(c) = credentials {
        let mut attempts = 0;
        cb.credentials(move |_url, _username_from_url, allowed| {
            attempts += 1;
            if attempts > MAX_CREDENTIAL_ATTEMPTS
                || !allowed.contains(CredentialType::USER_PASS_PLAINTEXT)
            {
                return Err(git2::Error::from_str("gist credentials were rejected"));
            }
            Cred::userpass_plaintext(&c.user, &c.token)
        });
    }

    let mut fo = FetchOptions::new();
    fo.remote_callbacks(cb);
    fo.update_fetchhead(false);
    fo
}

/// Register a remote named `name` for `url`. An existing remote of that name
/// is left untouched.
pub fn register_remote(
    repo: &Repository,
    name: &str,
    url: &str,
) -> Result<RemoteOutcome, ReconcileError> {
    match repo.remote(name, url) {
        Ok(_) => Ok(RemoteOutcome::Added),
        Err(e) if e.code() == ErrorCode::Exists => Ok(RemoteOutcome::AlreadyExists),
        Err(source) => Err(ReconcileError::Remote {
            name: name.to_string(),
            url: url.to_string(),
            source,
        }),
    }
}

/// Fetch the branches of `url` into `refs/remotes/<name>/*` and return the
/// commit the remote `HEAD` resolves to.
pub fn fetch_head(
    repo: &Repository,
    name: &str,
    url: &str,
    credentials: Option<&Credentials>,
) -> Result<Oid, ReconcileError> {
    let fetch_err = |source| ReconcileError::Fetch {
        url: url.to_string(),
        source,
    };

    let mut remote = repo.remote_anonymous(url).map_err(fetch_err)?;
    let refspec = format!("+refs/heads/*:refs/remotes/{}/*", name);
    let mut fo = fetch_opts(credentials);
    remote
        .fetch(&[refspec.as_str()], Some(&mut fo), None)
        .map_err(fetch_err)?;

    // An empty gist advertises no refs at all, and git2 cannot list an
    // empty advertisement.
    let tracking = format!("refs/remotes/{}/*", name);
    let fetched = repo
        .references_glob(&tracking)
        .map_err(fetch_err)?
        .next()
        .is_some();
    if !fetched {
        return Err(ReconcileError::MissingHead {
            url: url.to_string(),
        });
    }

    // The advertised refs stay readable after the fetch disconnects.
    let head = remote
        .list()
        .map_err(fetch_err)?
        .iter()
        .find(|h| h.name() == "HEAD")
        .map(|h| h.oid());
    let Some(oid) = head else {
        return Err(ReconcileError::MissingHead {
            url: url.to_string(),
        });
    };
    repo.find_commit(oid).map_err(|_| ReconcileError::MissingHead {
        url: url.to_string(),
    })?;
    debug!(url, head = %oid, "fetched gist");
    Ok(oid)
}

/// Delete local branch `branch` if it exists.
pub fn delete_branch(repo: &Repository, branch: &str) -> Result<BranchRemoval, ReconcileError> {
    let delete_err = |source| ReconcileError::BranchDelete {
        branch: branch.to_string(),
        source,
    };

    let mut reference = match repo.find_reference(&format!("refs/heads/{}", branch)) {
        Ok(r) => r,
        Err(e) if e.code() == ErrorCode::NotFound => return Ok(BranchRemoval::Absent),
        Err(e) => return Err(delete_err(e)),
    };
    let old = reference.target().unwrap_or_else(Oid::zero);
    reference.delete().map_err(delete_err)?;
    Ok(BranchRemoval::Deleted(old))
}

/// Create local branch `branch` at `commit`. The branch must not exist.
pub fn create_branch(repo: &Repository, branch: &str, commit: Oid) -> Result<(), ReconcileError> {
    let create_err = |source| ReconcileError::BranchCreate {
        branch: branch.to_string(),
        commit,
        source,
    };
    let target = repo.find_commit(commit).map_err(create_err)?;
    repo.branch(branch, &target, false).map_err(create_err)?;
    Ok(())
}

/// Mirror one gist into `repo` under `branch`.
///
/// Steps, in order:
/// 1. Add a remote named after the gist id (kept as-is if it already exists).
/// 2. Fetch the gist and resolve its `HEAD` commit.
/// 3. Delete `branch` if present, then recreate it at that commit.
///
/// Running this again for the same gist converges to the same state: one
/// remote, one branch at the gist's current `HEAD`.
///
/// # Errors
/// Fetch and branch failures are returned to the caller; the repository may
/// then hold the remote but no branch for this gist, which the next run
/// repairs.
pub fn reconcile(
    repo: &Repository,
    gist: &GistRecord,
    branch: &str,
    credentials: Option<&Credentials>,
) -> Result<Reconciliation, ReconcileError> {
    let remote = register_remote(repo, &gist.id, &gist.pull_url)?;
    let commit = fetch_head(repo, &gist.id, &gist.pull_url, credentials)?;
    let previous = delete_branch(repo, branch)?;
    create_branch(repo, branch, commit)?;

    debug!(gist = %gist.id, branch, commit = %commit, ?remote, ?previous, "reconciled");
    Ok(Reconciliation {
        remote,
        previous,
        commit,
    })
}
