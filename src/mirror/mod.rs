mod progress;

use anyhow::{Context, Result, bail};
use colored::Colorize;
use indicatif::MultiProgress;
use std::collections::HashMap;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::gist::{GistLister, GistRecord};
use crate::git::{BranchChange, open_mirror, reconcile};
use crate::naming::branch_name;

/// Counts of what one mirror run did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Summary {
    pub listed: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    /// Ids of gists that could not be mirrored (only with `keep_going`).
    pub failed: Vec<String>,
}

/// Mirror every gist of the configured user and print a summary.
///
/// # Errors
/// Returns an error if the run aborts, or if any gist failed under
/// `keep_going`.
pub fn cmd_mirror(settings: &Settings) -> Result<()> {
    let summary = run(settings)?;
    if settings.dry_run {
        return Ok(());
    }

    println!(
        "{} gists: {} created, {} updated, {} unchanged, {} failed",
        summary.listed,
        summary.created.to_string().green(),
        summary.updated.to_string().cyan(),
        summary.unchanged.to_string().dimmed(),
        summary.failed.len().to_string().red(),
    );
    if !summary.failed.is_empty() {
        bail!(
            "{} gist(s) could not be mirrored: {}",
            summary.failed.len(),
            summary.failed.join(", ")
        );
    }
    Ok(())
}

/// Run one mirror pass.
///
/// High-level flow:
/// 1. List all gists of the user (all pages, filtered by visibility).
/// 2. For each gist, in listing order, compute its branch name.
/// 3. Reconcile the gist into the bare repository (remote, fetch, branch).
///
/// A listing failure prints the API payload and aborts before the
/// repository is touched. A reconcile failure aborts the run unless
/// `keep_going` is set, in which case it is recorded in the summary and the
/// remaining gists are still processed.
pub fn run(settings: &Settings) -> Result<Summary> {
    let gists = list(settings)?;
    let mut summary = Summary {
        listed: gists.len(),
        ..Summary::default()
    };

    if settings.dry_run {
        for g in &gists {
            println!("{}\t{}\t{}", branch_name(g, settings.branch_names), g.id, g.pull_url);
        }
        return Ok(summary);
    }

    let repo = open_mirror(&settings.repo, settings.init)?;
    let mp = MultiProgress::new();
    let mut claimed: HashMap<String, &str> = HashMap::new();

    for gist in &gists {
        let branch = branch_name(gist, settings.branch_names);
        if let Some(prev) = claimed.insert(branch.clone(), &gist.id) {
            mp.suspend(|| {
                warn!(branch = %branch, gist = %gist.id, replaces = prev, "branch name already used in this run");
            });
        }

        let pb = progress::start(Some(&mp), format!("{} ← {}", branch, gist.id));
        match reconcile(&repo, gist, &branch, settings.credentials.as_ref()) {
            Ok(r) => {
                let commit = r.commit.to_string();
                let short = short_id(&commit);
                let note = match r.change() {
                    BranchChange::Created => {
                        summary.created += 1;
                        "created".to_string()
                    }
                    BranchChange::Updated { from } => {
                        summary.updated += 1;
                        format!("updated from {}", short_id(&from.to_string()))
                    }
                    BranchChange::Unchanged => {
                        summary.unchanged += 1;
                        "unchanged".to_string()
                    }
                };
                progress::finish_ok(
                    &pb,
                    format!("{} ← {} ({}, {})", branch, gist.id, short, note),
                );
            }
            Err(e) => {
                progress::finish_err(
                    &pb,
                    format!("{} ← {} (error: {})", branch, gist.id, error_chain(&e)),
                );
                if !settings.keep_going {
                    return Err(e).with_context(|| format!("mirroring gist {}", gist.id));
                }
                mp.suspend(|| warn!(gist = %gist.id, error = %e, "skipping gist"));
                summary.failed.push(gist.id.clone());
            }
        }
    }

    info!(
        created = summary.created,
        updated = summary.updated,
        unchanged = summary.unchanged,
        failed = summary.failed.len(),
        "mirror run finished"
    );
    Ok(summary)
}

fn list(settings: &Settings) -> Result<Vec<GistRecord>> {
    let lister = GistLister::new(&settings.api_url, settings.credentials.clone())?;
    let pb = progress::start(None, format!("listing gists of {}", settings.user));

    match lister.list(&settings.user, settings.include_private) {
        Ok(gists) => {
            progress::finish_ok(
                &pb,
                format!("listed {} gists of {}", gists.len(), settings.user),
            );
            Ok(gists)
        }
        Err(e) => {
            progress::finish_err(&pb, format!("listing gists of {} (error: {})", settings.user, e));
            if let Some(payload) = e.payload() {
                eprintln!("{}", payload);
            }
            error!(user = %settings.user, error = %e, "listing failed, nothing mirrored");
            Err(e).context("listing gists failed")
        }
    }
}

/// `outer: inner: root` rendering of an error and its sources.
fn error_chain(e: &dyn std::error::Error) -> String {
    let mut out = e.to_string();
    let mut cur = e.source();
    while let Some(src) = cur {
        out.push_str(": ");
        out.push_str(&src.to_string());
        cur = src.source();
    }
    out
}

fn short_id(full: &str) -> &str {
    full.get(..7).unwrap_or(full)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::naming::BranchNameMode;
    use git2::{BranchType, Commit, Oid, Repository, Signature};
    use httpmock::prelude::*;
    use serde_json::{Value, json};
    use std::path::{Path, PathBuf};
    use tempfile::{TempDir, tempdir};

    fn commit_file(repo: &Repository, name: &str, content: &str) -> Oid {
        let sig = Signature::now("Gist Owner", "owner@example.com").unwrap();
        let blob = repo.blob(content.as_bytes()).unwrap();
        let mut tb = repo.treebuilder(None).unwrap();
        tb.insert(name, blob, 0o100644).unwrap();
        let tree = repo.find_tree(tb.write().unwrap()).unwrap();
        let parents: Vec<Commit> = match repo.head() {
            Ok(h) => vec![h.peel_to_commit().unwrap()],
            Err(_) => vec![],
        };
        let parent_refs: Vec<&Commit> = parents.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, content, &tree, &parent_refs)
            .unwrap()
    }

    /// A gist backed by a local repository with a single commit.
    fn local_gist(root: &Path, id: &str, file: &str, public: bool) -> (Value, Oid) {
        let path = root.join(id);
        let repo = Repository::init(&path).unwrap();
        let head = commit_file(&repo, file, id);
        let mut files = serde_json::Map::new();
        files.insert(file.to_string(), json!({}));
        let raw = json!({
            "id": id,
            "git_pull_url": path.to_str().unwrap(),
            "created_at": "2023-05-01T10:00:00Z",
            "description": "",
            "public": public,
            "files": files,
        });
        (raw, head)
    }

    fn settings(api_url: String, repo: PathBuf, mode: BranchNameMode) -> Settings {
        Settings {
            repo,
            user: "alice".into(),
            include_private: false,
            branch_names: mode,
            credentials: None,
            api_url,
            keep_going: false,
            dry_run: false,
            init: true,
        }
    }

    fn branch_target(repo: &Repository, name: &str) -> Option<Oid> {
        repo.find_branch(name, BranchType::Local)
            .ok()
            .and_then(|b| b.get().target())
    }

    fn serve(server: &MockServer, gists: Vec<Value>) {
        server.mock(|when, then| {
            when.method(GET).path("/users/alice/gists");
            then.status(200).json_body(Value::Array(gists));
        });
    }

    fn scratch() -> (TempDir, PathBuf) {
        let td = tempdir().unwrap();
        let mirror = td.path().join("mirror.git");
        (td, mirror)
    }

    #[test]
    fn mirrors_listed_gists_and_is_idempotent() {
        let (td, mirror) = scratch();
        let (a, head_a) = local_gist(td.path(), "aaaaaaaaaaaa0001", "notes.md", true);
        let (b, head_b) = local_gist(td.path(), "bbbbbbbbbbbb0002", "gistfile1.sh", true);
        let (hidden, _) = local_gist(td.path(), "cccccccccccc0003", "secret.txt", false);

        let server = MockServer::start();
        serve(&server, vec![a, b, hidden]);
        let s = settings(server.base_url(), mirror.clone(), BranchNameMode::Filename);

        let first = run(&s).unwrap();
        assert_eq!(first.listed, 2);
        assert_eq!(first.created, 2);

        let repo = Repository::open_bare(&mirror).unwrap();
        assert_eq!(branch_target(&repo, "notes.md_aaaaaaaaaa"), Some(head_a));
        assert_eq!(branch_target(&repo, "sh_bbbbbbbbbb"), Some(head_b));
        assert!(repo.find_remote("cccccccccccc0003").is_err());

        let second = run(&s).unwrap();
        assert_eq!(second.created, 0);
        assert_eq!(second.unchanged, 2);
        assert_eq!(repo.branches(Some(BranchType::Local)).unwrap().count(), 2);
        assert_eq!(repo.remotes().unwrap().len(), 2);
    }

    #[test]
    fn fetch_failure_aborts_the_run_by_default() {
        let (td, mirror) = scratch();
        let (a, head_a) = local_gist(td.path(), "aaaaaaaaaaaa0001", "a.txt", true);
        let broken = json!({
            "id": "dddddddddddd0004",
            "git_pull_url": td.path().join("gone").to_str().unwrap(),
            "created_at": "2023-05-02T10:00:00Z",
            "description": "",
            "public": true,
            "files": {},
        });
        let (c, _) = local_gist(td.path(), "cccccccccccc0003", "c.txt", true);

        let server = MockServer::start();
        serve(&server, vec![a, broken, c]);
        let s = settings(server.base_url(), mirror.clone(), BranchNameMode::Hash);

        let err = run(&s).unwrap_err();
        assert!(format!("{:#}", err).contains("dddddddddddd0004"));

        let repo = Repository::open_bare(&mirror).unwrap();
        assert_eq!(branch_target(&repo, "aaaaaaaaaaaa0001"), Some(head_a));
        assert!(branch_target(&repo, "cccccccccccc0003").is_none());
    }

    #[test]
    fn keep_going_records_failures_and_continues() {
        let (td, mirror) = scratch();
        let broken = json!({
            "id": "dddddddddddd0004",
            "git_pull_url": td.path().join("gone").to_str().unwrap(),
            "created_at": "2023-05-02T10:00:00Z",
            "description": "",
            "public": true,
            "files": {},
        });
        let (c, head_c) = local_gist(td.path(), "cccccccccccc0003", "c.txt", true);

        let server = MockServer::start();
        serve(&server, vec![broken, c]);
        let mut s = settings(server.base_url(), mirror.clone(), BranchNameMode::Hash);
        s.keep_going = true;

        let summary = run(&s).unwrap();
        assert_eq!(summary.failed, vec!["dddddddddddd0004".to_string()]);
        assert_eq!(summary.created, 1);

        let repo = Repository::open_bare(&mirror).unwrap();
        assert_eq!(branch_target(&repo, "cccccccccccc0003"), Some(head_c));

        assert!(cmd_mirror(&s).is_err());
    }

    #[test]
    fn listing_failure_leaves_repository_untouched() {
        let (_td, mirror) = scratch();
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/users/alice/gists");
            then.status(404).json_body(json!({ "message": "Not Found" }));
        });
        let s = settings(server.base_url(), mirror.clone(), BranchNameMode::Hash);

        let err = run(&s).unwrap_err();
        assert!(format!("{:#}", err).contains("listing gists failed"));
        assert!(!mirror.exists());
    }

    #[test]
    fn dry_run_does_not_open_the_repository() {
        let (td, mirror) = scratch();
        let (a, _) = local_gist(td.path(), "aaaaaaaaaaaa0001", "a.txt", true);
        let server = MockServer::start();
        serve(&server, vec![a]);

        let mut s = settings(server.base_url(), mirror.clone(), BranchNameMode::Ctime);
        s.dry_run = true;
        s.init = false;

        let summary = run(&s).unwrap();
        assert_eq!(summary.listed, 1);
        assert!(!mirror.exists());
    }

    #[test]
    fn short_id_handles_short_input() {
        assert_eq!(short_id("0123456789abcdef"), "0123456");
        assert_eq!(short_id("abc"), "abc");
    }
}
