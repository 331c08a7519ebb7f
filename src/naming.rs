//! Branch naming.
//!
//! Every mirrored gist becomes one branch in the target repository. The name
//! is derived from the gist metadata according to a [`BranchNameMode`] chosen
//! once per run. Names derived from free text carry the first ten characters
//! of the gist id so that gists sharing a description or filename still get
//! distinct branches.
//!
//! All names are restricted to `[A-Za-z0-9._-]` and are valid git ref
//! components.

use clap::ValueEnum;
use regex::Regex;
use serde::Deserialize;
use std::fmt;
use std::sync::LazyLock;

use crate::gist::GistRecord;

/// Placeholder prefix the platform gives to files created without a name.
const GENERIC_FILE_PREFIX: &str = "gistfile";
const DESCRIPTION_MAX_CHARS: usize = 50;
const ID_SUFFIX_CHARS: usize = 10;

static UNSAFE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]").unwrap());

/// How branch names are derived from a gist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BranchNameMode {
    /// The gist id, verbatim.
    #[default]
    Hash,
    /// The creation timestamp, e.g. `2023-05-01_10_00_00`.
    Ctime,
    /// A slug of the description, falling back to `filename` when empty.
    Description,
    /// A slug of the file names (or their extensions), falling back to the id.
    Filename,
}

impl fmt::Display for BranchNameMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BranchNameMode::Hash => "hash",
            BranchNameMode::Ctime => "ctime",
            BranchNameMode::Description => "description",
            BranchNameMode::Filename => "filename",
        };
        f.write_str(s)
    }
}

/// Compute the branch name for `gist` under `mode`.
///
/// Always returns a non-empty string made of `[A-Za-z0-9._-]` that git
/// accepts as a branch name. The result depends only on the arguments.
pub fn branch_name(gist: &GistRecord, mode: BranchNameMode) -> String {
    let raw = match mode {
        BranchNameMode::Hash => gist.id.clone(),
        BranchNameMode::Ctime => by_ctime(&gist.created_at),
        BranchNameMode::Description => by_description(gist)
            .or_else(|| by_filename(gist))
            .unwrap_or_else(|| gist.id.clone()),
        BranchNameMode::Filename => by_filename(gist).unwrap_or_else(|| gist.id.clone()),
    };
    ref_safe(raw)
}

/// Replace every character outside `[A-Za-z0-9._-]` with `_`.
pub fn slugify(s: &str) -> String {
    UNSAFE_CHARS.replace_all(s, "_").into_owned()
}

fn by_ctime(created_at: &str) -> String {
    slugify(created_at).replace('T', "_").replace('Z', "")
}

fn by_description(gist: &GistRecord) -> Option<String> {
    if gist.description.is_empty() {
        return None;
    }
    let head: String = gist
        .description
        .trim()
        .chars()
        .take(DESCRIPTION_MAX_CHARS)
        .collect();
    let slug: String = slugify(head.trim_end_matches('.'))
        .to_ascii_lowercase()
        .chars()
        .take(DESCRIPTION_MAX_CHARS)
        .collect();
    Some(with_id_suffix(&slug, &gist.id))
}

fn by_filename(gist: &GistRecord) -> Option<String> {
    let named: Vec<String> = gist
        .files
        .iter()
        .filter(|f| !f.to_lowercase().starts_with(GENERIC_FILE_PREFIX))
        .map(|f| slugify(f))
        .collect();
    if !named.is_empty() {
        return Some(with_id_suffix(&named.join("_"), &gist.id));
    }

    let extensions: Vec<String> = gist
        .files
        .iter()
        .map(|f| extension(f))
        .filter(|ext| !ext.is_empty())
        .map(slugify)
        .collect();
    if extensions.is_empty() {
        return None;
    }
    Some(with_id_suffix(&extensions.join("_"), &gist.id))
}

/// Text after the last `.` of a file name. Leading dots do not start an
/// extension, so `.bashrc` has none.
fn extension(name: &str) -> &str {
    let stem = name.trim_start_matches('.');
    match stem.rfind('.') {
        Some(i) => &stem[i + 1..],
        None => "",
    }
}

fn with_id_suffix(base: &str, id: &str) -> String {
    let prefix = match id.char_indices().nth(ID_SUFFIX_CHARS) {
        Some((i, _)) => &id[..i],
        None => id,
    };
    format!("{}_{}", base, prefix)
}

/// Patch up the few shapes git rejects in a single ref component that the
/// character whitelist alone lets through.
fn ref_safe(mut name: String) -> String {
    if name.is_empty() {
        return "_".to_string();
    }
    if name.starts_with('.') || name.starts_with('-') {
        name.replace_range(..1, "_");
    }
    while name.contains("..") {
        name = name.replace("..", "._");
    }
    if name.ends_with('.') || name.ends_with(".lock") {
        name.push('_');
    }
    name
}
