use anyhow::{Context, Result, bail};
use clap::Args;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::gist::{Credentials, DEFAULT_API_URL};
use crate::naming::BranchNameMode;
use crate::paths::default_config_path;

/// Optional defaults loaded from `config.toml`.
///
/// Every key mirrors a command-line flag; flags given on the command line
/// win over the file.
///
/// Example TOML:
/// ```toml
/// repo         = "/srv/mirrors/gists.git"
/// user         = "alice"
/// private      = true
/// branch_names = "description"
/// token_user   = "alice"
/// token        = "/home/alice/.config/gist-mirror/token"
/// ```
#[derive(Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub repo: Option<PathBuf>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub private: bool,
    #[serde(default)]
    pub branch_names: Option<BranchNameMode>,
    #[serde(default)]
    pub token_user: Option<String>,
    #[serde(default)]
    pub token: Option<PathBuf>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub keep_going: bool,
}

/// Flags of a mirror run.
#[derive(Args, Debug, Default, Clone)]
pub struct MirrorArgs {
    /// Path to a bare repository that gists will be pulled to
    #[arg(short, long)]
    pub repo: Option<PathBuf>,
    /// User to mirror gists from
    #[arg(short, long)]
    pub user: Option<String>,
    /// Include private gists (needs --token-user/--token)
    #[arg(short, long)]
    pub private: bool,
    /// How branches are named [default: hash]
    #[arg(short, long = "branch-names", value_enum)]
    pub branch_names: Option<BranchNameMode>,
    /// Username for authenticated requests
    #[arg(short = 'U', long = "token-user")]
    pub token_user: Option<String>,
    /// File containing an API token; enables authenticated requests
    #[arg(short, long)]
    pub token: Option<PathBuf>,
    /// Base URL of the gist API
    #[arg(long = "api-url")]
    pub api_url: Option<String>,
    /// Report gists that fail to fetch or branch and continue with the rest
    #[arg(short, long = "keep-going")]
    pub keep_going: bool,
    /// Print the branch each gist would get without touching the repository
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,
    /// Create the bare repository if it does not exist
    #[arg(long)]
    pub init: bool,
    /// Configuration file [default: $XDG_CONFIG_HOME/gist-mirror/config.toml]
    #[arg(short, long)]
    pub config: Option<PathBuf>,
}

/// Fully resolved settings of one mirror run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub repo: PathBuf,
    pub user: String,
    pub include_private: bool,
    pub branch_names: BranchNameMode,
    pub credentials: Option<Credentials>,
    pub api_url: String,
    pub keep_going: bool,
    pub dry_run: bool,
    pub init: bool,
}

impl Settings {
    /// Merge command-line flags over the file configuration.
    ///
    /// # Errors
    /// - `repo` or `user` is missing from both sources.
    /// - Only one of `token_user`/`token` is given.
    /// - The token file cannot be read or is empty.
    pub fn resolve(args: &MirrorArgs, file: FileConfig) -> Result<Settings> {
        let repo = args
            .repo
            .clone()
            .or(file.repo)
            .context("missing --repo (or `repo` in config.toml)")?;
        let user = args
            .user
            .clone()
            .or(file.user)
            .context("missing --user (or `user` in config.toml)")?;

        let token_user = args.token_user.clone().or(file.token_user);
        let token = args.token.clone().or(file.token);
        let credentials = match (token_user, token) {
            (Some(user), Some(path)) => Some(Credentials {
                user,
                token: read_token(&path)?,
            }),
            (None, None) => None,
            _ => bail!("Both --token and --token-user must be defined."),
        };

        Ok(Settings {
            repo,
            user,
            include_private: args.private || file.private,
            branch_names: args.branch_names.or(file.branch_names).unwrap_or_default(),
            credentials,
            api_url: args
                .api_url
                .clone()
                .or(file.api_url)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            keep_going: args.keep_going || file.keep_going,
            dry_run: args.dry_run,
            init: args.init,
        })
    }
}

/// Load `config.toml`.
///
/// With an explicit path the file must exist. Without one, the default
/// location is used and a missing file yields an empty configuration.
///
/// # Errors
/// - The file cannot be read.
/// - Parsing the TOML fails (including unknown keys).
pub fn load_config(explicit: Option<&Path>) -> Result<FileConfig> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => {
            let p = default_config_path();
            if !p.exists() {
                return Ok(FileConfig::default());
            }
            p
        }
    };
    let txt = fs::read_to_string(&path)
        .with_context(|| format!("config not found: {}", path.display()))?;
    let cfg: FileConfig = toml::from_str(&txt)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(cfg)
}

/// Read an API token from `path`, ignoring surrounding whitespace.
fn read_token(path: &Path) -> Result<String> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("cannot read token file: {}", path.display()))?;
    let token = raw.trim();
    if token.is_empty() {
        bail!("token file is empty: {}", path.display());
    }
    Ok(token.to_string())
}
