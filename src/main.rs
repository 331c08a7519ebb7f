//! # gist-mirror
//!
//! **gist-mirror** keeps a local bare repository in sync with all gists of a
//! user. Every gist gets a remote named after its id and a branch pointing
//! at its current `HEAD`. Re-running converges to the same state.
//!
//! Defaults can be stored in `$XDG_CONFIG_HOME/gist-mirror/config.toml`;
//! command-line flags take precedence.
//!
//! This CLI is built with [clap](https://docs.rs/clap).

use anyhow::Result;
use clap::Parser;
use gist_mirror::{MirrorArgs, Settings, cmd_mirror, load_config};
use tracing_subscriber::EnvFilter;

/// Command-line interface definition.
#[derive(Parser, Debug)]
#[command(
    name = "gist-mirror",
    version,
    about = "Mirror a user's gists into a bare git repository, one branch per gist",
    arg_required_else_help = true
)]
struct Cli {
    #[command(flatten)]
    mirror: MirrorArgs,
    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(short, long)]
    verbose: bool,
}

/// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose {
        "gist_mirror=debug"
    } else {
        "gist_mirror=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// CLI entry point.
///
/// Parses arguments, merges them over the config file and runs the mirror.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let file = load_config(cli.mirror.config.as_deref())?;
    let settings = Settings::resolve(&cli.mirror, file)?;
    cmd_mirror(&settings)
}
