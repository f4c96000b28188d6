//! jj-land - merge a stack of jj revisions through their GitHub PRs

mod cli;

use anstream::eprintln;
use anyhow::Context;
use clap::Parser;
use cli::style::Stylize;
use jj_land::types::MergeMethod;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "jj-land")]
#[command(about = "Merge a stack of jj revisions through their GitHub pull requests")]
#[command(version)]
struct Cli {
    /// Top of the stack to merge
    #[arg(default_value = "@")]
    revset: String,

    /// Fail instead of waiting when a PR is not mergeable yet
    #[arg(long)]
    no_wait: bool,

    /// Path to the jj workspace (defaults to the current directory)
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Git remote to fetch from and push to
    #[arg(long)]
    remote: Option<String>,

    /// Merge without asking for confirmation
    #[arg(short, long)]
    yes: bool,

    /// Seconds between mergeability checks
    #[arg(long, value_name = "SECS")]
    poll_interval: Option<u64>,

    /// Give up after this many resyncs caused by a stale PR branch
    #[arg(long, value_name = "N")]
    max_stale_retries: Option<u32>,

    /// Merge method: merge, squash or rebase
    #[arg(long, value_name = "METHOD")]
    merge_method: Option<MergeMethod>,

    /// Enable debug logging (repeat for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "jj_land=debug",
        _ => "jj_land=trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cancel = CancellationToken::new();
    cli::spawn_signal_handler(cancel.clone());

    let path = cli.path.unwrap_or_else(|| PathBuf::from("."));
    let options = cli::LandOptions {
        revset: cli.revset,
        no_wait: cli.no_wait,
        remote: cli.remote,
        yes: cli.yes,
        poll_interval_secs: cli.poll_interval,
        max_stale_retries: cli.max_stale_retries,
        merge_method: cli.merge_method,
    };

    let result = cli::run_land(&path, options, cancel)
        .await
        .with_context(|| format!("cannot land stack in {}", path.display()));
    let code = match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{} {e:#}", "Error:".error());
            cli::EXIT_FAILURE
        }
    };

    // a declined or interrupted prompt may leave a blocking reader behind;
    // exit without waiting for it
    std::process::exit(code)
}
