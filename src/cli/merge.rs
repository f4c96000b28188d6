//! Land command - merge every PR in the stack, bottom to top

use crate::cli::context::CommandContext;
use crate::cli::progress::CliProgress;
use jj_land::error::{Error, Result};
use jj_land::merge::{MachineOptions, MergeMachine, MergeRunner, RunSummary, ViewOptions};
use jj_land::platform::PlatformService;
use jj_land::repo::VcsBackend;
use jj_land::types::MergeMethod;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Exit status for a successful or declined run
pub const EXIT_SUCCESS: i32 = 0;
/// Exit status for a failed run
pub const EXIT_FAILURE: i32 = 1;
/// Exit status for a run stopped by a signal
pub const EXIT_INTERRUPTED: i32 = 130;

/// Options for the land command
#[derive(Debug, Clone)]
pub struct LandOptions {
    /// Revset naming the top of the stack
    pub revset: String,
    /// Fail instead of waiting when a PR is not mergeable
    pub no_wait: bool,
    /// Remote override
    pub remote: Option<String>,
    /// Skip the confirmation prompt
    pub yes: bool,
    /// Poll interval override, in seconds
    pub poll_interval_secs: Option<u64>,
    /// Stale-branch retry cap override
    pub max_stale_retries: Option<u32>,
    /// Merge method override
    pub merge_method: Option<MergeMethod>,
}

/// Run the land command
pub async fn run_land(path: &Path, options: LandOptions, cancel: CancellationToken) -> Result<i32> {
    let ctx = CommandContext::new(path, options.remote.as_deref()).await?;

    let mut config = ctx.config.clone();
    if let Some(secs) = options.poll_interval_secs {
        config.poll_interval_secs = secs;
    }
    if let Some(retries) = options.max_stale_retries {
        config.max_stale_retries = Some(retries);
    }
    if let Some(method) = options.merge_method {
        config.merge_method = method;
    }
    info!(
        workspace = %ctx.workspace_root.display(),
        remote = %ctx.remote_name,
        revset = %options.revset,
        ?config,
        "starting merge run"
    );

    let mut machine = MergeMachine::new(
        options.revset,
        MachineOptions {
            no_wait: options.no_wait,
            poll_interval: config.poll_interval(),
            max_stale_retries: config.max_stale_retries,
        },
    );
    let backend: Arc<dyn VcsBackend> = ctx.backend.clone();
    let platform: Arc<dyn PlatformService> = ctx.platform.clone();
    let runner = MergeRunner::new(backend, platform, cancel)
        .with_merge_method(config.merge_method)
        .with_auto_confirm(options.yes);

    let view = ViewOptions::new(ctx.platform_config.clone()).with_width(terminal_width());
    let progress = CliProgress::new(view);
    let summary = runner.run(&mut machine, &progress).await;

    Ok(exit_code(&summary))
}

/// Map a run summary to the process exit status
pub const fn exit_code(summary: &RunSummary) -> i32 {
    match &summary.error {
        None => EXIT_SUCCESS,
        Some(Error::Cancelled) => EXIT_INTERRUPTED,
        Some(_) => EXIT_FAILURE,
    }
}

/// Terminal width from `COLUMNS`; 0 when unknown
fn terminal_width() -> usize {
    std::env::var("COLUMNS")
        .ok()
        .and_then(|c| c.trim().parse().ok())
        .unwrap_or(0)
}
