//! Terminal progress for merge runs

use crate::cli::style::{Stylize, spinner_style};
use anstream::{eprintln, print};
use async_trait::async_trait;
use dialoguer::Confirm;
use indicatif::ProgressBar;
use jj_land::merge::{
    MergeProgress, MergeSnapshot, Phase, ViewOptions, activity, render_stack, summary,
};
use std::sync::Mutex;
use std::time::Duration;

/// Draws the stack with a spinner while work is in flight, and prints the
/// stack plus a summary at confirmation and at the end
pub struct CliProgress {
    options: ViewOptions,
    bar: Mutex<Option<ProgressBar>>,
}

impl CliProgress {
    /// Create progress output for `options`
    pub const fn new(options: ViewOptions) -> Self {
        Self {
            options,
            bar: Mutex::new(None),
        }
    }

    fn show_activity(&self, snapshot: &MergeSnapshot, activity: String) {
        let Ok(mut guard) = self.bar.lock() else {
            return;
        };
        let bar = guard.get_or_insert_with(|| {
            let bar = ProgressBar::new_spinner();
            bar.set_style(spinner_style());
            bar.enable_steady_tick(Duration::from_millis(80));
            bar
        });
        if snapshot.phase == Phase::Loading || snapshot.revisions.is_empty() {
            bar.set_prefix("");
        } else {
            bar.set_prefix(render_stack(snapshot, &self.options));
        }
        bar.set_message(activity);
    }

    fn clear(&self) {
        if let Ok(mut guard) = self.bar.lock()
            && let Some(bar) = guard.take()
        {
            bar.finish_and_clear();
        }
    }
}

#[async_trait]
impl MergeProgress for CliProgress {
    async fn on_update(&self, snapshot: &MergeSnapshot) {
        if let Some(activity) = activity(snapshot) {
            self.show_activity(snapshot, activity);
            return;
        }

        self.clear();
        let Some(summary) = summary(snapshot) else {
            return;
        };
        if snapshot.aborted {
            print!("{}", summary.muted());
            return;
        }

        if !snapshot.revisions.is_empty() {
            print!("{}", render_stack(snapshot, &self.options));
        }
        match snapshot.phase {
            Phase::Complete => print!("{}", summary.success()),
            Phase::Error => eprintln!("{}", summary.trim_end().error()),
            _ => print!("\n{summary}"),
        }
    }

    async fn confirm(&self, _snapshot: &MergeSnapshot) -> bool {
        self.clear();
        let answer = tokio::task::spawn_blocking(|| {
            Confirm::new()
                .with_prompt("Merge these PRs?")
                .default(true)
                .interact()
        })
        .await;
        matches!(answer, Ok(Ok(true)))
    }
}
