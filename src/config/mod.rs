//! Layered configuration
//!
//! Settings come from, in increasing priority: built-in defaults, the user
//! config file, the repository config file in `.jj/repo/land/`, and finally
//! command-line flags (applied by the caller).

mod storage;

pub use storage::{load_config, repo_config_path, user_config_path};

use crate::types::MergeMethod;
use serde::Deserialize;
use std::time::Duration;

/// Default delay between mergeability polls
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

/// Effective configuration for a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LandConfig {
    /// Remote to fetch from and push to (None = auto-select)
    pub remote: Option<String>,
    /// Seconds between mergeability polls
    pub poll_interval_secs: u64,
    /// Merge method passed to the platform
    pub merge_method: MergeMethod,
    /// Cap on resyncs after stale-branch merge failures (None = unbounded)
    pub max_stale_retries: Option<u32>,
}

impl Default for LandConfig {
    fn default() -> Self {
        Self {
            remote: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            merge_method: MergeMethod::default(),
            max_stale_retries: None,
        }
    }
}

impl LandConfig {
    /// Delay between mergeability polls
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Overlay the values set in `file`
    pub fn apply(&mut self, file: ConfigFile) {
        if let Some(remote) = file.remote {
            self.remote = Some(remote);
        }
        if let Some(secs) = file.poll_interval_secs {
            self.poll_interval_secs = secs;
        }
        if let Some(method) = file.merge_method {
            self.merge_method = method;
        }
        if let Some(retries) = file.max_stale_retries {
            self.max_stale_retries = Some(retries);
        }
    }
}

/// One config file's contents; unset keys leave lower layers untouched
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    /// Remote name
    pub remote: Option<String>,
    /// Seconds between mergeability polls
    pub poll_interval_secs: Option<u64>,
    /// Merge method ("merge", "squash" or "rebase")
    pub merge_method: Option<MergeMethod>,
    /// Cap on stale-branch resyncs
    pub max_stale_retries: Option<u32>,
}
