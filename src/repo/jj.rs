//! `jj` CLI backend
//!
//! Shells out to the `jj` binary in the workspace root. Every invocation
//! runs with `--color=never` so output can be parsed.

use super::VcsBackend;
use crate::error::{Error, Result};
use crate::types::{Change, GitRemote, RebaseOutcome, StackRead};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// jj's built-in template for branch names created by `jj git push --change`
const DEFAULT_PUSH_BOOKMARK_TEMPLATE: &str = r#""push-" ++ change_id.short()"#;

/// Log template emitting one JSON object per change. The push-bookmark
/// template is spliced between the prefix and suffix.
const LOG_TEMPLATE_PREFIX: &str = r#""{\"change_id\":\"" ++ change_id ++ "\",\"short_id\":\"" ++ change_id.shortest() ++ "\",\"commit_id\":\"" ++ commit_id ++ "\",\"immutable\":" ++ if(immutable, "true", "false") ++ ",\"description\":" ++ json(description) ++ ",\"bookmark\":" ++ json(stringify("#;
const LOG_TEMPLATE_SUFFIX: &str = r#")) ++ ",\"parents\":[" ++ parents.map(|p| "\"" ++ p.change_id() ++ "\"").join(",") ++ "]}\n""#;

/// Template for the trunk commit: change id, then its remote bookmark names
const TRUNK_TEMPLATE: &str =
    r#"change_id ++ "\n" ++ remote_bookmarks.map(|b| b.name()).join("\n") ++ "\n""#;

/// Fallback trunk name when `trunk()` has no remote bookmark
const DEFAULT_TRUNK_NAME: &str = "main";

/// Backend driving the `jj` binary
#[derive(Debug, Clone)]
pub struct JjCli {
    workspace_root: PathBuf,
    remote: String,
}

impl JjCli {
    /// Create a backend for the workspace at `workspace_root`, pushing to
    /// and fetching from `remote`
    pub fn new(workspace_root: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        Self {
            workspace_root: workspace_root.into(),
            remote: remote.into(),
        }
    }

    /// Find the root of the jj workspace containing `path`
    pub async fn discover(path: &Path) -> Result<PathBuf> {
        let output = Command::new("jj")
            .args(["--color=never", "root"])
            .current_dir(path)
            .output()
            .await
            .map_err(|e| Error::Jj(format!("failed to run jj: {e}")))?;

        if !output.status.success() {
            return Err(Error::Jj(format!(
                "{} is not in a jj workspace: {}",
                path.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(PathBuf::from(String::from_utf8_lossy(&output.stdout).trim()))
    }

    /// Use `remote` for fetch and push
    #[must_use]
    pub fn with_remote(mut self, remote: impl Into<String>) -> Self {
        self.remote = remote.into();
        self
    }

    /// Workspace root this backend operates in
    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Remote name used for fetch and push
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Run `jj` with `args`, returning stdout on success
    async fn run(&self, args: &[&str]) -> Result<String> {
        debug!(?args, "running jj");
        let output = Command::new("jj")
            .arg("--color=never")
            .args(args)
            .current_dir(&self.workspace_root)
            .output()
            .await
            .map_err(|e| Error::Jj(format!("failed to run jj: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::Jj(format!(
                "`jj {}` failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn push_bookmark_template(&self) -> String {
        match self.run(&["config", "get", "templates.git_push_bookmark"]).await {
            Ok(out) if !out.trim().is_empty() => out.trim().to_string(),
            Ok(_) | Err(_) => {
                debug!("templates.git_push_bookmark not set, using jj default");
                DEFAULT_PUSH_BOOKMARK_TEMPLATE.to_string()
            }
        }
    }

    async fn trunk_info(&self) -> Result<(String, String)> {
        let out = self
            .run(&["log", "--no-graph", "-r", "trunk()", "-T", TRUNK_TEMPLATE])
            .await?;
        Ok(parse_trunk_output(&out))
    }
}

/// Revset selecting the mutable stack below `selector`, without an empty
/// undescribed working-copy commit on top
fn stack_revset(selector: &str) -> String {
    format!(r#"(trunk()..({selector})) ~ (empty() & description(exact:""))"#)
}

/// Parse newline-delimited JSON changes from the log template
fn parse_changes(output: &str) -> Result<Vec<Change>> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(Error::from))
        .collect()
}

/// Parse the trunk template output into `(change_id, trunk_name)`
fn parse_trunk_output(output: &str) -> (String, String) {
    let mut lines = output.lines().map(str::trim).filter(|l| !l.is_empty());
    let change_id = lines.next().unwrap_or_default().to_string();
    let name = lines.next().unwrap_or(DEFAULT_TRUNK_NAME).to_string();
    (change_id, name)
}

/// Parse `jj git remote list` output ("name url" per line)
fn parse_remotes(output: &str) -> Vec<GitRemote> {
    output
        .lines()
        .filter_map(|line| {
            let (name, url) = line.trim().split_once(char::is_whitespace)?;
            Some(GitRemote {
                name: name.to_string(),
                url: url.trim().to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl VcsBackend for JjCli {
    async fn fetch_remote(&self) -> Result<()> {
        debug!(remote = %self.remote, "fetching");
        self.run(&["git", "fetch", "--remote", &self.remote]).await?;
        Ok(())
    }

    async fn read_stack(&self, selector: &str) -> Result<StackRead> {
        let bookmark_template = self.push_bookmark_template().await;
        let template = format!("{LOG_TEMPLATE_PREFIX}{bookmark_template}{LOG_TEMPLATE_SUFFIX}");
        let revset = stack_revset(selector);

        let out = self
            .run(&["log", "--no-graph", "-r", &revset, "-T", &template])
            .await?;
        let changes: Vec<Change> = parse_changes(&out)?
            .into_iter()
            .filter(|c| !c.immutable)
            .collect();

        let (trunk_change_id, trunk_name) = self.trunk_info().await?;
        debug!(count = changes.len(), %trunk_name, "read stack");

        Ok(StackRead {
            changes,
            trunk_name,
            trunk_change_id,
        })
    }

    async fn rebase(&self, change_id: &str, onto: &str) -> Result<RebaseOutcome> {
        debug!(change_id, onto, "rebasing");
        self.run(&["rebase", "-s", change_id, "-d", onto]).await?;

        let conflicted_revset = format!("({change_id}):: & conflicts()");
        let out = self
            .run(&["log", "--no-graph", "-r", &conflicted_revset, "-T", r#"change_id ++ "\n""#])
            .await?;

        if out.trim().is_empty() {
            Ok(RebaseOutcome::Clean)
        } else {
            debug!(change_id, "rebase left conflicts");
            Ok(RebaseOutcome::Conflicted)
        }
    }

    async fn push_branch(&self, change_id: &str) -> Result<()> {
        debug!(change_id, remote = %self.remote, "pushing");
        self.run(&["git", "push", "--remote", &self.remote, "--change", change_id])
            .await?;
        Ok(())
    }

    async fn remotes(&self) -> Result<Vec<GitRemote>> {
        let out = self.run(&["git", "remote", "list"]).await?;
        Ok(parse_remotes(&out))
    }
}
