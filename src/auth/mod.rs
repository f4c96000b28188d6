//! Authentication for GitHub
//!
//! Supports CLI-based auth (gh) and environment variables.

mod github;

pub use github::{GitHubAuthConfig, get_github_auth, token_from_env};

/// Source of authentication token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthSource {
    /// Token from CLI tool (gh)
    Cli,
    /// Token from environment variable
    EnvVar,
}
