pub mod numstat;

pub use numstat::{parse_numstat, FileStat};

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, instrument};

#[derive(Debug, Error)]
pub enum VcsError {
    #[error("git I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("git {command} exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("Unexpected numstat line: {0:?}")]
    MalformedNumstat(String),
}

/// The two version-control capabilities the git-log export needs.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Clone only `branch` of `url` into a new directory under `repos_dir`.
    /// Fails when the target directory already holds a clone.
    async fn clone_branch(&self, url: &str, branch: &str, repos_dir: &Path) -> Result<(), VcsError>;

    /// Raw `--numstat` output for exactly one commit, without the message.
    async fn log_numstat(&self, repo_dir: &Path, commit: &str) -> Result<String, VcsError>;
}

/// [`VersionControl`] backed by the local `git` binary.
pub struct GitCli;

impl GitCli {
    async fn run(dir: &Path, args: &[&str]) -> Result<String, VcsError> {
        let output = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .await?;

        if !output.status.success() {
            return Err(VcsError::CommandFailed {
                command: args.first().copied().unwrap_or_default().to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

#[async_trait]
impl VersionControl for GitCli {
    #[instrument(skip(self))]
    async fn clone_branch(&self, url: &str, branch: &str, repos_dir: &Path) -> Result<(), VcsError> {
        tokio::fs::create_dir_all(repos_dir).await?;
        Self::run(repos_dir, &["clone", url, "--branch", branch, "--single-branch"]).await?;
        debug!("clone finished");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn log_numstat(&self, repo_dir: &Path, commit: &str) -> Result<String, VcsError> {
        Self::run(repo_dir, &["log", commit, "--numstat", "-1", "--format="]).await
    }
}
