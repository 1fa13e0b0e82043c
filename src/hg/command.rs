//! Mercurial command execution

use std::future::Future;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use super::types::RepoLocation;
use crate::config::HgConfig;

/// Errors raised while talking to the `hg` client
#[derive(Debug, thiserror::Error)]
pub enum HgError {
    #[error("repository location is empty")]
    EmptyLocation,

    #[error("invalid issue id '{0}': expected digits only")]
    InvalidIssueId(String),

    #[error("failed to spawn hg: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("hg exited with {code:?}: {stderr}")]
    Exit { code: Option<i32>, stderr: String },

    #[error("hg did not finish within {0}s")]
    Timeout(u64),
}

/// Something that can run an `hg` subcommand inside a repository.
///
/// The production implementation is [`HgCommand`]; tests substitute a
/// scripted runner so matching logic can be checked without a repository.
pub trait CommandRunner: Send + Sync {
    fn run(
        &self,
        args: &[&str],
        repo: &RepoLocation,
    ) -> impl Future<Output = Result<String, HgError>> + Send;
}

/// Runs the real `hg` binary
#[derive(Debug, Clone)]
pub struct HgCommand {
    binary: String,
    timeout: Duration,
}

impl HgCommand {
    pub fn new(config: &HgConfig) -> Self {
        Self {
            binary: config.binary.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }
}

impl CommandRunner for HgCommand {
    fn run(
        &self,
        args: &[&str],
        repo: &RepoLocation,
    ) -> impl Future<Output = Result<String, HgError>> + Send {
        let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
        let repo = repo.as_str().to_string();
        let binary = self.binary.clone();
        let timeout = self.timeout;

        async move {
            tracing::debug!(repo = %repo, "hg {}", args.join(" "));

            let mut cmd = Command::new(&binary);
            cmd.arg("--cwd")
                .arg(&repo)
                .args(&args)
                // Plain mode: no aliases, no localized or decorated output
                .env("HGPLAIN", "1")
                .env("HGENCODING", "utf-8")
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .kill_on_drop(true);

            let child = cmd.spawn()?;
            let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
                Ok(output) => output?,
                Err(_) => return Err(HgError::Timeout(timeout.as_secs())),
            };

            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

            if !output.status.success() {
                return Err(HgError::Exit {
                    code: output.status.code(),
                    stderr: stderr.trim().to_string(),
                });
            }

            // hg sometimes reports informational text on stderr only
            if stdout.is_empty() {
                Ok(stderr)
            } else {
                Ok(stdout)
            }
        }
    }
}
