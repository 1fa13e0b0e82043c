//! Mercurial queries keyed by issue id
//!
//! Provides:
//! - Changeset matching (coarse keyword search + strict verification)
//! - Changed-file listing for one or all matching commits
//! - Issue reference scanning over the whole log
//! - Diff extraction and per-file splitting
//!
//! Every public query on [`HgClient`] treats tool failures as "no data":
//! the failure is logged and an empty value is returned.

pub mod changeset;
pub mod command;
pub mod diff;
pub mod files;
pub mod matcher;
pub mod scanner;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use command::{CommandRunner, HgCommand, HgError};
pub use diff::{split_diff, FileDiff};
pub use files::merge_latest;
pub use scanner::extract_issue_ids;
pub use types::{
    Changeset, CommitRecord, FileChange, FileStatus, IssueId, MatchMode, RepoLocation, Resolution,
};

use crate::config::HgConfig;

/// `{rev}:{node|short} {desc|firstline}` per commit, one per line
pub(crate) const LOG_LINE_TEMPLATE: &str = "{rev}:{node|short} {desc|firstline}\\n";
/// Full description of a single commit
pub(crate) const DESC_TEMPLATE: &str = "{desc}";
/// Every description in the log, newline separated
pub(crate) const ALL_DESC_TEMPLATE: &str = "{desc}\\n";
/// Commit metadata, one field per line
pub(crate) const DETAIL_TEMPLATE: &str =
    "{rev}\\n{node|short}\\n{author|person}\\n{date|isodate}\\n{desc|firstline}";

/// Issue-centric view of a Mercurial repository
pub struct HgClient<R = HgCommand> {
    runner: R,
    verify_concurrency: usize,
}

impl HgClient<HgCommand> {
    pub fn from_config(config: &HgConfig) -> Self {
        Self::with_runner(HgCommand::new(config), config.verify_concurrency)
    }
}

impl<R: CommandRunner> HgClient<R> {
    pub fn with_runner(runner: R, verify_concurrency: usize) -> Self {
        Self {
            runner,
            verify_concurrency: verify_concurrency.max(1),
        }
    }

    pub(crate) async fn run(&self, args: &[&str], repo: &RepoLocation) -> Result<String, HgError> {
        self.runner.run(args, repo).await
    }
}
