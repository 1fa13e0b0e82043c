//! hgtrace - issue-to-changeset lookups for Mercurial repositories
//!
//! A small backend for the bug-report and weekly-report workflow:
//! - Resolve a tracker issue id to the changesets that reference it
//! - List changed files (latest commit or merged across history)
//! - Extract diffs and every issue id mentioned in the log
//! - Draft modification notes through an LLM
//! - Serve all of the above over HTTP for the browser extension

pub mod config;
pub mod hg;
pub mod llm;
pub mod report;
pub mod server;

pub use config::Config;
pub use hg::{FileChange, FileStatus, HgClient, IssueId, MatchMode, RepoLocation};
pub use report::{file_changes_summary, ReportPeriod};
