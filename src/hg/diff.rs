//! Diff extraction for the latest matching changeset

use serde::Serialize;

use super::command::CommandRunner;
use super::types::{IssueId, RepoLocation};
use super::HgClient;

/// The part of a multi-file diff that belongs to one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileDiff {
    pub filename: String,
    pub content: String,
}

/// Per-file header filename, or `None` if `line` is not a header.
///
/// Plain hg writes `diff -r 1a2b3c -r 4d5e6f path/to/file`; with git-style
/// diffs enabled it writes `diff --git a/path b/path`.
fn header_filename(line: &str) -> Option<String> {
    if line.starts_with("diff --git ") {
        let last = line.split_whitespace().last()?;
        Some(last.strip_prefix("b/").unwrap_or(last).to_string())
    } else if line.starts_with("diff -r ") {
        line.split_whitespace().last().map(str::to_string)
    } else {
        None
    }
}

/// Split a multi-file diff into per-file segments, header line included.
/// Text before the first header is dropped.
pub fn split_diff(diff: &str) -> Vec<FileDiff> {
    let mut files = Vec::new();
    let mut current: Option<FileDiff> = None;

    for line in diff.lines() {
        if let Some(filename) = header_filename(line) {
            if let Some(mut done) = current.take() {
                done.content = done.content.trim().to_string();
                files.push(done);
            }
            current = Some(FileDiff {
                filename,
                content: format!("{}\n", line),
            });
        } else if let Some(file) = current.as_mut() {
            file.content.push_str(line);
            file.content.push('\n');
        }
    }

    if let Some(mut done) = current {
        done.content = done.content.trim().to_string();
        files.push(done);
    }

    files
}

impl<R: CommandRunner> HgClient<R> {
    /// Unified diff of the most recent commit referencing `issue`, or an
    /// empty string
    pub async fn diff_for_latest_match(&self, issue: &IssueId, repo: &RepoLocation) -> String {
        let Some(revision) = self.find_best_match(issue, repo).await else {
            return String::new();
        };

        let rev = revision.to_string();
        match self.run(&["diff", "-c", rev.as_str()], repo).await {
            Ok(diff) => diff,
            Err(e) => {
                tracing::warn!(issue = %issue, revision, "hg diff failed: {}", e);
                String::new()
            }
        }
    }
}
