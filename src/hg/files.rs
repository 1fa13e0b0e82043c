//! Changed-file extraction

use std::collections::HashMap;

use super::command::{CommandRunner, HgError};
use super::types::{FileChange, FileStatus, IssueId, MatchMode, RepoLocation};
use super::HgClient;

/// Parse `hg status --change` output: status code in column 0, path from
/// column 2 onwards
pub fn parse_status_lines(output: &str, revision: u64) -> Vec<FileChange> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let code = line.chars().next()?;
            let path = line.get(2..)?.trim();
            if path.is_empty() {
                return None;
            }
            Some(FileChange {
                path: path.to_string(),
                status: FileStatus::from_code(code),
                revision,
            })
        })
        .collect()
}

/// Collapse changes from several commits to one entry per path, keeping the
/// entry from the highest revision. Result is sorted by path.
pub fn merge_latest(changes: impl IntoIterator<Item = FileChange>) -> Vec<FileChange> {
    let by_path = changes
        .into_iter()
        .fold(HashMap::<String, FileChange>::new(), |mut acc, change| {
            match acc.get(&change.path) {
                Some(existing) if existing.revision >= change.revision => {}
                _ => {
                    acc.insert(change.path.clone(), change);
                }
            }
            acc
        });

    let mut merged: Vec<FileChange> = by_path.into_values().collect();
    merged.sort_by(|a, b| a.path.cmp(&b.path));
    merged
}

impl<R: CommandRunner> HgClient<R> {
    /// Files touched by the most recent commit referencing `issue`
    pub async fn files_for_latest_match(&self, issue: &IssueId, repo: &RepoLocation) -> Vec<FileChange> {
        let Some(revision) = self.find_best_match(issue, repo).await else {
            return Vec::new();
        };

        match self.files_at(revision, repo).await {
            Ok(files) => files,
            Err(e) => {
                tracing::warn!(issue = %issue, revision, "hg status failed: {}", e);
                Vec::new()
            }
        }
    }

    /// Files touched by any commit referencing `issue`, newest status per path
    pub async fn files_for_all_matches(&self, issue: &IssueId, repo: &RepoLocation) -> Vec<FileChange> {
        let revisions = self.find_all_matches(issue, repo).await;
        if revisions.is_empty() {
            return Vec::new();
        }

        let mut all = Vec::new();
        for revision in revisions {
            match self.files_at(revision, repo).await {
                Ok(files) => all.extend(files),
                Err(e) => {
                    tracing::warn!(issue = %issue, revision, "hg status failed: {}", e);
                    return Vec::new();
                }
            }
        }

        merge_latest(all)
    }

    pub async fn files(&self, issue: &IssueId, repo: &RepoLocation, mode: MatchMode) -> Vec<FileChange> {
        match mode {
            MatchMode::Latest => self.files_for_latest_match(issue, repo).await,
            MatchMode::AllHistory => self.files_for_all_matches(issue, repo).await,
        }
    }

    pub(crate) async fn files_at(&self, revision: u64, repo: &RepoLocation) -> Result<Vec<FileChange>, HgError> {
        let rev = revision.to_string();
        let output = self.run(&["status", "--change", rev.as_str()], repo).await?;
        Ok(parse_status_lines(&output, revision))
    }
}
