//! Full details of the changeset behind an issue

use super::command::{CommandRunner, HgError};
use super::types::{Changeset, CommitRecord, IssueId, RepoLocation};
use super::{HgClient, DESC_TEMPLATE, DETAIL_TEMPLATE};

/// Parse the five-line output of [`DETAIL_TEMPLATE`]
fn parse_detail(output: &str, revision: u64) -> CommitRecord {
    let mut lines = output.lines().map(str::trim);
    let revision = lines
        .next()
        .and_then(|l| l.parse().ok())
        .unwrap_or(revision);
    let mut next = || lines.next().unwrap_or("").to_string();

    CommitRecord {
        revision,
        short_hash: next(),
        author: next(),
        date: next(),
        summary: next(),
        message: None,
    }
}

impl<R: CommandRunner> HgClient<R> {
    /// Metadata and file list of the most recent commit referencing `issue`
    pub async fn changeset(&self, issue: &IssueId, repo: &RepoLocation) -> Option<Changeset> {
        let revision = self.find_best_match(issue, repo).await?;

        let (commit, files) = tokio::join!(self.commit_at(revision, repo), self.files_at(revision, repo));
        match (commit, files) {
            (Ok(commit), Ok(files)) => Some(Changeset { commit, files }),
            (Err(e), _) | (_, Err(e)) => {
                tracing::warn!(issue = %issue, revision, "could not read changeset: {}", e);
                None
            }
        }
    }

    async fn commit_at(&self, revision: u64, repo: &RepoLocation) -> Result<CommitRecord, HgError> {
        let rev = revision.to_string();
        let detail_args = ["log", "-r", rev.as_str(), "--template", DETAIL_TEMPLATE];
        let message_args = ["log", "-r", rev.as_str(), "--template", DESC_TEMPLATE];
        let (detail, message) = tokio::join!(
            self.run(&detail_args, repo),
            self.run(&message_args, repo),
        );

        let mut commit = parse_detail(&detail?, revision);
        commit.message = Some(message?.trim().to_string());
        Ok(commit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hg::fake::FakeRepo;
    use crate::hg::types::{FileChange, FileStatus};

    #[test]
    fn test_parse_detail() {
        let output = "17\n9f8e7d6c5b4a\nLi Na\n2024-03-07 10:00 +0800\nfix #300 crash\n";
        let commit = parse_detail(output, 17);
        assert_eq!(commit.revision, 17);
        assert_eq!(commit.short_hash, "9f8e7d6c5b4a");
        assert_eq!(commit.author, "Li Na");
        assert_eq!(commit.date, "2024-03-07 10:00 +0800");
        assert_eq!(commit.summary, "fix #300 crash");
    }

    #[test]
    fn test_parse_detail_tolerates_short_output() {
        let commit = parse_detail("", 4);
        assert_eq!(commit.revision, 4);
        assert_eq!(commit.summary, "");
    }

    #[tokio::test]
    async fn test_changeset_for_issue() {
        let fake = FakeRepo::new()
            .commit(1, "fix issue(100) login bug\n\nlong explanation", &[('A', "x.txt")])
            .commit(3, "#100 follow-up", &[('M', "x.txt"), ('D', "old.txt")]);
        let hg = HgClient::with_runner(fake, 2);
        let repo = RepoLocation::new("/srv/hg/firmware").unwrap();

        let changeset = hg
            .changeset(&IssueId::parse("100").unwrap(), &repo)
            .await
            .unwrap();
        assert_eq!(changeset.commit.revision, 3);
        assert_eq!(changeset.commit.author, "Zhang Wei");
        assert_eq!(changeset.commit.summary, "#100 follow-up");
        assert_eq!(
            changeset.files,
            vec![
                FileChange { path: "x.txt".to_string(), status: FileStatus::Modified, revision: 3 },
                FileChange { path: "old.txt".to_string(), status: FileStatus::Deleted, revision: 3 },
            ]
        );

        let json = serde_json::to_value(&changeset).unwrap();
        assert_eq!(json["revision"], 3);
        assert_eq!(json["node"], changeset.commit.short_hash.as_str());
        assert_eq!(json["message"], "#100 follow-up");
    }

    #[tokio::test]
    async fn test_changeset_not_found() {
        let hg = HgClient::with_runner(FakeRepo::new(), 2);
        let repo = RepoLocation::new("/srv/hg/firmware").unwrap();
        assert!(hg.changeset(&IssueId::parse("1").unwrap(), &repo).await.is_none());
    }
}
