//! Value types shared by the hg queries

use serde::{Deserialize, Serialize};
use std::fmt;

use super::command::HgError;

/// Where `hg` should operate; a filesystem path in practice
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoLocation(String);

impl RepoLocation {
    pub fn new(location: &str) -> Result<Self, HgError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(HgError::EmptyLocation);
        }
        Ok(Self(location.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RepoLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Tracker issue number. Digits only, so it is safe to splice into a
/// pattern or a command line.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IssueId(String);

impl IssueId {
    /// Parse user input such as `"92520"` or `"#92520"`
    pub fn parse(input: &str) -> Result<Self, HgError> {
        let digits = input.trim().trim_start_matches('#');
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(HgError::InvalidIssueId(input.to_string()));
        }
        Ok(Self(digits.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IssueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Per-file change type, as reported by `hg status --change`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FileStatus {
    Added,
    Modified,
    Deleted,
    /// Any other code, kept verbatim for display
    Other(char),
}

impl FileStatus {
    pub fn from_code(code: char) -> Self {
        match code {
            'A' => FileStatus::Added,
            'M' => FileStatus::Modified,
            'D' => FileStatus::Deleted,
            other => FileStatus::Other(other),
        }
    }

    pub fn code(&self) -> char {
        match self {
            FileStatus::Added => 'A',
            FileStatus::Modified => 'M',
            FileStatus::Deleted => 'D',
            FileStatus::Other(c) => *c,
        }
    }

    /// Label used in report text
    pub fn label(&self) -> String {
        match self {
            FileStatus::Added => "新增".to_string(),
            FileStatus::Deleted => "删除".to_string(),
            FileStatus::Modified => "修改".to_string(),
            FileStatus::Other(c) => format!("其他({})", c),
        }
    }
}

impl From<String> for FileStatus {
    fn from(code: String) -> Self {
        code.chars()
            .next()
            .map(FileStatus::from_code)
            .unwrap_or(FileStatus::Other('?'))
    }
}

impl From<FileStatus> for String {
    fn from(status: FileStatus) -> Self {
        status.code().to_string()
    }
}

/// One changed path in one commit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub status: FileStatus,
    /// Revision of the commit that produced this entry
    pub revision: u64,
}

/// A commit as read from the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitRecord {
    pub revision: u64,
    #[serde(rename = "node")]
    pub short_hash: String,
    pub author: String,
    pub date: String,
    /// First line of the description
    pub summary: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Best-matching commit for an issue together with its files
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Changeset {
    #[serde(flatten)]
    pub commit: CommitRecord,
    pub files: Vec<FileChange>,
}

/// Which commits a query should consider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchMode {
    /// Only the most recent verified commit
    #[default]
    Latest,
    /// Every verified commit in history
    AllHistory,
}

impl MatchMode {
    pub fn from_all_history(all_history: bool) -> Self {
        if all_history {
            MatchMode::AllHistory
        } else {
            MatchMode::Latest
        }
    }
}

/// Outcome of matching an issue against the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    NotFound,
    Latest(u64),
    /// Most recent first
    All(Vec<u64>),
}

impl Resolution {
    pub fn revisions(&self) -> Vec<u64> {
        match self {
            Resolution::NotFound => Vec::new(),
            Resolution::Latest(rev) => vec![*rev],
            Resolution::All(revs) => revs.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Resolution::NotFound => true,
            Resolution::Latest(_) => false,
            Resolution::All(revs) => revs.is_empty(),
        }
    }
}
