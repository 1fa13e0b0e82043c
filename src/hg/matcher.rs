//! Changeset matching
//!
//! Resolution runs in two passes. `hg log --keyword` is a cheap, high-recall
//! filter: searching for `100` also returns commits mentioning `9100` or
//! `1005`. Each candidate's full description is then checked against a
//! strict pattern that only accepts the issue number as a whole token.

use futures::future::join_all;
use once_cell::sync::Lazy;
use regex::Regex;

use super::command::{CommandRunner, HgError};
use super::types::{IssueId, MatchMode, RepoLocation, Resolution};
use super::{HgClient, DESC_TEMPLATE, LOG_LINE_TEMPLATE};

static LOG_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+):([0-9a-f]+)(?: (.*))?$").expect("valid log line pattern"));

/// A commit returned by the keyword search, before verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub revision: u64,
    pub short_hash: String,
    pub summary: String,
}

/// Parse `{rev}:{node|short} {desc|firstline}` lines, skipping anything else
pub fn parse_log_lines(output: &str) -> Vec<Candidate> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let caps = LOG_LINE.captures(line.trim_end());
            let Some(caps) = caps else {
                tracing::debug!("skipping unparseable log line: {:?}", line);
                return None;
            };
            let revision = caps[1].parse().ok()?;
            Some(Candidate {
                revision,
                short_hash: caps[2].to_string(),
                summary: caps.get(3).map_or("", |m| m.as_str()).to_string(),
            })
        })
        .collect()
}

/// Strict whole-token matcher for one issue number.
///
/// Accepts `#520`, `issue 520`, `Issue(520)`, `520 & 92380`, `修复520。`;
/// rejects `92520`, `52098`, `v1.5200`.
#[derive(Debug, Clone)]
pub struct IssueReference {
    pattern: Regex,
}

impl IssueReference {
    pub fn new(issue: &IssueId) -> Self {
        // The id must not sit inside a longer word or number on the left, and
        // must not be followed by another digit on the right.
        let pattern = format!(
            r"(?i)(?:^|[^0-9A-Za-z_])(?:#|issue\s*\(?\s*)?{}(?:[^0-9]|$)",
            regex::escape(issue.as_str())
        );
        Self {
            pattern: Regex::new(&pattern).expect("issue ids are digits only"),
        }
    }

    pub fn is_referenced_in(&self, message: &str) -> bool {
        self.pattern.is_match(message)
    }
}

impl<R: CommandRunner> HgClient<R> {
    /// Most recent commit whose description references `issue`
    pub async fn find_best_match(&self, issue: &IssueId, repo: &RepoLocation) -> Option<u64> {
        let candidates = match self.candidates(issue, repo).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(issue = %issue, repo = %repo, "keyword search failed: {}", e);
                return None;
            }
        };

        let reference = IssueReference::new(issue);
        for candidate in candidates {
            if self.verify(&reference, candidate.revision, repo).await {
                return Some(candidate.revision);
            }
        }

        tracing::debug!(issue = %issue, repo = %repo, "no verified changeset");
        None
    }

    /// Every commit referencing `issue`, most recent first
    pub async fn find_all_matches(&self, issue: &IssueId, repo: &RepoLocation) -> Vec<u64> {
        let candidates = match self.candidates(issue, repo).await {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(issue = %issue, repo = %repo, "keyword search failed: {}", e);
                return Vec::new();
            }
        };

        // Verify in bounded batches; join_all keeps results in log order
        let reference = IssueReference::new(issue);
        let mut verified = Vec::new();
        for batch in candidates.chunks(self.verify_concurrency) {
            let checks = join_all(
                batch
                    .iter()
                    .map(|candidate| self.verify(&reference, candidate.revision, repo)),
            )
            .await;
            verified.extend(
                batch
                    .iter()
                    .zip(checks)
                    .filter(|(_, ok)| *ok)
                    .map(|(candidate, _)| candidate.revision),
            );
        }

        verified
    }

    pub async fn resolve(&self, issue: &IssueId, repo: &RepoLocation, mode: MatchMode) -> Resolution {
        match mode {
            MatchMode::Latest => match self.find_best_match(issue, repo).await {
                Some(rev) => Resolution::Latest(rev),
                None => Resolution::NotFound,
            },
            MatchMode::AllHistory => {
                let revs = self.find_all_matches(issue, repo).await;
                if revs.is_empty() {
                    Resolution::NotFound
                } else {
                    Resolution::All(revs)
                }
            }
        }
    }

    async fn candidates(&self, issue: &IssueId, repo: &RepoLocation) -> Result<Vec<Candidate>, HgError> {
        let output = self
            .run(
                &["log", "--keyword", issue.as_str(), "--template", LOG_LINE_TEMPLATE],
                repo,
            )
            .await?;
        Ok(parse_log_lines(&output))
    }

    /// Fetch the full description and check it. Fetch failures count as
    /// "not referenced".
    async fn verify(&self, reference: &IssueReference, revision: u64, repo: &RepoLocation) -> bool {
        let rev = revision.to_string();
        match self.run(&["log", "-r", rev.as_str(), "--template", DESC_TEMPLATE], repo).await {
            Ok(desc) => reference.is_referenced_in(desc.trim()),
            Err(e) => {
                tracing::debug!(revision, "could not read description: {}", e);
                false
            }
        }
    }
}
