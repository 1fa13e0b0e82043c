//! In-memory stand-in for the `hg` client used by unit tests

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::command::{CommandRunner, HgError};
use super::types::RepoLocation;
use super::{ALL_DESC_TEMPLATE, DESC_TEMPLATE, DETAIL_TEMPLATE, LOG_LINE_TEMPLATE};

pub(crate) struct FakeCommit {
    pub rev: u64,
    pub hash: String,
    pub author: String,
    pub date: String,
    pub desc: String,
    pub files: Vec<(char, String)>,
    pub diff: String,
}

/// Answers the handful of `hg` invocations the client issues, from a fixed
/// list of commits. Unknown invocations fail like a bad hg command would.
#[derive(Default)]
pub(crate) struct FakeRepo {
    commits: Vec<FakeCommit>,
    broken: bool,
    calls: AtomicUsize,
}

impl FakeRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository whose every command fails
    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::default()
        }
    }

    pub fn commit(mut self, rev: u64, desc: &str, files: &[(char, &str)]) -> Self {
        self.commits.push(FakeCommit {
            rev,
            hash: format!("{:012x}", 0xabc000 + rev),
            author: "Zhang Wei".to_string(),
            date: format!("2024-03-{:02} 10:00 +0800", (rev % 28) + 1),
            desc: desc.to_string(),
            files: files.iter().map(|(c, p)| (*c, p.to_string())).collect(),
            diff: String::new(),
        });
        self
    }

    pub fn with_diff(mut self, rev: u64, diff: &str) -> Self {
        if let Some(commit) = self.commits.iter_mut().find(|c| c.rev == rev) {
            commit.diff = diff.to_string();
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Newest first, like `hg log`
    fn log_order(&self) -> Vec<&FakeCommit> {
        let mut commits: Vec<&FakeCommit> = self.commits.iter().collect();
        commits.sort_by(|a, b| b.rev.cmp(&a.rev));
        commits
    }

    fn find(&self, rev: &str) -> Result<&FakeCommit, HgError> {
        rev.parse::<u64>()
            .ok()
            .and_then(|rev| self.commits.iter().find(|c| c.rev == rev))
            .ok_or_else(|| HgError::Exit {
                code: Some(255),
                stderr: format!("abort: unknown revision '{}'!", rev),
            })
    }

    fn answer(&self, args: &[&str]) -> Result<String, HgError> {
        if self.broken {
            return Err(HgError::Exit {
                code: Some(255),
                stderr: "abort: repository not found!".to_string(),
            });
        }

        match args {
            ["log", "--keyword", keyword, "--template", t] if *t == LOG_LINE_TEMPLATE => {
                let keyword = keyword.to_lowercase();
                Ok(self
                    .log_order()
                    .into_iter()
                    .filter(|c| c.desc.to_lowercase().contains(&keyword))
                    .map(|c| {
                        let first = c.desc.lines().next().unwrap_or("");
                        format!("{}:{} {}\n", c.rev, c.hash, first)
                    })
                    .collect())
            }
            ["log", "-r", rev, "--template", t] if *t == DESC_TEMPLATE => {
                Ok(self.find(rev)?.desc.clone())
            }
            ["log", "-r", rev, "--template", t] if *t == DETAIL_TEMPLATE => {
                let c = self.find(rev)?;
                Ok(format!(
                    "{}\n{}\n{}\n{}\n{}",
                    c.rev,
                    c.hash,
                    c.author,
                    c.date,
                    c.desc.lines().next().unwrap_or("")
                ))
            }
            ["log", "--template", t] if *t == ALL_DESC_TEMPLATE => Ok(self
                .log_order()
                .into_iter()
                .map(|c| format!("{}\n", c.desc))
                .collect()),
            ["status", "--change", rev] => Ok(self
                .find(rev)?
                .files
                .iter()
                .map(|(code, path)| format!("{} {}\n", code, path))
                .collect()),
            ["diff", "-c", rev] => Ok(self.find(rev)?.diff.clone()),
            _ => Err(HgError::Exit {
                code: Some(255),
                stderr: format!("hg: unknown command '{}'", args.join(" ")),
            }),
        }
    }
}

impl CommandRunner for FakeRepo {
    fn run(
        &self,
        args: &[&str],
        _repo: &RepoLocation,
    ) -> impl Future<Output = Result<String, HgError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::future::ready(self.answer(args))
    }
}
