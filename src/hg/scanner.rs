//! Issue reference discovery over the whole log
//!
//! Unlike [`super::matcher::IssueReference`] this pattern is permissive: it
//! recognises `#123`, `issue 123` and `issue(123)` anywhere, including inside
//! longer tokens. Results are leads, not ground truth; feed them back through
//! the matcher when precision matters.

use std::cmp::Ordering;
use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::command::CommandRunner;
use super::types::RepoLocation;
use super::{HgClient, ALL_DESC_TEMPLATE};

static ISSUE_MENTION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)issue\s*\(?\s*([0-9]+)\s*\)?|#([0-9]+)").expect("valid issue mention pattern")
});

/// Every issue number mentioned in `text`, deduplicated, ascending
pub fn extract_issue_ids(text: &str) -> Vec<String> {
    let unique: HashSet<&str> = ISSUE_MENTION
        .captures_iter(text)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)))
        .map(|m| m.as_str())
        .collect();

    let mut ids: Vec<String> = unique.into_iter().map(str::to_string).collect();
    ids.sort_by(|a, b| numeric_cmp(a, b));
    ids
}

/// Compare digit strings by value without overflowing on long input.
/// `"007"` and `"7"` are equal in value and fall back to text order.
fn numeric_cmp(a: &str, b: &str) -> Ordering {
    let a_digits = a.trim_start_matches('0');
    let b_digits = b.trim_start_matches('0');
    a_digits
        .len()
        .cmp(&b_digits.len())
        .then_with(|| a_digits.cmp(b_digits))
        .then_with(|| a.cmp(b))
}

impl<R: CommandRunner> HgClient<R> {
    /// All issue numbers referenced anywhere in the repository log
    pub async fn scan_all_issue_ids(&self, repo: &RepoLocation) -> Vec<String> {
        match self.run(&["log", "--template", ALL_DESC_TEMPLATE], repo).await {
            Ok(log) => extract_issue_ids(&log),
            Err(e) => {
                tracing::warn!(repo = %repo, "hg log failed: {}", e);
                Vec::new()
            }
        }
    }
}
