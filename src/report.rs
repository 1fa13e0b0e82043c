//! Helpers shared by the bug report and the weekly report

use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::Serialize;

use crate::hg::{FileChange, FileStatus};

/// A weekly reporting period: Thursday through the following Wednesday
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl ReportPeriod {
    /// The period that `date` falls in
    pub fn containing(date: NaiveDate) -> Self {
        // Thursday is 3 days from Monday
        let since_thursday = (date.weekday().num_days_from_monday() + 7 - 3) % 7;
        let start = date - Duration::days(since_thursday as i64);
        Self {
            start,
            end: start + Duration::days(6),
        }
    }

    pub fn current() -> Self {
        Self::containing(Local::now().date_naive())
    }

    /// `2024-03-07 ~ 2024-03-13`
    pub fn label(&self) -> String {
        format!("{} ~ {}", self.start.format("%Y-%m-%d"), self.end.format("%Y-%m-%d"))
    }

    /// Whether a tracker date (`YYYY-MM-DD`, optionally followed by a time)
    /// falls inside the period
    pub fn contains(&self, date: &str) -> bool {
        date.get(..10)
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .map(|d| d >= self.start && d <= self.end)
            .unwrap_or(false)
    }
}

/// The "modified files" cell of a bug report
pub fn file_changes_summary(files: &[FileChange]) -> String {
    if files.is_empty() {
        return "无".to_string();
    }

    files
        .iter()
        .map(|f| {
            let label = match f.status {
                FileStatus::Added => "新增",
                FileStatus::Deleted => "删除",
                _ => "修改",
            };
            format!("{}: {}", label, f.path)
        })
        .collect::<Vec<_>>()
        .join("\n")
}
