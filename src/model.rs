use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::{RepostatError, Result};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: i64,
    pub path: String,
    pub display_name: String,
    pub remote_url: Option<String>,
    pub last_scanned_commit: Option<String>,
    pub last_scanned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub id: String,
    pub repository_id: i64,
    pub author_name: String,
    pub author_email: String,
    pub message: String,
    pub authored_at: DateTime<Utc>,
    pub branch: Option<String>,
    pub additions: u64,
    pub deletions: u64,
    pub files_changed: u64,
}

impl Commit {
    pub fn lines_changed(&self) -> u64 {
        self.additions + self.deletions
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileChange {
    pub commit_id: String,
    pub repository_id: i64,
    pub file_path: String,
    pub additions: u64,
    pub deletions: u64,
    pub is_binary: bool,
    pub diff_text: String,
}

/// A commit together with every file it touched, the unit of an atomic write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitDetail {
    pub commit: Commit,
    pub file_changes: Vec<FileChange>,
}

impl CommitDetail {
    /// Builds the commit-level totals from the file rows so they are always
    /// the exact sums.
    pub fn from_parts(mut commit: Commit, file_changes: Vec<FileChange>) -> Self {
        commit.additions = file_changes.iter().map(|f| f.additions).sum();
        commit.deletions = file_changes.iter().map(|f| f.deletions).sum();
        commit.files_changed = file_changes.len() as u64;
        Self {
            commit,
            file_changes,
        }
    }
}

/// Per-file statistics without the diff text, used by the read side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatRow {
    pub file_path: String,
    pub additions: u64,
    pub deletions: u64,
    pub authored_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "bound")]
pub enum ScanMode {
    Incremental,
    Forced,
    RecentBound(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "message")]
pub enum ScanState {
    Idle,
    Scanning,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub repository_id: i64,
    pub mode: ScanMode,
    pub commits_processed: usize,
    pub watermark: Option<String>,
    pub history_rewrite_detected: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new() -> Self {
        Self { since: None, until: None }
    }

    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub fn contains(&self, timestamp: &DateTime<Utc>) -> bool {
        if let Some(since) = self.since {
            if timestamp < &since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if timestamp > &until {
                return false;
            }
        }
        true
    }
}

/// Selection applied to every read-side query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsFilter {
    #[serde(default)]
    pub date_range: DateRange,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub exclude_authors: Vec<String>,
    #[serde(default)]
    pub repository_id: Option<i64>,
}

impl StatsFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    pub fn excluding(mut self, author: impl Into<String>) -> Self {
        self.exclude_authors.push(author.into());
        self
    }

    pub fn for_repository(mut self, repository_id: i64) -> Self {
        self.repository_id = Some(repository_id);
        self
    }

    pub fn within(mut self, date_range: DateRange) -> Self {
        self.date_range = date_range;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if let (Some(since), Some(until)) = (self.date_range.since, self.date_range.until) {
            if since > until {
                return Err(RepostatError::InvalidFilter(format!(
                    "since ({since}) is after until ({until})"
                )));
            }
        }
        if matches!(self.author.as_deref(), Some(a) if a.trim().is_empty()) {
            return Err(RepostatError::InvalidFilter("author must not be empty".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeTotals {
    pub commits: u64,
    pub additions: u64,
    pub deletions: u64,
}

impl ChangeTotals {
    pub fn add(&mut self, commit: &Commit) {
        self.commits += 1;
        self.additions += commit.additions;
        self.deletions += commit.deletions;
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyBucket {
    pub hour: u32,
    #[serde(flatten)]
    pub totals: ChangeTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyBucket {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub totals: ChangeTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayBucket {
    /// 0 = Sunday .. 6 = Saturday
    pub weekday: u32,
    #[serde(flatten)]
    pub totals: ChangeTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryTotals {
    pub display_name: String,
    #[serde(flatten)]
    pub totals: ChangeTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DensityCell {
    pub hour: u32,
    pub weekday: u32,
    pub commits: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorTrendPoint {
    pub author: String,
    /// `YYYY-MM`
    pub period: String,
    #[serde(flatten)]
    pub totals: ChangeTotals,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCommitCount {
    pub date: NaiveDate,
    pub commit_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeClass {
    Small,
    Medium,
    Large,
    Huge,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeBucket {
    pub size_class: SizeClass,
    pub count: u64,
    pub min_lines: u64,
    pub max_lines: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EfficiencyPoint {
    pub date: NaiveDate,
    pub efficiency_ratio: f64,
    pub total_changes: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HotFile {
    pub file_path: String,
    pub change_count: u64,
    pub total_additions: u64,
    pub total_deletions: u64,
    pub last_modified: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageWord {
    pub word: String,
    pub count: u64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateBundle {
    pub total_commits: u64,
    pub total_additions: u64,
    pub total_deletions: u64,
    pub total_files_changed: u64,
    pub author_count: u64,
    pub hourly: Vec<HourlyBucket>,
    pub daily: Vec<DailyBucket>,
    pub weekly: Vec<WeekdayBucket>,
    pub authors: BTreeMap<String, ChangeTotals>,
    pub repositories: BTreeMap<i64, RepositoryTotals>,
    pub hourly_density: Vec<DensityCell>,
    pub author_trends: Vec<AuthorTrendPoint>,
    pub daily_commit_counts: Vec<DailyCommitCount>,
    pub commit_sizes: Vec<SizeBucket>,
    pub efficiency: Vec<EfficiencyPoint>,
    pub hot_files: Vec<HotFile>,
    pub message_words: Vec<MessageWord>,
}
