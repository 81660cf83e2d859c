//! Read-side statistics. Everything here is a pure function of the stored
//! rows selected by a filter; nothing is persisted.

pub mod aggregate;
pub mod words;

use crate::config::EngineConfig;
use crate::model::{AggregateBundle, Commit, FileStatRow, Repository, StatsFilter};

#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    pub hot_file_limit: usize,
    pub word_limit: usize,
    pub min_word_length: usize,
}

impl From<&EngineConfig> for AggregateOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            hot_file_limit: config.hot_file_limit,
            word_limit: config.word_limit,
            min_word_length: config.min_word_length,
        }
    }
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

/// Computes every aggregate view over `commits` (and their `files`).
/// `repositories` are the repositories in scope of the filter.
pub fn compute(
    commits: &[Commit],
    files: &[FileStatRow],
    repositories: &[Repository],
    filter: &StatsFilter,
    options: &AggregateOptions,
) -> AggregateBundle {
    let daily = aggregate::daily(commits, aggregate::day_span(commits, filter));
    let authors = aggregate::authors(commits);

    AggregateBundle {
        total_commits: commits.len() as u64,
        total_additions: commits.iter().map(|c| c.additions).sum(),
        total_deletions: commits.iter().map(|c| c.deletions).sum(),
        total_files_changed: commits.iter().map(|c| c.files_changed).sum(),
        author_count: authors.len() as u64,
        hourly: aggregate::hourly(commits),
        weekly: aggregate::weekly(commits),
        daily_commit_counts: aggregate::daily_commit_counts(&daily),
        efficiency: aggregate::efficiency(&daily),
        daily,
        authors,
        repositories: aggregate::repositories(commits, repositories),
        hourly_density: aggregate::hourly_density(commits),
        author_trends: aggregate::author_trends(commits),
        commit_sizes: aggregate::commit_sizes(commits),
        hot_files: aggregate::hot_files(files, options.hot_file_limit),
        message_words: words::top_words(commits, options.word_limit, options.min_word_length),
    }
}
