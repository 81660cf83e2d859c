use crate::config::{EngineConfig, DEFAULT_DB_PATH};
use crate::engine::Engine;
use crate::model::{DateRange, ScanMode, StatsFilter};
use crate::output;
use crate::util::parse_bound;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "repostat")]
#[command(about = "Incremental git history scanner with persisted commit statistics")]
#[command(version)]
pub struct Cli {
    #[clap(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Clone)]
pub struct CommonArgs {
    #[arg(long, env = "REPOSTAT_DB", default_value = DEFAULT_DB_PATH, help = "Path to the statistics database")]
    pub db: PathBuf,

    #[arg(long, env = "REPOSTAT_JOBS", help = "Repositories scanned in parallel during refresh")]
    pub jobs: Option<usize>,

    #[arg(long, help = "Commits written per transaction")]
    pub batch_size: Option<usize>,

    #[arg(short, long, global = true, help = "Enable debug logging")]
    pub verbose: bool,
}

#[derive(Args, Clone, Default)]
pub struct FilterArgs {
    #[arg(long, help = "Only commits at or after this date (RFC3339, YYYY-MM-DD, or a duration like 30d)")]
    pub since: Option<String>,

    #[arg(long, help = "Only commits at or before this date (RFC3339, YYYY-MM-DD, or a duration like 30d)")]
    pub until: Option<String>,

    #[arg(long, help = "Only commits by this author name")]
    pub author: Option<String>,

    #[arg(long = "exclude-author", help = "Skip commits by this author name (repeatable)")]
    pub exclude_authors: Vec<String>,

    #[arg(long = "repo-id", help = "Only commits of this repository")]
    pub repo_id: Option<i64>,
}

#[derive(Args, Clone, Default)]
pub struct ScanArgs {
    #[arg(long, conflicts_with = "recent", help = "Discard stored history and rescan from scratch")]
    pub force: bool,

    #[arg(long, value_parser = humantime::parse_duration, help = "Only scan commits newer than this (e.g. 24h, 7days)")]
    pub recent: Option<Duration>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Register a repository by the path of its root
    Add {
        path: PathBuf,
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Unregister a repository and drop its stored history
    Remove { id: i64 },
    /// List registered repositories
    List {
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Scan one repository
    Scan {
        id: i64,
        #[clap(flatten)]
        mode: ScanArgs,
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Scan every registered repository
    Refresh {
        #[clap(flatten)]
        mode: ScanArgs,
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Aggregate statistics over stored commits
    Stats {
        #[clap(flatten)]
        filter: FilterArgs,
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// Stored commits, newest first
    Timeline {
        #[clap(flatten)]
        filter: FilterArgs,
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
    /// One commit with its file changes and diffs
    Show {
        repo_id: i64,
        commit_id: String,
        #[arg(long, help = "Output as JSON")]
        json: bool,
    },
}

impl ScanArgs {
    pub fn mode(&self) -> ScanMode {
        match (self.force, self.recent) {
            (true, _) => ScanMode::Forced,
            (false, Some(bound)) => ScanMode::RecentBound(bound),
            (false, None) => ScanMode::Incremental,
        }
    }
}

impl FilterArgs {
    pub fn to_filter(&self) -> Result<StatsFilter> {
        let mut range = DateRange::new();
        if let Some(since) = &self.since {
            range = range.with_since(parse_bound(since, false)?);
        }
        if let Some(until) = &self.until {
            range = range.with_until(parse_bound(until, true)?);
        }
        Ok(StatsFilter {
            date_range: range,
            author: self.author.clone(),
            exclude_authors: self.exclude_authors.clone(),
            repository_id: self.repo_id,
        })
    }
}

impl CommonArgs {
    pub fn engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default().with_database(&self.db);
        if let Some(jobs) = self.jobs {
            config = config.with_max_concurrent_scans(jobs);
        }
        if let Some(batch_size) = self.batch_size {
            config = config.with_batch_size(batch_size);
        }
        config
    }
}

impl Cli {
    pub fn parse() -> Self {
        <Self as Parser>::parse()
    }

    pub fn execute(self) -> Result<()> {
        let engine = Engine::open(self.common.engine_config()).context("Failed to open statistics database")?;

        match self.command {
            Commands::Add { path, json } => {
                let repository = engine
                    .add_repository(&path)
                    .with_context(|| format!("Failed to register {}", path.display()))?;
                output::repositories(&[repository], json)
            }
            Commands::Remove { id } => {
                engine
                    .remove_repository(id)
                    .with_context(|| format!("Failed to remove repository {id}"))?;
                output::removed(id);
                Ok(())
            }
            Commands::List { json } => {
                let repositories = engine.list_repositories().context("Failed to list repositories")?;
                output::repositories(&repositories, json)
            }
            Commands::Scan { id, mode, json } => {
                let pb = spinner(&format!("Scanning repository {id}..."));
                let result = engine.scan_repository(id, mode.mode());
                pb.finish_and_clear();
                let result = result.with_context(|| format!("Failed to scan repository {id}"))?;
                output::scan_result(&result, json)
            }
            Commands::Refresh { mode, json } => {
                let pb = spinner("Refreshing repositories...");
                let outcomes = engine.refresh_all(mode.mode());
                pb.finish_and_clear();
                let outcomes = outcomes.context("Failed to refresh repositories")?;
                output::refresh(&outcomes, json)
            }
            Commands::Stats { filter, json } => {
                let filter = filter.to_filter()?;
                let stats = engine.get_statistics(&filter).context("Failed to compute statistics")?;
                output::statistics(&stats, json)
            }
            Commands::Timeline { filter, json } => {
                let filter = filter.to_filter()?;
                let commits = engine
                    .get_commit_timeline(&filter)
                    .context("Failed to read commit timeline")?;
                output::timeline(&commits, json)
            }
            Commands::Show {
                repo_id,
                commit_id,
                json,
            } => {
                let detail = engine
                    .get_commit_detail(repo_id, &commit_id)
                    .with_context(|| format!("Failed to load commit {commit_id}"))?;
                output::commit_detail(&detail, json)
            }
        }
    }
}

fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn force_wins_over_default_mode() {
        let args = ScanArgs {
            force: true,
            recent: None,
        };
        assert_eq!(args.mode(), ScanMode::Forced);
        assert_eq!(ScanArgs::default().mode(), ScanMode::Incremental);
    }

    #[test]
    fn filter_args_become_a_filter() {
        let args = FilterArgs {
            since: Some("2024-01-01".to_string()),
            until: Some("2024-01-31".to_string()),
            author: Some("A".to_string()),
            exclude_authors: vec!["bot".to_string()],
            repo_id: Some(3),
        };
        let filter = args.to_filter().unwrap();
        assert_eq!(filter.author.as_deref(), Some("A"));
        assert_eq!(filter.exclude_authors, vec!["bot".to_string()]);
        assert_eq!(filter.repository_id, Some(3));
        assert!(filter.date_range.since < filter.date_range.until);
    }

    #[test]
    fn command_line_parses() {
        let cli = Cli::try_parse_from(["repostat", "--db", "x.db", "scan", "4", "--recent", "24h"]).unwrap();
        match cli.command {
            Commands::Scan { id, mode, .. } => {
                assert_eq!(id, 4);
                assert_eq!(mode.mode(), ScanMode::RecentBound(Duration::from_secs(24 * 3600)));
            }
            _ => panic!("expected scan"),
        }
    }
}
