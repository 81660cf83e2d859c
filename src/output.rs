use crate::engine::RefreshOutcome;
use crate::error::RepostatError;
use crate::model::{AggregateBundle, Commit, CommitDetail, Repository, ScanResult};
use anyhow::Result;
use console::style;
use serde::Serialize;

const TIMELINE_ROWS: usize = 50;

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn repositories(repositories: &[Repository], json: bool) -> Result<()> {
    if json {
        return print_json(repositories);
    }
    if repositories.is_empty() {
        println!("No repositories registered");
        return Ok(());
    }
    println!(
        "{:>4} {:<20} {:<12} {:<20} {}",
        style("ID").bold(),
        style("Name").bold(),
        style("Watermark").bold(),
        style("Last scan").bold(),
        style("Path").bold()
    );
    println!("{}", "─".repeat(90));
    for repo in repositories {
        println!(
            "{:>4} {:<20} {:<12} {:<20} {}",
            repo.id,
            repo.display_name,
            repo.last_scanned_commit
                .as_deref()
                .map(short_id)
                .unwrap_or("-"),
            repo.last_scanned_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "never".to_string()),
            repo.path
        );
    }
    Ok(())
}

pub fn removed(repository_id: i64) {
    println!("Removed repository {}", style(repository_id).bold());
}

pub fn scan_result(result: &ScanResult, json: bool) -> Result<()> {
    if json {
        return print_json(result);
    }
    println!(
        "Repository {}: {} new commits, watermark {}",
        style(result.repository_id).bold(),
        style(result.commits_processed).green(),
        result.watermark.as_deref().map(short_id).unwrap_or("-")
    );
    if result.history_rewrite_detected {
        println!(
            "{}",
            style("History was rewritten; stored commits were rebuilt from scratch").yellow()
        );
    }
    Ok(())
}

pub fn refresh(outcomes: &[RefreshOutcome], json: bool) -> Result<()> {
    if json {
        return print_json(outcomes);
    }
    for outcome in outcomes {
        match &outcome.result {
            Ok(result) => scan_result(result, false)?,
            Err(report) => println!(
                "Repository {}: {}",
                style(outcome.repository_id).bold(),
                style(&report.message).red()
            ),
        }
    }
    Ok(())
}

pub fn statistics(stats: &AggregateBundle, json: bool) -> Result<()> {
    if json {
        return print_json(stats);
    }

    println!("{}", style("Totals").bold());
    println!(
        "  commits: {}  additions: {}  deletions: {}  files changed: {}  authors: {}",
        stats.total_commits,
        style(stats.total_additions).green(),
        style(stats.total_deletions).red(),
        stats.total_files_changed,
        stats.author_count
    );

    println!("\n{}", style("Commits by hour (UTC)").bold());
    let max_hour = stats.hourly.iter().map(|b| b.totals.commits).max().unwrap_or(0).max(1);
    for bucket in &stats.hourly {
        println!(
            "  {:02}:00 {:<30} {}",
            bucket.hour,
            style(bar(bucket.totals.commits, max_hour, 30)).green(),
            bucket.totals.commits
        );
    }

    println!("\n{}", style("Commits by weekday").bold());
    const WEEKDAYS: [&str; 7] = ["Sun", "Mon", "Tue", "Wed", "Thu", "Fri", "Sat"];
    let max_day = stats.weekly.iter().map(|b| b.totals.commits).max().unwrap_or(0).max(1);
    for bucket in &stats.weekly {
        println!(
            "  {} {:<30} {}",
            WEEKDAYS[bucket.weekday as usize % 7],
            style(bar(bucket.totals.commits, max_day, 30)).blue(),
            bucket.totals.commits
        );
    }

    println!("\n{}", style("Authors").bold());
    println!(
        "  {:<30} {:>8} {:>10} {:>10}",
        style("Author").bold(),
        style("Commits").bold(),
        style("Added").bold(),
        style("Deleted").bold()
    );
    let mut authors: Vec<_> = stats.authors.iter().collect();
    authors.sort_by(|a, b| b.1.commits.cmp(&a.1.commits).then_with(|| a.0.cmp(b.0)));
    for (name, totals) in authors {
        println!(
            "  {:<30} {:>8} {:>10} {:>10}",
            name, totals.commits, totals.additions, totals.deletions
        );
    }

    println!("\n{}", style("Repositories").bold());
    for (id, repo) in &stats.repositories {
        println!(
            "  {:>4} {:<25} {:>8} commits  +{:<8} -{}",
            id, repo.display_name, repo.totals.commits, repo.totals.additions, repo.totals.deletions
        );
    }

    println!("\n{}", style("Commit sizes").bold());
    for bucket in &stats.commit_sizes {
        let range = if bucket.max_lines == u64::MAX {
            format!(">{}", bucket.min_lines.saturating_sub(1))
        } else {
            format!("{}-{}", bucket.min_lines, bucket.max_lines)
        };
        println!("  {:<8} {:>9} lines {:>6}", format!("{:?}", bucket.size_class), range, bucket.count);
    }

    if !stats.hot_files.is_empty() {
        println!("\n{}", style("Hot files").bold());
        for file in &stats.hot_files {
            println!(
                "  {:<50} {:>5} changes  +{:<7} -{}",
                file.file_path, file.change_count, file.total_additions, file.total_deletions
            );
        }
    }

    if !stats.message_words.is_empty() {
        println!("\n{}", style("Message words").bold());
        let words: Vec<String> = stats
            .message_words
            .iter()
            .take(20)
            .map(|w| format!("{} ({})", w.word, w.count))
            .collect();
        println!("  {}", words.join(", "));
    }

    Ok(())
}

pub fn timeline(commits: &[Commit], json: bool) -> Result<()> {
    if json {
        return print_json(commits);
    }
    if commits.is_empty() {
        println!("No commits match the filter");
        return Ok(());
    }
    for commit in commits.iter().take(TIMELINE_ROWS) {
        println!(
            "{} {} {:<20} {:>6} {:>6}  {}",
            style(short_id(&commit.id)).yellow(),
            commit.authored_at.format("%Y-%m-%d %H:%M"),
            commit.author_name,
            style(format!("+{}", commit.additions)).green(),
            style(format!("-{}", commit.deletions)).red(),
            commit.message.lines().next().unwrap_or("")
        );
    }
    if commits.len() > TIMELINE_ROWS {
        println!("\n... and {} more commits", commits.len() - TIMELINE_ROWS);
    }
    Ok(())
}

pub fn commit_detail(detail: &CommitDetail, json: bool) -> Result<()> {
    if json {
        return print_json(detail);
    }
    let commit = &detail.commit;
    println!("{} {}", style("commit").yellow(), style(&commit.id).yellow());
    println!("Author: {} <{}>", commit.author_name, commit.author_email);
    println!("Date:   {}", commit.authored_at.to_rfc3339());
    if let Some(branch) = &commit.branch {
        println!("Branch: {branch}");
    }
    println!();
    for line in commit.message.lines() {
        println!("    {line}");
    }
    println!(
        "\n{} files changed, {} insertions(+), {} deletions(-)\n",
        commit.files_changed,
        style(commit.additions).green(),
        style(commit.deletions).red()
    );
    for file in &detail.file_changes {
        for line in file.diff_text.lines() {
            let styled = if line.starts_with("+++") || line.starts_with("---") {
                style(line).bold()
            } else if line.starts_with('+') {
                style(line).green()
            } else if line.starts_with('-') {
                style(line).red()
            } else if line.starts_with("@@") {
                style(line).cyan()
            } else {
                style(line)
            };
            println!("{styled}");
        }
    }
    Ok(())
}

/// Prints a failure without the storage or library details behind it; the
/// full chain goes to the debug log.
pub fn error(err: &anyhow::Error) {
    tracing::debug!(error = ?err, "command failed");
    let Some(cause) = err.chain().find_map(|c| c.downcast_ref::<RepostatError>()) else {
        eprintln!("{} {:#}", style("Error:").red().bold(), err);
        return;
    };
    let report = cause.report();
    if err.downcast_ref::<RepostatError>().is_some() {
        eprintln!("{} {}", style("Error:").red().bold(), report.message);
    } else {
        eprintln!("{} {}: {}", style("Error:").red().bold(), err, report.message);
    }
}

fn short_id(id: &str) -> &str {
    id.get(..10).unwrap_or(id)
}

fn bar(value: u64, max: u64, width: usize) -> String {
    let filled = ((value as f64 / max as f64) * width as f64).round() as usize;
    "█".repeat(filled.min(width))
}
