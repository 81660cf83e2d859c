use crate::model::{
    AuthorTrendPoint, ChangeTotals, Commit, DailyBucket, DailyCommitCount, DensityCell, EfficiencyPoint,
    FileStatRow, HotFile, HourlyBucket, Repository, RepositoryTotals, SizeBucket, SizeClass,
    StatsFilter, WeekdayBucket,
};
use crate::util::{day_key, days_between, month_key};
use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use std::collections::{BTreeMap, HashMap};

const SIZE_CLASSES: [(SizeClass, u64, u64); 4] = [
    (SizeClass::Small, 0, 10),
    (SizeClass::Medium, 11, 100),
    (SizeClass::Large, 101, 500),
    (SizeClass::Huge, 501, u64::MAX),
];

pub fn hourly(commits: &[Commit]) -> Vec<HourlyBucket> {
    let mut buckets: Vec<HourlyBucket> = (0..24)
        .map(|hour| HourlyBucket {
            hour,
            totals: ChangeTotals::default(),
        })
        .collect();
    for commit in commits {
        buckets[commit.authored_at.hour() as usize].totals.add(commit);
    }
    buckets
}

pub fn weekly(commits: &[Commit]) -> Vec<WeekdayBucket> {
    let mut buckets: Vec<WeekdayBucket> = (0..7)
        .map(|weekday| WeekdayBucket {
            weekday,
            totals: ChangeTotals::default(),
        })
        .collect();
    for commit in commits {
        let weekday = commit.authored_at.weekday().num_days_from_sunday();
        buckets[weekday as usize].totals.add(commit);
    }
    buckets
}

/// Widest span the daily series are zero-filled over.
pub const MAX_DAILY_SPAN_DAYS: i64 = 3660;

/// Day span the daily series cover: the filter bounds where given, the
/// first and last matching commit otherwise. Bounds further apart than
/// `MAX_DAILY_SPAN_DAYS` shrink to the matching commits.
pub fn day_span(commits: &[Commit], filter: &StatsFilter) -> Option<(NaiveDate, NaiveDate)> {
    let first = commits.iter().map(|c| c.authored_at).min();
    let last = commits.iter().map(|c| c.authored_at).max();
    let start = day_key(&filter.date_range.since.or(first)?);
    let end = day_key(&filter.date_range.until.or(last)?);
    if end.signed_duration_since(start).num_days() <= MAX_DAILY_SPAN_DAYS {
        return Some((start, end));
    }
    // matching commits already lie inside the filter bounds
    Some((day_key(&first?), day_key(&last?)))
}

fn per_day(commits: &[Commit]) -> HashMap<NaiveDate, ChangeTotals> {
    let mut days: HashMap<NaiveDate, ChangeTotals> = HashMap::new();
    for commit in commits {
        days.entry(day_key(&commit.authored_at)).or_default().add(commit);
    }
    days
}

pub fn daily(commits: &[Commit], span: Option<(NaiveDate, NaiveDate)>) -> Vec<DailyBucket> {
    let Some((start, end)) = span else {
        return Vec::new();
    };
    let mut days = per_day(commits);
    days_between(start, end)
        .map(|date| DailyBucket {
            date,
            totals: days.remove(&date).unwrap_or_default(),
        })
        .collect()
}

pub fn daily_commit_counts(daily: &[DailyBucket]) -> Vec<DailyCommitCount> {
    daily
        .iter()
        .map(|day| DailyCommitCount {
            date: day.date,
            commit_count: day.totals.commits,
        })
        .collect()
}

/// additions / (additions + deletions) per day; 0 for a day without changes.
pub fn efficiency(daily: &[DailyBucket]) -> Vec<EfficiencyPoint> {
    daily
        .iter()
        .map(|day| {
            let total_changes = day.totals.additions + day.totals.deletions;
            let efficiency_ratio = if total_changes == 0 {
                0.0
            } else {
                day.totals.additions as f64 / total_changes as f64
            };
            EfficiencyPoint {
                date: day.date,
                efficiency_ratio,
                total_changes,
            }
        })
        .collect()
}

pub fn authors(commits: &[Commit]) -> BTreeMap<String, ChangeTotals> {
    let mut authors: BTreeMap<String, ChangeTotals> = BTreeMap::new();
    for commit in commits {
        authors.entry(commit.author_name.clone()).or_default().add(commit);
    }
    authors
}

/// Totals for every repository in scope, zero for those without matching
/// commits.
pub fn repositories(commits: &[Commit], in_scope: &[Repository]) -> BTreeMap<i64, RepositoryTotals> {
    let mut totals: BTreeMap<i64, RepositoryTotals> = in_scope
        .iter()
        .map(|repo| {
            (
                repo.id,
                RepositoryTotals {
                    display_name: repo.display_name.clone(),
                    totals: ChangeTotals::default(),
                },
            )
        })
        .collect();
    for commit in commits {
        totals
            .entry(commit.repository_id)
            .or_insert_with(|| RepositoryTotals {
                display_name: format!("#{}", commit.repository_id),
                totals: ChangeTotals::default(),
            })
            .totals
            .add(commit);
    }
    totals
}

/// Commit counts for all 168 weekday/hour cells, Sunday first.
pub fn hourly_density(commits: &[Commit]) -> Vec<DensityCell> {
    let mut grid = [[0u64; 24]; 7];
    for commit in commits {
        let weekday = commit.authored_at.weekday().num_days_from_sunday() as usize;
        grid[weekday][commit.authored_at.hour() as usize] += 1;
    }
    let mut cells = Vec::with_capacity(7 * 24);
    for (weekday, hours) in grid.iter().enumerate() {
        for (hour, commits) in hours.iter().enumerate() {
            cells.push(DensityCell {
                hour: hour as u32,
                weekday: weekday as u32,
                commits: *commits,
            });
        }
    }
    cells
}

pub fn author_trends(commits: &[Commit]) -> Vec<AuthorTrendPoint> {
    let mut trends: BTreeMap<(String, String), ChangeTotals> = BTreeMap::new();
    for commit in commits {
        trends
            .entry((commit.author_name.clone(), month_key(&commit.authored_at)))
            .or_default()
            .add(commit);
    }
    trends
        .into_iter()
        .map(|((author, period), totals)| AuthorTrendPoint {
            author,
            period,
            totals,
        })
        .collect()
}

pub fn commit_sizes(commits: &[Commit]) -> Vec<SizeBucket> {
    let mut buckets: Vec<SizeBucket> = SIZE_CLASSES
        .iter()
        .map(|&(size_class, min_lines, max_lines)| SizeBucket {
            size_class,
            count: 0,
            min_lines,
            max_lines,
        })
        .collect();
    for commit in commits {
        let lines = commit.lines_changed();
        if let Some(bucket) = buckets
            .iter_mut()
            .find(|b| lines >= b.min_lines && lines <= b.max_lines)
        {
            bucket.count += 1;
        }
    }
    buckets
}

struct FileAccum {
    change_count: u64,
    additions: u64,
    deletions: u64,
    last_modified: DateTime<Utc>,
}

/// Most often touched files; ties go to the file with more changed lines,
/// then to the lexically smaller path.
pub fn hot_files(files: &[FileStatRow], limit: usize) -> Vec<HotFile> {
    let mut by_path: HashMap<&str, FileAccum> = HashMap::new();
    for row in files {
        let entry = by_path.entry(row.file_path.as_str()).or_insert(FileAccum {
            change_count: 0,
            additions: 0,
            deletions: 0,
            last_modified: row.authored_at,
        });
        entry.change_count += 1;
        entry.additions += row.additions;
        entry.deletions += row.deletions;
        entry.last_modified = entry.last_modified.max(row.authored_at);
    }

    let mut hot: Vec<HotFile> = by_path
        .into_iter()
        .map(|(path, acc)| HotFile {
            file_path: path.to_string(),
            change_count: acc.change_count,
            total_additions: acc.additions,
            total_deletions: acc.deletions,
            last_modified: acc.last_modified,
        })
        .collect();
    hot.sort_by(|a, b| {
        b.change_count
            .cmp(&a.change_count)
            .then_with(|| {
                (b.total_additions + b.total_deletions).cmp(&(a.total_additions + a.total_deletions))
            })
            .then_with(|| a.file_path.cmp(&b.file_path))
    });
    hot.truncate(limit);
    hot
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn commit_at(author: &str, at: DateTime<Utc>, additions: u64, deletions: u64) -> Commit {
        Commit {
            id: format!("{author}-{}", at.timestamp()),
            repository_id: 1,
            author_name: author.to_string(),
            author_email: format!("{author}@example.com"),
            message: String::new(),
            authored_at: at,
            branch: None,
            additions,
            deletions,
            files_changed: 1,
        }
    }

    fn file_row(path: &str, additions: u64, deletions: u64, day: u32) -> FileStatRow {
        FileStatRow {
            file_path: path.to_string(),
            additions,
            deletions,
            authored_at: Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn weekday_zero_is_sunday() {
        // 2024-03-03 was a Sunday
        let sunday = Utc.with_ymd_and_hms(2024, 3, 3, 9, 0, 0).unwrap();
        let buckets = weekly(&[commit_at("A", sunday, 1, 0)]);
        assert_eq!(buckets.len(), 7);
        assert_eq!(buckets[0].totals.commits, 1);
        assert!(buckets[1..].iter().all(|b| b.totals.commits == 0));
    }

    #[test]
    fn size_buckets_use_inclusive_boundaries() {
        let at = Utc.with_ymd_and_hms(2024, 3, 3, 9, 0, 0).unwrap();
        let commits = vec![
            commit_at("A", at, 10, 0),
            commit_at("A", at, 6, 5),
            commit_at("A", at, 100, 0),
            commit_at("A", at, 500, 1),
            commit_at("A", at, 0, 0),
        ];
        let counts: Vec<u64> = commit_sizes(&commits).iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![2, 2, 0, 1]);
        assert_eq!(commit_sizes(&[])[3].max_lines, u64::MAX);
    }

    #[test]
    fn hot_files_tie_break_on_lines_then_path() {
        let rows = vec![
            file_row("b.rs", 1, 0, 1),
            file_row("b.rs", 1, 0, 3),
            file_row("a.rs", 1, 0, 1),
            file_row("a.rs", 1, 0, 2),
            file_row("c.rs", 50, 0, 1),
            file_row("d.rs", 5, 5, 1),
            file_row("d.rs", 0, 0, 1),
        ];
        let hot = hot_files(&rows, 3);
        let paths: Vec<&str> = hot.iter().map(|h| h.file_path.as_str()).collect();
        assert_eq!(paths, vec!["d.rs", "a.rs", "b.rs"]);
        assert_eq!(hot[2].last_modified, Utc.with_ymd_and_hms(2024, 1, 3, 12, 0, 0).unwrap());
    }

    #[test]
    fn daily_series_fill_gaps_with_zero() {
        let commits = vec![
            commit_at("A", Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap(), 3, 1),
            commit_at("A", Utc.with_ymd_and_hms(2024, 1, 4, 8, 0, 0).unwrap(), 0, 2),
        ];
        let span = day_span(&commits, &StatsFilter::new());
        let days = daily(&commits, span);
        let counts: Vec<u64> = daily_commit_counts(&days).iter().map(|d| d.commit_count).collect();
        assert_eq!(counts, vec![1, 0, 0, 1]);

        let ratios: Vec<f64> = efficiency(&days).iter().map(|e| e.efficiency_ratio).collect();
        assert_eq!(ratios, vec![0.75, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn open_ended_bounds_shrink_to_the_commits() {
        let at = Utc.with_ymd_and_hms(2024, 1, 3, 10, 0, 0).unwrap();
        let commits = vec![commit_at("A", at, 1, 0)];
        let filter = StatsFilter::new().within(
            crate::model::DateRange::new()
                .with_since(Utc.with_ymd_and_hms(1, 1, 1, 0, 0, 0).unwrap())
                .with_until(Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap()),
        );
        let day = at.date_naive();
        assert_eq!(day_span(&commits, &filter), Some((day, day)));
        assert_eq!(daily(&commits, day_span(&commits, &filter)).len(), 1);

        // nothing matched, nothing to zero-fill
        assert_eq!(day_span(&[], &filter), None);

        // a wide but representable range is still filled completely
        let decade = StatsFilter::new().within(
            crate::model::DateRange::new()
                .with_since(Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap())
                .with_until(Utc.with_ymd_and_hms(2029, 12, 31, 0, 0, 0).unwrap()),
        );
        assert_eq!(daily(&commits, day_span(&commits, &decade)).len(), 3653);
    }

    #[test]
    fn density_covers_every_cell() {
        let at = Utc.with_ymd_and_hms(2024, 3, 4, 3, 0, 0).unwrap();
        let cells = hourly_density(&[commit_at("A", at, 1, 1)]);
        assert_eq!(cells.len(), 168);
        let hit: Vec<&DensityCell> = cells.iter().filter(|c| c.commits > 0).collect();
        assert_eq!(hit.len(), 1);
        assert_eq!((hit[0].weekday, hit[0].hour), (1, 3));
    }

    #[test]
    fn trends_are_grouped_by_author_and_month() {
        let commits = vec![
            commit_at("B", Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(), 1, 0),
            commit_at("A", Utc.with_ymd_and_hms(2024, 2, 2, 0, 0, 0).unwrap(), 1, 0),
            commit_at("A", Utc.with_ymd_and_hms(2024, 2, 20, 0, 0, 0).unwrap(), 2, 0),
        ];
        let trends = author_trends(&commits);
        let keys: Vec<(&str, &str, u64)> = trends
            .iter()
            .map(|t| (t.author.as_str(), t.period.as_str(), t.totals.commits))
            .collect();
        assert_eq!(keys, vec![("A", "2024-02", 2), ("B", "2024-01", 1)]);
    }
}
