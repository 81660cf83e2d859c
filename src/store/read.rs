use super::Store;
use crate::error::{RepostatError, Result};
use crate::model::{Commit, CommitDetail, FileChange, FileStatRow, Repository, StatsFilter};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, OptionalExtension, Row, ToSql};
use std::collections::HashSet;

const REPOSITORY_COLUMNS: &str =
    "id, path, display_name, remote_url, last_scanned_commit, last_scanned_at";

const COMMIT_COLUMNS: &str = "c.id, c.repository_id, c.author_name, c.author_email, c.message, \
     c.authored_at, c.branch, c.additions, c.deletions, c.files_changed";

impl Store {
    pub fn list_repositories(&self) -> Result<Vec<Repository>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {REPOSITORY_COLUMNS} FROM repositories ORDER BY id"
        ))?;
        let rows = stmt.query_map([], repository_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn repository(&self, repository_id: i64) -> Result<Repository> {
        let conn = self.conn()?;
        conn.query_row(
            &format!("SELECT {REPOSITORY_COLUMNS} FROM repositories WHERE id = ?"),
            params![repository_id],
            repository_from_row,
        )
        .optional()?
        .ok_or_else(|| RepostatError::NotFound(format!("repository {repository_id}")))
    }

    /// Every commit id stored for the repository; the membership set the
    /// walker tests against.
    pub fn known_commit_ids(&self, repository_id: i64) -> Result<HashSet<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id FROM commits WHERE repository_id = ?")?;
        let ids = stmt
            .query_map(params![repository_id], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(ids)
    }

    /// Filtered commits, newest first. Ties on the timestamp are broken by
    /// repository and commit id so the order is stable.
    pub fn commits(&self, filter: &StatsFilter) -> Result<Vec<Commit>> {
        let (clause, to_bind) = filter_clause(filter);
        let query = format!(
            "SELECT {COMMIT_COLUMNS} FROM commits c WHERE 1=1{clause}
             ORDER BY c.authored_at DESC, c.repository_id, c.id"
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&query)?;
        let bind_refs: Vec<&dyn ToSql> = to_bind.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(bind_refs.as_slice(), commit_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Per-file statistics (no diff text) of every commit matching the filter.
    pub fn file_stats(&self, filter: &StatsFilter) -> Result<Vec<FileStatRow>> {
        let (clause, to_bind) = filter_clause(filter);
        let query = format!(
            "SELECT f.file_path, f.additions, f.deletions, c.authored_at
             FROM file_changes f
             JOIN commits c ON c.repository_id = f.repository_id AND c.id = f.commit_id
             WHERE 1=1{clause}
             ORDER BY f.id"
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&query)?;
        let bind_refs: Vec<&dyn ToSql> = to_bind.iter().map(|b| b.as_ref()).collect();
        let rows = stmt.query_map(bind_refs.as_slice(), |row| {
            Ok(FileStatRow {
                file_path: row.get(0)?,
                additions: row.get::<_, i64>(1)? as u64,
                deletions: row.get::<_, i64>(2)? as u64,
                authored_at: timestamp_from_row(row, 3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn commit_detail(&self, repository_id: i64, commit_id: &str) -> Result<CommitDetail> {
        let conn = self.conn()?;
        let commit = conn
            .query_row(
                &format!("SELECT {COMMIT_COLUMNS} FROM commits c WHERE c.repository_id = ? AND c.id = ?"),
                params![repository_id, commit_id],
                commit_from_row,
            )
            .optional()?
            .ok_or_else(|| {
                RepostatError::NotFound(format!("commit {commit_id} in repository {repository_id}"))
            })?;

        let mut stmt = conn.prepare(
            "SELECT commit_id, repository_id, file_path, additions, deletions, is_binary, diff_text
             FROM file_changes WHERE repository_id = ? AND commit_id = ?
             ORDER BY file_path, id",
        )?;
        let file_changes = stmt
            .query_map(params![repository_id, commit_id], |row| {
                Ok(FileChange {
                    commit_id: row.get(0)?,
                    repository_id: row.get(1)?,
                    file_path: row.get(2)?,
                    additions: row.get::<_, i64>(3)? as u64,
                    deletions: row.get::<_, i64>(4)? as u64,
                    is_binary: row.get(5)?,
                    diff_text: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(CommitDetail {
            commit,
            file_changes,
        })
    }
}

/// Builds the `AND ...` conditions on the `c` (commits) alias.
fn filter_clause(filter: &StatsFilter) -> (String, Vec<Box<dyn ToSql>>) {
    let mut clause = String::new();
    let mut to_bind: Vec<Box<dyn ToSql>> = Vec::new();

    if let Some(since) = &filter.date_range.since {
        clause.push_str(" AND c.authored_at >= ?");
        to_bind.push(Box::new(since.timestamp()));
    }
    if let Some(until) = &filter.date_range.until {
        clause.push_str(" AND c.authored_at <= ?");
        to_bind.push(Box::new(until.timestamp()));
    }
    if let Some(author) = &filter.author {
        clause.push_str(" AND c.author_name = ?");
        to_bind.push(Box::new(author.clone()));
    }
    if !filter.exclude_authors.is_empty() {
        let placeholders = vec!["?"; filter.exclude_authors.len()].join(",");
        clause.push_str(&format!(" AND c.author_name NOT IN ({placeholders})"));
        for author in &filter.exclude_authors {
            to_bind.push(Box::new(author.clone()));
        }
    }
    if let Some(repository_id) = filter.repository_id {
        clause.push_str(" AND c.repository_id = ?");
        to_bind.push(Box::new(repository_id));
    }

    (clause, to_bind)
}

fn timestamp_from_row(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let ts: i64 = row.get(idx)?;
    Utc.timestamp_opt(ts, 0).single().ok_or_else(|| {
        rusqlite::Error::InvalidColumnType(idx, "timestamp".to_string(), rusqlite::types::Type::Integer)
    })
}

fn repository_from_row(row: &Row<'_>) -> rusqlite::Result<Repository> {
    let last_scanned_at = match row.get::<_, Option<i64>>(5)? {
        Some(_) => Some(timestamp_from_row(row, 5)?),
        None => None,
    };
    Ok(Repository {
        id: row.get(0)?,
        path: row.get(1)?,
        display_name: row.get(2)?,
        remote_url: row.get(3)?,
        last_scanned_commit: row.get(4)?,
        last_scanned_at,
    })
}

fn commit_from_row(row: &Row<'_>) -> rusqlite::Result<Commit> {
    Ok(Commit {
        id: row.get(0)?,
        repository_id: row.get(1)?,
        author_name: row.get(2)?,
        author_email: row.get(3)?,
        message: row.get(4)?,
        authored_at: timestamp_from_row(row, 5)?,
        branch: row.get(6)?,
        additions: row.get::<_, i64>(7)? as u64,
        deletions: row.get::<_, i64>(8)? as u64,
        files_changed: row.get::<_, i64>(9)? as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::super::tests::{sample_detail, store_with_repo};
    use super::*;
    use crate::model::DateRange;
    use chrono::Duration;
    use pretty_assertions::assert_eq;

    fn with_author(mut detail: CommitDetail, author: &str, hours: i64) -> CommitDetail {
        detail.commit.author_name = author.to_string();
        detail.commit.authored_at = detail.commit.authored_at + Duration::hours(hours);
        detail
    }

    #[test]
    fn commits_are_filtered_and_newest_first() {
        let (store, repo_id) = store_with_repo();
        let batch = vec![
            with_author(sample_detail(repo_id, "c1", &[("a.rs", 1, 0)]), "A", 0),
            with_author(sample_detail(repo_id, "c2", &[("a.rs", 2, 0)]), "B", 1),
            with_author(sample_detail(repo_id, "c3", &[("b.rs", 3, 0)]), "A", 2),
        ];
        store.write_batch(repo_id, &batch, Some("c3")).unwrap();

        let all: Vec<String> = store
            .commits(&StatsFilter::new())
            .unwrap()
            .into_iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(all, vec!["c3", "c2", "c1"]);

        let only_a = store.commits(&StatsFilter::new().with_author("A")).unwrap();
        assert_eq!(only_a.len(), 2);

        let not_a = store.commits(&StatsFilter::new().excluding("A")).unwrap();
        assert_eq!(not_a.len(), 1);
        assert_eq!(not_a[0].author_name, "B");

        let since = batch[1].commit.authored_at;
        let recent = store
            .commits(&StatsFilter::new().within(DateRange::new().with_since(since)))
            .unwrap();
        assert_eq!(recent.len(), 2);

        let files = store.file_stats(&StatsFilter::new().with_author("B")).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].additions, 2);
    }

    #[test]
    fn commit_detail_returns_sorted_files() {
        let (store, repo_id) = store_with_repo();
        let detail = sample_detail(repo_id, "c1", &[("z.rs", 1, 0), ("a.rs", 2, 1)]);
        store.write_batch(repo_id, &[detail], Some("c1")).unwrap();

        let stored = store.commit_detail(repo_id, "c1").unwrap();
        let paths: Vec<&str> = stored.file_changes.iter().map(|f| f.file_path.as_str()).collect();
        assert_eq!(paths, vec!["a.rs", "z.rs"]);
        assert_eq!(stored.commit.additions, 3);
        assert_eq!(stored.commit.deletions, 1);
        assert_eq!(stored.file_changes[0].diff_text, "+a.rs\n");
    }

    #[test]
    fn unknown_commit_is_not_found() {
        let (store, repo_id) = store_with_repo();
        assert!(matches!(
            store.commit_detail(repo_id, "missing"),
            Err(RepostatError::NotFound(_))
        ));
        assert!(matches!(store.repository(repo_id + 1), Err(RepostatError::NotFound(_))));
    }

    #[test]
    fn repositories_are_listed_by_id() {
        let (store, first) = store_with_repo();
        let second = store
            .insert_repository(&crate::store::NewRepository {
                path: "/work/beta".to_string(),
                display_name: "beta".to_string(),
                remote_url: Some("https://example.com/beta.git".to_string()),
            })
            .unwrap();
        let ids: Vec<i64> = store.list_repositories().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![first, second.id]);
    }
}
