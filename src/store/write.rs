use super::Store;
use crate::error::{RepostatError, Result};
use crate::model::{CommitDetail, Repository};
use chrono::Utc;
use rusqlite::{params, ErrorCode, OptionalExtension, Transaction};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct NewRepository {
    pub path: String,
    pub display_name: String,
    pub remote_url: Option<String>,
}

impl Store {
    pub fn insert_repository(&self, new: &NewRepository) -> Result<Repository> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT INTO repositories (path, display_name, remote_url) VALUES (?, ?, ?)",
            params![new.path, new.display_name, new.remote_url],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(RepostatError::DuplicatePath(new.path.clone()));
            }
            Err(e) => return Err(e.into()),
        }
        Ok(Repository {
            id: conn.last_insert_rowid(),
            path: new.path.clone(),
            display_name: new.display_name.clone(),
            remote_url: new.remote_url.clone(),
            last_scanned_commit: None,
            last_scanned_at: None,
        })
    }

    /// Deletes the repository; commits and file changes go with it through
    /// the cascading foreign keys.
    pub fn delete_repository(&self, repository_id: i64) -> Result<()> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM repositories WHERE id = ?", params![repository_id])?;
        if deleted == 0 {
            return Err(RepostatError::NotFound(format!("repository {repository_id}")));
        }
        Ok(())
    }

    /// Drops every stored commit of a repository and resets its watermark,
    /// as one transaction.
    pub fn reset_repository(&self, repository_id: i64) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        ensure_repository(&tx, repository_id)?;
        tx.execute(
            "UPDATE repositories SET last_scanned_commit = NULL, last_scanned_at = NULL WHERE id = ?",
            params![repository_id],
        )?;
        let removed = tx.execute("DELETE FROM commits WHERE repository_id = ?", params![repository_id])?;
        tx.commit()?;
        debug!(repository_id, removed, "reset stored history");
        Ok(())
    }

    /// Writes a batch of commits with their file changes. Commits already
    /// stored for the repository are skipped. When `watermark` is given the
    /// repository's watermark moves to it inside the same transaction, so it
    /// never runs ahead of the data.
    ///
    /// Returns how many commits were newly written.
    pub fn write_batch(
        &self,
        repository_id: i64,
        batch: &[CommitDetail],
        watermark: Option<&str>,
    ) -> Result<usize> {
        self.write_batch_with(repository_id, batch, watermark, |_| Ok(()))
    }

    pub(crate) fn write_batch_with<F>(
        &self,
        repository_id: i64,
        batch: &[CommitDetail],
        watermark: Option<&str>,
        mut before_files: F,
    ) -> Result<usize>
    where
        F: FnMut(&CommitDetail) -> Result<()>,
    {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        ensure_repository(&tx, repository_id)?;

        let mut written = 0;
        {
            let mut insert_commit_stmt = tx.prepare(
                "INSERT OR IGNORE INTO commits
                 (id, repository_id, author_name, author_email, message, authored_at, branch,
                  additions, deletions, files_changed)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )?;
            let mut insert_file_stmt = tx.prepare(
                "INSERT INTO file_changes
                 (repository_id, commit_id, file_path, additions, deletions, is_binary, diff_text)
                 VALUES (?, ?, ?, ?, ?, ?, ?)",
            )?;

            for detail in batch {
                let c = &detail.commit;
                let inserted = insert_commit_stmt.execute(params![
                    c.id,
                    repository_id,
                    c.author_name,
                    c.author_email,
                    c.message,
                    c.authored_at.timestamp(),
                    c.branch,
                    c.additions as i64,
                    c.deletions as i64,
                    c.files_changed as i64
                ])?;
                if inserted == 0 {
                    continue;
                }

                before_files(detail)?;

                for f in &detail.file_changes {
                    insert_file_stmt.execute(params![
                        repository_id,
                        c.id,
                        f.file_path,
                        f.additions as i64,
                        f.deletions as i64,
                        f.is_binary,
                        f.diff_text
                    ])?;
                }
                written += 1;
            }
        }

        if let Some(commit_id) = watermark {
            set_watermark(&tx, repository_id, commit_id)?;
        }

        tx.commit()?;
        Ok(written)
    }

    pub fn advance_watermark(&self, repository_id: i64, commit_id: &str) -> Result<()> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        ensure_repository(&tx, repository_id)?;
        set_watermark(&tx, repository_id, commit_id)?;
        tx.commit()?;
        Ok(())
    }
}

fn ensure_repository(tx: &Transaction<'_>, repository_id: i64) -> Result<()> {
    let exists = tx
        .query_row(
            "SELECT 1 FROM repositories WHERE id = ?",
            params![repository_id],
            |row| row.get::<_, i64>(0),
        )
        .optional()?;
    match exists {
        Some(_) => Ok(()),
        None => Err(RepostatError::NotFound(format!("repository {repository_id}"))),
    }
}

fn set_watermark(tx: &Transaction<'_>, repository_id: i64, commit_id: &str) -> Result<()> {
    tx.execute(
        "UPDATE repositories SET last_scanned_commit = ?, last_scanned_at = ? WHERE id = ?",
        params![commit_id, Utc::now().timestamp(), repository_id],
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::tests::{sample_detail, store_with_repo};
    use super::*;
    use crate::model::StatsFilter;

    #[test]
    fn duplicate_path_is_rejected() {
        let (store, _) = store_with_repo();
        let again = store.insert_repository(&NewRepository {
            path: "/work/alpha".to_string(),
            display_name: "alpha".to_string(),
            remote_url: None,
        });
        assert!(matches!(again, Err(RepostatError::DuplicatePath(_))));
    }

    #[test]
    fn rewriting_a_known_commit_is_a_no_op() {
        let (store, repo_id) = store_with_repo();
        let detail = sample_detail(repo_id, "c1", &[("a.rs", 3, 1)]);
        assert_eq!(store.write_batch(repo_id, &[detail.clone()], Some("c1")).unwrap(), 1);
        assert_eq!(store.write_batch(repo_id, &[detail], Some("c1")).unwrap(), 0);

        let stored = store.commit_detail(repo_id, "c1").unwrap();
        assert_eq!(stored.file_changes.len(), 1);
    }

    #[test]
    fn fault_between_commit_and_files_leaves_nothing_behind() {
        let (store, repo_id) = store_with_repo();
        let first = sample_detail(repo_id, "c1", &[("a.rs", 1, 0)]);
        let second = sample_detail(repo_id, "c2", &[("b.rs", 2, 0), ("c.rs", 4, 4)]);

        let result = store.write_batch_with(
            repo_id,
            &[first, second],
            Some("c2"),
            |detail| {
                if detail.commit.id == "c2" {
                    Err(RepostatError::Storage("injected crash".to_string()))
                } else {
                    Ok(())
                }
            },
        );
        assert!(result.is_err());

        assert!(matches!(
            store.commit_detail(repo_id, "c1"),
            Err(RepostatError::NotFound(_))
        ));
        assert!(matches!(
            store.commit_detail(repo_id, "c2"),
            Err(RepostatError::NotFound(_))
        ));
        assert!(store.file_stats(&StatsFilter::new()).unwrap().is_empty());
        let repo = store.repository(repo_id).unwrap();
        assert_eq!(repo.last_scanned_commit, None);
    }

    #[test]
    fn deleting_a_repository_cascades() {
        let (store, repo_id) = store_with_repo();
        store
            .write_batch(repo_id, &[sample_detail(repo_id, "c1", &[("a.rs", 1, 0)])], Some("c1"))
            .unwrap();
        store.delete_repository(repo_id).unwrap();

        let conn = store.conn().unwrap();
        let commits: i64 = conn.query_row("SELECT COUNT(*) FROM commits", [], |r| r.get(0)).unwrap();
        let files: i64 = conn.query_row("SELECT COUNT(*) FROM file_changes", [], |r| r.get(0)).unwrap();
        assert_eq!((commits, files), (0, 0));
    }

    #[test]
    fn deleting_unknown_repository_is_not_found() {
        let (store, repo_id) = store_with_repo();
        assert!(matches!(
            store.delete_repository(repo_id + 100),
            Err(RepostatError::NotFound(_))
        ));
    }

    #[test]
    fn reset_clears_history_and_watermark() {
        let (store, repo_id) = store_with_repo();
        store
            .write_batch(repo_id, &[sample_detail(repo_id, "c1", &[("a.rs", 1, 0)])], Some("c1"))
            .unwrap();
        store.reset_repository(repo_id).unwrap();

        let repo = store.repository(repo_id).unwrap();
        assert_eq!(repo.last_scanned_commit, None);
        assert_eq!(repo.last_scanned_at, None);
        assert!(store.known_commit_ids(repo_id).unwrap().is_empty());
    }

    #[test]
    fn batch_without_watermark_leaves_it_alone() {
        let (store, repo_id) = store_with_repo();
        store
            .write_batch(repo_id, &[sample_detail(repo_id, "c1", &[])], Some("c1"))
            .unwrap();
        store
            .write_batch(repo_id, &[sample_detail(repo_id, "c2", &[])], None)
            .unwrap();
        let repo = store.repository(repo_id).unwrap();
        assert_eq!(repo.last_scanned_commit.as_deref(), Some("c1"));
    }
}
