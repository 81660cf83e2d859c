//! Drives one scan of one repository: walk, extract, write in batches.

use crate::config::EngineConfig;
use crate::error::{RepostatError, Result};
use crate::git::{CommitWalker, DiffExtractor, GitRepo, ResumeCursor, WalkedCommit};
use crate::model::{Repository, ScanMode, ScanResult};
use crate::store::Store;
use chrono::{DateTime, Utc};
use gix::ObjectId;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct Scanner<'a> {
    store: &'a Store,
    config: &'a EngineConfig,
}

impl<'a> Scanner<'a> {
    pub fn new(store: &'a Store, config: &'a EngineConfig) -> Self {
        Self { store, config }
    }

    /// Scans `repository` in the given mode. Any git-level failure is
    /// reported as `RepositoryUnreadable`; the watermark only ever reflects
    /// batches that were fully written.
    pub fn scan(&self, repository: &Repository, mode: ScanMode) -> Result<ScanResult> {
        info!(repository_id = repository.id, ?mode, "scan started");
        let git = GitRepo::open_registered(&repository.path)?;
        let result = self
            .scan_open(&git, repository, mode)
            .map_err(RepostatError::into_unreadable)?;
        info!(
            repository_id = repository.id,
            commits = result.commits_processed,
            rewrite = result.history_rewrite_detected,
            "scan finished"
        );
        Ok(result)
    }

    fn scan_open(&self, git: &GitRepo, repository: &Repository, mode: ScanMode) -> Result<ScanResult> {
        let repository_id = repository.id;
        let walker = CommitWalker::new(git);
        let mut history_rewrite_detected = false;
        let mut watermark = repository.last_scanned_commit.clone();

        let pending = match mode {
            ScanMode::Incremental => {
                let known = self.store.known_commit_ids(repository_id)?;
                let cursor = ResumeCursor::new(repository.last_scanned_commit.clone());
                match walker.resume(&cursor, &known) {
                    Ok(pending) => pending,
                    Err(RepostatError::HistoryRewriteDetected(lost)) => {
                        warn!(
                            repository_id,
                            watermark = %lost,
                            "watermark no longer reachable, rescanning full history"
                        );
                        history_rewrite_detected = true;
                        let pending = walker.full(&HashSet::new())?;
                        self.store.reset_repository(repository_id)?;
                        watermark = None;
                        pending
                    }
                    Err(e) => return Err(e),
                }
            }
            ScanMode::Forced => {
                let pending = walker.full(&HashSet::new())?;
                self.store.reset_repository(repository_id)?;
                watermark = None;
                pending
            }
            ScanMode::RecentBound(bound) => {
                let known = self.store.known_commit_ids(repository_id)?;
                walker.recent(cutoff_before(Utc::now(), bound), &known)?
            }
        };

        let line = match mode {
            ScanMode::RecentBound(_) => HashSet::new(),
            _ => walker.advancing_line(watermark.as_deref())?,
        };
        let commits_processed = self.write_pending(git, repository_id, &pending, &line)?;

        // Everything reachable is stored now, so the checked-out tip is a
        // valid resume point as long as it descends from the old one.
        if let Some(tip) = git.tips()?.first() {
            if line.contains(&tip.id) {
                self.store.advance_watermark(repository_id, &tip.id.to_string())?;
            } else {
                debug!(repository_id, tip = %tip.name, "checked-out tip does not advance the watermark");
            }
        }

        Ok(ScanResult {
            repository_id,
            mode,
            commits_processed,
            watermark: self.store.repository(repository_id)?.last_scanned_commit,
            history_rewrite_detected,
        })
    }

    /// Extracts and writes `pending` (already ordered parents first) in
    /// batches, one transaction each. A batch moves the watermark to its
    /// newest commit on `line`, if any.
    fn write_pending(
        &self,
        git: &GitRepo,
        repository_id: i64,
        pending: &[WalkedCommit],
        line: &HashSet<ObjectId>,
    ) -> Result<usize> {
        let extractor = DiffExtractor::new(git);
        let mut written = 0;

        for batch in pending.chunks(self.config.batch_size) {
            let details = batch
                .iter()
                .map(|commit| extractor.extract(commit, repository_id))
                .collect::<Result<Vec<_>>>()?;
            let watermark = batch
                .iter()
                .rev()
                .find(|commit| line.contains(&commit.id))
                .map(|commit| commit.id.to_string());
            written += self
                .store
                .write_batch(repository_id, &details, watermark.as_deref())?;
            debug!(repository_id, batch = batch.len(), written, "batch stored");
        }

        Ok(written)
    }
}

/// Oldest author time a recent scan still accepts. Bounds too large to
/// represent reach back to the beginning of time.
fn cutoff_before(now: DateTime<Utc>, bound: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(bound)
        .ok()
        .and_then(|delta| now.checked_sub_signed(delta))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cutoff_subtracts_the_bound() {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        let cutoff = cutoff_before(now, Duration::from_secs(24 * 3600));
        assert_eq!(cutoff, Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn huge_bound_reaches_back_to_the_start() {
        let now = Utc.with_ymd_and_hms(2024, 5, 2, 12, 0, 0).unwrap();
        assert_eq!(cutoff_before(now, Duration::MAX), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn unreadable_path_fails_the_scan() {
        let store = Store::open_in_memory().unwrap();
        let config = EngineConfig::default();
        let dir = tempfile::tempdir().unwrap();
        let repository = store
            .insert_repository(&crate::store::NewRepository {
                path: dir.path().join("gone").to_string_lossy().to_string(),
                display_name: "gone".to_string(),
                remote_url: None,
            })
            .unwrap();
        let result = Scanner::new(&store, &config).scan(&repository, ScanMode::Incremental);
        assert!(matches!(result, Err(RepostatError::RepositoryUnreadable(_))));
    }
}
