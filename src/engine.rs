//! The public face of the crate: repository management, scanning and the
//! read-side queries, all behind one handle that can be shared across
//! threads.

use crate::config::EngineConfig;
use crate::error::{ErrorReport, Result};
use crate::model::{AggregateBundle, Commit, CommitDetail, Repository, ScanMode, ScanResult, ScanState, StatsFilter};
use crate::registry::Registry;
use crate::scan::Scanner;
use crate::stats::{self, AggregateOptions};
use crate::store::Store;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Per-repository result of a multi-repository refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshOutcome {
    pub repository_id: i64,
    pub result: std::result::Result<ScanResult, ErrorReport>,
}

pub struct Engine {
    store: Arc<Store>,
    registry: Registry,
    config: EngineConfig,
}

impl Engine {
    pub fn open(config: EngineConfig) -> Result<Self> {
        let store = Store::open(&config.database_path)?;
        Ok(Self::with_store(store, config))
    }

    pub fn in_memory(config: EngineConfig) -> Result<Self> {
        Ok(Self::with_store(Store::open_in_memory()?, config))
    }

    fn with_store(store: Store, config: EngineConfig) -> Self {
        let store = Arc::new(store);
        Self {
            registry: Registry::new(Arc::clone(&store)),
            store,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn add_repository<P: AsRef<Path>>(&self, path: P) -> Result<Repository> {
        self.registry.register(path)
    }

    pub fn remove_repository(&self, repository_id: i64) -> Result<()> {
        self.registry.unregister(repository_id)
    }

    pub fn list_repositories(&self) -> Result<Vec<Repository>> {
        self.registry.list()
    }

    pub fn scan_state(&self, repository_id: i64) -> Result<ScanState> {
        self.registry.state(repository_id)
    }

    /// Scans one repository. Fails with `ScanInProgress` when another scan of
    /// the same repository has not finished yet.
    pub fn scan_repository(&self, repository_id: i64, mode: ScanMode) -> Result<ScanResult> {
        let mut guard = self.registry.begin_scan(repository_id)?;
        let repository = self.registry.get(repository_id)?;
        let result = Scanner::new(&self.store, &self.config).scan(&repository, mode);
        if let Err(e) = &result {
            warn!(repository_id = guard.repository_id(), error = %e, "scan failed");
            guard.fail(e.report().message);
        }
        result
    }

    /// Scans every registered repository, at most `max_concurrent_scans` at
    /// a time. A failing repository does not stop the others.
    pub fn refresh_all(&self, mode: ScanMode) -> Result<Vec<RefreshOutcome>> {
        let repositories = self.registry.list()?;
        let scan_one = |repository: &Repository| RefreshOutcome {
            repository_id: repository.id,
            result: self
                .scan_repository(repository.id, mode)
                .map_err(|e| e.report()),
        };

        let outcomes: Vec<RefreshOutcome> = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.max_concurrent_scans)
            .build()
        {
            Ok(pool) => pool.install(|| repositories.par_iter().map(scan_one).collect()),
            Err(e) => {
                warn!(error = %e, "could not start scan pool, refreshing sequentially");
                repositories.iter().map(scan_one).collect()
            }
        };
        Ok(outcomes)
    }

    pub fn get_statistics(&self, filter: &StatsFilter) -> Result<AggregateBundle> {
        filter.validate()?;
        let commits = self.store.commits(filter)?;
        let files = self.store.file_stats(filter)?;
        let in_scope: Vec<Repository> = self
            .store
            .list_repositories()?
            .into_iter()
            .filter(|repo| filter.repository_id.map_or(true, |id| id == repo.id))
            .collect();
        Ok(stats::compute(
            &commits,
            &files,
            &in_scope,
            filter,
            &AggregateOptions::from(&self.config),
        ))
    }

    /// Matching commits, newest first.
    pub fn get_commit_timeline(&self, filter: &StatsFilter) -> Result<Vec<Commit>> {
        filter.validate()?;
        self.store.commits(filter)
    }

    pub fn get_commit_detail(&self, repository_id: i64, commit_id: &str) -> Result<CommitDetail> {
        self.store.commit_detail(repository_id, commit_id)
    }
}
