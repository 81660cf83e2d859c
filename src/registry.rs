//! Registered repositories and their per-repository scan state.

use crate::error::{RepostatError, Result};
use crate::git::GitRepo;
use crate::model::{Repository, ScanState};
use crate::store::{NewRepository, Store};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::info;

pub struct Registry {
    store: Arc<Store>,
    states: Mutex<HashMap<i64, ScanState>>,
}

impl Registry {
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            states: Mutex::new(HashMap::new()),
        }
    }

    /// Validates that `path` is a repository root and records it without a
    /// watermark.
    pub fn register<P: AsRef<Path>>(&self, path: P) -> Result<Repository> {
        let git = GitRepo::open_root(path)?;
        let repository = self.store.insert_repository(&NewRepository {
            path: git.path().to_string_lossy().to_string(),
            display_name: git.display_name(),
            remote_url: git.remote_url(),
        })?;
        info!(
            repository_id = repository.id,
            path = %repository.path,
            "registered repository"
        );
        Ok(repository)
    }

    /// Removes the repository and all its stored history. Refused while the
    /// repository is being scanned.
    pub fn unregister(&self, repository_id: i64) -> Result<()> {
        let mut states = self.states();
        if states.get(&repository_id) == Some(&ScanState::Scanning) {
            return Err(RepostatError::ScanInProgress(repository_id));
        }
        self.store.delete_repository(repository_id)?;
        states.remove(&repository_id);
        info!(repository_id, "unregistered repository");
        Ok(())
    }

    pub fn list(&self) -> Result<Vec<Repository>> {
        self.store.list_repositories()
    }

    pub fn get(&self, repository_id: i64) -> Result<Repository> {
        self.store.repository(repository_id)
    }

    pub fn state(&self, repository_id: i64) -> Result<ScanState> {
        self.store.repository(repository_id)?;
        Ok(self
            .states()
            .get(&repository_id)
            .cloned()
            .unwrap_or(ScanState::Idle))
    }

    /// Marks the repository as scanning. Only one guard per repository can
    /// exist at a time; the state is released when the guard drops.
    pub fn begin_scan(&self, repository_id: i64) -> Result<ScanGuard<'_>> {
        self.store.repository(repository_id)?;
        let mut states = self.states();
        if states.get(&repository_id) == Some(&ScanState::Scanning) {
            return Err(RepostatError::ScanInProgress(repository_id));
        }
        states.insert(repository_id, ScanState::Scanning);
        Ok(ScanGuard {
            registry: self,
            repository_id,
            failure: None,
        })
    }

    // The map holds plain values, so a panic elsewhere cannot leave it
    // half-updated.
    fn states(&self) -> MutexGuard<'_, HashMap<i64, ScanState>> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub struct ScanGuard<'a> {
    registry: &'a Registry,
    repository_id: i64,
    failure: Option<String>,
}

impl ScanGuard<'_> {
    pub fn repository_id(&self) -> i64 {
        self.repository_id
    }

    /// Leaves the repository in `Failed` instead of `Idle` once released.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.failure = Some(message.into());
    }
}

impl Drop for ScanGuard<'_> {
    fn drop(&mut self) {
        let next = match self.failure.take() {
            Some(message) => ScanState::Failed(message),
            None => ScanState::Idle,
        };
        self.registry.states().insert(self.repository_id, next);
    }
}
