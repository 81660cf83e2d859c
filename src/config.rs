use std::path::PathBuf;

pub const DEFAULT_DB_PATH: &str = ".repostat/repostat.db";

/// Tunables for the engine. The CLI fills these from flags and environment.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub database_path: PathBuf,
    /// Upper bound on repositories scanned in parallel during a refresh.
    pub max_concurrent_scans: usize,
    /// Commits written (and the watermark advanced) per transaction.
    pub batch_size: usize,
    pub hot_file_limit: usize,
    pub word_limit: usize,
    pub min_word_length: usize,
}

impl EngineConfig {
    pub fn with_database(mut self, path: impl Into<PathBuf>) -> Self {
        self.database_path = path.into();
        self
    }

    pub fn with_max_concurrent_scans(mut self, jobs: usize) -> Self {
        self.max_concurrent_scans = jobs.max(1);
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DB_PATH),
            max_concurrent_scans: default_scan_jobs(),
            batch_size: 100,
            hot_file_limit: 20,
            word_limit: 50,
            min_word_length: 3,
        }
    }
}

/// Leave a quarter of the cores to the rest of the system.
fn default_scan_jobs() -> usize {
    let cpus = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    (cpus * 3 / 4).max(1)
}
