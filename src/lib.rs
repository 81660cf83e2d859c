pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod git;
pub mod model;
pub mod output;
pub mod registry;
pub mod scan;
pub mod stats;
pub mod store;
pub mod util;

pub use config::EngineConfig;
pub use engine::{Engine, RefreshOutcome};
pub use error::{ErrorKind, ErrorReport, RepostatError, Result};
pub use model::{
    AggregateBundle, Commit, CommitDetail, DateRange, FileChange, Repository, ScanMode, ScanResult,
    ScanState, StatsFilter,
};
