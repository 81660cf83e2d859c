use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RepostatError>;

#[derive(Error, Debug)]
pub enum RepostatError {
    #[error("Not a usable git repository: {0}")]
    InvalidRepository(String),
    #[error("Repository already registered: {0}")]
    DuplicatePath(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Repository unreadable: {0}")]
    RepositoryUnreadable(String),
    #[error("History rewrite detected: watermark {0} is no longer reachable")]
    HistoryRewriteDetected(String),
    #[error("A scan is already running for repository {0}")]
    ScanInProgress(i64),
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Git error: {0}")]
    Git(#[from] Box<gix::open::Error>),
    #[error("Git repository error: {0}")]
    GitRepo(String),
    #[error("Object find error: {0}")]
    ObjectFind(#[from] Box<gix::object::find::existing::Error>),
    #[error("Commit error: {0}")]
    Commit(#[from] Box<gix::object::commit::Error>),
    #[error("Object find with conversion error: {0}")]
    ObjectFindConv(#[from] Box<gix::object::find::existing::with_conversion::Error>),
    #[error("Object decode error: {0}")]
    ObjectDecode(#[from] Box<gix::objs::decode::Error>),
    #[error("Diff tree to tree error: {0}")]
    DiffTreeToTree(#[from] Box<gix::repository::diff_tree_to_tree::Error>),
    #[error("Reference find error: {0}")]
    RefFind(#[from] Box<gix::reference::find::existing::Error>),
}

/// Caller-facing classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidRepository,
    DuplicatePath,
    NotFound,
    RepositoryUnreadable,
    HistoryRewriteDetected,
    ScanInProgress,
    InvalidFilter,
    StorageFailure,
}

/// What the presentation layer gets to see: a classification and a message
/// that carries no storage or library internals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl RepostatError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RepostatError::InvalidRepository(_) => ErrorKind::InvalidRepository,
            RepostatError::DuplicatePath(_) => ErrorKind::DuplicatePath,
            RepostatError::NotFound(_) => ErrorKind::NotFound,
            RepostatError::HistoryRewriteDetected(_) => ErrorKind::HistoryRewriteDetected,
            RepostatError::ScanInProgress(_) => ErrorKind::ScanInProgress,
            RepostatError::InvalidFilter(_) => ErrorKind::InvalidFilter,
            RepostatError::Storage(_) | RepostatError::Database(_) => ErrorKind::StorageFailure,
            RepostatError::RepositoryUnreadable(_)
            | RepostatError::Io(_)
            | RepostatError::Git(_)
            | RepostatError::GitRepo(_)
            | RepostatError::ObjectFind(_)
            | RepostatError::Commit(_)
            | RepostatError::ObjectFindConv(_)
            | RepostatError::ObjectDecode(_)
            | RepostatError::DiffTreeToTree(_)
            | RepostatError::RefFind(_) => ErrorKind::RepositoryUnreadable,
        }
    }

    pub fn report(&self) -> ErrorReport {
        let message = match self.kind() {
            ErrorKind::StorageFailure => "The statistics store could not be read or written".to_string(),
            ErrorKind::RepositoryUnreadable => "The repository could not be read".to_string(),
            _ => self.to_string(),
        };
        ErrorReport {
            kind: self.kind(),
            message,
        }
    }

    /// Folds every git-level failure into `RepositoryUnreadable`, keeping the
    /// already-classified variants as they are.
    pub fn into_unreadable(self) -> Self {
        match self.kind() {
            ErrorKind::RepositoryUnreadable => match self {
                RepostatError::RepositoryUnreadable(_) => self,
                other => RepostatError::RepositoryUnreadable(other.to_string()),
            },
            _ => self,
        }
    }
}

// Manual From implementations for unboxed to boxed conversions
impl From<gix::open::Error> for RepostatError {
    fn from(err: gix::open::Error) -> Self {
        RepostatError::Git(Box::new(err))
    }
}

impl From<gix::object::find::existing::Error> for RepostatError {
    fn from(err: gix::object::find::existing::Error) -> Self {
        RepostatError::ObjectFind(Box::new(err))
    }
}

impl From<gix::object::commit::Error> for RepostatError {
    fn from(err: gix::object::commit::Error) -> Self {
        RepostatError::Commit(Box::new(err))
    }
}

impl From<gix::object::find::existing::with_conversion::Error> for RepostatError {
    fn from(err: gix::object::find::existing::with_conversion::Error) -> Self {
        RepostatError::ObjectFindConv(Box::new(err))
    }
}

impl From<gix::objs::decode::Error> for RepostatError {
    fn from(err: gix::objs::decode::Error) -> Self {
        RepostatError::ObjectDecode(Box::new(err))
    }
}

impl From<gix::repository::diff_tree_to_tree::Error> for RepostatError {
    fn from(err: gix::repository::diff_tree_to_tree::Error) -> Self {
        RepostatError::DiffTreeToTree(Box::new(err))
    }
}

impl From<gix::reference::find::existing::Error> for RepostatError {
    fn from(err: gix::reference::find::existing::Error) -> Self {
        RepostatError::RefFind(Box::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn storage_report_hides_details() {
        let err = RepostatError::Database(rusqlite::Error::InvalidQuery);
        let report = err.report();
        assert_eq!(report.kind, ErrorKind::StorageFailure);
        assert!(!report.message.contains("Query"));
    }

    #[test]
    fn caller_errors_keep_their_message() {
        let err = RepostatError::DuplicatePath("/tmp/repo".to_string());
        let report = err.report();
        assert_eq!(report.kind, ErrorKind::DuplicatePath);
        assert!(report.message.contains("/tmp/repo"));
    }

    #[test]
    fn git_failures_fold_into_unreadable() {
        let err = RepostatError::GitRepo("bad pack".to_string()).into_unreadable();
        assert!(matches!(err, RepostatError::RepositoryUnreadable(_)));
        let kept = RepostatError::NotFound("commit".to_string()).into_unreadable();
        assert!(matches!(kept, RepostatError::NotFound(_)));
    }
}
