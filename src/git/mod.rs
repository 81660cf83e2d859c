pub mod diff;
pub mod repo;
pub mod walk;

pub use diff::DiffExtractor;
pub use repo::{GitRepo, Tip};
pub use walk::{CommitWalker, ResumeCursor, WalkedCommit};
