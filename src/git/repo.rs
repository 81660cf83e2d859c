use crate::error::{RepostatError, Result};
use gix::{ObjectId, Repository};
use std::path::{Path, PathBuf};

/// A branch tip the walker starts from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tip {
    pub name: String,
    pub id: ObjectId,
}

pub struct GitRepo {
    repo: Repository,
    path: PathBuf,
}

impl GitRepo {
    /// Opens the repository whose root is exactly `path`. Subdirectories of
    /// a work tree and plain directories are rejected.
    pub fn open_root<P: AsRef<Path>>(path: P) -> Result<Self> {
        let requested = path.as_ref();
        let canonical = std::fs::canonicalize(requested).map_err(|e| {
            RepostatError::InvalidRepository(format!("{}: {e}", requested.display()))
        })?;

        let repo = gix::open(&canonical).map_err(|e| {
            RepostatError::InvalidRepository(format!("{}: {e}", canonical.display()))
        })?;

        let root = repo.workdir().unwrap_or_else(|| repo.path()).to_path_buf();
        let root = std::fs::canonicalize(&root).unwrap_or(root);
        if root != canonical {
            return Err(RepostatError::InvalidRepository(format!(
                "{} is inside the repository at {}",
                canonical.display(),
                root.display()
            )));
        }

        Ok(Self {
            repo,
            path: canonical,
        })
    }

    /// Opens an already registered repository for scanning; any failure here
    /// means the repository can no longer be read.
    pub fn open_registered<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let repo = gix::open(&path)
            .map_err(|e| RepostatError::RepositoryUnreadable(format!("{}: {e}", path.display())))?;
        Ok(Self { repo, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn display_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().trim_end_matches(".git").to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.path.to_string_lossy().to_string())
    }

    /// URL of the default fetch remote, when there is one.
    pub fn remote_url(&self) -> Option<String> {
        let remote = self
            .repo
            .find_default_remote(gix::remote::Direction::Fetch)?
            .ok()?;
        remote
            .url(gix::remote::Direction::Fetch)
            .map(|url| url.to_bstring().to_string())
    }

    pub(crate) fn inner(&self) -> &Repository {
        &self.repo
    }

    /// Local branch tips, the checked-out branch first and the rest by name.
    /// A detached HEAD that no branch points at is appended as `HEAD`.
    pub fn tips(&self) -> Result<Vec<Tip>> {
        let head_branch = self
            .repo
            .head_name()?
            .map(|name| name.as_ref().shorten().to_string());

        let platform = self
            .repo
            .references()
            .map_err(|e| RepostatError::GitRepo(format!("Cannot read references: {e}")))?;
        let branches = platform
            .local_branches()
            .map_err(|e| RepostatError::GitRepo(format!("Cannot list branches: {e}")))?;

        let mut tips = Vec::new();
        for reference in branches {
            let mut reference =
                reference.map_err(|e| RepostatError::GitRepo(format!("Bad reference: {e}")))?;
            let name = reference.name().shorten().to_string();
            let id = reference
                .peel_to_id_in_place()
                .map_err(|e| RepostatError::GitRepo(format!("Cannot resolve branch {name}: {e}")))?
                .detach();
            tips.push(Tip { name, id });
        }

        tips.sort_by(|a, b| {
            let a_head = head_branch.as_deref() == Some(a.name.as_str());
            let b_head = head_branch.as_deref() == Some(b.name.as_str());
            b_head.cmp(&a_head).then_with(|| a.name.cmp(&b.name))
        });

        if head_branch.is_none() {
            if let Ok(head_id) = self.repo.head_id() {
                let head_id = head_id.detach();
                if !tips.iter().any(|t| t.id == head_id) {
                    tips.push(Tip {
                        name: "HEAD".to_string(),
                        id: head_id,
                    });
                }
            }
        }

        Ok(tips)
    }

    /// Whether `commit_id` names a commit present in the object database.
    pub fn has_commit(&self, commit_id: &str) -> bool {
        ObjectId::from_hex(commit_id.as_bytes())
            .ok()
            .and_then(|oid| self.repo.find_commit(oid).ok())
            .is_some()
    }
}
