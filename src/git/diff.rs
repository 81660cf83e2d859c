use super::repo::GitRepo;
use super::walk::WalkedCommit;
use crate::error::{RepostatError, Result};
use crate::model::{Commit, CommitDetail, FileChange};
use chrono::{DateTime, Utc};
use gix::object::tree::diff::ChangeDetached;
use gix::objs::tree::EntryMode;
use gix::ObjectId;
use similar::{ChangeTag, TextDiff};
use std::collections::BTreeMap;

const BINARY_SNIFF_LEN: usize = 8000;
const CONTEXT_LINES: usize = 3;

/// Turns one commit into its stored form: metadata plus one row per touched
/// file, diffed against the first parent (or the empty tree for a root
/// commit).
///
/// Renames are recorded as a deletion of the old path and an addition of the
/// new one, copies as an addition, so the totals do not depend on whether
/// git's rename tracking is enabled.
pub struct DiffExtractor<'r> {
    repo: &'r GitRepo,
}

impl<'r> DiffExtractor<'r> {
    pub fn new(repo: &'r GitRepo) -> Self {
        Self { repo }
    }

    pub fn extract(&self, walked: &WalkedCommit, repository_id: i64) -> Result<CommitDetail> {
        let repo = self.repo.inner();
        let commit = repo.find_commit(walked.id)?;
        let author = commit.author()?;
        let authored_at = author_time(walked.id, walked.authored_seconds)?;

        let record = Commit {
            id: walked.id.to_string(),
            repository_id,
            author_name: author.name.to_string(),
            author_email: author.email.to_string(),
            message: commit.message_raw()?.to_string(),
            authored_at,
            branch: Some(walked.branch.clone()),
            additions: 0,
            deletions: 0,
            files_changed: 0,
        };

        let commit_tree = commit.tree()?;
        let changes: Vec<ChangeDetached> = match walked.parents.first() {
            Some(parent_id) => {
                let parent_tree = repo.find_commit(*parent_id)?.tree()?;
                repo.diff_tree_to_tree(Some(&parent_tree), Some(&commit_tree), None)?
            }
            None => repo.diff_tree_to_tree(None, Some(&commit_tree), None)?,
        };

        let mut files: BTreeMap<String, FileChange> = BTreeMap::new();
        for change in changes {
            for (path, old, new) in self.sides(change)? {
                let (additions, deletions, is_binary, diff_text) =
                    file_delta(&path, old.as_deref(), new.as_deref());
                let entry = files.entry(path.clone()).or_insert_with(|| FileChange {
                    commit_id: record.id.clone(),
                    repository_id,
                    file_path: path,
                    additions: 0,
                    deletions: 0,
                    is_binary: false,
                    diff_text: String::new(),
                });
                entry.additions += additions;
                entry.deletions += deletions;
                entry.is_binary |= is_binary;
                entry.diff_text.push_str(&diff_text);
            }
        }

        Ok(CommitDetail::from_parts(record, files.into_values().collect()))
    }

    /// Splits a tree change into (path, old blob, new blob) triples. Trees
    /// and submodules are skipped.
    fn sides(&self, change: ChangeDetached) -> Result<Vec<(String, Option<Vec<u8>>, Option<Vec<u8>>)>> {
        let mut out = Vec::new();
        match change {
            ChangeDetached::Addition {
                entry_mode,
                id,
                location,
                ..
            } => {
                if is_file(entry_mode) {
                    out.push((location.to_string(), None, Some(self.blob(id)?)));
                }
            }
            ChangeDetached::Deletion {
                entry_mode,
                id,
                location,
                ..
            } => {
                if is_file(entry_mode) {
                    out.push((location.to_string(), Some(self.blob(id)?), None));
                }
            }
            ChangeDetached::Modification {
                previous_entry_mode,
                previous_id,
                entry_mode,
                id,
                location,
                ..
            } => {
                let old = if is_file(previous_entry_mode) {
                    Some(self.blob(previous_id)?)
                } else {
                    None
                };
                let new = if is_file(entry_mode) {
                    Some(self.blob(id)?)
                } else {
                    None
                };
                if old.is_some() || new.is_some() {
                    out.push((location.to_string(), old, new));
                }
            }
            ChangeDetached::Rewrite {
                source_id,
                source_location,
                entry_mode,
                id,
                location,
                copy,
                ..
            } => {
                if is_file(entry_mode) {
                    if !copy {
                        out.push((source_location.to_string(), Some(self.blob(source_id)?), None));
                    }
                    out.push((location.to_string(), None, Some(self.blob(id)?)));
                }
            }
        }
        Ok(out)
    }

    fn blob(&self, id: ObjectId) -> Result<Vec<u8>> {
        let object = self.repo.inner().find_object(id)?;
        Ok(object.data.clone())
    }
}

fn author_time(id: ObjectId, seconds: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0).ok_or_else(|| {
        RepostatError::GitRepo(format!("Commit {id} has an out-of-range author time: {seconds}"))
    })
}

fn is_file(mode: EntryMode) -> bool {
    !mode.is_tree() && !mode.is_commit()
}

fn is_binary(data: &[u8]) -> bool {
    data.iter().take(BINARY_SNIFF_LEN).any(|&b| b == 0)
}

/// Line counts and patch text for one file. Binary content counts as zero
/// lines and gets a placeholder instead of a patch.
fn file_delta(path: &str, old: Option<&[u8]>, new: Option<&[u8]>) -> (u64, u64, bool, String) {
    let old_name = if old.is_some() {
        format!("a/{path}")
    } else {
        "/dev/null".to_string()
    };
    let new_name = if new.is_some() {
        format!("b/{path}")
    } else {
        "/dev/null".to_string()
    };

    if old.is_some_and(is_binary) || new.is_some_and(is_binary) {
        return (0, 0, true, format!("Binary files {old_name} and {new_name} differ\n"));
    }

    let old_text = String::from_utf8_lossy(old.unwrap_or_default());
    let new_text = String::from_utf8_lossy(new.unwrap_or_default());
    let diff = TextDiff::from_lines(old_text.as_ref(), new_text.as_ref());

    let mut added = 0u64;
    let mut deleted = 0u64;
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => added += 1,
            ChangeTag::Delete => deleted += 1,
            ChangeTag::Equal => {}
        }
    }

    let patch = diff
        .unified_diff()
        .context_radius(CONTEXT_LINES)
        .header(&old_name, &new_name)
        .to_string();

    (added, deleted, false, patch)
}
