//! Commit graph traversal with an explicit resume point.

use super::repo::GitRepo;
use crate::error::{RepostatError, Result};
use chrono::{DateTime, Utc};
use gix::ObjectId;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// A commit discovered by the walker, not yet diffed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedCommit {
    pub id: ObjectId,
    pub parents: Vec<ObjectId>,
    pub authored_seconds: i64,
    /// Tip under which the commit was first reached.
    pub branch: String,
}

/// Where an incremental walk picks up: the last commit whose data (and the
/// data of all its ancestors) is known to be stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeCursor {
    pub last_processed: Option<String>,
}

impl ResumeCursor {
    pub fn new(last_processed: Option<String>) -> Self {
        Self { last_processed }
    }
}

enum Boundary {
    Nothing,
    Watermark(ObjectId),
    /// Stop below commits older than the cutoff or already stored.
    Recent { cutoff: i64 },
}

pub struct CommitWalker<'r> {
    repo: &'r GitRepo,
}

impl<'r> CommitWalker<'r> {
    pub fn new(repo: &'r GitRepo) -> Self {
        Self { repo }
    }

    /// Every reachable commit not in `known`, parents before children.
    pub fn full(&self, known: &HashSet<String>) -> Result<Vec<WalkedCommit>> {
        let (commits, _) = self.traverse(&Boundary::Nothing, known)?;
        Ok(parents_first(commits))
    }

    /// Commits reachable from the tips but not from the cursor, minus those
    /// already in `known`, parents before children.
    ///
    /// Fails with `HistoryRewriteDetected` when the cursor's commit is gone
    /// or no longer reachable from any tip.
    pub fn resume(&self, cursor: &ResumeCursor, known: &HashSet<String>) -> Result<Vec<WalkedCommit>> {
        let Some(last) = cursor.last_processed.as_deref() else {
            return self.full(known);
        };
        if !self.repo.has_commit(last) {
            return Err(RepostatError::HistoryRewriteDetected(last.to_string()));
        }
        let watermark = ObjectId::from_hex(last.as_bytes())
            .map_err(|_| RepostatError::HistoryRewriteDetected(last.to_string()))?;

        let (commits, reached) = self.traverse(&Boundary::Watermark(watermark), known)?;
        if !reached {
            return Err(RepostatError::HistoryRewriteDetected(last.to_string()));
        }
        Ok(parents_first(commits))
    }

    /// Newest commits back to `cutoff`, stopping early on anything already
    /// stored.
    pub fn recent(&self, cutoff: DateTime<Utc>, known: &HashSet<String>) -> Result<Vec<WalkedCommit>> {
        let boundary = Boundary::Recent {
            cutoff: cutoff.timestamp(),
        };
        let (commits, _) = self.traverse(&boundary, known)?;
        Ok(parents_first(commits))
    }

    /// Commits the watermark may move to: the first-parent chain of the
    /// checked-out tip, restricted to strict descendants of `watermark`
    /// (the whole chain when there is none). Any two of them are ancestor
    /// and descendant, so moving along this set never goes backward.
    pub fn advancing_line(&self, watermark: Option<&str>) -> Result<HashSet<ObjectId>> {
        let Some(tip) = self.repo.tips()?.into_iter().next() else {
            return Ok(HashSet::new());
        };
        let watermark = match watermark {
            Some(hex) => match ObjectId::from_hex(hex.as_bytes()) {
                Ok(id) => Some(id),
                Err(_) => return Ok(HashSet::new()),
            },
            None => None,
        };

        // Ancestors of the tip, not expanded past the watermark.
        let repo = self.repo.inner();
        let mut parents_of: HashMap<ObjectId, Vec<ObjectId>> = HashMap::new();
        let mut stack = vec![tip.id];
        while let Some(commit_id) = stack.pop() {
            if Some(commit_id) == watermark || parents_of.contains_key(&commit_id) {
                continue;
            }
            let parents: Vec<ObjectId> = repo
                .find_commit(commit_id)?
                .parent_ids()
                .map(|id| id.detach())
                .collect();
            stack.extend(parents.iter().copied());
            parents_of.insert(commit_id, parents);
        }

        let descendants = match watermark {
            None => None,
            Some(watermark) => {
                let mut children: HashMap<ObjectId, Vec<ObjectId>> = HashMap::new();
                for (child, parents) in &parents_of {
                    for parent in parents {
                        children.entry(*parent).or_default().push(*child);
                    }
                }
                let mut reached = HashSet::new();
                let mut stack = vec![watermark];
                while let Some(commit_id) = stack.pop() {
                    for child in children.get(&commit_id).into_iter().flatten() {
                        if reached.insert(*child) {
                            stack.push(*child);
                        }
                    }
                }
                Some(reached)
            }
        };

        let mut line = HashSet::new();
        let mut current = Some(tip.id);
        while let Some(commit_id) = current {
            let Some(parents) = parents_of.get(&commit_id) else {
                break;
            };
            // below the first non-descendant nothing descends either
            if descendants.as_ref().is_some_and(|d| !d.contains(&commit_id)) {
                break;
            }
            line.insert(commit_id);
            current = parents.first().copied();
        }
        Ok(line)
    }

    /// Depth-first from each tip in order; a commit belongs to the first tip
    /// that reaches it. Returns the unknown commits and whether the
    /// boundary was hit.
    fn traverse(
        &self,
        boundary: &Boundary,
        known: &HashSet<String>,
    ) -> Result<(Vec<WalkedCommit>, bool)> {
        let repo = self.repo.inner();
        let mut commits = Vec::new();
        let mut seen: HashSet<ObjectId> = HashSet::new();
        let mut boundary_hit = false;

        for tip in self.repo.tips()? {
            let mut stack = vec![tip.id];
            while let Some(commit_id) = stack.pop() {
                if !seen.insert(commit_id) {
                    continue;
                }

                let commit = repo.find_commit(commit_id)?;
                let authored_seconds = commit.author()?.seconds();
                let hex = commit_id.to_string();

                let stop = match boundary {
                    Boundary::Nothing => false,
                    Boundary::Watermark(watermark) => commit_id == *watermark,
                    Boundary::Recent { cutoff } => {
                        authored_seconds < *cutoff || known.contains(&hex)
                    }
                };
                if stop {
                    boundary_hit = true;
                    continue;
                }

                let parents: Vec<ObjectId> = commit.parent_ids().map(|id| id.detach()).collect();
                for pid in parents.iter().rev() {
                    stack.push(*pid);
                }

                if !known.contains(&hex) {
                    commits.push(WalkedCommit {
                        id: commit_id,
                        parents,
                        authored_seconds,
                        branch: tip.name.clone(),
                    });
                }
            }
        }

        Ok((commits, boundary_hit))
    }
}

/// Orders commits so every parent inside the set precedes its children;
/// among commits that are ready at the same time the oldest (then lowest
/// id) goes first, which keeps the order stable for a fixed graph.
fn parents_first(commits: Vec<WalkedCommit>) -> Vec<WalkedCommit> {
    let index: HashMap<ObjectId, usize> = commits
        .iter()
        .enumerate()
        .map(|(i, c)| (c.id, i))
        .collect();

    let mut pending = vec![0usize; commits.len()];
    let mut children: Vec<Vec<usize>> = vec![Vec::new(); commits.len()];
    for (i, commit) in commits.iter().enumerate() {
        for parent in &commit.parents {
            if let Some(&p) = index.get(parent) {
                pending[i] += 1;
                children[p].push(i);
            }
        }
    }

    let mut ready: BinaryHeap<Reverse<(i64, ObjectId, usize)>> = commits
        .iter()
        .enumerate()
        .filter(|(i, _)| pending[*i] == 0)
        .map(|(i, c)| Reverse((c.authored_seconds, c.id, i)))
        .collect();

    let mut order = Vec::with_capacity(commits.len());
    while let Some(Reverse((_, _, i))) = ready.pop() {
        order.push(i);
        for &child in &children[i] {
            pending[child] -= 1;
            if pending[child] == 0 {
                let c = &commits[child];
                ready.push(Reverse((c.authored_seconds, c.id, child)));
            }
        }
    }

    let mut slots: Vec<Option<WalkedCommit>> = commits.into_iter().map(Some).collect();
    order.into_iter().filter_map(|i| slots[i].take()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oid(n: u8) -> ObjectId {
        ObjectId::from_bytes_or_panic(&[n; 20])
    }

    fn walked(n: u8, parents: &[u8], seconds: i64) -> WalkedCommit {
        WalkedCommit {
            id: oid(n),
            parents: parents.iter().map(|p| oid(*p)).collect(),
            authored_seconds: seconds,
            branch: "main".to_string(),
        }
    }

    #[test]
    fn parents_come_before_children_despite_clock_skew() {
        // child 2 claims to be older than its parent 1
        let commits = vec![walked(2, &[1], 10), walked(1, &[], 50), walked(3, &[2], 60)];
        let ids: Vec<ObjectId> = parents_first(commits).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![oid(1), oid(2), oid(3)]);
    }

    #[test]
    fn merge_waits_for_both_parents() {
        let commits = vec![
            walked(4, &[2, 3], 40),
            walked(3, &[1], 30),
            walked(2, &[1], 20),
            walked(1, &[], 10),
        ];
        let ids: Vec<ObjectId> = parents_first(commits).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![oid(1), oid(2), oid(3), oid(4)]);
    }

    #[test]
    fn parents_outside_the_set_are_ignored() {
        let commits = vec![walked(6, &[5], 20), walked(5, &[9], 10)];
        let ids: Vec<ObjectId> = parents_first(commits).into_iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![oid(5), oid(6)]);
    }
}
