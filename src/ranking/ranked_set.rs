//! Ranked Set
//!
//! Order-statistic treap keyed by `(score descending, member ascending)`.
//! Every node carries its subtree size, so increments, rank lookups and the
//! start of a range are all O(log N) expected. Nodes live in an arena and
//! are never freed; a member keeps its slot for the lifetime of the set.
//!
//! Priorities come from a [`DeterministicRng`] seeded by the set key, so
//! the same insertion sequence always produces the same tree.

use std::cmp::Ordering;
use std::collections::HashMap;
use serde::{Serialize, Deserialize};
use thiserror::Error;

use crate::core::ids::UserId;
use crate::core::rng::DeterministicRng;

type NodeId = usize;

/// One row of a ranked read.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedEntry {
    /// Member (user id).
    pub member: UserId,
    /// Accumulated score.
    pub score: i64,
    /// 1-based position in descending-score order.
    pub rank: u64,
}

/// Accumulated score would leave the i64 range.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("score overflow: {current} + {delta}")]
pub struct ScoreOverflow {
    /// Score before the increment.
    pub current: i64,
    /// Rejected delta.
    pub delta: i64,
}

#[derive(Clone, Debug)]
struct Node {
    member: UserId,
    score: i64,
    priority: u64,
    left: Option<NodeId>,
    right: Option<NodeId>,
    size: usize,
}

/// A single leaderboard: members mapped to accumulated scores.
#[derive(Clone, Debug)]
pub struct RankedSet {
    nodes: Vec<Node>,
    slots: HashMap<UserId, NodeId>,
    root: Option<NodeId>,
    rng: DeterministicRng,
}

impl RankedSet {
    /// Create an empty set whose priorities derive from `set_key`.
    pub fn new(set_key: &str) -> Self {
        Self {
            nodes: Vec::new(),
            slots: HashMap::new(),
            root: None,
            rng: DeterministicRng::for_set(set_key),
        }
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.size(self.root)
    }

    /// True when no member has scored.
    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Accumulated score of a member.
    pub fn score_of(&self, member: &UserId) -> Option<i64> {
        self.slots.get(member).map(|&id| self.nodes[id].score)
    }

    /// Add `delta` to a member's score, creating the entry if absent.
    ///
    /// Returns the new score. On overflow the set is left untouched.
    pub fn increment(&mut self, member: &UserId, delta: i64) -> Result<i64, ScoreOverflow> {
        let Some(id) = self.slots.get(member).copied() else {
            let id = self.nodes.len();
            self.nodes.push(Node {
                member: member.clone(),
                score: delta,
                priority: self.rng.next_u64(),
                left: None,
                right: None,
                size: 1,
            });
            self.slots.insert(member.clone(), id);
            self.attach(id);
            return Ok(delta);
        };

        let current = self.nodes[id].score;
        let new_score = current
            .checked_add(delta)
            .ok_or(ScoreOverflow { current, delta })?;
        if delta == 0 {
            return Ok(current);
        }

        let root = self.root;
        self.root = self.detach(root, id);

        let node = &mut self.nodes[id];
        node.score = new_score;
        node.left = None;
        node.right = None;
        node.size = 1;
        self.attach(id);

        Ok(new_score)
    }

    /// 1-based descending rank, or `None` if the member never scored.
    pub fn rank_of(&self, member: &UserId) -> Option<u64> {
        let id = *self.slots.get(member)?;
        let mut before = 0usize;
        let mut cursor = self.root;

        while let Some(n) = cursor {
            let node = &self.nodes[n];
            match self.cmp_nodes(id, n) {
                Ordering::Less => cursor = node.left,
                Ordering::Equal => return Some((before + self.size(node.left) + 1) as u64),
                Ordering::Greater => {
                    before += self.size(node.left) + 1;
                    cursor = node.right;
                }
            }
        }

        None
    }

    /// Entries at 0-based positions `[offset, offset + limit)`.
    pub fn range(&self, offset: usize, limit: usize) -> Vec<RankedEntry> {
        let total = self.len();
        if limit == 0 || offset >= total {
            return Vec::new();
        }

        let take = limit.min(total - offset);
        let mut out = Vec::with_capacity(take);
        let mut skip = offset;
        self.collect(self.root, &mut skip, offset, take, &mut out);
        out
    }

    /// Every entry in rank order.
    pub fn entries(&self) -> Vec<RankedEntry> {
        self.range(0, usize::MAX)
    }

    // =========================================================================
    // TREAP INTERNALS
    // =========================================================================

    #[inline]
    fn size(&self, t: Option<NodeId>) -> usize {
        t.map_or(0, |n| self.nodes[n].size)
    }

    #[inline]
    fn update(&mut self, n: NodeId) {
        let size = 1 + self.size(self.nodes[n].left) + self.size(self.nodes[n].right);
        self.nodes[n].size = size;
    }

    /// Rank order: higher score first, then member id ascending.
    fn cmp_nodes(&self, a: NodeId, b: NodeId) -> Ordering {
        let (a, b) = (&self.nodes[a], &self.nodes[b]);
        b.score.cmp(&a.score).then_with(|| a.member.cmp(&b.member))
    }

    /// Split `t` into nodes ordered before `key` and the rest.
    fn split(&mut self, t: Option<NodeId>, key: NodeId) -> (Option<NodeId>, Option<NodeId>) {
        let Some(n) = t else {
            return (None, None);
        };

        if self.cmp_nodes(n, key) == Ordering::Less {
            let right = self.nodes[n].right;
            let (l, r) = self.split(right, key);
            self.nodes[n].right = l;
            self.update(n);
            (Some(n), r)
        } else {
            let left = self.nodes[n].left;
            let (l, r) = self.split(left, key);
            self.nodes[n].left = r;
            self.update(n);
            (l, Some(n))
        }
    }

    /// Merge two trees where every key in `l` orders before every key in `r`.
    fn merge(&mut self, l: Option<NodeId>, r: Option<NodeId>) -> Option<NodeId> {
        match (l, r) {
            (None, r) => r,
            (l, None) => l,
            (Some(a), Some(b)) => {
                if self.nodes[a].priority > self.nodes[b].priority {
                    let right = self.nodes[a].right;
                    let merged = self.merge(right, Some(b));
                    self.nodes[a].right = merged;
                    self.update(a);
                    Some(a)
                } else {
                    let left = self.nodes[b].left;
                    let merged = self.merge(Some(a), left);
                    self.nodes[b].left = merged;
                    self.update(b);
                    Some(b)
                }
            }
        }
    }

    /// Insert a standalone node into the tree.
    fn attach(&mut self, id: NodeId) {
        let root = self.root;
        let (l, r) = self.split(root, id);
        let left = self.merge(l, Some(id));
        self.root = self.merge(left, r);
    }

    /// Remove node `key` from subtree `t`, returning the new subtree root.
    fn detach(&mut self, t: Option<NodeId>, key: NodeId) -> Option<NodeId> {
        let n = t?;
        if n == key {
            let (l, r) = (self.nodes[n].left, self.nodes[n].right);
            return self.merge(l, r);
        }

        if self.cmp_nodes(key, n) == Ordering::Less {
            let left = self.nodes[n].left;
            let detached = self.detach(left, key);
            self.nodes[n].left = detached;
        } else {
            let right = self.nodes[n].right;
            let detached = self.detach(right, key);
            self.nodes[n].right = detached;
        }
        self.update(n);
        Some(n)
    }

    fn collect(
        &self,
        t: Option<NodeId>,
        skip: &mut usize,
        offset: usize,
        take: usize,
        out: &mut Vec<RankedEntry>,
    ) {
        let Some(n) = t else {
            return;
        };
        if out.len() >= take {
            return;
        }

        let node = &self.nodes[n];
        let left_size = self.size(node.left);
        if *skip >= left_size {
            *skip -= left_size;
        } else {
            self.collect(node.left, skip, offset, take, out);
        }

        if out.len() >= take {
            return;
        }
        if *skip > 0 {
            *skip -= 1;
        } else {
            out.push(RankedEntry {
                member: node.member.clone(),
                score: node.score,
                rank: (offset + out.len() + 1) as u64,
            });
        }

        self.collect(node.right, skip, offset, take, out);
    }

    /// Verify size, heap and order invariants. Returns the node count.
    #[cfg(test)]
    fn check_invariants(&self) -> usize {
        fn walk(set: &RankedSet, t: Option<NodeId>) -> usize {
            let Some(n) = t else { return 0 };
            let node = &set.nodes[n];
            for child in [node.left, node.right].into_iter().flatten() {
                assert!(set.nodes[child].priority <= node.priority, "heap order broken");
            }
            if let Some(l) = node.left {
                assert_eq!(set.cmp_nodes(l, n), Ordering::Less, "left child out of order");
            }
            if let Some(r) = node.right {
                assert_eq!(set.cmp_nodes(r, n), Ordering::Greater, "right child out of order");
            }
            let size = 1 + walk(set, node.left) + walk(set, node.right);
            assert_eq!(size, node.size, "stale subtree size");
            size
        }

        let count = walk(self, self.root);
        assert_eq!(count, self.slots.len());
        count
    }
}

// =============================================================================
// TESTS
// =============================================================================
