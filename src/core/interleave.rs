//! core::interleave
//!
//! Distribution of apply/revert operations into commit buckets.
//!
//! # Contract
//!
//! Given `n` operation pairs and a commit count `m`, [`interleave`] returns
//! exactly `m` buckets such that:
//!
//! 1. every apply and every revert appears exactly once
//! 2. each pair's apply sits in a strictly earlier bucket than its revert
//! 3. every bucket is non-empty
//! 4. applies keep plan order among themselves, and so do reverts
//!
//! # Balancing
//!
//! Buckets are filled front to back. Before closing bucket `b`, the filler
//! checks that the remaining operations can still cover the remaining
//! buckets. With `E` reverts already eligible (their apply sits in an earlier
//! bucket) and `A` applies still pending, the remaining buckets can hold at
//! most `E + 2A` non-empty commits. Every operation placed now lowers that
//! capacity by one.
//!
//! With `m > 2` the first bucket holds only the first apply. Middle buckets
//! take an even share of what is left, and each takes at least one eligible
//! revert when one exists. The second-to-last bucket takes every remaining
//! apply, so the last bucket is left with reverts only. When the applies were
//! spread out, that is the single final revert.
//!
//! With `m == 2` the constraints leave one choice: all applies first, then
//! all reverts.
//!
//! # Example
//!
//! ```
//! use commit_mirage::core::interleave::interleave;
//! use commit_mirage::core::plan::{OperationPair, OperationPlan, Operation};
//!
//! let plan = OperationPlan::new(vec![
//!     OperationPair::new("a.txt", "A2", "A1", "Add a", "Drop a"),
//! ]).unwrap();
//!
//! let buckets = interleave(&plan, 2).unwrap();
//! assert_eq!(buckets[0].operations(), &[Operation::apply(0)]);
//! assert_eq!(buckets[1].operations(), &[Operation::revert(0)]);
//! ```

use thiserror::Error;

use super::plan::{OpKind, Operation, OperationPlan};

/// Errors from interleaving.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InterleaveError {
    /// No pairs to distribute.
    #[error("operation plan is empty")]
    EmptyPlan,

    /// Fewer than two commits cannot separate an apply from its revert.
    #[error("commit count must be at least 2, got {requested}")]
    InvalidCommitCount { requested: usize },

    /// More commits requested than there are operations to fill them.
    #[error(
        "insufficient operations: {requested} commits need at least {needed} operations, \
         plan has {available}"
    )]
    InsufficientOperations {
        requested: usize,
        needed: usize,
        available: usize,
    },
}

/// One commit's worth of operations, in write order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitBucket {
    operations: Vec<Operation>,
}

impl CommitBucket {
    /// Operations in the order they are written.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// Whether the bucket contains the given operation.
    pub fn contains(&self, op: Operation) -> bool {
        self.operations.contains(&op)
    }
}

/// Largest commit count `interleave` accepts for `pairs` pairs.
pub fn max_commits(pairs: usize) -> usize {
    pairs * 2
}

/// Distribute the plan's operations into exactly `commit_count` buckets.
///
/// # Errors
///
/// - [`InterleaveError::EmptyPlan`] for a plan with no pairs
/// - [`InterleaveError::InvalidCommitCount`] when `commit_count < 2`
/// - [`InterleaveError::InsufficientOperations`] when `commit_count > 2 * pairs`
pub fn interleave(
    plan: &OperationPlan,
    commit_count: usize,
) -> Result<Vec<CommitBucket>, InterleaveError> {
    distribute(plan.len(), commit_count)
}

/// Index-only core of [`interleave`], usable without building a plan.
pub fn distribute(pairs: usize, commit_count: usize) -> Result<Vec<CommitBucket>, InterleaveError> {
    if pairs == 0 {
        return Err(InterleaveError::EmptyPlan);
    }
    if commit_count < 2 {
        return Err(InterleaveError::InvalidCommitCount {
            requested: commit_count,
        });
    }
    if commit_count > max_commits(pairs) {
        return Err(InterleaveError::InsufficientOperations {
            requested: commit_count,
            needed: commit_count,
            available: max_commits(pairs),
        });
    }

    let mut state = Cursor {
        next_apply: 0,
        next_revert: 0,
        applied: 0,
        pairs,
    };
    let mut buckets = Vec::with_capacity(commit_count);

    for index in 0..commit_count {
        let remaining = commit_count - index;
        let (applies, reverts) = if remaining == 1 {
            (0, state.eligible())
        } else if remaining == 2 {
            let pending = state.pending();
            let eligible = state.eligible();
            // Keep one revert back for the last bucket when nothing new is applied here.
            let reverts = if pending == 0 { eligible - 1 } else { eligible };
            (pending, reverts)
        } else {
            let target = if index == 0 { 1 } else { state.middle_target(remaining) };
            state.middle_quota(target, remaining)
        };

        let bucket = state.take(applies, reverts);
        debug_assert!(!bucket.is_empty());
        buckets.push(bucket);
    }

    debug_assert_eq!(state.next_apply, pairs);
    debug_assert_eq!(state.next_revert, pairs);
    Ok(buckets)
}

/// Progress through the apply and revert streams.
struct Cursor {
    /// Next apply to place.
    next_apply: usize,
    /// Next revert to place.
    next_revert: usize,
    /// Applies placed in already-closed buckets.
    applied: usize,
    pairs: usize,
}

impl Cursor {
    /// Applies not yet placed.
    fn pending(&self) -> usize {
        self.pairs - self.next_apply
    }

    /// Reverts whose apply sits in a closed bucket.
    fn eligible(&self) -> usize {
        self.applied - self.next_revert
    }

    /// Non-empty buckets the unplaced operations could still fill.
    fn capacity(&self) -> usize {
        self.eligible() + 2 * self.pending()
    }

    /// Even share for a middle bucket, reserving one operation for the last.
    fn middle_target(&self, remaining: usize) -> usize {
        let ops = self.capacity().saturating_sub(1);
        ops.div_ceil(remaining - 1).max(1)
    }

    /// Split a middle bucket's target between applies and reverts.
    ///
    /// `remaining >= 3` here, so at least two buckets follow this one.
    fn middle_quota(&self, target: usize, remaining: usize) -> (usize, usize) {
        let pending = self.pending();
        let eligible = self.eligible();
        let cap = self.capacity() - (remaining - 1);
        let target = target.clamp(1, cap);

        // Spread all but the last apply over the buckets before the
        // second-to-last one; that bucket takes the final apply.
        let spread_over = remaining - 2;
        let mut applies = pending
            .min(pending.saturating_sub(1).div_ceil(spread_over))
            .min(target);
        let mut reverts = eligible.min(target - applies);

        if applies + reverts < target {
            applies = pending.min(target - reverts);
        }

        if reverts == 0 && eligible > 0 {
            reverts = 1;
            if applies + reverts > cap {
                applies -= 1;
            }
        }

        (applies, reverts)
    }

    /// Close a bucket with the given counts, alternating revert/apply.
    fn take(&mut self, applies: usize, reverts: usize) -> CommitBucket {
        let mut operations = Vec::with_capacity(applies + reverts);
        let (mut a, mut r) = (0, 0);

        while a < applies || r < reverts {
            if r < reverts {
                operations.push(Operation::revert(self.next_revert + r));
                r += 1;
            }
            if a < applies {
                operations.push(Operation::apply(self.next_apply + a));
                a += 1;
            }
        }

        self.next_revert += reverts;
        self.next_apply += applies;
        self.applied = self.next_apply;

        CommitBucket { operations }
    }
}

/// Check the four interleaving invariants.
///
/// Returns a description of the first violation found.
pub fn check_invariants(
    buckets: &[CommitBucket],
    pairs: usize,
    commit_count: usize,
) -> Result<(), String> {
    if buckets.len() != commit_count {
        return Err(format!(
            "expected {} buckets, got {}",
            commit_count,
            buckets.len()
        ));
    }

    let mut apply_at = vec![None; pairs];
    let mut revert_at = vec![None; pairs];
    let mut last_apply = None;
    let mut last_revert = None;

    for (index, bucket) in buckets.iter().enumerate() {
        if bucket.is_empty() {
            return Err(format!("bucket {} is empty", index + 1));
        }
        for op in bucket.operations() {
            if op.pair >= pairs {
                return Err(format!("operation refers to unknown pair {}", op.pair));
            }
            let (slot, last) = match op.kind {
                OpKind::Apply => (&mut apply_at[op.pair], &mut last_apply),
                OpKind::Revert => (&mut revert_at[op.pair], &mut last_revert),
            };
            if slot.replace(index).is_some() {
                return Err(format!("{} of pair {} appears twice", op.kind, op.pair));
            }
            if let Some(prev) = *last {
                if op.pair <= prev {
                    return Err(format!("{} of pair {} is out of order", op.kind, op.pair));
                }
            }
            *last = Some(op.pair);
        }
    }

    for pair in 0..pairs {
        match (apply_at[pair], revert_at[pair]) {
            (Some(a), Some(r)) if a < r => {}
            (Some(a), Some(r)) => {
                return Err(format!(
                    "pair {} reverted in bucket {} before or with its apply in bucket {}",
                    pair,
                    r + 1,
                    a + 1
                ))
            }
            _ => return Err(format!("pair {} is missing an operation", pair)),
        }
    }

    Ok(())
}
