//! Sharding of in-place merges.
//!
//! The receiver's containers are cut into contiguous runs of near-equal
//! length. Every shard owns the mutable slots of its run plus one scratch
//! buffer, so shards run on the rayon pool without sharing any state.

use std::ops::Range;

use rayon::prelude::*;
use tracing::debug;

use crate::merge::{ContainerBuffer, Scratch};

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct ShardPlan {
    ranges: Vec<Range<usize>>,
}

impl ShardPlan {
    /// Splits `0..containers` into `clamp(containers / min_per_shard, 1,
    /// max_concurrency)` ranges. The first `containers % shards` ranges hold
    /// one extra container.
    pub(crate) fn new(containers: usize, max_concurrency: usize, min_per_shard: usize) -> Self {
        let shards = (containers / min_per_shard.max(1)).clamp(1, max_concurrency.max(1));
        let base = containers / shards;
        let extra = containers % shards;

        let mut start = 0;
        let ranges = (0..shards)
            .map(|i| {
                let len = base + usize::from(i < extra);
                let range = start..start + len;
                start += len;
                range
            })
            .collect();

        Self { ranges }
    }

    pub(crate) fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    pub(crate) fn len(&self) -> usize {
        self.ranges.len()
    }
}

/// The part of a merge owned by one worker.
pub(crate) struct Shard<'a, 'b> {
    /// Container indices of the receiver.
    pub(crate) range: Range<usize>,
    /// Slots of the containers in `range`, in order.
    pub(crate) slots: &'a mut [&'b mut [u16]],
    pub(crate) scratch: Scratch<'a>,
}

/// Runs `work` once per shard of `plan` and returns the results in shard
/// order. A single shard runs on the calling thread.
pub(crate) fn execute<'a, 'b, T, F>(
    plan: &ShardPlan,
    slots: &'a mut [&'b mut [u16]],
    buffers: &'a mut [ContainerBuffer],
    work: F,
) -> Vec<T>
where
    T: Send,
    F: Fn(Shard<'a, 'b>) -> T + Send + Sync,
{
    debug_assert_eq!(plan.ranges().last().map_or(0, |r| r.end), slots.len());

    let mut scratches = buffers
        .iter_mut()
        .map(Scratch::borrowed)
        .chain(std::iter::repeat_with(Scratch::lazy));

    let mut rest = slots;
    let mut shards = Vec::with_capacity(plan.len());
    for (range, scratch) in plan.ranges().iter().cloned().zip(&mut scratches) {
        let (head, tail) = std::mem::take(&mut rest).split_at_mut(range.len());
        rest = tail;
        shards.push(Shard {
            range,
            slots: head,
            scratch,
        });
    }

    debug!(
        shards = shards.len(),
        containers = plan.ranges().last().map_or(0, |r| r.end),
        "running merge shards"
    );

    if shards.len() == 1 {
        shards.into_iter().map(work).collect()
    } else {
        shards.into_par_iter().map(work).collect()
    }
}
