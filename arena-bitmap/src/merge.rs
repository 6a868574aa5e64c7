//! The merge engine.
//!
//! Every binary operation is a two-pointer join over the key indexes of both
//! operands with the container work dispatched on the pair of container
//! types. Functional merges build a new arena. In-place merges carve the
//! receiver into disjoint container slots, merge them shard by shard and
//! apply growth and new keys with a single writer afterwards.

use std::cmp::Ordering;
use std::fmt;

use crate::arena::{Arena, INITIAL_KEY_CAPACITY};
use crate::config::MergeConfig;
use crate::container::{self, Container, InPlace, MAX_CONTAINER_SIZE};
use crate::error::{Error, Result};
use crate::keys::Keys;
use crate::partition::{self, Shard, ShardPlan};

/// A binary set operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Op {
    And,
    Or,
    AndNot,
}

/// How an in-place merge treats source keys missing from the receiver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Mode {
    /// Missing keys are copied into the receiver.
    InPlace,
    /// The receiver already holds every non-empty source key.
    Superset,
}

/// Reusable scratch space large enough for any container.
///
/// Passing buffers to merges avoids allocating one per call. Concurrent
/// merges use one buffer per shard.
pub struct ContainerBuffer {
    words: Box<[u16]>,
}

impl ContainerBuffer {
    pub fn new() -> Self {
        Self {
            words: scratch_words(),
        }
    }

    /// `n` fresh buffers, one per shard of an `n`-way merge.
    pub fn many(n: usize) -> Vec<Self> {
        (0..n).map(|_| Self::new()).collect()
    }
}

impl Default for ContainerBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ContainerBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContainerBuffer")
            .field("words", &self.words.len())
            .finish()
    }
}

fn scratch_words() -> Box<[u16]> {
    vec![0; MAX_CONTAINER_SIZE].into_boxed_slice()
}

/// A caller's buffer, or one allocated on first use.
pub(crate) enum Scratch<'a> {
    Borrowed(&'a mut [u16]),
    Lazy(Option<Box<[u16]>>),
}

impl<'a> Scratch<'a> {
    pub(crate) fn borrowed(buffer: &'a mut ContainerBuffer) -> Self {
        Scratch::Borrowed(&mut buffer.words)
    }

    pub(crate) fn lazy() -> Self {
        Scratch::Lazy(None)
    }

    pub(crate) fn get(&mut self) -> &mut [u16] {
        match self {
            Scratch::Borrowed(words) => words,
            Scratch::Lazy(words) => words.get_or_insert_with(scratch_words),
        }
    }
}

fn apply(op: Op, a: Container<'_>, b: Container<'_>, out: &mut [u16]) -> usize {
    match op {
        Op::And => container::and_into(a, b, out),
        Op::Or => container::or_into(a, b, out),
        Op::AndNot => container::and_not_into(a, b, out),
    }
}

fn push_non_empty(out: &mut Arena, key: u64, words: &[u16]) {
    if container::cardinality(words) > 0 {
        out.push_container(key, words);
    }
}

/// Computes `a op b` into a new arena. Empty result containers are dropped.
pub(crate) fn merge(a: &Arena, b: &Arena, op: Op, buffer: Option<&mut ContainerBuffer>) -> Arena {
    let (ka, kb) = (a.keys(), b.keys());
    let (na, nb) = (ka.len(), kb.len());
    let key_capacity = match op {
        Op::And => na.min(nb),
        Op::Or => na + nb,
        Op::AndNot => na,
    };
    let mut out = Arena::with_key_capacity(key_capacity.max(INITIAL_KEY_CAPACITY));
    let mut scratch = match buffer {
        Some(buffer) => Scratch::borrowed(buffer),
        None => Scratch::lazy(),
    };

    let (mut i, mut j) = (0, 0);
    loop {
        let more = match op {
            Op::And => i < na && j < nb,
            Op::Or => i < na || j < nb,
            Op::AndNot => i < na,
        };
        if !more {
            break;
        }

        let order = match (i < na, j < nb) {
            (true, true) => ka.key(i).cmp(&kb.key(j)),
            (true, false) => Ordering::Less,
            (false, _) => Ordering::Greater,
        };
        match order {
            Ordering::Equal => {
                let buf = scratch.get();
                let ca = Container::view(a.container(ka.offset(i)));
                let cb = Container::view(b.container(kb.offset(j)));
                let size = apply(op, ca, cb, buf);
                push_non_empty(&mut out, ka.key(i), &buf[..size]);
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                if op != Op::And {
                    push_non_empty(&mut out, ka.key(i), a.container(ka.offset(i)));
                }
                i += 1;
            }
            Ordering::Greater => {
                if op == Op::Or {
                    push_non_empty(&mut out, kb.key(j), b.container(kb.offset(j)));
                }
                j += 1;
            }
        }
    }
    out
}

/// Fails with the first non-empty `src` key that `dst` does not hold.
pub(crate) fn check_superset(dst: &Arena, src: &Arena) -> Result<()> {
    let keys = dst.keys();
    for (key, offset) in src.keys().iter() {
        if container::cardinality(src.container(offset)) > 0 && keys.search(key).is_err() {
            return Err(Error::NotASuperset { key });
        }
    }
    Ok(())
}

/// What a shard leaves for the single writer.
#[derive(Default)]
struct ShardOutcome {
    /// Receiver containers whose result outgrew their slot.
    grown: Vec<(usize, Vec<u16>)>,
    /// Source containers whose keys the receiver lacks.
    missing: Vec<usize>,
}

/// Merges `src` into `dst` in place.
///
/// In [`Mode::Superset`] the caller has established that `dst` holds every
/// non-empty `src` key, see [`check_superset`].
pub(crate) fn merge_in_place(
    dst: &mut Arena,
    src: &Arena,
    op: Op,
    mode: Mode,
    config: &MergeConfig,
    buffers: &mut [ContainerBuffer],
) {
    let (dst_keys, mut slots) = dst.container_slots_mut();
    let plan = ShardPlan::new(
        slots.len(),
        config.max_concurrency,
        config.min_containers_per_shard,
    );
    let outcomes = partition::execute(&plan, &mut slots, buffers, |shard| {
        merge_shard(dst_keys, src, op, mode, shard)
    });
    drop(slots);

    for (index, words) in outcomes.iter().flat_map(|o| &o.grown) {
        dst.replace_container(*index, words);
    }

    let src_keys = src.keys();
    let missing: Vec<(u64, &[u16])> = outcomes
        .iter()
        .flat_map(|o| &o.missing)
        .map(|&j| (src_keys.key(j), src.container(src_keys.offset(j))))
        .collect();
    dst.insert_containers(&missing);
}

fn merge_shard(dst: Keys<'_>, src: &Arena, op: Op, mode: Mode, shard: Shard<'_, '_>) -> ShardOutcome {
    let Shard {
        range,
        slots,
        mut scratch,
    } = shard;
    let keys = src.keys();
    let mut outcome = ShardOutcome::default();

    // Only unions care about source keys the receiver lacks.
    let note_missing = |outcome: &mut ShardOutcome, j: usize| {
        if op != Op::Or || container::cardinality(src.container(keys.offset(j))) == 0 {
            return;
        }
        debug_assert!(mode == Mode::InPlace, "superset union met a missing key");
        if mode == Mode::InPlace {
            outcome.missing.push(j);
        }
    };

    let mut j = match range.start {
        0 => 0,
        start => match keys.search(dst.key(start)) {
            Ok(j) | Err(j) => j,
        },
    };

    for (index, slot) in range.clone().zip(slots.iter_mut()) {
        let key = dst.key(index);
        while j < keys.len() && keys.key(j) < key {
            note_missing(&mut outcome, j);
            j += 1;
        }

        if j < keys.len() && keys.key(j) == key {
            let other = Container::view(src.container(keys.offset(j)));
            match op {
                Op::And => container::and_in_place(slot, other),
                Op::AndNot => container::and_not_in_place(slot, other),
                Op::Or => {
                    if let InPlace::Grown(size) = container::or_in_place(slot, other, scratch.get()) {
                        outcome.grown.push((index, scratch.get()[..size].to_vec()));
                    }
                }
            }
            j += 1;
        } else if op == Op::And {
            container::zero_out(slot);
        }
    }

    if op == Op::Or {
        let upper = (range.end < dst.len()).then(|| dst.key(range.end));
        while j < keys.len() && upper.is_none_or(|upper| keys.key(j) < upper) {
            note_missing(&mut outcome, j);
            j += 1;
        }
    }
    outcome
}
