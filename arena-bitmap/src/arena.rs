//! The word arena backing a bitmap.
//!
//! One `Vec<u16>` holds the key index followed by every container. Containers
//! are addressed by word offsets stored in the key index, so growing the
//! vector never invalidates them. Space given up by relocated containers is
//! only reclaimed by a compacting clone.

use std::iter;

use tracing::trace;

use crate::container::{self, ContainerKind, MAX_CONTAINER_SIZE};
use crate::error::{Error, Result};
use crate::keys::{self, Keys, KeysMut};

/// A growing container followed by at most this many words shifts the tail
/// in place. Longer tails relocate the container to the end instead.
pub(crate) const SHIFT_LIMIT_WORDS: usize = 1 << 15;

pub(crate) const INITIAL_KEY_CAPACITY: usize = 2;

#[derive(Debug)]
pub(crate) struct Arena {
    data: Vec<u16>,
}

impl Arena {
    pub(crate) fn new() -> Self {
        Self::with_key_capacity(INITIAL_KEY_CAPACITY)
    }

    pub(crate) fn with_key_capacity(capacity: usize) -> Self {
        Self::in_buffer(Vec::new(), capacity)
    }

    /// An empty arena reusing the allocation of `buf`.
    pub(crate) fn in_buffer(mut buf: Vec<u16>, key_capacity: usize) -> Self {
        let node = keys::node_size_for(key_capacity);
        buf.clear();
        buf.resize(node, 0);
        keys::write_u64(&mut buf, keys::INDEX_NODE_SIZE, node as u64);
        Self { data: buf }
    }

    /// Adopts `data` without copying. It must have passed [`validate`].
    pub(crate) fn from_words(data: Vec<u16>) -> Self {
        Self { data }
    }

    pub(crate) fn words(&self) -> &[u16] {
        &self.data
    }

    pub(crate) fn into_words(self) -> Vec<u16> {
        self.data
    }

    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.data.capacity()
    }

    fn node_size(&self) -> usize {
        keys::read_u64(&self.data, keys::INDEX_NODE_SIZE) as usize
    }

    pub(crate) fn keys(&self) -> Keys<'_> {
        Keys::new(&self.data[..self.node_size()])
    }

    fn keys_mut(&mut self) -> KeysMut<'_> {
        let node = self.node_size();
        KeysMut::new(&mut self.data[..node])
    }

    pub(crate) fn container(&self, offset: usize) -> &[u16] {
        let size = container::size(&self.data[offset..]);
        &self.data[offset..offset + size]
    }

    pub(crate) fn container_at(&self, index: usize) -> &[u16] {
        self.container(self.keys().offset(index))
    }

    pub(crate) fn container_at_mut(&mut self, index: usize) -> &mut [u16] {
        let offset = self.keys().offset(index);
        let size = container::size(&self.data[offset..]);
        &mut self.data[offset..offset + size]
    }

    /// Makes room for `additional` words, at least doubling the allocation.
    pub(crate) fn reserve(&mut self, additional: usize) {
        let needed = self.data.len() + additional;
        let capacity = self.data.capacity();
        if needed <= capacity {
            return;
        }
        let target = needed.max(capacity * 2);
        trace!(from = capacity, to = target, "growing arena");
        self.data.reserve_exact(target - self.data.len());
    }

    /// Bump-allocates a zeroed container of `size` words and returns its offset.
    pub(crate) fn new_container(&mut self, size: usize) -> usize {
        assert!(
            (container::HEADER_WORDS..=MAX_CONTAINER_SIZE).contains(&size),
            "invalid container size {size}"
        );
        self.reserve(size);
        let offset = self.data.len();
        self.data.resize(offset + size, 0);
        self.data[offset] = size as u16;
        offset
    }

    /// Grows the key index to hold `capacity` keys, shifting every container.
    pub(crate) fn expand_keys(&mut self, capacity: usize) {
        let keys = self.keys();
        if capacity <= keys.capacity() {
            return;
        }
        let old = keys.node_size();
        let new = keys::node_size_for(capacity);
        let delta = new - old;
        trace!(old, new, "expanding key index");
        self.reserve(delta);
        self.data.splice(old..old, iter::repeat_n(0, delta));
        keys::write_u64(&mut self.data, keys::INDEX_NODE_SIZE, new as u64);
        self.keys_mut().rebase(old, delta);
    }

    /// Ensures `additional` more keys fit, doubling the index when it grows.
    pub(crate) fn reserve_keys(&mut self, additional: usize) {
        let keys = self.keys();
        let needed = keys.len() + additional;
        if needed > keys.capacity() {
            let grown = needed.max(keys.capacity() * 2).max(INITIAL_KEY_CAPACITY);
            self.expand_keys(grown);
        }
    }

    /// Allocates an empty container for `key` at key position `index`.
    pub(crate) fn insert_container(&mut self, index: usize, key: u64, kind: ContainerKind, size: usize) {
        self.reserve_keys(1);
        let offset = self.new_container(size);
        container::init(&mut self.data[offset..offset + size], kind);
        self.keys_mut().insert(index, key, offset);
    }

    /// Appends a copy of `words` as the container of `key`, which must be
    /// greater than every stored key.
    pub(crate) fn push_container(&mut self, key: u64, words: &[u16]) {
        let n = self.keys().len();
        debug_assert!(n == 0 || self.keys().key(n - 1) < key);
        self.reserve_keys(1);
        let offset = self.new_container(words.len());
        self.data[offset..offset + words.len()].copy_from_slice(words);
        self.keys_mut().insert(n, key, offset);
    }

    /// Grows the container at `index` to `new_size` words, keeping its content.
    pub(crate) fn resize_container(&mut self, index: usize, new_size: usize) {
        let mut offset = self.keys().offset(index);
        let old_size = container::size(&self.data[offset..]);
        if new_size <= old_size {
            return;
        }
        let delta = new_size - old_size;
        let end = offset + old_size;
        let tail = self.data.len() - end;
        if tail == 0 {
            self.reserve(delta);
            self.data.resize(end + delta, 0);
        } else if tail <= SHIFT_LIMIT_WORDS {
            trace!(offset, delta, tail, "shifting containers");
            self.reserve(delta);
            self.data.splice(end..end, iter::repeat_n(0, delta));
            self.keys_mut().rebase(end, delta);
        } else {
            let moved = self.new_container(new_size);
            trace!(from = offset, to = moved, "relocating container");
            self.data.copy_within(offset..end, moved);
            self.keys_mut().set_offset(index, moved);
            offset = moved;
        }
        self.data[offset] = new_size as u16;
    }

    /// Overwrites the container at `index` with `words`, growing its slot
    /// when needed. The slot keeps its size if it is already large enough.
    pub(crate) fn replace_container(&mut self, index: usize, words: &[u16]) {
        let len = words.len();
        self.resize_container(index, len);
        let slot = self.container_at_mut(index);
        slot[container::INDEX_TYPE..len].copy_from_slice(&words[container::INDEX_TYPE..]);
    }

    /// Adds containers for keys that are not stored yet. `entries` must be
    /// ascending by key.
    pub(crate) fn insert_containers(&mut self, entries: &[(u64, &[u16])]) {
        if entries.is_empty() {
            return;
        }
        self.reserve_keys(entries.len());
        self.reserve(entries.iter().map(|(_, words)| words.len()).sum());
        let mut added = Vec::with_capacity(entries.len());
        for &(key, words) in entries {
            let offset = self.new_container(words.len());
            self.data[offset..offset + words.len()].copy_from_slice(words);
            added.push((key, offset));
        }
        trace!(containers = added.len(), "inserted containers");
        self.keys_mut().merge(&added);
    }

    /// Splits the arena into the key index and one disjoint mutable slot per
    /// container, in key order.
    pub(crate) fn container_slots_mut(&mut self) -> (Keys<'_>, Vec<&mut [u16]>) {
        let keys = self.keys();
        let node = keys.node_size();
        let mut layout: Vec<(usize, usize, usize)> = keys
            .iter()
            .enumerate()
            .map(|(index, (_, offset))| (offset, container::size(&self.data[offset..]), index))
            .collect();
        layout.sort_unstable();

        let (node_words, mut rest) = self.data.split_at_mut(node);
        let mut slots: Vec<Option<&mut [u16]>> = iter::repeat_with(|| None).take(layout.len()).collect();
        let mut base = node;
        for (offset, size, index) in layout {
            assert!(offset >= base, "container at offset {offset} overlaps its predecessor");
            let (_, tail) = std::mem::take(&mut rest).split_at_mut(offset - base);
            let (slot, tail) = tail.split_at_mut(size);
            rest = tail;
            base = offset + size;
            slots[index] = Some(slot);
        }
        (Keys::new(node_words), slots.into_iter().flatten().collect())
    }

    /// Words needed by a compacted copy.
    pub(crate) fn compacted_len(&self) -> usize {
        let keys = self.keys();
        keys.node_size()
            + keys
                .iter()
                .map(|(_, offset)| container::size(&self.data[offset..]))
                .sum::<usize>()
    }

    /// Copies the key index and every container, in key order, into `buf`.
    /// Orphaned words are dropped.
    pub(crate) fn compact_into(&self, mut buf: Vec<u16>) -> Arena {
        let keys = self.keys();
        buf.clear();
        buf.reserve_exact(self.compacted_len());
        buf.extend_from_slice(&self.data[..keys.node_size()]);
        let mut out = Arena { data: buf };
        for (index, (_, offset)) in keys.iter().enumerate() {
            let at = out.data.len();
            out.data.extend_from_slice(self.container(offset));
            out.keys_mut().set_offset(index, at);
        }
        out
    }
}

/// Checks that `words` holds a well-formed arena.
pub(crate) fn validate(words: &[u16]) -> Result<()> {
    let malformed = |reason| Err(Error::Malformed { reason });

    if words.len() < keys::HEADER_WORDS {
        return malformed("shorter than the key index header");
    }
    let node = keys::read_u64(words, keys::INDEX_NODE_SIZE);
    if node < keys::HEADER_WORDS as u64
        || node > words.len() as u64
        || (node as usize - keys::HEADER_WORDS) % keys::PAIR_WORDS != 0
    {
        return malformed("invalid key index size");
    }
    let node = node as usize;
    let keys = Keys::new(&words[..node]);
    if keys::read_u64(words, keys::INDEX_NUM_KEYS) > keys.capacity() as u64 {
        return malformed("key count exceeds the key index");
    }

    let mut layout = Vec::with_capacity(keys.len());
    let mut prev = None;
    for (key, offset) in keys.iter() {
        if key & 0xFFFF != 0 {
            return malformed("key with low bits set");
        }
        if prev.is_some_and(|prev| prev >= key) {
            return malformed("keys are not strictly ascending");
        }
        prev = Some(key);

        if offset < node || offset.checked_add(container::HEADER_WORDS).is_none_or(|end| end > words.len()) {
            return malformed("container offset out of bounds");
        }
        let c = &words[offset..];
        let size = container::size(c);
        if size < container::HEADER_WORDS || offset + size > words.len() {
            return malformed("container exceeds the buffer");
        }
        let c = &c[..size];
        let n = container::cardinality(c);
        match ContainerKind::from_tag(c[container::INDEX_TYPE]) {
            None => return malformed("unknown container type"),
            Some(ContainerKind::Array) => {
                if size > MAX_CONTAINER_SIZE {
                    return malformed("array container is too large");
                }
                if n > size - container::HEADER_WORDS {
                    return malformed("array cardinality exceeds its container");
                }
                let values = &c[container::HEADER_WORDS..container::HEADER_WORDS + n];
                if values.windows(2).any(|w| w[0] >= w[1]) {
                    return malformed("array values are not strictly ascending");
                }
            }
            Some(ContainerKind::Bitmap) => {
                if size != MAX_CONTAINER_SIZE {
                    return malformed("bitmap container has the wrong size");
                }
                let ones: usize = c[container::HEADER_WORDS..]
                    .iter()
                    .map(|w| w.count_ones() as usize)
                    .sum();
                if ones != n {
                    return malformed("bitmap cardinality does not match its bits");
                }
            }
        }
        layout.push((offset, size));
    }

    layout.sort_unstable();
    if layout.windows(2).any(|w| w[0].0 + w[0].1 > w[1].0) {
        return malformed("containers overlap");
    }
    Ok(())
}
