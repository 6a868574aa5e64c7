//! The key index stored at the front of the arena.
//!
//! ```text
//! words 0..4   node size in words (u64)
//! words 4..8   number of keys (u64)
//! words 8..    (key: u64, offset: u64) pairs, ascending by key
//! ```
//!
//! Every u64 spans four words, least significant word first. Pairs past
//! `num_keys` up to the node size are reserved for future insertions.

pub(crate) const INDEX_NODE_SIZE: usize = 0;
pub(crate) const INDEX_NUM_KEYS: usize = 4;
pub(crate) const HEADER_WORDS: usize = 8;
pub(crate) const PAIR_WORDS: usize = 8;

#[inline]
pub(crate) fn read_u64(words: &[u16], at: usize) -> u64 {
    words[at..at + 4]
        .iter()
        .rev()
        .fold(0, |acc, &w| acc << 16 | w as u64)
}

#[inline]
pub(crate) fn write_u64(words: &mut [u16], at: usize, value: u64) {
    for (i, w) in words[at..at + 4].iter_mut().enumerate() {
        *w = (value >> (16 * i)) as u16;
    }
}

/// Words needed by a key index with room for `capacity` keys.
pub(crate) const fn node_size_for(capacity: usize) -> usize {
    HEADER_WORDS + capacity * PAIR_WORDS
}

#[inline]
const fn pair(i: usize) -> usize {
    HEADER_WORDS + i * PAIR_WORDS
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Keys<'a> {
    node: &'a [u16],
}

impl<'a> Keys<'a> {
    pub(crate) fn new(node: &'a [u16]) -> Self {
        Self { node }
    }

    pub(crate) fn node_size(&self) -> usize {
        read_u64(self.node, INDEX_NODE_SIZE) as usize
    }

    pub(crate) fn len(&self) -> usize {
        read_u64(self.node, INDEX_NUM_KEYS) as usize
    }

    pub(crate) fn capacity(&self) -> usize {
        (self.node_size() - HEADER_WORDS) / PAIR_WORDS
    }

    pub(crate) fn key(&self, i: usize) -> u64 {
        read_u64(self.node, pair(i))
    }

    pub(crate) fn offset(&self, i: usize) -> usize {
        read_u64(self.node, pair(i) + 4) as usize
    }

    /// Binary search over the stored keys.
    pub(crate) fn search(&self, key: u64) -> Result<usize, usize> {
        let (mut lo, mut hi) = (0, self.len());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match self.key(mid).cmp(&key) {
                std::cmp::Ordering::Less => lo = mid + 1,
                std::cmp::Ordering::Greater => hi = mid,
                std::cmp::Ordering::Equal => return Ok(mid),
            }
        }
        Err(lo)
    }

    /// `(key, offset)` pairs in key order.
    pub(crate) fn iter(self) -> impl DoubleEndedIterator<Item = (u64, usize)> + 'a {
        (0..self.len()).map(move |i| (self.key(i), self.offset(i)))
    }
}

pub(crate) struct KeysMut<'a> {
    node: &'a mut [u16],
}

impl<'a> KeysMut<'a> {
    pub(crate) fn new(node: &'a mut [u16]) -> Self {
        Self { node }
    }

    fn keys(&self) -> Keys<'_> {
        Keys::new(self.node)
    }

    fn set_len(&mut self, len: usize) {
        write_u64(self.node, INDEX_NUM_KEYS, len as u64);
    }

    fn set_pair(&mut self, i: usize, key: u64, offset: usize) {
        write_u64(self.node, pair(i), key);
        write_u64(self.node, pair(i) + 4, offset as u64);
    }

    pub(crate) fn set_offset(&mut self, i: usize, offset: usize) {
        write_u64(self.node, pair(i) + 4, offset as u64);
    }

    pub(crate) fn insert(&mut self, i: usize, key: u64, offset: usize) {
        let keys = self.keys();
        let n = keys.len();
        assert!(n < keys.capacity(), "key index is full");
        debug_assert!(i == 0 || keys.key(i - 1) < key);
        debug_assert!(i == n || key < keys.key(i));
        self.node.copy_within(pair(i)..pair(n), pair(i + 1));
        self.set_pair(i, key, offset);
        self.set_len(n + 1);
    }

    /// Shifts every offset at or past `from` by `delta` words.
    pub(crate) fn rebase(&mut self, from: usize, delta: usize) {
        for i in 0..self.keys().len() {
            let offset = self.keys().offset(i);
            if offset >= from {
                self.set_offset(i, offset + delta);
            }
        }
    }

    /// Merges `added`, ascending and disjoint from the stored keys, into the
    /// index in one pass from the back.
    pub(crate) fn merge(&mut self, added: &[(u64, usize)]) {
        let keys = self.keys();
        let n = keys.len();
        let total = n + added.len();
        assert!(total <= keys.capacity(), "key index is full");

        let (mut i, mut j) = (n, added.len());
        for at in (0..total).rev() {
            let take_old = j == 0 || (i > 0 && self.keys().key(i - 1) > added[j - 1].0);
            if take_old {
                i -= 1;
                if i == at {
                    // The remaining prefix is already in place.
                    break;
                }
                let (key, offset) = (self.keys().key(i), self.keys().offset(i));
                self.set_pair(at, key, offset);
            } else {
                j -= 1;
                let (key, offset) = added[j];
                self.set_pair(at, key, offset);
            }
        }
        self.set_len(total);
    }
}
