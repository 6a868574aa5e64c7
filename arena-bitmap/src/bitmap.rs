use std::cmp::Ordering;
use std::fmt;
use std::ops::{BitAnd, BitAndAssign, BitOr, BitOrAssign, Sub, SubAssign};

use tracing::warn;
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, IntoBytes};

use crate::arena::{self, Arena};
use crate::config::MergeConfig;
use crate::container::{self, Container, ContainerKind, Insert, MAX_CONTAINER_SIZE, MIN_CONTAINER_SIZE};
use crate::error::{Error, Result};
use crate::fill;
use crate::iter::Iter;
use crate::merge::{self, ContainerBuffer, Mode, Op};

const LOW_MASK: u64 = 0xFFFF;

/// The container key of `value`: its upper 48 bits, low bits zeroed.
#[inline]
pub(crate) fn key_of(value: u64) -> u64 {
    value & !LOW_MASK
}

#[inline]
pub(crate) fn low_of(value: u64) -> u16 {
    value as u16
}

/// A compressed set of `u64` values.
///
/// Values are grouped by their upper 48 bits into containers of at most
/// 65536 values. A container is a sorted array while sparse and a 65536-bit
/// bitmap once it holds more than 4096 values. The key index and every
/// container live in one `Vec<u16>`, which is also the serialized form of
/// the bitmap: see [`Bitmap::as_words`] and [`Bitmap::from_words`].
///
/// Merges come in three flavours:
///
/// - functional ([`Bitmap::and`], [`Bitmap::or`], [`Bitmap::and_not`]) build
///   a new bitmap,
/// - in-place ([`Bitmap::and_assign`] and friends) mutate the receiver and
///   optionally split the work over the rayon pool,
/// - superset ([`Bitmap::and_to_superset`] and friends) additionally assume
///   that the receiver already holds every key of the source.
pub struct Bitmap {
    arena: Arena,
}

impl Bitmap {
    /// An empty bitmap.
    pub fn new() -> Self {
        Self { arena: Arena::new() }
    }

    fn from_arena(arena: Arena) -> Self {
        Self { arena }
    }

    /// Adopts a serialized word buffer without copying it.
    ///
    /// Malformed buffers are logged and yield an empty bitmap. Use
    /// [`Bitmap::try_from_words`] to get the error instead.
    pub fn from_words(words: Vec<u16>) -> Self {
        match Self::try_from_words(words) {
            Ok(bitmap) => bitmap,
            Err(err) => {
                warn!("ignoring bitmap buffer: {err}");
                Self::new()
            }
        }
    }

    /// Adopts a serialized word buffer after validating its structure.
    pub fn try_from_words(words: Vec<u16>) -> Result<Self> {
        arena::validate(&words)?;
        Ok(Self::from_arena(Arena::from_words(words)))
    }

    /// Decodes the little-endian byte form produced by [`Bitmap::to_bytes`].
    pub fn try_from_bytes(bytes: &[u8]) -> Result<Self> {
        let words = <[U16]>::ref_from_bytes(bytes).map_err(|_| Error::Malformed {
            reason: "odd number of bytes",
        })?;
        Self::try_from_words(words.iter().map(|w| w.get()).collect())
    }

    /// Like [`Bitmap::try_from_bytes`], but malformed input yields an empty
    /// bitmap.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match Self::try_from_bytes(bytes) {
            Ok(bitmap) => bitmap,
            Err(err) => {
                warn!("ignoring bitmap bytes: {err}");
                Self::new()
            }
        }
    }

    /// The word buffer, every word little-endian.
    pub fn to_bytes(&self) -> Vec<u8> {
        let words: Vec<U16> = self.arena.words().iter().map(|&w| U16::new(w)).collect();
        words.as_slice().as_bytes().to_vec()
    }

    /// The serialized form, including any unused tail of the key index.
    pub fn as_words(&self) -> &[u16] {
        self.arena.words()
    }

    pub fn into_words(self) -> Vec<u16> {
        self.arena.into_words()
    }

    /// Adds `value` and reports whether it was absent.
    pub fn set(&mut self, value: u64) -> bool {
        let key = key_of(value);
        let low = low_of(value);
        let index = match self.arena.keys().search(key) {
            Ok(index) => index,
            Err(index) => {
                self.arena
                    .insert_container(index, key, ContainerKind::Array, MIN_CONTAINER_SIZE);
                index
            }
        };

        loop {
            let slot = self.arena.container_at_mut(index);
            match container::insert(slot, low) {
                Insert::Added => return true,
                Insert::Present => return false,
                Insert::Full => {
                    let size = container::size(slot);
                    if size < MAX_CONTAINER_SIZE {
                        self.arena.resize_container(index, container::grown_size(size));
                    } else {
                        container::convert_to_bitmap(slot);
                    }
                }
            }
        }
    }

    pub fn contains(&self, value: u64) -> bool {
        match self.arena.keys().search(key_of(value)) {
            Ok(index) => Container::view(self.arena.container_at(index)).contains(low_of(value)),
            Err(_) => false,
        }
    }

    fn containers(&self) -> impl DoubleEndedIterator<Item = (u64, Container<'_>)> {
        self.arena
            .keys()
            .iter()
            .map(|(key, offset)| (key, Container::view(self.arena.container(offset))))
    }

    pub fn min(&self) -> Option<u64> {
        self.containers()
            .find_map(|(key, c)| c.min().map(|low| key | low as u64))
    }

    pub fn max(&self) -> Option<u64> {
        self.containers()
            .rev()
            .find_map(|(key, c)| c.max().map(|low| key | low as u64))
    }

    /// Number of values in the set.
    pub fn cardinality(&self) -> u64 {
        self.containers().map(|(_, c)| c.cardinality() as u64).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.containers().all(|(_, c)| c.cardinality() == 0)
    }

    /// Number of containers, empty ones included.
    pub fn num_keys(&self) -> usize {
        self.arena.keys().len()
    }

    pub fn compare_num_keys(&self, other: &Bitmap) -> Ordering {
        self.num_keys().cmp(&other.num_keys())
    }

    /// Length of the serialized form.
    pub fn len_in_bytes(&self) -> usize {
        self.arena.len() * 2
    }

    /// Allocated size of the backing buffer.
    pub fn capacity_in_bytes(&self) -> usize {
        self.arena.capacity() * 2
    }

    /// Clones into the allocation of `buf`, compacting the copy.
    ///
    /// Fails when `buf` cannot hold the compacted bitmap without growing.
    pub fn clone_to_buf(&self, buf: Vec<u16>) -> Result<Bitmap> {
        let needed = self.arena.compacted_len();
        if buf.capacity() < needed {
            return Err(Error::BufferTooSmall {
                needed,
                capacity: buf.capacity(),
            });
        }
        Ok(Self::from_arena(self.arena.compact_into(buf)))
    }

    pub fn iter(&self) -> Iter<'_> {
        Iter::new(&self.arena)
    }

    pub fn to_vec(&self) -> Vec<u64> {
        let mut out = Vec::with_capacity(self.cardinality() as usize);
        out.extend(self.iter());
        out
    }

    // ---- functional merges ----

    /// Computes `self op other` into a new bitmap, using `buffer` as scratch
    /// space when given.
    pub fn merge(&self, other: &Bitmap, op: Op, buffer: Option<&mut ContainerBuffer>) -> Bitmap {
        Self::from_arena(merge::merge(&self.arena, &other.arena, op, buffer))
    }

    pub fn and(&self, other: &Bitmap) -> Bitmap {
        self.merge(other, Op::And, None)
    }

    pub fn or(&self, other: &Bitmap) -> Bitmap {
        self.merge(other, Op::Or, None)
    }

    pub fn and_not(&self, other: &Bitmap) -> Bitmap {
        self.merge(other, Op::AndNot, None)
    }

    // ---- in-place merges ----

    /// Merges `other` into `self`.
    ///
    /// Containers are split into shards as described by [`MergeConfig`].
    /// Shard `i` uses `buffers[i]` as scratch space when present and
    /// allocates its own otherwise. The result does not depend on the
    /// configuration.
    pub fn merge_in_place(
        &mut self,
        other: &Bitmap,
        op: Op,
        config: &MergeConfig,
        buffers: &mut [ContainerBuffer],
    ) -> &mut Self {
        merge::merge_in_place(&mut self.arena, &other.arena, op, Mode::InPlace, config, buffers);
        self
    }

    /// Merges `other` into `self`, which must hold every key with a
    /// non-empty container in `other`.
    ///
    /// Intersections and differences never need new keys and cannot fail.
    /// A union fails with [`Error::NotASuperset`] before touching `self` if a
    /// key is missing.
    pub fn merge_to_superset(
        &mut self,
        other: &Bitmap,
        op: Op,
        config: &MergeConfig,
        buffers: &mut [ContainerBuffer],
    ) -> Result<&mut Self> {
        if op == Op::Or {
            merge::check_superset(&self.arena, &other.arena)?;
        }
        merge::merge_in_place(&mut self.arena, &other.arena, op, Mode::Superset, config, buffers);
        Ok(self)
    }

    fn merge_conc(&mut self, other: &Bitmap, op: Op, max_concurrency: usize) -> &mut Self {
        let config = MergeConfig::new().with_max_concurrency(max_concurrency);
        self.merge_in_place(other, op, &config, &mut [])
    }

    fn merge_conc_buf(&mut self, other: &Bitmap, op: Op, buffers: &mut [ContainerBuffer]) -> &mut Self {
        let config = MergeConfig::new().with_max_concurrency(buffers.len());
        self.merge_in_place(other, op, &config, buffers)
    }

    pub fn and_assign(&mut self, other: &Bitmap) -> &mut Self {
        self.merge_conc(other, Op::And, 1)
    }

    pub fn or_assign(&mut self, other: &Bitmap) -> &mut Self {
        self.merge_conc(other, Op::Or, 1)
    }

    pub fn and_not_assign(&mut self, other: &Bitmap) -> &mut Self {
        self.merge_conc(other, Op::AndNot, 1)
    }

    pub fn and_conc(&mut self, other: &Bitmap, max_concurrency: usize) -> &mut Self {
        self.merge_conc(other, Op::And, max_concurrency)
    }

    pub fn or_conc(&mut self, other: &Bitmap, max_concurrency: usize) -> &mut Self {
        self.merge_conc(other, Op::Or, max_concurrency)
    }

    pub fn and_not_conc(&mut self, other: &Bitmap, max_concurrency: usize) -> &mut Self {
        self.merge_conc(other, Op::AndNot, max_concurrency)
    }

    /// Like [`Bitmap::and_conc`] with one shard per buffer.
    pub fn and_conc_buf(&mut self, other: &Bitmap, buffers: &mut [ContainerBuffer]) -> &mut Self {
        self.merge_conc_buf(other, Op::And, buffers)
    }

    pub fn or_conc_buf(&mut self, other: &Bitmap, buffers: &mut [ContainerBuffer]) -> &mut Self {
        self.merge_conc_buf(other, Op::Or, buffers)
    }

    pub fn and_not_conc_buf(&mut self, other: &Bitmap, buffers: &mut [ContainerBuffer]) -> &mut Self {
        self.merge_conc_buf(other, Op::AndNot, buffers)
    }

    /// Intersects in place. Containers of `self` without a counterpart are
    /// emptied but keep their keys.
    pub fn and_to_superset(&mut self, other: &Bitmap, buffers: &mut [ContainerBuffer]) -> &mut Self {
        let config = MergeConfig::new().with_max_concurrency(buffers.len());
        merge::merge_in_place(&mut self.arena, &other.arena, Op::And, Mode::Superset, &config, buffers);
        self
    }

    /// Unions in place without adding keys. See [`Bitmap::merge_to_superset`].
    pub fn or_to_superset(&mut self, other: &Bitmap, buffers: &mut [ContainerBuffer]) -> Result<&mut Self> {
        let config = MergeConfig::new().with_max_concurrency(buffers.len());
        self.merge_to_superset(other, Op::Or, &config, buffers)
    }

    pub fn and_not_to_superset(&mut self, other: &Bitmap, buffers: &mut [ContainerBuffer]) -> &mut Self {
        let config = MergeConfig::new().with_max_concurrency(buffers.len());
        merge::merge_in_place(&mut self.arena, &other.arena, Op::AndNot, Mode::Superset, &config, buffers);
        self
    }

    // ---- bulk construction ----

    /// Rewrites every array container as a bitmap container.
    pub fn convert_to_bitmap_containers(&mut self) {
        let mut words = vec![0u16; MAX_CONTAINER_SIZE];
        for index in 0..self.arena.keys().len() {
            if let Container::Array(values) = Container::view(self.arena.container_at(index)) {
                let size = container::write_bitmap(values, &mut words);
                self.arena.replace_container(index, &words[..size]);
            }
        }
    }

    /// The set `0..=max_value`.
    pub fn prefill(max_value: u64) -> Self {
        let (full, remainder) = fill::full_containers_and_remainder(max_value);
        let chunks = full as usize + usize::from(remainder > 0);
        let mut bitmap = Self::from_arena(Arena::with_key_capacity(chunks));
        fill::fill_range(&mut bitmap.arena, 0, max_value);
        bitmap
    }

    /// Adds every value from `max() + 1` (or 0 when empty) up to
    /// `max_value`. Does nothing when `max() >= max_value`.
    pub fn fill_up(&mut self, max_value: u64) {
        let first = match self.max() {
            Some(max) if max >= max_value => return,
            Some(max) => max + 1,
            None => 0,
        };
        fill::fill_range(&mut self.arena, first, max_value);
    }
}

impl Default for Bitmap {
    fn default() -> Self {
        Self::new()
    }
}

/// Clones are compacted: orphaned arena words are not copied.
impl Clone for Bitmap {
    fn clone(&self) -> Self {
        Self::from_arena(self.arena.compact_into(Vec::new()))
    }
}

impl fmt::Debug for Bitmap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bitmap")
            .field("keys", &self.num_keys())
            .field("cardinality", &self.cardinality())
            .field("len_in_bytes", &self.len_in_bytes())
            .finish()
    }
}

/// Bitmaps are equal when they hold the same values, regardless of layout.
impl PartialEq for Bitmap {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for Bitmap {}

impl FromIterator<u64> for Bitmap {
    fn from_iter<I: IntoIterator<Item = u64>>(iter: I) -> Self {
        let mut bitmap = Self::new();
        bitmap.extend(iter);
        bitmap
    }
}

impl Extend<u64> for Bitmap {
    fn extend<I: IntoIterator<Item = u64>>(&mut self, iter: I) {
        for value in iter {
            self.set(value);
        }
    }
}

impl<'a> IntoIterator for &'a Bitmap {
    type Item = u64;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Iter<'a> {
        self.iter()
    }
}

impl BitAnd for &Bitmap {
    type Output = Bitmap;

    fn bitand(self, rhs: &Bitmap) -> Bitmap {
        self.and(rhs)
    }
}

impl BitOr for &Bitmap {
    type Output = Bitmap;

    fn bitor(self, rhs: &Bitmap) -> Bitmap {
        self.or(rhs)
    }
}

impl Sub for &Bitmap {
    type Output = Bitmap;

    fn sub(self, rhs: &Bitmap) -> Bitmap {
        self.and_not(rhs)
    }
}

impl BitAndAssign<&Bitmap> for Bitmap {
    fn bitand_assign(&mut self, rhs: &Bitmap) {
        self.and_assign(rhs);
    }
}

impl BitOrAssign<&Bitmap> for Bitmap {
    fn bitor_assign(&mut self, rhs: &Bitmap) {
        self.or_assign(rhs);
    }
}

impl SubAssign<&Bitmap> for Bitmap {
    fn sub_assign(&mut self, rhs: &Bitmap) {
        self.and_not_assign(rhs);
    }
}
