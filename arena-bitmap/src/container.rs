//! Per-chunk containers.
//!
//! A container holds the low 16 bits of every value that shares one key. It
//! lives inside the arena as a run of `u16` words:
//!
//! ```text
//! word 0      size of the container in words, header included
//! word 1      type tag: 1 = array, 2 = bitmap
//! words 2..4  cardinality (u32, low word first)
//! words 4..   payload
//! ```
//!
//! Array payloads are sorted, unique values and only the first `cardinality`
//! words are meaningful. Bitmap payloads are always 4096 words, where bit
//! `x & 15` of word `x >> 4` is set iff `x` is present.

use std::cmp::Ordering;

pub(crate) const INDEX_SIZE: usize = 0;
pub(crate) const INDEX_TYPE: usize = 1;
pub(crate) const INDEX_CARDINALITY: usize = 2;
pub(crate) const HEADER_WORDS: usize = 4;

const TYPE_ARRAY: u16 = 1;
const TYPE_BITMAP: u16 = 2;

/// Number of distinct values a single container can hold.
pub const MAX_CARDINALITY: usize = 1 << 16;

pub(crate) const BITMAP_WORDS: usize = MAX_CARDINALITY / 16;

/// Size in words of the largest container, a bitmap container.
pub const MAX_CONTAINER_SIZE: usize = HEADER_WORDS + BITMAP_WORDS;

/// Size of a freshly allocated array container.
pub(crate) const MIN_CONTAINER_SIZE: usize = 64;

/// An array container holding more values than this is stored as a bitmap.
pub(crate) const MAX_ARRAY_CARDINALITY: usize = MAX_CONTAINER_SIZE - HEADER_WORDS;

const_assert!(MAX_CONTAINER_SIZE <= u16::MAX as usize);
const_assert_eq!(BITMAP_WORDS * 16, MAX_CARDINALITY);
const_assert!(MIN_CONTAINER_SIZE.is_power_of_two());
const_assert!(MIN_CONTAINER_SIZE > HEADER_WORDS);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum ContainerKind {
    Array,
    Bitmap,
}

impl ContainerKind {
    pub(crate) fn from_tag(tag: u16) -> Option<Self> {
        match tag {
            TYPE_ARRAY => Some(Self::Array),
            TYPE_BITMAP => Some(Self::Bitmap),
            _ => None,
        }
    }

    pub(crate) fn tag(self) -> u16 {
        match self {
            Self::Array => TYPE_ARRAY,
            Self::Bitmap => TYPE_BITMAP,
        }
    }
}

#[inline]
pub(crate) fn size(c: &[u16]) -> usize {
    c[INDEX_SIZE] as usize
}

#[inline]
pub(crate) fn kind(c: &[u16]) -> ContainerKind {
    match ContainerKind::from_tag(c[INDEX_TYPE]) {
        Some(kind) => kind,
        None => panic!("unknown container type tag {}", c[INDEX_TYPE]),
    }
}

#[inline]
pub(crate) fn cardinality(c: &[u16]) -> usize {
    c[INDEX_CARDINALITY] as usize | (c[INDEX_CARDINALITY + 1] as usize) << 16
}

#[inline]
pub(crate) fn set_cardinality(c: &mut [u16], n: usize) {
    debug_assert!(n <= MAX_CARDINALITY);
    c[INDEX_CARDINALITY] = n as u16;
    c[INDEX_CARDINALITY + 1] = (n >> 16) as u16;
}

/// Smallest size bucket that fits an array of `n` values.
pub(crate) fn array_size_for(n: usize) -> usize {
    (HEADER_WORDS + n)
        .next_power_of_two()
        .clamp(MIN_CONTAINER_SIZE, MAX_CONTAINER_SIZE)
}

/// Next size bucket of a full array container.
pub(crate) fn grown_size(size: usize) -> usize {
    (size * 2).min(MAX_CONTAINER_SIZE)
}

/// Turns a zeroed slot into an empty container of `kind`. The size word is
/// left as allocated.
pub(crate) fn init(c: &mut [u16], kind: ContainerKind) {
    c[INDEX_TYPE] = kind.tag();
    set_cardinality(c, 0);
    if kind == ContainerKind::Bitmap {
        debug_assert_eq!(size(c), MAX_CONTAINER_SIZE);
        c[HEADER_WORDS..MAX_CONTAINER_SIZE].fill(0);
    }
}

/// Writes the header of a result built in `out` and returns its size.
fn finish(out: &mut [u16], kind: ContainerKind, n: usize) -> usize {
    let size = match kind {
        ContainerKind::Array => array_size_for(n),
        ContainerKind::Bitmap => MAX_CONTAINER_SIZE,
    };
    out[INDEX_SIZE] = size as u16;
    out[INDEX_TYPE] = kind.tag();
    set_cardinality(out, n);
    if kind == ContainerKind::Array {
        out[HEADER_WORDS + n..size].fill(0);
    }
    size
}

/// Read-only view of a container.
#[derive(Clone, Copy, Debug)]
pub(crate) enum Container<'a> {
    Array(&'a [u16]),
    Bitmap { bits: &'a [u16], cardinality: usize },
}

impl<'a> Container<'a> {
    pub(crate) fn view(c: &'a [u16]) -> Self {
        let n = cardinality(c);
        match kind(c) {
            ContainerKind::Array => Container::Array(&c[HEADER_WORDS..HEADER_WORDS + n]),
            ContainerKind::Bitmap => Container::Bitmap {
                bits: &c[HEADER_WORDS..MAX_CONTAINER_SIZE],
                cardinality: n,
            },
        }
    }

    pub(crate) fn cardinality(&self) -> usize {
        match *self {
            Container::Array(values) => values.len(),
            Container::Bitmap { cardinality, .. } => cardinality,
        }
    }

    pub(crate) fn contains(&self, x: u16) -> bool {
        match *self {
            Container::Array(values) => values.binary_search(&x).is_ok(),
            Container::Bitmap { bits, .. } => bit_test(bits, x),
        }
    }

    pub(crate) fn min(&self) -> Option<u16> {
        match *self {
            Container::Array(values) => values.first().copied(),
            Container::Bitmap { bits, .. } => {
                let i = bits.iter().position(|&w| w != 0)?;
                Some((i * 16) as u16 + bits[i].trailing_zeros() as u16)
            }
        }
    }

    pub(crate) fn max(&self) -> Option<u16> {
        match *self {
            Container::Array(values) => values.last().copied(),
            Container::Bitmap { bits, .. } => {
                let i = bits.iter().rposition(|&w| w != 0)?;
                Some((i * 16) as u16 + 15 - bits[i].leading_zeros() as u16)
            }
        }
    }
}

#[inline]
pub(crate) fn bit_test(bits: &[u16], x: u16) -> bool {
    bits[(x >> 4) as usize] & (1 << (x & 15)) != 0
}

/// Sets bit `x` and reports whether it was clear.
#[inline]
fn bit_set(bits: &mut [u16], x: u16) -> bool {
    let word = &mut bits[(x >> 4) as usize];
    let mask = 1 << (x & 15);
    let fresh = *word & mask == 0;
    *word |= mask;
    fresh
}

/// Clears bit `x` and reports whether it was set.
#[inline]
fn bit_clear(bits: &mut [u16], x: u16) -> bool {
    let word = &mut bits[(x >> 4) as usize];
    let mask = 1 << (x & 15);
    let present = *word & mask != 0;
    *word &= !mask;
    present
}

// ---- single value insertion ----

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Insert {
    Added,
    Present,
    /// The array has no free slot left; grow or convert it and retry.
    Full,
}

pub(crate) fn insert(c: &mut [u16], x: u16) -> Insert {
    match kind(c) {
        ContainerKind::Array => array_insert(c, x),
        ContainerKind::Bitmap => {
            if bit_set(&mut c[HEADER_WORDS..MAX_CONTAINER_SIZE], x) {
                let n = cardinality(c);
                set_cardinality(c, n + 1);
                Insert::Added
            } else {
                Insert::Present
            }
        }
    }
}

fn array_insert(c: &mut [u16], x: u16) -> Insert {
    let n = cardinality(c);
    match c[HEADER_WORDS..HEADER_WORDS + n].binary_search(&x) {
        Ok(_) => Insert::Present,
        Err(_) if HEADER_WORDS + n == size(c) => Insert::Full,
        Err(pos) => {
            let at = HEADER_WORDS + pos;
            c.copy_within(at..HEADER_WORDS + n, at + 1);
            c[at] = x;
            set_cardinality(c, n + 1);
            Insert::Added
        }
    }
}

/// Writes a bitmap container holding `values` into `out` and returns its size.
pub(crate) fn write_bitmap(values: &[u16], out: &mut [u16]) -> usize {
    let bits = &mut out[HEADER_WORDS..MAX_CONTAINER_SIZE];
    bits.fill(0);
    for &x in values {
        bit_set(bits, x);
    }
    finish(out, ContainerKind::Bitmap, values.len())
}

/// Rebuilds a full, maximum size array container as a bitmap in the same slot.
pub(crate) fn convert_to_bitmap(c: &mut [u16]) {
    debug_assert_eq!(size(c), MAX_CONTAINER_SIZE);
    let n = cardinality(c);
    let mut values = [0u16; MAX_ARRAY_CARDINALITY];
    values[..n].copy_from_slice(&c[HEADER_WORDS..HEADER_WORDS + n]);
    write_bitmap(&values[..n], c);
}

/// Empties a container without changing its type or size.
pub(crate) fn zero_out(c: &mut [u16]) {
    if kind(c) == ContainerKind::Bitmap {
        c[HEADER_WORDS..MAX_CONTAINER_SIZE].fill(0);
    }
    set_cardinality(c, 0);
}

// ---- functional operations ----
//
// Each writes a complete container into `out` (at least MAX_CONTAINER_SIZE
// words long) and returns its size in words.

pub(crate) fn and_into(a: Container<'_>, b: Container<'_>, out: &mut [u16]) -> usize {
    match (a, b) {
        (Container::Array(x), Container::Array(y)) => {
            let n = intersect(x, y, &mut out[HEADER_WORDS..]);
            finish(out, ContainerKind::Array, n)
        }
        (Container::Array(x), Container::Bitmap { bits, .. })
        | (Container::Bitmap { bits, .. }, Container::Array(x)) => {
            let n = filter(x, |v| bit_test(bits, v), &mut out[HEADER_WORDS..]);
            finish(out, ContainerKind::Array, n)
        }
        (Container::Bitmap { bits: x, .. }, Container::Bitmap { bits: y, .. }) => {
            let n = combine(&mut out[HEADER_WORDS..MAX_CONTAINER_SIZE], x, y, |l, r| l & r);
            finish(out, ContainerKind::Bitmap, n)
        }
    }
}

/// Unions stay arrays while the result holds at most 4096 values.
pub(crate) fn or_into(a: Container<'_>, b: Container<'_>, out: &mut [u16]) -> usize {
    match (a, b) {
        (Container::Array(x), Container::Array(y)) => {
            let n = union_len(x, y);
            if n <= MAX_ARRAY_CARDINALITY {
                union(x, y, &mut out[HEADER_WORDS..]);
                finish(out, ContainerKind::Array, n)
            } else {
                let bits = &mut out[HEADER_WORDS..MAX_CONTAINER_SIZE];
                bits.fill(0);
                for &v in x.iter().chain(y) {
                    bit_set(bits, v);
                }
                finish(out, ContainerKind::Bitmap, n)
            }
        }
        (Container::Array(x), Container::Bitmap { bits, cardinality })
        | (Container::Bitmap { bits, cardinality }, Container::Array(x)) => {
            let dst = &mut out[HEADER_WORDS..MAX_CONTAINER_SIZE];
            dst.copy_from_slice(bits);
            let added = x.iter().filter(|&&v| bit_set(dst, v)).count();
            finish(out, ContainerKind::Bitmap, cardinality + added)
        }
        (Container::Bitmap { bits: x, .. }, Container::Bitmap { bits: y, .. }) => {
            let n = combine(&mut out[HEADER_WORDS..MAX_CONTAINER_SIZE], x, y, |l, r| l | r);
            finish(out, ContainerKind::Bitmap, n)
        }
    }
}

pub(crate) fn and_not_into(a: Container<'_>, b: Container<'_>, out: &mut [u16]) -> usize {
    match (a, b) {
        (Container::Array(x), Container::Array(y)) => {
            let n = difference(x, y, &mut out[HEADER_WORDS..]);
            finish(out, ContainerKind::Array, n)
        }
        (Container::Array(x), Container::Bitmap { bits, .. }) => {
            let n = filter(x, |v| !bit_test(bits, v), &mut out[HEADER_WORDS..]);
            finish(out, ContainerKind::Array, n)
        }
        (Container::Bitmap { bits, cardinality }, Container::Array(y)) => {
            let dst = &mut out[HEADER_WORDS..MAX_CONTAINER_SIZE];
            dst.copy_from_slice(bits);
            let removed = y.iter().filter(|&&v| bit_clear(dst, v)).count();
            finish(out, ContainerKind::Bitmap, cardinality - removed)
        }
        (Container::Bitmap { bits: x, .. }, Container::Bitmap { bits: y, .. }) => {
            let n = combine(&mut out[HEADER_WORDS..MAX_CONTAINER_SIZE], x, y, |l, r| l & !r);
            finish(out, ContainerKind::Bitmap, n)
        }
    }
}

// ---- in-place operations ----

pub(crate) fn and_in_place(dst: &mut [u16], src: Container<'_>) {
    let n = match kind(dst) {
        ContainerKind::Array => {
            let len = cardinality(dst);
            let values = &mut dst[HEADER_WORDS..HEADER_WORDS + len];
            match src {
                Container::Array(y) => {
                    let mut j = 0;
                    retain(values, |v| {
                        while j < y.len() && y[j] < v {
                            j += 1;
                        }
                        j < y.len() && y[j] == v
                    })
                }
                Container::Bitmap { bits, .. } => retain(values, |v| bit_test(bits, v)),
            }
        }
        ContainerKind::Bitmap => {
            let bits = &mut dst[HEADER_WORDS..MAX_CONTAINER_SIZE];
            match src {
                Container::Bitmap { bits: other, .. } => combine_in_place(bits, other, |l, r| l & r),
                Container::Array(y) => {
                    // Values are grouped by word since `y` is sorted.
                    let mut j = 0;
                    let mut n = 0;
                    for (w, word) in bits.iter_mut().enumerate() {
                        let mut mask = 0u16;
                        while j < y.len() && (y[j] >> 4) as usize == w {
                            mask |= 1 << (y[j] & 15);
                            j += 1;
                        }
                        *word &= mask;
                        n += word.count_ones() as usize;
                    }
                    n
                }
            }
        }
    };
    set_cardinality(dst, n);
}

pub(crate) fn and_not_in_place(dst: &mut [u16], src: Container<'_>) {
    if src.cardinality() == 0 {
        return;
    }
    let n = match kind(dst) {
        ContainerKind::Array => {
            let len = cardinality(dst);
            let values = &mut dst[HEADER_WORDS..HEADER_WORDS + len];
            match src {
                Container::Array(y) => {
                    let mut j = 0;
                    retain(values, |v| {
                        while j < y.len() && y[j] < v {
                            j += 1;
                        }
                        j == y.len() || y[j] != v
                    })
                }
                Container::Bitmap { bits, .. } => retain(values, |v| !bit_test(bits, v)),
            }
        }
        ContainerKind::Bitmap => {
            let before = cardinality(dst);
            let bits = &mut dst[HEADER_WORDS..MAX_CONTAINER_SIZE];
            match src {
                Container::Bitmap { bits: other, .. } => combine_in_place(bits, other, |l, r| l & !r),
                Container::Array(y) => before - y.iter().filter(|&&v| bit_clear(bits, v)).count(),
            }
        }
    };
    set_cardinality(dst, n);
}

/// Outcome of an in-place union.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum InPlace {
    Done,
    /// The union does not fit the slot. A container of this size was left
    /// in the scratch buffer.
    Grown(usize),
}

/// Unions `src` into `dst`. Array destinations are computed through
/// `scratch` and copied back when the result fits the slot.
pub(crate) fn or_in_place(dst: &mut [u16], src: Container<'_>, scratch: &mut [u16]) -> InPlace {
    if src.cardinality() == 0 {
        return InPlace::Done;
    }
    match kind(dst) {
        ContainerKind::Bitmap => {
            let n = cardinality(dst);
            if n == MAX_CARDINALITY {
                return InPlace::Done;
            }
            let bits = &mut dst[HEADER_WORDS..MAX_CONTAINER_SIZE];
            let n = match src {
                Container::Bitmap { bits: other, .. } => combine_in_place(bits, other, |l, r| l | r),
                Container::Array(y) => n + y.iter().filter(|&&v| bit_set(bits, v)).count(),
            };
            set_cardinality(dst, n);
            InPlace::Done
        }
        ContainerKind::Array => {
            let written = or_into(Container::view(dst), src, scratch);
            if written <= size(dst) {
                dst[INDEX_TYPE..written].copy_from_slice(&scratch[INDEX_TYPE..written]);
                InPlace::Done
            } else {
                InPlace::Grown(written)
            }
        }
    }
}

// ---- helpers ----

fn combine(out: &mut [u16], x: &[u16], y: &[u16], f: impl Fn(u16, u16) -> u16) -> usize {
    let mut n = 0;
    for ((d, &l), &r) in out.iter_mut().zip(x).zip(y) {
        *d = f(l, r);
        n += d.count_ones() as usize;
    }
    n
}

fn combine_in_place(bits: &mut [u16], other: &[u16], f: impl Fn(u16, u16) -> u16) -> usize {
    let mut n = 0;
    for (d, &r) in bits.iter_mut().zip(other) {
        *d = f(*d, r);
        n += d.count_ones() as usize;
    }
    n
}

/// Compacts the values accepted by `keep` to the front and returns their count.
fn retain(values: &mut [u16], mut keep: impl FnMut(u16) -> bool) -> usize {
    let mut n = 0;
    for i in 0..values.len() {
        let v = values[i];
        if keep(v) {
            values[n] = v;
            n += 1;
        }
    }
    n
}

fn filter(values: &[u16], keep: impl Fn(u16) -> bool, out: &mut [u16]) -> usize {
    let mut n = 0;
    for &v in values {
        if keep(v) {
            out[n] = v;
            n += 1;
        }
    }
    n
}

pub(crate) fn intersect(x: &[u16], y: &[u16], out: &mut [u16]) -> usize {
    let (mut i, mut j, mut n) = (0, 0, 0);
    while i < x.len() && j < y.len() {
        match x[i].cmp(&y[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                out[n] = x[i];
                n += 1;
                i += 1;
                j += 1;
            }
        }
    }
    n
}

pub(crate) fn union_len(x: &[u16], y: &[u16]) -> usize {
    let (mut i, mut j, mut n) = (0, 0, 0);
    while i < x.len() && j < y.len() {
        match x[i].cmp(&y[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
        n += 1;
    }
    n + (x.len() - i) + (y.len() - j)
}

pub(crate) fn union(x: &[u16], y: &[u16], out: &mut [u16]) -> usize {
    let (mut i, mut j, mut n) = (0, 0, 0);
    while i < x.len() && j < y.len() {
        out[n] = match x[i].cmp(&y[j]) {
            Ordering::Less => {
                i += 1;
                x[i - 1]
            }
            Ordering::Greater => {
                j += 1;
                y[j - 1]
            }
            Ordering::Equal => {
                i += 1;
                j += 1;
                x[i - 1]
            }
        };
        n += 1;
    }
    for &v in x[i..].iter().chain(&y[j..]) {
        out[n] = v;
        n += 1;
    }
    n
}

pub(crate) fn difference(x: &[u16], y: &[u16], out: &mut [u16]) -> usize {
    let (mut i, mut j, mut n) = (0, 0, 0);
    while i < x.len() {
        if j == y.len() || x[i] < y[j] {
            out[n] = x[i];
            n += 1;
            i += 1;
        } else if x[i] > y[j] {
            j += 1;
        } else {
            i += 1;
            j += 1;
        }
    }
    n
}
