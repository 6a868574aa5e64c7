//! Bulk filling of contiguous value ranges.

use crate::arena::Arena;
use crate::bitmap::{key_of, low_of};
use crate::container::{
    self, ContainerKind, HEADER_WORDS, MAX_ARRAY_CARDINALITY, MAX_CONTAINER_SIZE,
};

/// Splits `0..=max_value` into the number of full containers and the number
/// of values left over for a trailing partial container.
pub(crate) fn full_containers_and_remainder(max_value: u64) -> (u64, usize) {
    let low = max_value & 0xFFFF;
    if low == 0xFFFF {
        ((max_value >> 16) + 1, 0)
    } else {
        (max_value >> 16, low as usize + 1)
    }
}

/// Sets bits `lo..=hi` of a bitmap payload and returns how many were clear.
pub(crate) fn set_range(bits: &mut [u16], lo: u16, hi: u16) -> usize {
    debug_assert!(lo <= hi);
    let (first, last) = ((lo >> 4) as usize, (hi >> 4) as usize);
    let head = u16::MAX << (lo & 15);
    let tail = u16::MAX >> (15 - (hi & 15));

    let mut added = 0;
    let mut set = |word: &mut u16, mask: u16| {
        added += (mask & !*word).count_ones() as usize;
        *word |= mask;
    };
    if first == last {
        set(&mut bits[first], head & tail);
    } else {
        set(&mut bits[first], head);
        for word in &mut bits[first + 1..last] {
            set(word, u16::MAX);
        }
        set(&mut bits[last], tail);
    }
    added
}

/// Adds every value of `first..=last`. Every value already present must be
/// below `first`.
pub(crate) fn fill_range(arena: &mut Arena, first: u64, last: u64) {
    debug_assert!(first <= last);
    let (first_key, last_key) = (key_of(first), key_of(last));
    let chunks = ((last_key - first_key) >> 16) as usize + 1;
    arena.reserve_keys(chunks);

    let mut key = first_key;
    loop {
        let lo = if key == first_key { low_of(first) } else { 0 };
        let hi = if key == last_key { low_of(last) } else { u16::MAX };
        fill_chunk(arena, key, lo, hi);
        if key == last_key {
            break;
        }
        key += 1 << 16;
    }
}

fn fill_chunk(arena: &mut Arena, key: u64, lo: u16, hi: u16) {
    let count = (hi - lo) as usize + 1;
    let index = match arena.keys().search(key) {
        Ok(index) => index,
        Err(index) => {
            let (kind, size) = if count <= MAX_ARRAY_CARDINALITY {
                (ContainerKind::Array, container::array_size_for(count))
            } else {
                (ContainerKind::Bitmap, MAX_CONTAINER_SIZE)
            };
            arena.insert_container(index, key, kind, size);
            index
        }
    };

    let slot = arena.container_at(index);
    let n = container::cardinality(slot);
    match container::kind(slot) {
        ContainerKind::Array if n + count <= MAX_ARRAY_CARDINALITY => {
            arena.resize_container(index, container::array_size_for(n + count));
            let slot = arena.container_at_mut(index);
            for (word, value) in slot[HEADER_WORDS + n..HEADER_WORDS + n + count]
                .iter_mut()
                .zip(lo..=hi)
            {
                *word = value;
            }
            container::set_cardinality(slot, n + count);
        }
        ContainerKind::Array => {
            let mut words = vec![0u16; MAX_CONTAINER_SIZE];
            container::write_bitmap(&slot[HEADER_WORDS..HEADER_WORDS + n], &mut words);
            let added = set_range(&mut words[HEADER_WORDS..], lo, hi);
            container::set_cardinality(&mut words, n + added);
            arena.replace_container(index, &words);
        }
        ContainerKind::Bitmap => {
            let slot = arena.container_at_mut(index);
            let added = set_range(&mut slot[HEADER_WORDS..], lo, hi);
            container::set_cardinality(slot, n + added);
        }
    }
}
