use std::cmp::Ordering;

use crate::*;

fn bitmap(values: &[u64]) -> Bitmap {
    values.iter().copied().collect()
}

#[test]
fn test_set_and_contains() {
    let mut bm = Bitmap::new();
    assert!(bm.is_empty());
    assert!(bm.set(1));
    assert!(bm.set(70_000));
    assert!(!bm.set(1));

    assert!(bm.contains(1));
    assert!(bm.contains(70_000));
    assert!(!bm.contains(2));
    assert!(!bm.contains(1 + 65536));
    assert_eq!(bm.cardinality(), 2);
    assert_eq!(bm.num_keys(), 2);
    assert!(!bm.is_empty());
}

#[test]
fn test_extreme_values() {
    let bm = bitmap(&[0, u64::MAX, 1 << 63]);
    assert!(bm.contains(0));
    assert!(bm.contains(u64::MAX));
    assert!(bm.contains(1 << 63));
    assert_eq!(bm.min(), Some(0));
    assert_eq!(bm.max(), Some(u64::MAX));
    assert_eq!(bm.to_vec(), vec![0, 1 << 63, u64::MAX]);
}

#[test]
fn test_min_max_empty() {
    let bm = Bitmap::new();
    assert_eq!(bm.min(), None);
    assert_eq!(bm.max(), None);
    assert_eq!(bm.cardinality(), 0);
    assert!(bm.to_vec().is_empty());
}

#[test]
fn test_conversion_is_transparent() {
    // 5000 distinct values in one chunk force an array to bitmap conversion.
    let values: Vec<u64> = (0..5000u64).map(|i| i * 13 % 65536).collect();
    let mut bm = Bitmap::new();
    for &v in &values {
        assert!(bm.set(v));
    }
    assert_eq!(bm.cardinality(), 5000);
    assert_eq!(bm.num_keys(), 1);
    for &v in &values {
        assert!(bm.contains(v));
    }
    assert!(!bm.contains(1));

    let mut sorted = values.clone();
    sorted.sort_unstable();
    assert_eq!(bm.to_vec(), sorted);
    assert_eq!(bm.min(), Some(0));
    assert_eq!(bm.max(), sorted.last().copied());
}

#[test]
fn test_growth_keeps_neighbours_intact() {
    // Interleaved inserts grow containers that are not last in the arena.
    let mut bm = Bitmap::new();
    for i in 0..3000u64 {
        for chunk in 0..4u64 {
            bm.set((chunk << 16) | (i * 7 % 65536));
        }
    }
    assert_eq!(bm.cardinality(), 12_000);
    for chunk in 0..4u64 {
        for i in 0..3000u64 {
            assert!(bm.contains((chunk << 16) | (i * 7 % 65536)));
        }
    }
}

#[test]
fn test_scenario_union_then_difference() {
    let mut bm = bitmap(&[69239, 69240, 446423875]);
    bm.or_assign(&bitmap(&[69239]));
    bm.and_not_assign(&bitmap(&[69240]));
    assert_eq!(bm.to_vec(), vec![69239, 446423875]);
}

#[test]
fn test_words_round_trip() {
    let bm = bitmap(&[3, 5, 100_000, 1 << 40]);
    let words = bm.as_words().to_vec();
    let loaded = Bitmap::from_words(words);
    assert_eq!(loaded, bm);
    assert_eq!(loaded.cardinality(), 4);

    let loaded = Bitmap::try_from_words(bm.clone().into_words()).unwrap();
    assert_eq!(loaded.to_vec(), bm.to_vec());
}

#[test]
fn test_bytes_round_trip() {
    let values: Vec<u64> = (0..6000u64).map(|i| i * 31).collect();
    let bm = bitmap(&values);
    let bytes = bm.to_bytes();
    assert_eq!(bytes.len(), bm.len_in_bytes());

    let loaded = Bitmap::try_from_bytes(&bytes).unwrap();
    assert_eq!(loaded.to_vec(), values);
    assert_eq!(Bitmap::from_bytes(&bytes), bm);
}

#[test]
fn test_bytes_are_little_endian() {
    let bytes = Bitmap::new().to_bytes();
    // The node size (24 words) leads the buffer.
    assert_eq!(&bytes[..8], &[24, 0, 0, 0, 0, 0, 0, 0]);
}

#[test]
fn test_malformed_input() {
    assert!(Bitmap::from_words(vec![]).is_empty());
    assert!(Bitmap::from_words(vec![1, 2, 3]).is_empty());
    assert!(Bitmap::from_bytes(&[1, 2, 3]).is_empty());

    assert!(matches!(
        Bitmap::try_from_bytes(&[0; 17]),
        Err(Error::Malformed { .. })
    ));
    assert!(matches!(
        Bitmap::try_from_words(vec![0; 3]),
        Err(Error::Malformed { .. })
    ));

    // A lenient load still yields a usable bitmap.
    let mut bm = Bitmap::from_words(vec![7; 40]);
    bm.set(9);
    assert_eq!(bm.to_vec(), vec![9]);
}

#[test]
fn test_clone_is_independent() {
    let original = bitmap(&[1, 2, 3]);
    let mut copy = original.clone();
    copy.set(4);
    assert_eq!(original.to_vec(), vec![1, 2, 3]);
    assert_eq!(copy.to_vec(), vec![1, 2, 3, 4]);
}

#[test]
fn test_clone_to_buf_reuses_capacity() {
    let bm = bitmap(&[1, 2, 65536, 1 << 33]);
    let buf: Vec<u16> = Vec::with_capacity(bm.len_in_bytes());
    let capacity = buf.capacity();

    let clone = bm.clone_to_buf(buf).unwrap();
    assert_eq!(clone.capacity_in_bytes(), capacity * 2);
    assert_eq!(clone, bm);
    assert_eq!(clone.len_in_bytes(), bm.len_in_bytes());
}

#[test]
fn test_clone_to_buf_too_small() {
    let bm = bitmap(&[1, 2, 65536]);
    match bm.clone_to_buf(Vec::with_capacity(4)) {
        Err(Error::BufferTooSmall { needed, capacity }) => {
            assert_eq!(needed * 2, bm.len_in_bytes());
            assert!(capacity < needed);
        }
        other => panic!("expected BufferTooSmall, got {other:?}"),
    }
}

#[test]
fn test_clone_compacts() {
    let n = 700u64;
    let mut bm = Bitmap::new();
    for chunk in 0..n {
        bm.set(chunk << 16);
    }
    // Growing the first container relocates it and orphans its old slot.
    for i in 1..100u64 {
        bm.set(i);
    }
    let clone = bm.clone();
    assert_eq!(clone, bm);
    assert!(clone.len_in_bytes() < bm.len_in_bytes());
}

#[test]
fn test_compare_num_keys() {
    let small = bitmap(&[1, 2, 3]);
    let large = bitmap(&[1, 1 << 16, 2 << 16]);
    assert_eq!(small.compare_num_keys(&large), Ordering::Less);
    assert_eq!(large.compare_num_keys(&small), Ordering::Greater);
    assert_eq!(small.compare_num_keys(&small.clone()), Ordering::Equal);
}

#[test]
fn test_iter_and_rewind() {
    let bm = bitmap(&[0, 5, 1 << 20]);
    let mut it = bm.iter();
    assert_eq!(it.next(), Some(0));
    assert_eq!(it.next(), Some(5));
    assert_eq!(it.next(), Some(1 << 20));
    assert_eq!(it.next(), None);
    assert_eq!(it.next(), None);

    it.rewind();
    assert_eq!(it.collect::<Vec<_>>(), vec![0, 5, 1 << 20]);

    let collected: Vec<u64> = (&bm).into_iter().collect();
    assert_eq!(collected, bm.to_vec());
}

#[test]
fn test_convert_to_bitmap_containers() {
    let values: Vec<u64> = vec![1, 2, 3, 70_000, 1 << 35];
    let mut bm = bitmap(&values);
    let before = bm.len_in_bytes();
    bm.convert_to_bitmap_containers();
    assert_eq!(bm.to_vec(), values);
    assert!(bm.len_in_bytes() > before);
    assert!(bm.contains(70_000));
    bm.set(4);
    assert_eq!(bm.cardinality(), 6);
}

#[test]
fn test_equality_ignores_layout() {
    let a = bitmap(&[1, 2, 3, 100_000]);
    let mut b = bitmap(&[100_000, 3, 2, 1]);
    b.convert_to_bitmap_containers();
    assert_eq!(a, b);

    // An emptied container keeps its key but not its values.
    let mut c = bitmap(&[1, 2, 3, 100_000, 1 << 40]);
    c.and_assign(&a);
    assert_eq!(c.num_keys(), 3);
    assert_eq!(c, a);
}

#[test]
fn test_operators() {
    let a = bitmap(&[1, 2, 3, 1 << 20]);
    let b = bitmap(&[2, 3, 4]);

    assert_eq!((&a & &b).to_vec(), vec![2, 3]);
    assert_eq!((&a | &b).to_vec(), vec![1, 2, 3, 4, 1 << 20]);
    assert_eq!((&a - &b).to_vec(), vec![1, 1 << 20]);

    let mut c = a.clone();
    c &= &b;
    assert_eq!(c.to_vec(), vec![2, 3]);
    let mut c = a.clone();
    c |= &b;
    assert_eq!(c.to_vec(), vec![1, 2, 3, 4, 1 << 20]);
    let mut c = a.clone();
    c -= &b;
    assert_eq!(c.to_vec(), vec![1, 1 << 20]);
}

#[test]
fn test_extend() {
    let mut bm = bitmap(&[1]);
    bm.extend([5, 1, 1 << 50]);
    assert_eq!(bm.to_vec(), vec![1, 5, 1 << 50]);
}

#[test]
fn test_debug_is_summary() {
    let bm = bitmap(&[1, 2]);
    let text = format!("{bm:?}");
    assert!(text.contains("cardinality: 2"), "{text}");
}
