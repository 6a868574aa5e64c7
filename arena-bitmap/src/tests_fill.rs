use crate::fill::{full_containers_and_remainder, set_range};
use crate::*;

#[test]
fn test_full_containers_and_remainder() {
    assert_eq!(full_containers_and_remainder(0), (0, 1));
    assert_eq!(full_containers_and_remainder(1), (0, 2));
    assert_eq!(full_containers_and_remainder(65534), (0, 65535));
    assert_eq!(full_containers_and_remainder(65535), (1, 0));
    assert_eq!(full_containers_and_remainder(65536), (1, 1));
    assert_eq!(full_containers_and_remainder(4 * 65536 - 1), (4, 0));
    assert_eq!(full_containers_and_remainder(4 * 65536 + 41), (4, 42));
}

#[test]
fn test_set_range() {
    let mut bits = vec![0u16; 4096];
    assert_eq!(set_range(&mut bits, 3, 5), 3);
    assert_eq!(bits[0], 0b111000);

    assert_eq!(set_range(&mut bits, 0, 40), 38);
    assert_eq!(&bits[..3], &[u16::MAX, u16::MAX, 0x01FF]);

    let mut bits = vec![0u16; 4096];
    assert_eq!(set_range(&mut bits, 0, u16::MAX), 65536);
    assert!(bits.iter().all(|&w| w == u16::MAX));
}

#[test]
fn test_prefill() {
    for max in [0u64, 1, 100, 4095, 4096, 65535, 65536, 200_000] {
        let bm = Bitmap::prefill(max);
        assert_eq!(bm.cardinality(), max + 1, "prefill({max})");
        assert_eq!(bm.min(), Some(0));
        assert_eq!(bm.max(), Some(max));
        assert!(bm.contains(max / 2));
        assert!(!bm.contains(max + 1));
    }
}

#[test]
fn test_prefill_elements() {
    let bm = Bitmap::prefill(70_000);
    assert_eq!(bm.to_vec(), (0..=70_000).collect::<Vec<u64>>());
    assert_eq!(bm.num_keys(), 2);
}

#[test]
fn test_fill_up_from_empty() {
    let mut bm = Bitmap::new();
    bm.fill_up(1000);
    assert_eq!(bm, Bitmap::prefill(1000));
}

#[test]
fn test_fill_up_extends() {
    let mut bm: Bitmap = [3, 10, 65_530].into_iter().collect();
    bm.fill_up(140_000);
    assert_eq!(bm.cardinality(), 3 + (140_000 - 65_530));
    assert!(bm.contains(3));
    assert!(!bm.contains(4));
    assert!(bm.contains(65_531));
    assert!(bm.contains(65_536));
    assert!(bm.contains(140_000));
    assert!(!bm.contains(140_001));
}

#[test]
fn test_fill_up_promotes_array() {
    // The first chunk ends up with more than 4096 values.
    let mut bm: Bitmap = (0..100u64).map(|i| i * 2).collect();
    bm.fill_up(10_000);
    assert_eq!(bm.cardinality(), 100 + (10_000 - 198));
    assert!(bm.contains(198));
    assert!(!bm.contains(197));
    assert!(bm.contains(5000));
}

#[test]
fn test_fill_up_is_idempotent() {
    let mut bm: Bitmap = [5, 1 << 20].into_iter().collect();
    bm.fill_up(100);
    assert_eq!(bm.to_vec(), vec![5, 1 << 20]);

    let mut bm = Bitmap::prefill(500);
    bm.fill_up(2000);
    let once = bm.to_vec();
    bm.fill_up(2000);
    assert_eq!(bm.to_vec(), once);
    assert_eq!(bm, Bitmap::prefill(2000));
}

#[test]
fn test_fill_up_reuses_emptied_container() {
    let mut bm: Bitmap = [1, 2, 1 << 16].into_iter().collect();
    bm.and_assign(&[1, 2].into_iter().collect());
    assert_eq!(bm.num_keys(), 2);

    bm.fill_up(70_000);
    assert_eq!(bm.num_keys(), 2);
    assert_eq!(bm, Bitmap::prefill(70_000).and_not(&[0].into_iter().collect()));
}
