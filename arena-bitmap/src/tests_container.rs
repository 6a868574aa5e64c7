use std::collections::BTreeSet;

use crate::container::*;

fn array(values: &[u16]) -> Vec<u16> {
    let mut words = vec![0u16; MAX_CONTAINER_SIZE];
    words[INDEX_SIZE] = MAX_CONTAINER_SIZE as u16;
    init(&mut words, ContainerKind::Array);
    for &v in values {
        assert_ne!(insert(&mut words, v), Insert::Full);
    }
    words
}

fn bitmap(values: &[u16]) -> Vec<u16> {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let mut words = vec![0u16; MAX_CONTAINER_SIZE];
    write_bitmap(&sorted, &mut words);
    words
}

fn build(values: &[u16], kind: ContainerKind) -> Vec<u16> {
    match kind {
        ContainerKind::Array => array(values),
        ContainerKind::Bitmap => bitmap(values),
    }
}

fn values_of(c: &[u16]) -> Vec<u16> {
    match Container::view(c) {
        Container::Array(values) => values.to_vec(),
        Container::Bitmap { bits, .. } => (0..=u16::MAX).filter(|&x| bit_test(bits, x)).collect(),
    }
}

fn reference(op: crate::Op, a: &[u16], b: &[u16]) -> Vec<u16> {
    let a: BTreeSet<u16> = a.iter().copied().collect();
    let b: BTreeSet<u16> = b.iter().copied().collect();
    match op {
        crate::Op::And => a.intersection(&b).copied().collect(),
        crate::Op::Or => a.union(&b).copied().collect(),
        crate::Op::AndNot => a.difference(&b).copied().collect(),
    }
}

const KINDS: [ContainerKind; 2] = [ContainerKind::Array, ContainerKind::Bitmap];
const OPS: [crate::Op; 3] = [crate::Op::And, crate::Op::Or, crate::Op::AndNot];

fn operands() -> (Vec<u16>, Vec<u16>) {
    let a: Vec<u16> = (0..2000).map(|i| i * 3).collect();
    let b: Vec<u16> = (0..4000).map(|i| i * 5 + 1).collect();
    (a, b)
}

#[test]
fn test_array_size_buckets() {
    assert_eq!(array_size_for(0), MIN_CONTAINER_SIZE);
    assert_eq!(array_size_for(60), 64);
    assert_eq!(array_size_for(61), 128);
    assert_eq!(array_size_for(4092), 4096);
    assert_eq!(array_size_for(4093), MAX_CONTAINER_SIZE);
    assert_eq!(array_size_for(4096), MAX_CONTAINER_SIZE);
    assert_eq!(grown_size(2048), 4096);
    assert_eq!(grown_size(4096), MAX_CONTAINER_SIZE);
}

#[test]
fn test_array_insert_keeps_order() {
    let mut c = array(&[]);
    assert_eq!(insert(&mut c, 10), Insert::Added);
    assert_eq!(insert(&mut c, 5), Insert::Added);
    assert_eq!(insert(&mut c, 7), Insert::Added);
    assert_eq!(insert(&mut c, 5), Insert::Present);
    assert_eq!(values_of(&c), vec![5, 7, 10]);
    assert_eq!(cardinality(&c), 3);
}

#[test]
fn test_array_insert_reports_full() {
    let mut c = vec![0u16; MIN_CONTAINER_SIZE];
    c[INDEX_SIZE] = MIN_CONTAINER_SIZE as u16;
    init(&mut c, ContainerKind::Array);
    for v in 0..(MIN_CONTAINER_SIZE - HEADER_WORDS) as u16 {
        assert_eq!(insert(&mut c, v * 2), Insert::Added);
    }
    assert_eq!(insert(&mut c, 1), Insert::Full);
    // Present values are still reported as such.
    assert_eq!(insert(&mut c, 0), Insert::Present);
}

#[test]
fn test_convert_to_bitmap_preserves_values() {
    let values: Vec<u16> = (0..MAX_ARRAY_CARDINALITY as u32)
        .map(|i| (i * 13 % 65536) as u16)
        .collect();
    let mut c = array(&values);
    assert_eq!(insert(&mut c, 1), Insert::Full);

    convert_to_bitmap(&mut c);
    assert_eq!(kind(&c), ContainerKind::Bitmap);
    assert_eq!(cardinality(&c), MAX_ARRAY_CARDINALITY);
    assert_eq!(insert(&mut c, 1), Insert::Added);

    let mut expected = values.clone();
    expected.push(1);
    expected.sort_unstable();
    assert_eq!(values_of(&c), expected);
}

#[test]
fn test_min_max() {
    for kind in KINDS {
        let c = build(&[300, 17, 65535], kind);
        let view = Container::view(&c);
        assert_eq!(view.min(), Some(17), "{kind:?}");
        assert_eq!(view.max(), Some(65535), "{kind:?}");
        assert!(view.contains(300));
        assert!(!view.contains(301));

        let empty = build(&[], kind);
        assert_eq!(Container::view(&empty).min(), None);
        assert_eq!(Container::view(&empty).max(), None);
    }
}

#[test]
fn test_functional_ops_match_reference() {
    let (a, b) = operands();
    let mut out = vec![0u16; MAX_CONTAINER_SIZE];

    for op in OPS {
        let expected = reference(op, &a, &b);
        for ka in KINDS {
            for kb in KINDS {
                let (ca, cb) = (build(&a, ka), build(&b, kb));
                let (va, vb) = (Container::view(&ca), Container::view(&cb));
                let size = match op {
                    crate::Op::And => and_into(va, vb, &mut out),
                    crate::Op::Or => or_into(va, vb, &mut out),
                    crate::Op::AndNot => and_not_into(va, vb, &mut out),
                };
                assert_eq!(size, self::size(&out));
                assert_eq!(values_of(&out[..size]), expected, "{op:?} {ka:?} {kb:?}");
                assert_eq!(cardinality(&out), expected.len());
            }
        }
    }
}

#[test]
fn test_or_promotes_large_unions() {
    let mut out = vec![0u16; MAX_CONTAINER_SIZE];

    let (a, b) = (array(&(0..3000).collect::<Vec<_>>()), array(&(2000..5000).collect::<Vec<_>>()));
    let size = or_into(Container::view(&a), Container::view(&b), &mut out);
    assert_eq!(size, MAX_CONTAINER_SIZE);
    assert_eq!(kind(&out), ContainerKind::Bitmap);
    assert_eq!(cardinality(&out), 5000);

    // Exactly 4096 values still fit an array.
    let (a, b) = (array(&(0..2000).collect::<Vec<_>>()), array(&(2000..4096).collect::<Vec<_>>()));
    let size = or_into(Container::view(&a), Container::view(&b), &mut out);
    assert_eq!(size, MAX_CONTAINER_SIZE);
    assert_eq!(kind(&out), ContainerKind::Array);
    assert_eq!(values_of(&out), (0..4096).collect::<Vec<_>>());
}

#[test]
fn test_and_of_bitmaps_stays_bitmap() {
    let mut out = vec![0u16; MAX_CONTAINER_SIZE];
    let (a, b) = (bitmap(&[1, 2, 3]), bitmap(&[2, 3, 4]));
    and_into(Container::view(&a), Container::view(&b), &mut out);
    assert_eq!(kind(&out), ContainerKind::Bitmap);
    assert_eq!(values_of(&out), vec![2, 3]);
}

#[test]
fn test_in_place_ops_match_reference() {
    let (a, b) = operands();
    let mut scratch = vec![0u16; MAX_CONTAINER_SIZE];

    for op in OPS {
        let expected = reference(op, &a, &b);
        for ka in KINDS {
            for kb in KINDS {
                let mut dst = build(&a, ka);
                let src = build(&b, kb);
                let other = Container::view(&src);
                match op {
                    crate::Op::And => and_in_place(&mut dst, other),
                    crate::Op::AndNot => and_not_in_place(&mut dst, other),
                    crate::Op::Or => {
                        // Every slot here has the maximum size, so results fit.
                        assert_eq!(or_in_place(&mut dst, other, &mut scratch), InPlace::Done);
                    }
                }
                assert_eq!(values_of(&dst), expected, "{op:?} {ka:?} {kb:?}");
                assert_eq!(cardinality(&dst), expected.len());
                assert_eq!(size(&dst), MAX_CONTAINER_SIZE);
            }
        }
    }
}

#[test]
fn test_or_in_place_reports_growth() {
    let mut dst = vec![0u16; MIN_CONTAINER_SIZE];
    dst[INDEX_SIZE] = MIN_CONTAINER_SIZE as u16;
    init(&mut dst, ContainerKind::Array);
    for v in 0..10 {
        insert(&mut dst, v);
    }
    let src = array(&(100..200).collect::<Vec<_>>());
    let mut scratch = vec![0u16; MAX_CONTAINER_SIZE];

    let grown = or_in_place(&mut dst, Container::view(&src), &mut scratch);
    assert_eq!(grown, InPlace::Grown(128));
    assert_eq!(cardinality(&scratch), 110);
    // The slot is untouched until the caller applies the result.
    assert_eq!(cardinality(&dst), 10);
}

#[test]
fn test_or_in_place_fits_slot() {
    let mut dst = vec![0u16; MIN_CONTAINER_SIZE];
    dst[INDEX_SIZE] = MIN_CONTAINER_SIZE as u16;
    init(&mut dst, ContainerKind::Array);
    for v in [1, 5, 9] {
        insert(&mut dst, v);
    }
    let src = array(&[2, 5, 10]);
    let mut scratch = vec![0u16; MAX_CONTAINER_SIZE];

    assert_eq!(or_in_place(&mut dst, Container::view(&src), &mut scratch), InPlace::Done);
    assert_eq!(values_of(&dst), vec![1, 2, 5, 9, 10]);
    assert_eq!(size(&dst), MIN_CONTAINER_SIZE);
}

#[test]
fn test_zero_out() {
    for kind in KINDS {
        let mut c = build(&[1, 2, 1000], kind);
        zero_out(&mut c);
        assert_eq!(cardinality(&c), 0);
        assert!(values_of(&c).is_empty(), "{kind:?}");
        assert_eq!(self::kind(&c), kind);
    }
}

#[test]
fn test_array_helpers() {
    let (x, y) = ([1u16, 3, 5, 7], [3u16, 4, 5, 8]);
    let mut out = [0u16; 8];

    let n = intersect(&x, &y, &mut out);
    assert_eq!(&out[..n], &[3, 5]);

    assert_eq!(union_len(&x, &y), 6);
    let n = union(&x, &y, &mut out);
    assert_eq!(&out[..n], &[1, 3, 4, 5, 7, 8]);

    let n = difference(&x, &y, &mut out);
    assert_eq!(&out[..n], &[1, 7]);
}
