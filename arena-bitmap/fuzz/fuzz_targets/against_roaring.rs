#![no_main]

use arena_bitmap::{Bitmap, ContainerBuffer, MergeConfig, Op};
use libfuzzer_sys::arbitrary::{self, Arbitrary, Unstructured};
use libfuzzer_sys::fuzz_target;
use roaring::RoaringTreemap;
use std::mem;

/// A value confined to a few chunks so that operands share containers.
#[derive(Debug, Copy, Clone)]
struct Num(u64);

impl<'a> Arbitrary<'a> for Num {
    fn arbitrary(u: &mut Unstructured<'a>) -> arbitrary::Result<Self> {
        let chunk: u8 = u.arbitrary()?;
        let low: u16 = u.arbitrary()?;
        Ok(Self(((chunk % 16) as u64) << 16 | low as u64))
    }
}

#[derive(Arbitrary, Debug)]
enum Operation {
    Set(Num),
    SetRun(Num, u16),
    Contains(Num),
    CheckLen,
    CheckMinMax,
    CheckIter,
    And,
    Or,
    AndNot,
    AndInPlace(u8),
    OrInPlace(u8),
    AndNotInPlace(u8),
    OrToSuperset,
    FillUp(u16),
    ConvertToBitmaps,
    SwapSides,
    BytesRoundtrip,
    CloneCompact,
}

#[derive(Arbitrary, Debug)]
struct FuzzInput {
    initial_lhs: Vec<Num>,
    initial_rhs: Vec<Num>,
    ops: Vec<Operation>,
}

/// Assert that a Bitmap and a RoaringTreemap contain the same elements.
fn check_equal(b: &Bitmap, r: &RoaringTreemap) {
    assert_eq!(b.cardinality(), r.len(), "cardinality mismatch");
    assert_eq!(b.min(), r.min(), "min mismatch");
    assert_eq!(b.max(), r.max(), "max mismatch");
    assert_eq!(b.is_empty(), r.is_empty(), "is_empty mismatch");

    let b_vals: Vec<u64> = b.iter().collect();
    let r_vals: Vec<u64> = r.iter().collect();
    assert_eq!(b_vals, r_vals, "iter mismatch");
}

fn make_pair(vals: &[Num]) -> (Bitmap, RoaringTreemap) {
    let b = vals.iter().map(|n| n.0).collect();
    let r = vals.iter().map(|n| n.0).collect();
    (b, r)
}

fn config(shards: u8) -> MergeConfig {
    MergeConfig::new()
        .with_max_concurrency(shards as usize % 8 + 1)
        .with_min_containers_per_shard(1)
}

fuzz_target!(|input: FuzzInput| {
    let (mut lhs_b, mut lhs_r) = make_pair(&input.initial_lhs);
    let (mut rhs_b, mut rhs_r) = make_pair(&input.initial_rhs);
    let mut buffers = ContainerBuffer::many(4);

    check_equal(&lhs_b, &lhs_r);
    check_equal(&rhs_b, &rhs_r);

    for op in &input.ops {
        match *op {
            Operation::Set(Num(v)) => {
                assert_eq!(lhs_b.set(v), lhs_r.insert(v), "set({v}) mismatch");
            }
            Operation::SetRun(Num(v), len) => {
                for x in v..v + (len % 6000) as u64 {
                    lhs_b.set(x);
                    lhs_r.insert(x);
                }
            }
            Operation::Contains(Num(v)) => {
                assert_eq!(lhs_b.contains(v), lhs_r.contains(v), "contains({v}) mismatch");
            }
            Operation::CheckLen => {
                assert_eq!(lhs_b.cardinality(), lhs_r.len(), "cardinality mismatch");
            }
            Operation::CheckMinMax => {
                assert_eq!(lhs_b.min(), lhs_r.min(), "min mismatch");
                assert_eq!(lhs_b.max(), lhs_r.max(), "max mismatch");
            }
            Operation::CheckIter => {
                let b_vals: Vec<u64> = lhs_b.iter().collect();
                let r_vals: Vec<u64> = lhs_r.iter().collect();
                assert_eq!(b_vals, r_vals, "iter mismatch");
            }
            Operation::And => {
                lhs_b = lhs_b.and(&rhs_b);
                lhs_r &= &rhs_r;
            }
            Operation::Or => {
                lhs_b = lhs_b.merge(&rhs_b, Op::Or, Some(&mut buffers[0]));
                lhs_r |= &rhs_r;
            }
            Operation::AndNot => {
                lhs_b = lhs_b.and_not(&rhs_b);
                lhs_r -= &rhs_r;
            }
            Operation::AndInPlace(shards) => {
                lhs_b.merge_in_place(&rhs_b, Op::And, &config(shards), &mut []);
                lhs_r &= &rhs_r;
            }
            Operation::OrInPlace(shards) => {
                lhs_b.merge_in_place(&rhs_b, Op::Or, &config(shards), &mut buffers);
                lhs_r |= &rhs_r;
            }
            Operation::AndNotInPlace(shards) => {
                lhs_b.merge_in_place(&rhs_b, Op::AndNot, &config(shards), &mut []);
                lhs_r -= &rhs_r;
            }
            Operation::OrToSuperset => {
                let before = lhs_b.as_words().to_vec();
                let merged = lhs_b.or_to_superset(&rhs_b, &mut buffers).map(|_| ());
                match merged {
                    Ok(_) => lhs_r |= &rhs_r,
                    Err(_) => assert_eq!(lhs_b.as_words(), before.as_slice(), "failed superset merge mutated"),
                }
            }
            Operation::FillUp(extra) => {
                let target = lhs_b.max().unwrap_or(0) + extra as u64;
                lhs_b.fill_up(target);
                match lhs_r.max() {
                    Some(max) if max >= target => {}
                    Some(max) => {
                        lhs_r.insert_range(max + 1..=target);
                    }
                    None => {
                        lhs_r.insert_range(0..=target);
                    }
                }
            }
            Operation::ConvertToBitmaps => {
                lhs_b.convert_to_bitmap_containers();
            }
            Operation::SwapSides => {
                mem::swap(&mut lhs_b, &mut rhs_b);
                mem::swap(&mut lhs_r, &mut rhs_r);
            }
            Operation::BytesRoundtrip => {
                let restored = Bitmap::try_from_bytes(&lhs_b.to_bytes()).unwrap();
                assert_eq!(restored, lhs_b, "bytes roundtrip mismatch");
            }
            Operation::CloneCompact => {
                let clone = lhs_b.clone();
                assert!(clone.len_in_bytes() <= lhs_b.len_in_bytes());
                lhs_b = clone;
            }
        }
    }

    check_equal(&lhs_b, &lhs_r);
    check_equal(&rhs_b, &rhs_r);
});
