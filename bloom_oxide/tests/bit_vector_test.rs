//! Bit vector tests across the three backings
//!
//! Heap, off-heap anonymous, and file-mapped vectors share one contract:
//! transition-reporting set/unset, incremental cardinality, OR-merge between
//! same-kind peers, and idempotent close. File-mapped vectors additionally
//! persist their words across reopen.

use bloom_oxide::{BackingKind, BitVector, FilterError};
use proptest::prelude::*;

// ============================================================================
// Phase 1: Transition semantics (all backings)
// ============================================================================

fn backings(bits: u64) -> Vec<BitVector> {
    vec![
        BitVector::new_heap(bits),
        BitVector::new_off_heap(bits).unwrap(),
    ]
}

#[test]
fn test_set_unset_transitions_off_heap() {
    let vector = BitVector::new_off_heap(64).unwrap();
    assert!(vector.set(1), "set(1) transitions");
    assert!(!vector.set(1), "set(1) again does not");
    assert!(vector.set(2));
    assert!(vector.unset(1), "unset(1) transitions");
    assert!(!vector.get(1));
    assert!(vector.get(2));
}

#[test]
fn test_cardinality_tracks_transitions() {
    for vector in backings(512) {
        assert_eq!(vector.cardinality(), 0);
        for i in 0..100 {
            assert!(vector.set(i * 5));
        }
        assert_eq!(vector.cardinality(), 100);
        for i in 0..50 {
            assert!(vector.unset(i * 5));
        }
        assert_eq!(vector.cardinality(), 50);
    }
}

#[test]
fn test_kind_reported() {
    assert_eq!(BitVector::new_heap(8).kind(), BackingKind::Heap);
    assert_eq!(
        BitVector::new_off_heap(8).unwrap().kind(),
        BackingKind::OffHeap
    );
}

// ============================================================================
// Phase 2: Merge compatibility
// ============================================================================

#[test]
fn test_put_all_same_kind_unions() {
    let a = BitVector::new_off_heap(256).unwrap();
    let b = BitVector::new_off_heap(256).unwrap();
    a.set(10);
    b.set(200);
    a.put_all(&b).unwrap();
    assert!(a.get(10));
    assert!(a.get(200));
    assert_eq!(a.cardinality(), 2);
}

#[test]
fn test_put_all_rejects_kind_mismatch() {
    let heap = BitVector::new_heap(256);
    let off_heap = BitVector::new_off_heap(256).unwrap();
    assert!(matches!(
        heap.put_all(&off_heap),
        Err(FilterError::IncompatibleMerge { .. })
    ));
}

#[test]
fn test_put_all_rejects_size_mismatch() {
    let a = BitVector::new_heap(256);
    let b = BitVector::new_heap(128);
    assert!(matches!(
        a.put_all(&b),
        Err(FilterError::IncompatibleMerge { .. })
    ));
}

// ============================================================================
// Phase 3: File-mapped persistence
// ============================================================================

#[test]
fn test_file_round_trip_restores_exact_bits() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bits.bloom");
    let positions: &[u64] = &[0, 1, 63, 64, 65, 500, 999];

    {
        let mut vector = BitVector::open_file(&path, 1000).unwrap();
        for &p in positions {
            assert!(vector.set(p));
        }
        vector.close();
    }

    let reopened = BitVector::open_file(&path, 1000).unwrap();
    assert_eq!(reopened.kind(), BackingKind::FileMapped);
    assert_eq!(reopened.cardinality(), positions.len() as u64);
    for bit in 0..1000u64 {
        assert_eq!(
            reopened.get(bit),
            positions.contains(&bit),
            "bit {} differs after reopen",
            bit
        );
    }
}

#[test]
fn test_file_created_zeroed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh.bloom");
    let vector = BitVector::open_file(&path, 256).unwrap();
    assert_eq!(vector.cardinality(), 0);

    // The on-disk image is the word-aligned raw array, no header
    let len = std::fs::metadata(&path).unwrap().len();
    assert_eq!(len, 256_u64.div_ceil(64) * 8);
}

#[test]
fn test_file_close_idempotent_and_flushes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("close.bloom");
    let mut vector = BitVector::open_file(&path, 64).unwrap();
    vector.set(7);
    vector.close();
    vector.close();
    assert!(vector.is_closed());

    let reopened = BitVector::open_file(&path, 64).unwrap();
    assert!(reopened.get(7));
}

#[test]
fn test_file_merge_between_mapped_vectors() {
    let dir = tempfile::tempdir().unwrap();
    let a = BitVector::open_file(&dir.path().join("a.bloom"), 128).unwrap();
    let b = BitVector::open_file(&dir.path().join("b.bloom"), 128).unwrap();
    a.set(3);
    b.set(99);
    a.put_all(&b).unwrap();
    assert!(a.get(3));
    assert!(a.get(99));
}

// ============================================================================
// Phase 4: Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_cardinality_matches_observable_bits(ops in proptest::collection::vec((0u64..256, any::<bool>()), 0..200)) {
        let vector = BitVector::new_heap(256);
        for (index, set) in ops {
            if set {
                vector.set(index);
            } else {
                vector.unset(index);
            }
        }
        let visible = (0..256u64).filter(|&i| vector.get(i)).count() as u64;
        prop_assert_eq!(vector.cardinality(), visible);
    }

    #[test]
    fn prop_merge_is_idempotent(a_bits in proptest::collection::hash_set(0u64..512, 0..64),
                                b_bits in proptest::collection::hash_set(0u64..512, 0..64)) {
        let a = BitVector::new_heap(512);
        let b = BitVector::new_heap(512);
        for &bit in &a_bits {
            a.set(bit);
        }
        for &bit in &b_bits {
            b.set(bit);
        }

        a.put_all(&b).unwrap();
        let first_cardinality = a.cardinality();
        a.put_all(&b).unwrap();
        prop_assert_eq!(a.cardinality(), first_cardinality);
        for bit in a_bits.union(&b_bits) {
            prop_assert!(a.get(*bit));
        }
    }
}
