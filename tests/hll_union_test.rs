mod common;

use common::hashed;
use hll::Hll;
use hll::HllType;

/// Build an estimator over a hashed range with the default promotion
/// settings.
fn build(log2m: u32, regwidth: u32, range: std::ops::Range<u64>) -> Hll {
    let mut hll = Hll::new(log2m, regwidth).unwrap();
    for i in range {
        hll.add_raw(hashed(i));
    }
    hll
}

#[test]
fn test_union_of_two_empties_is_empty() {
    let mut a = Hll::new(11, 5).unwrap();
    let b = Hll::new(11, 5).unwrap();
    a.union(&b);
    assert_eq!(a.hll_type(), HllType::Empty);
    assert_eq!(a.cardinality(), 0);
}

#[test]
fn test_union_with_empty_is_clone() {
    let mut a = Hll::new(11, 5).unwrap();
    let b = build(11, 5, 0..100);
    assert_eq!(b.hll_type(), HllType::Explicit);

    a.union(&b);
    assert_eq!(a.hll_type(), HllType::Explicit);
    assert_eq!(a.to_bytes(), b.to_bytes());
}

#[test]
fn test_union_empty_source_leaves_destination_unchanged() {
    let mut a = build(11, 5, 0..5_000);
    let b = Hll::new(11, 5).unwrap();
    let bytes = a.to_bytes();

    a.union(&b);
    assert_eq!(a.to_bytes(), bytes);
}

#[test]
fn test_union_with_empty_destination_clones_each_representation() {
    for count in [50u64, 400, 30_000] {
        let src = build(11, 5, 0..count);
        let mut dest = Hll::new(11, 5).unwrap();
        dest.union(&src);
        assert_eq!(dest.hll_type(), src.hll_type());
        assert_eq!(dest.cardinality(), src.cardinality());
        assert_eq!(dest.to_bytes(), src.to_bytes());
    }
}

#[test]
fn test_explicit_union_stays_exact() {
    let mut a = build(12, 5, 0..100);
    let b = build(12, 5, 50..150);

    a.union(&b);
    assert_eq!(a.hll_type(), HllType::Explicit);
    assert_eq!(a.cardinality(), 150);
}

#[test]
fn test_explicit_union_promotes_past_threshold() {
    // Thresholds at (11, 5): EXPLICIT 160, SPARSE 512.
    let mut a = build(11, 5, 0..100);
    let b = build(11, 5, 100..200);

    a.union(&b);
    assert_eq!(a.hll_type(), HllType::Sparse);
    let estimate = a.cardinality();
    assert!(
        (180..=220).contains(&estimate),
        "expected an estimate near 200, got {estimate}"
    );
}

#[test]
fn test_sparse_union_merges_registers() {
    let mut a = build(11, 5, 0..300);
    let b = build(11, 5, 200..500);
    assert_eq!(a.hll_type(), HllType::Sparse);
    assert_eq!(b.hll_type(), HllType::Sparse);

    a.union(&b);
    let replayed = build(11, 5, 0..500);
    assert_eq!(a.cardinality(), replayed.cardinality());
}

#[test]
fn test_full_union_takes_register_maxima() {
    let mut a = build(11, 5, 0..20_000);
    let b = build(11, 5, 10_000..40_000);
    assert_eq!(a.hll_type(), HllType::Full);
    assert_eq!(b.hll_type(), HllType::Full);

    a.union(&b);
    let replayed = build(11, 5, 0..40_000);
    // FULL is canonical: identical registers mean identical bytes.
    assert_eq!(a.to_bytes(), replayed.to_bytes());
    assert_eq!(a.cardinality(), replayed.cardinality());
}

#[test]
fn test_union_equals_replay_across_representations() {
    // Every (destination, source) representation pair, driven by input
    // sizes that land each side in the desired state at (11, 5).
    let sizes = [("explicit", 100u64), ("sparse", 400), ("full", 30_000)];

    for &(dest_name, dest_count) in &sizes {
        for &(src_name, src_count) in &sizes {
            let mut dest = build(11, 5, 0..dest_count);
            let src = build(11, 5, dest_count..dest_count + src_count);

            dest.union(&src);
            let replayed = build(11, 5, 0..dest_count + src_count);
            assert_eq!(
                dest.cardinality(),
                replayed.cardinality(),
                "union({dest_name}, {src_name}) diverged from replay"
            );
        }
    }
}

#[test]
fn test_union_is_commutative_on_cardinality() {
    let a = build(11, 5, 0..700);
    let b = build(11, 5, 300..25_000);

    let mut ab = a.clone();
    ab.union(&b);
    let mut ba = b.clone();
    ba.union(&a);

    assert_eq!(ab.cardinality(), ba.cardinality());
}

#[test]
fn test_full_destination_absorbs_explicit_source() {
    let mut full = build(14, 6, 0..10_000_000);
    assert_eq!(full.hll_type(), HllType::Full);
    let before = full.cardinality();

    // Three hashes disjoint from the first ten million.
    let explicit = build(14, 6, 20_000_000..20_000_003);
    assert_eq!(explicit.hll_type(), HllType::Explicit);

    full.union(&explicit);
    assert_eq!(full.hll_type(), HllType::Full);
    let after = full.cardinality();
    assert!(after >= before, "estimate decreased across union");
    assert!(
        (after - before) as f64 <= before as f64 * 0.01,
        "estimate moved more than the FULL error bound: {before} -> {after}"
    );
}

#[test]
fn test_sparse_destination_with_full_source_goes_full() {
    let mut sparse = build(11, 5, 0..300);
    let full = build(11, 5, 300..30_000);
    assert_eq!(sparse.hll_type(), HllType::Sparse);
    assert_eq!(full.hll_type(), HllType::Full);

    sparse.union(&full);
    assert_eq!(sparse.hll_type(), HllType::Full);

    let replayed = build(11, 5, 0..30_000);
    assert_eq!(sparse.to_bytes(), replayed.to_bytes());
}

#[test]
fn test_explicit_destination_with_sparse_source_goes_sparse() {
    let mut explicit = build(11, 5, 0..100);
    let sparse = build(11, 5, 100..500);
    assert_eq!(explicit.hll_type(), HllType::Explicit);
    assert_eq!(sparse.hll_type(), HllType::Sparse);

    explicit.union(&sparse);
    assert_eq!(explicit.hll_type(), HllType::Sparse);

    let replayed = build(11, 5, 0..500);
    assert_eq!(explicit.cardinality(), replayed.cardinality());
}

#[test]
#[should_panic(expected = "cannot union HLLs of different parameters")]
fn test_union_rejects_mismatched_log2m() {
    let mut a = Hll::new(11, 5).unwrap();
    let b = Hll::new(12, 5).unwrap();
    a.union(&b);
}

#[test]
#[should_panic(expected = "cannot union HLLs of different parameters")]
fn test_union_rejects_mismatched_regwidth() {
    let mut a = Hll::new(11, 5).unwrap();
    let b = Hll::new(11, 6).unwrap();
    a.union(&b);
}
