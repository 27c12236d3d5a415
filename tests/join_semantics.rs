//! Hash join semantics
//!
//! - INNER emits one row per matching (probe, build) pair in probe order
//! - LEFT keeps every probe row; RIGHT keeps every build row; OUTER keeps both
//! - Null keys match each other
//! - Pipeline join probes in chunks without changing the result

use std::collections::BTreeSet;

use chunkql::join::{join, JoinSpec, JoinType};
use chunkql::pipeline::{Operation, QueryPipeline};
use chunkql::record::{Record, Table, Value};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// =============================================================================
// Test Utilities
// =============================================================================

fn random_side(rng: &mut StdRng, name: &str, id_col: &str, n: usize) -> Table {
    let rows = (0..n)
        .map(|i| {
            let key = if rng.gen_bool(0.1) {
                Value::Null
            } else {
                Value::Number(rng.gen_range(0..8) as f64)
            };
            Record::new().with("key", key).with(id_col, i as i64)
        })
        .collect();
    Table::new(name, vec!["key".into(), id_col.into()], rows).unwrap()
}

fn ids(table: &Table, col: &str) -> BTreeSet<i64> {
    table
        .rows()
        .iter()
        .filter_map(|r| r.get(col).and_then(Value::as_number))
        .map(|n| n as i64)
        .collect()
}

fn matches_for(probe: &Record, build: &Table) -> usize {
    build
        .rows()
        .iter()
        .filter(|b| b.get("key") == probe.get("key"))
        .count()
}

// =============================================================================
// Tests
// =============================================================================

#[test]
fn test_inner_join_pair_count() {
    let mut rng = StdRng::seed_from_u64(11);
    let probe = random_side(&mut rng, "p", "pid", 60);
    let build = random_side(&mut rng, "b", "bid", 40);

    let out = join(&probe, &build, &JoinSpec::inner("key", "key")).unwrap();
    let expected: usize = probe.rows().iter().map(|r| matches_for(r, &build)).sum();
    assert_eq!(out.row_count(), expected);
    assert_eq!(out.headers(), &["key", "pid", "bid"]);
    assert_eq!(out.name(), "p");
}

#[test]
fn test_left_join_keeps_every_probe_row() {
    let mut rng = StdRng::seed_from_u64(12);
    let probe = random_side(&mut rng, "p", "pid", 50);
    let build = random_side(&mut rng, "b", "bid", 10);

    let out = join(&probe, &build, &JoinSpec::new("key", "key", JoinType::Left)).unwrap();
    assert_eq!(ids(&out, "pid"), ids(&probe, "pid"));

    let expected: usize = probe
        .rows()
        .iter()
        .map(|r| matches_for(r, &build).max(1))
        .sum();
    assert_eq!(out.row_count(), expected);
}

#[test]
fn test_right_join_keeps_every_build_row() {
    let mut rng = StdRng::seed_from_u64(13);
    let probe = random_side(&mut rng, "p", "pid", 10);
    let build = random_side(&mut rng, "b", "bid", 50);

    let out = join(&probe, &build, &JoinSpec::new("key", "key", JoinType::Right)).unwrap();
    assert_eq!(ids(&out, "bid"), ids(&build, "bid"));
}

#[test]
fn test_outer_join_keeps_both_sides() {
    let mut rng = StdRng::seed_from_u64(14);
    let probe = random_side(&mut rng, "p", "pid", 30);
    let build = random_side(&mut rng, "b", "bid", 30);

    let out = join(&probe, &build, &JoinSpec::new("key", "key", JoinType::Outer)).unwrap();
    assert_eq!(ids(&out, "pid"), ids(&probe, "pid"));
    assert_eq!(ids(&out, "bid"), ids(&build, "bid"));

    // Unmatched build rows come last, padded with null probe columns
    let tail_start = out
        .rows()
        .iter()
        .position(|r| r.get("pid") == Some(&Value::Null))
        .unwrap_or(out.row_count());
    assert!(out.rows()[tail_start..]
        .iter()
        .all(|r| r.get("pid") == Some(&Value::Null)));
}

#[test]
fn test_null_keys_match_each_other() {
    let probe = Table::new(
        "p",
        vec!["key".into(), "pid".into()],
        vec![Record::new().with("key", Value::Null).with("pid", 1)],
    )
    .unwrap();
    let build = Table::new(
        "b",
        vec!["key".into(), "bid".into()],
        vec![Record::new().with("key", Value::Null).with("bid", 9)],
    )
    .unwrap();

    let out = join(&probe, &build, &JoinSpec::inner("key", "key")).unwrap();
    assert_eq!(out.row_count(), 1);
    assert_eq!(out.value(0, "bid"), Some(&Value::Number(9.0)));
}

#[test]
fn test_pipeline_join_matches_direct_join() {
    let mut rng = StdRng::seed_from_u64(15);
    let probe = random_side(&mut rng, "p", "pid", 120);
    let build = random_side(&mut rng, "b", "bid", 25);
    let spec = JoinSpec::new("key", "key", JoinType::Outer);

    let direct = join(&probe, &build, &spec).unwrap();
    let piped = QueryPipeline::new(vec![Operation::Join {
        build: build.clone(),
        spec,
    }])
    .with_chunk_size(7)
    .execute(&probe)
    .unwrap();

    assert_eq!(piped.headers, direct.headers());
    assert_eq!(piped.records, direct.rows());
}

#[test]
fn test_missing_join_key_is_unknown_column() {
    let probe = Table::new("p", vec!["a".into()], Vec::new()).unwrap();
    let build = Table::new("b", vec!["b".into()], Vec::new()).unwrap();
    let err = join(&probe, &build, &JoinSpec::inner("a", "missing")).unwrap_err();
    assert_eq!(err.code(), chunkql::ErrorCode::UnknownColumn);
}
