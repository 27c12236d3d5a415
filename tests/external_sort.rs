//! External merge sort invariants
//!
//! - Output equals a stable in-memory sort with the same comparator
//! - The merge holds at most one record per run
//! - Spill storage is released on completion, early stop and failure
//! - Corrupted run files are detected on read

use std::fs;

use chunkql::errors::{EngineError, EngineResult, ErrorCode};
use chunkql::pipeline::{Operation, QueryPipeline};
use chunkql::record::{Record, Table, Value};
use chunkql::sort::{ExternalSorter, RunReader, RunWriter, SortKey, SortOrder, SpillDir};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tempfile::TempDir;

// =============================================================================
// Test Utilities
// =============================================================================

fn random_records(rng: &mut StdRng, n: usize) -> Vec<Record> {
    (0..n)
        .map(|i| {
            let group = match rng.gen_range(0..10) {
                0 => Value::Null,
                1 => Value::text(format!("g{}", rng.gen_range(0..5))),
                // numeric text compares numerically: "9" < "10"
                2 => Value::text(rng.gen_range(0..12).to_string()),
                3 => Value::text(format!("{:.2}", rng.gen_range(-3.0..3.0))),
                4 => Value::Number(rng.gen_range(-4..4) as f64 / 4.0),
                5 => Value::Number(if rng.gen_bool(0.5) { 0.0 } else { -0.0 }),
                6 => Value::Number(rng.gen_range(-3..=3) as f64 * 1e300),
                7 => Value::Number(if rng.gen_bool(0.5) {
                    f64::INFINITY
                } else {
                    f64::NEG_INFINITY
                }),
                _ => Value::Number(rng.gen_range(0..20) as f64),
            };
            Record::new()
                .with("group", group)
                .with("score", rng.gen_range(-50..50))
                .with("pos", i as i64)
        })
        .collect()
}

/// Field-wise equality that also distinguishes `0.0` from `-0.0`
fn assert_identical(left: &[Record], right: &[Record], context: &str) {
    assert_eq!(left, right, "{}", context);
    for (l, r) in left.iter().zip(right) {
        if let (Some(Value::Number(a)), Some(Value::Number(b))) = (l.get("group"), r.get("group")) {
            assert_eq!(a.to_bits(), b.to_bits(), "{}", context);
        }
    }
}

fn batches(records: &[Record], size: usize) -> Vec<EngineResult<Vec<Record>>> {
    records.chunks(size).map(|c| Ok(c.to_vec())).collect()
}

fn collect(sorter: &ExternalSorter, input: Vec<EngineResult<Vec<Record>>>) -> Vec<Record> {
    sorter
        .sort_batches(input)
        .unwrap()
        .collect::<EngineResult<Vec<_>>>()
        .unwrap()
}

// =============================================================================
// Ordering
// =============================================================================

#[test]
fn test_randomized_equivalence_with_in_memory_sort() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let order = SortOrder::new(vec![SortKey::asc("group"), SortKey::desc("score")]).unwrap();
    let sorter = ExternalSorter::new(order);

    for _ in 0..20 {
        let n = rng.gen_range(0..400);
        let size = rng.gen_range(1..64);
        let records = random_records(&mut rng, n);

        let merged = collect(&sorter, batches(&records, size));
        let reference = sorter.sort_in_memory(records);
        assert_identical(&merged, &reference, &format!("n={} chunk={}", n, size));
    }
}

#[test]
fn test_equal_keys_keep_input_order() {
    let records: Vec<Record> = (0..30)
        .map(|i| Record::new().with("k", i % 3).with("pos", i))
        .collect();
    let sorter = ExternalSorter::new(SortOrder::single(SortKey::asc("k")));
    let merged = collect(&sorter, batches(&records, 4));

    for pair in merged.windows(2) {
        if pair[0].get("k") == pair[1].get("k") {
            let a = pair[0].get("pos").and_then(Value::as_number).unwrap();
            let b = pair[1].get("pos").and_then(Value::as_number).unwrap();
            assert!(a < b, "stability broken at pos {} / {}", a, b);
        }
    }
}

#[test]
fn test_nulls_and_text_ordering() {
    let records = vec![
        Record::new().with("k", "beta"),
        Record::new().with("k", 10),
        Record::new().with("k", Value::Null),
        Record::new().with("k", "2"),
        Record::new().with("k", "alpha"),
    ];
    let sorter = ExternalSorter::new(SortOrder::single(SortKey::asc("k")));
    let merged = collect(&sorter, batches(&records, 2));
    let rendered: Vec<String> = merged
        .iter()
        .map(|r| r.get("k").map(Value::to_string).unwrap_or_default())
        .collect();
    assert_eq!(rendered, vec!["null", "2", "10", "alpha", "beta"]);
}

// =============================================================================
// Bounded memory
// =============================================================================

#[test]
fn test_merge_memory_bounded_by_run_count() {
    let mut rng = StdRng::seed_from_u64(7);
    let records = random_records(&mut rng, 2_000);
    let sorter = ExternalSorter::new(SortOrder::single(SortKey::asc("score")));

    let mut merged = sorter.sort_batches(batches(&records, 100)).unwrap();
    let runs = merged.stats().runs_created;
    assert_eq!(runs, 20);

    let mut emitted = 0;
    while let Some(record) = merged.next() {
        record.unwrap();
        emitted += 1;
        assert!(merged.in_flight() <= runs);
    }
    assert_eq!(emitted, 2_000);
    assert!(merged.stats().peak_in_flight <= runs);
}

// =============================================================================
// Cleanup
// =============================================================================

#[test]
fn test_spill_released_after_full_merge() {
    let base = TempDir::new().unwrap();
    let sorter =
        ExternalSorter::new(SortOrder::single(SortKey::asc("k"))).with_spill_base(base.path());
    let records: Vec<Record> = (0..10).rev().map(|i| Record::new().with("k", i)).collect();

    let merged = collect(&sorter, batches(&records, 3));
    assert_eq!(merged.len(), 10);
    assert_eq!(fs::read_dir(base.path()).unwrap().count(), 0);
}

#[test]
fn test_order_by_limit_releases_spill() {
    let base = TempDir::new().unwrap();
    let rows: Vec<Record> = (0..50).map(|i| Record::new().with("k", 50 - i)).collect();
    let input = Table::new("t", vec!["k".into()], rows).unwrap();

    let result = QueryPipeline::new(vec![
        Operation::OrderBy(SortOrder::single(SortKey::asc("k"))),
        Operation::Limit(3),
    ])
    .with_chunk_size(5)
    .with_spill_base(base.path())
    .execute(&input)
    .unwrap();

    assert_eq!(result.len(), 3);
    assert!(result.limit_applied);
    assert_eq!(result.sort_stats.unwrap().runs_created, 10);
    assert_eq!(fs::read_dir(base.path()).unwrap().count(), 0);
}

#[test]
fn test_failure_mid_stream_releases_spill() {
    let base = TempDir::new().unwrap();
    let sorter =
        ExternalSorter::new(SortOrder::single(SortKey::asc("k"))).with_spill_base(base.path());
    let mut input = batches(&[Record::new().with("k", 1), Record::new().with("k", 0)], 1);
    input.push(Err(EngineError::malformed_input("line 3: unterminated quote")));

    let err = sorter.sort_batches(input).err().unwrap();
    assert_eq!(err.code(), ErrorCode::MalformedInput);
    assert_eq!(fs::read_dir(base.path()).unwrap().count(), 0);
}

#[test]
fn test_concurrent_sorts_use_distinct_directories() {
    let base = TempDir::new().unwrap();
    let a = SpillDir::create(Some(base.path())).unwrap();
    let b = SpillDir::create(Some(base.path())).unwrap();
    assert_ne!(a.path(), b.path());
    drop(a);
    drop(b);
    assert_eq!(fs::read_dir(base.path()).unwrap().count(), 0);
}

// =============================================================================
// Corruption
// =============================================================================

#[test]
fn test_corrupted_run_is_detected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("run-000000.jsonl");

    let mut writer = RunWriter::create(path.clone()).unwrap();
    writer.write(&Record::new().with("k", "value")).unwrap();
    writer.finish().unwrap();

    let text = fs::read_to_string(&path).unwrap();
    fs::write(&path, text.replace("value", "valeu")).unwrap();

    let mut reader = RunReader::open(path).unwrap();
    let err = reader.next_record().unwrap_err();
    assert_eq!(err.code(), ErrorCode::Resource);
}
