//! Single-use hash index over the build side of a join

use std::collections::HashMap;

use crate::record::{Record, Value};

/// Raw join key. Numbers and text are distinct; null and absent share one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JoinKey {
    Null,
    /// Bit pattern of the number, with -0.0 folded into 0.0
    Number(u64),
    Text(String),
}

impl JoinKey {
    pub fn of(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => JoinKey::Null,
            Some(Value::Number(n)) => {
                let n = if *n == 0.0 { 0.0 } else { *n };
                JoinKey::Number(n.to_bits())
            }
            Some(Value::Text(s)) => JoinKey::Text(s.clone()),
        }
    }
}

/// Join key to the build records carrying it, in encounter order
#[derive(Debug, Default)]
pub struct JoinIndex {
    rows: Vec<Record>,
    buckets: HashMap<JoinKey, Vec<usize>>,
}

impl JoinIndex {
    /// Indexes `rows` on `column`
    pub fn build(rows: Vec<Record>, column: &str) -> Self {
        let mut buckets: HashMap<JoinKey, Vec<usize>> = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            buckets.entry(JoinKey::of(row.get(column))).or_default().push(i);
        }
        Self { rows, buckets }
    }

    /// Positions of build records matching `key`
    pub fn lookup(&self, key: &JoinKey) -> &[usize] {
        self.buckets.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn row(&self, pos: usize) -> Option<&Record> {
        self.rows.get(pos)
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn distinct_keys(&self) -> usize {
        self.buckets.len()
    }
}
