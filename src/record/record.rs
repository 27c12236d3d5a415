//! Normalized row representation
//!
//! A record is an ordered list of named fields. Lookup by name returns
//! `None` when the field is absent, which is distinct from a present
//! `Value::Null`. Duplicate names are allowed (a column projected twice);
//! lookups resolve to the first occurrence.

use super::value::Value;

/// An ordered list of named fields
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: Vec<(String, Value)>,
}

impl Record {
    /// Creates an empty record
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Creates an empty record with room for `n` fields
    pub fn with_capacity(n: usize) -> Self {
        Self {
            fields: Vec::with_capacity(n),
        }
    }

    /// Builds a record from positional values aligned with `headers`.
    ///
    /// Missing trailing values read as null; values beyond the header count
    /// are dropped so the record never outgrows its headers.
    pub fn from_row(headers: &[String], values: Vec<Value>) -> Self {
        let mut values = values.into_iter();
        let fields = headers
            .iter()
            .map(|h| (h.clone(), values.next().unwrap_or(Value::Null)))
            .collect();
        Self { fields }
    }

    /// Appends a field, even if the name already exists
    pub fn push(&mut self, name: impl Into<String>, value: Value) {
        self.fields.push((name.into(), value));
    }

    /// Builder form of `push`
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.push(name, value.into());
        self
    }

    /// Looks up a field by name.
    ///
    /// `None` means absent; `Some(&Value::Null)` means present but null.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Returns true if a field with this name is present
    pub fn contains(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    /// Overwrites the first field with this name, or appends it
    pub fn set(&mut self, name: &str, value: Value) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    /// Returns the number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns true if the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Returns field names in order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(n, _)| n.as_str())
    }

    /// Lays this record out in `headers` order, null-padding absent columns.
    pub fn conform(&self, headers: &[String]) -> Record {
        let fields = headers
            .iter()
            .map(|h| (h.clone(), self.get(h).cloned().unwrap_or(Value::Null)))
            .collect();
        Record { fields }
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
