//! Row sources: the record-at-a-time layer beneath the chunk reader
//!
//! Each source knows its headers up front and yields records in input
//! order. Sources are not seekable; restarting means opening a new one.

use std::io::{self, BufRead};

use crate::codec::{json_to_value, parse_document, DelimitedTokenizer, JsonValue};
use crate::errors::{EngineError, EngineResult};
use crate::record::{duplicate_header, Record, Table, Value};

/// A forward-only sequence of records with known headers
pub trait RowSource {
    /// Column names, fixed for the life of the source
    fn headers(&self) -> &[String];

    /// Returns the next record, `Ok(None)` at end of input
    fn next_record(&mut self) -> EngineResult<Option<Record>>;
}

impl<S: RowSource + ?Sized> RowSource for Box<S> {
    fn headers(&self) -> &[String] {
        (**self).headers()
    }

    fn next_record(&mut self) -> EngineResult<Option<Record>> {
        (**self).next_record()
    }
}

fn read_error(e: io::Error, line_no: usize) -> EngineError {
    if e.kind() == io::ErrorKind::InvalidData {
        EngineError::malformed_input(format!("Invalid UTF-8 on line {}", line_no))
    } else {
        EngineError::resource(format!("Failed to read input at line {}", line_no), e)
    }
}

fn check_headers(headers: &[String]) -> EngineResult<()> {
    match duplicate_header(headers) {
        Some(h) => Err(EngineError::malformed_input(format!(
            "Duplicate column '{}' in input headers",
            h
        ))),
        None => Ok(()),
    }
}

/// Synthesized header names for header-less input
pub fn default_headers(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("column_{}", i)).collect()
}

/// Delimited text, one record per non-blank line
pub struct DelimitedRows<R: BufRead> {
    reader: R,
    tokenizer: DelimitedTokenizer,
    headers: Vec<String>,
    /// First data line when the input has no header row
    pending: Option<Record>,
    line_no: usize,
    buf: String,
}

impl<R: BufRead> DelimitedRows<R> {
    /// Opens a delimited source, consuming the header line if present.
    ///
    /// Empty input yields no headers and no records.
    pub fn open(reader: R, tokenizer: DelimitedTokenizer, has_header: bool) -> EngineResult<Self> {
        let mut rows = Self {
            reader,
            tokenizer,
            headers: Vec::new(),
            pending: None,
            line_no: 0,
            buf: String::new(),
        };

        if let Some(first) = rows.next_fields()? {
            if has_header {
                check_headers(&first)?;
                rows.headers = first;
            } else {
                rows.headers = default_headers(first.len());
                rows.pending = Some(Record::from_row(
                    &rows.headers,
                    first.into_iter().map(Value::Text).collect(),
                ));
            }
        }

        Ok(rows)
    }

    /// Reads and tokenizes the next non-blank line
    fn next_fields(&mut self) -> EngineResult<Option<Vec<String>>> {
        loop {
            self.buf.clear();
            let n = self
                .reader
                .read_line(&mut self.buf)
                .map_err(|e| read_error(e, self.line_no + 1))?;
            if n == 0 {
                return Ok(None);
            }
            self.line_no += 1;

            let line = self.buf.trim_end_matches(['\n', '\r']);
            if line.trim().is_empty() {
                continue;
            }
            return Ok(Some(self.tokenizer.tokenize(line, self.line_no)?));
        }
    }
}

impl<R: BufRead> RowSource for DelimitedRows<R> {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn next_record(&mut self) -> EngineResult<Option<Record>> {
        if let Some(rec) = self.pending.take() {
            return Ok(Some(rec));
        }
        Ok(self.next_fields()?.map(|fields| {
            Record::from_row(&self.headers, fields.into_iter().map(Value::Text).collect())
        }))
    }
}

/// A JSON document collection: an array of objects, or one object.
///
/// The document is parsed whole; records are then handed out one at a time.
/// Headers are the union of keys in first-seen order and every record is
/// null-padded to them.
pub struct JsonRows {
    headers: Vec<String>,
    records: std::vec::IntoIter<Record>,
}

impl JsonRows {
    pub fn open<R: io::Read>(mut reader: R) -> EngineResult<Self> {
        let mut text = String::new();
        reader.read_to_string(&mut text).map_err(|e| read_error(e, 0))?;

        let docs = match parse_document(&text)? {
            JsonValue::Array(items) => items,
            obj @ JsonValue::Object(_) => vec![obj],
            other => {
                return Err(EngineError::malformed_input(format!(
                    "Expected an array of objects but found {}",
                    other.kind()
                )))
            }
        };

        let mut headers: Vec<String> = Vec::new();
        let mut raw = Vec::with_capacity(docs.len());
        for (i, doc) in docs.into_iter().enumerate() {
            let fields = match doc {
                JsonValue::Object(fields) => fields,
                other => {
                    return Err(EngineError::malformed_input(format!(
                        "Document {} is {} rather than an object",
                        i,
                        other.kind()
                    )))
                }
            };
            let keys: Vec<String> = fields.iter().map(|(k, _)| k.clone()).collect();
            if let Some(k) = duplicate_header(&keys) {
                return Err(EngineError::malformed_input(format!(
                    "Document {} repeats key '{}'",
                    i, k
                )));
            }
            let mut rec = Record::with_capacity(fields.len());
            for (k, v) in fields {
                if !headers.contains(&k) {
                    headers.push(k.clone());
                }
                rec.set(&k, json_to_value(v));
            }
            raw.push(rec);
        }

        let records: Vec<Record> = raw.iter().map(|r| r.conform(&headers)).collect();
        Ok(Self {
            headers,
            records: records.into_iter(),
        })
    }
}

impl RowSource for JsonRows {
    fn headers(&self) -> &[String] {
        &self.headers
    }

    fn next_record(&mut self) -> EngineResult<Option<Record>> {
        Ok(self.records.next())
    }
}

/// An in-memory table viewed as a row source
pub struct TableRows<'a> {
    headers: &'a [String],
    rows: std::slice::Iter<'a, Record>,
}

impl<'a> TableRows<'a> {
    pub fn new(table: &'a Table) -> Self {
        Self {
            headers: table.headers(),
            rows: table.rows().iter(),
        }
    }
}

impl RowSource for TableRows<'_> {
    fn headers(&self) -> &[String] {
        self.headers
    }

    fn next_record(&mut self) -> EngineResult<Option<Record>> {
        Ok(self.rows.next().cloned())
    }
}
