//! Output handling for CLI
//!
//! - Results: one compact JSON object per record on stdout
//! - Reports: a single JSON object on stdout
//! - Logs stay on stderr

use std::io::{self, BufWriter, Write};

use serde_json::Value;

use super::errors::CliResult;
use crate::codec::encode_record;
use crate::record::Record;

/// Writes records as JSON lines, returning the count written
pub fn write_records<'a, W: Write>(
    out: W,
    records: impl IntoIterator<Item = &'a Record>,
) -> CliResult<usize> {
    let mut out = BufWriter::new(out);
    let mut written = 0;
    for record in records {
        writeln!(out, "{}", encode_record(record))?;
        written += 1;
    }
    out.flush()?;
    Ok(written)
}

/// Writes a JSON report object to stdout
pub fn write_report(report: &Value) -> CliResult<()> {
    let mut stdout = io::stdout();
    serde_json::to_writer(&mut stdout, report)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_records_as_lines() {
        let records = vec![
            Record::new().with("id", 1).with("name", "a"),
            Record::new().with("id", 2).with("name", "b"),
        ];
        let mut buf = Vec::new();
        let n = write_records(&mut buf, &records).unwrap();
        assert_eq!(n, 2);
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], encode_record(&records[0]));
    }
}
