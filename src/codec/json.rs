//! JSON document codec
//!
//! A hand-written parser and writer. The same codec reads JSON document
//! collections and encodes records into merge-sort spill runs, one compact
//! object per line.

use crate::record::{format_number, Record, Value};

use super::errors::{CodecError, CodecResult};

/// A parsed JSON value. Objects keep their keys in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum JsonValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<JsonValue>),
    Object(Vec<(String, JsonValue)>),
}

impl JsonValue {
    /// Short type name for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            JsonValue::Null => "null",
            JsonValue::Bool(_) => "boolean",
            JsonValue::Number(_) => "number",
            JsonValue::String(_) => "string",
            JsonValue::Array(_) => "array",
            JsonValue::Object(_) => "object",
        }
    }

    /// Serializes to compact JSON text
    pub fn to_json_string(&self) -> String {
        let mut out = String::new();
        write_value(&mut out, self);
        out
    }
}

/// Parses a complete JSON document. Anything after the value other than
/// whitespace is an error.
pub fn parse_document(text: &str) -> CodecResult<JsonValue> {
    let mut parser = Parser::new(text);
    let value = parser.parse_value()?;
    parser.skip_whitespace();
    if parser.pos < parser.bytes.len() {
        return Err(CodecError::TrailingCharacters { offset: parser.pos });
    }
    Ok(value)
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len()
            && matches!(self.bytes[self.pos], b' ' | b'\t' | b'\n' | b'\r')
        {
            self.pos += 1;
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn unexpected(&self) -> CodecError {
        match self.text[self.pos..].chars().next() {
            Some(found) => CodecError::UnexpectedChar {
                offset: self.pos,
                found,
            },
            None => CodecError::UnexpectedEnd { offset: self.pos },
        }
    }

    fn expect(&mut self, byte: u8) -> CodecResult<()> {
        self.skip_whitespace();
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.unexpected())
        }
    }

    fn parse_value(&mut self) -> CodecResult<JsonValue> {
        self.skip_whitespace();
        match self.peek() {
            None => Err(CodecError::UnexpectedEnd { offset: self.pos }),
            Some(b'{') => self.parse_object(),
            Some(b'[') => self.parse_array(),
            Some(b'"') => self.parse_string().map(JsonValue::String),
            Some(b'-') | Some(b'0'..=b'9') => self.parse_number(),
            Some(_) => self.parse_literal(),
        }
    }

    fn parse_literal(&mut self) -> CodecResult<JsonValue> {
        let rest = &self.bytes[self.pos..];
        let (value, len) = if rest.starts_with(b"true") {
            (JsonValue::Bool(true), 4)
        } else if rest.starts_with(b"false") {
            (JsonValue::Bool(false), 5)
        } else if rest.starts_with(b"null") {
            (JsonValue::Null, 4)
        } else {
            return Err(self.unexpected());
        };
        self.pos += len;
        Ok(value)
    }

    fn parse_object(&mut self) -> CodecResult<JsonValue> {
        self.pos += 1;
        let mut fields = Vec::new();

        self.skip_whitespace();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Ok(JsonValue::Object(fields));
        }

        loop {
            self.skip_whitespace();
            if self.peek() != Some(b'"') {
                return Err(self.unexpected());
            }
            let key = self.parse_string()?;
            self.expect(b':')?;
            let value = self.parse_value()?;
            fields.push((key, value));

            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b'}') => {
                    self.pos += 1;
                    return Ok(JsonValue::Object(fields));
                }
                _ => return Err(self.unexpected()),
            }
        }
    }

    fn parse_array(&mut self) -> CodecResult<JsonValue> {
        self.pos += 1;
        let mut items = Vec::new();

        self.skip_whitespace();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Ok(JsonValue::Array(items));
        }

        loop {
            items.push(self.parse_value()?);
            self.skip_whitespace();
            match self.peek() {
                Some(b',') => self.pos += 1,
                Some(b']') => {
                    self.pos += 1;
                    return Ok(JsonValue::Array(items));
                }
                _ => return Err(self.unexpected()),
            }
        }
    }

    fn parse_string(&mut self) -> CodecResult<String> {
        let start = self.pos;
        self.pos += 1;
        let mut out = String::new();

        loop {
            let run_start = self.pos;
            while self.pos < self.bytes.len()
                && self.bytes[self.pos] != b'"'
                && self.bytes[self.pos] != b'\\'
            {
                self.pos += 1;
            }
            // Stops only on ASCII bytes, so the slice is on char boundaries
            out.push_str(&self.text[run_start..self.pos]);

            match self.peek() {
                None => return Err(CodecError::UnterminatedString { offset: start }),
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(out);
                }
                Some(_) => {
                    self.pos += 1;
                    self.parse_escape(&mut out)?;
                }
            }
        }
    }

    fn parse_escape(&mut self, out: &mut String) -> CodecResult<()> {
        let at = self.pos;
        let byte = self
            .peek()
            .ok_or(CodecError::UnterminatedString { offset: at })?;
        self.pos += 1;
        match byte {
            b'"' => out.push('"'),
            b'\\' => out.push('\\'),
            b'/' => out.push('/'),
            b'n' => out.push('\n'),
            b't' => out.push('\t'),
            b'r' => out.push('\r'),
            b'b' => out.push('\u{0008}'),
            b'f' => out.push('\u{000c}'),
            b'u' => {
                let high = self.parse_hex4()?;
                let code = if (0xD800..0xDC00).contains(&high) {
                    if !self.bytes[self.pos..].starts_with(b"\\u") {
                        return Err(CodecError::InvalidEscape { offset: at });
                    }
                    self.pos += 2;
                    let low = self.parse_hex4()?;
                    if !(0xDC00..0xE000).contains(&low) {
                        return Err(CodecError::InvalidEscape { offset: at });
                    }
                    0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00)
                } else {
                    high
                };
                let c = char::from_u32(code).ok_or(CodecError::InvalidEscape { offset: at })?;
                out.push(c);
            }
            _ => return Err(CodecError::InvalidEscape { offset: at }),
        }
        Ok(())
    }

    fn parse_hex4(&mut self) -> CodecResult<u32> {
        let at = self.pos;
        let digits = self
            .text
            .get(self.pos..self.pos + 4)
            .ok_or(CodecError::InvalidEscape { offset: at })?;
        let code =
            u32::from_str_radix(digits, 16).map_err(|_| CodecError::InvalidEscape { offset: at })?;
        self.pos += 4;
        Ok(code)
    }

    fn parse_number(&mut self) -> CodecResult<JsonValue> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        let int_start = self.pos;
        self.skip_digits();
        if self.pos == int_start {
            return Err(self.invalid_number(start));
        }
        if self.peek() == Some(b'.') {
            self.pos += 1;
            let frac_start = self.pos;
            self.skip_digits();
            if self.pos == frac_start {
                return Err(self.invalid_number(start));
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            self.pos += 1;
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.pos += 1;
            }
            let exp_start = self.pos;
            self.skip_digits();
            if self.pos == exp_start {
                return Err(self.invalid_number(start));
            }
        }

        let text = &self.text[start..self.pos];
        text.parse::<f64>()
            .map(JsonValue::Number)
            .map_err(|_| self.invalid_number(start))
    }

    fn skip_digits(&mut self) {
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
    }

    fn invalid_number(&self, start: usize) -> CodecError {
        CodecError::InvalidNumber {
            offset: start,
            text: self.text[start..self.pos].to_string(),
        }
    }
}

/// Appends `s` to `out` with JSON string escaping (no surrounding quotes).
pub fn escape_json_string(out: &mut String, s: &str) {
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    escape_json_string(out, s);
    out.push('"');
}

fn write_number(out: &mut String, n: f64) {
    if n == 0.0 && n.is_sign_negative() {
        out.push_str("-0");
    } else if n.is_finite() {
        out.push_str(&format_number(n));
    } else {
        out.push_str("null");
    }
}

/// Appends the compact JSON form of `value` to `out`
pub fn write_value(out: &mut String, value: &JsonValue) {
    match value {
        JsonValue::Null => out.push_str("null"),
        JsonValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        JsonValue::Number(n) => write_number(out, *n),
        JsonValue::String(s) => write_string(out, s),
        JsonValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        JsonValue::Object(fields) => {
            out.push('{');
            for (i, (k, v)) in fields.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_string(out, k);
                out.push(':');
                write_value(out, v);
            }
            out.push('}');
        }
    }
}

/// Field tag for numbers JSON cannot represent (`inf`, `-inf`, `NaN`)
const NON_FINITE_TAG: &str = "$f64";

/// Encodes a record as one compact JSON object, preserving field order
/// and duplicate names.
///
/// Non-finite numbers are written as `{"$f64":"inf"}` so `decode_record`
/// restores them exactly; text fields are always strings, so the tag
/// cannot collide with them.
pub fn encode_record(record: &Record) -> String {
    let mut out = String::with_capacity(16 * record.len().max(1));
    out.push('{');
    for (i, (name, value)) in record.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(&mut out, name);
        out.push(':');
        match value {
            Value::Null => out.push_str("null"),
            Value::Number(n) if !n.is_finite() => {
                out.push_str("{\"");
                out.push_str(NON_FINITE_TAG);
                out.push_str("\":\"");
                out.push_str(&n.to_string());
                out.push_str("\"}");
            }
            Value::Number(n) => write_number(&mut out, *n),
            Value::Text(s) => write_string(&mut out, s),
        }
    }
    out.push('}');
    out
}

fn decode_field(value: JsonValue) -> Value {
    if let JsonValue::Object(fields) = &value {
        if let [(tag, JsonValue::String(repr))] = fields.as_slice() {
            if tag.as_str() == NON_FINITE_TAG {
                if let Ok(n) = repr.parse::<f64>() {
                    return Value::Number(n);
                }
            }
        }
    }
    json_to_value(value)
}

/// Decodes a record written by `encode_record`.
pub fn decode_record(text: &str) -> CodecResult<Record> {
    match parse_document(text)? {
        JsonValue::Object(fields) => Ok(fields
            .into_iter()
            .map(|(k, v)| (k, decode_field(v)))
            .collect()),
        other => Err(CodecError::ShapeMismatch {
            expected: "object",
            found: other.kind(),
        }),
    }
}

/// Maps a JSON value onto a field value.
///
/// Booleans become the strings `true`/`false`; arrays and objects are kept
/// as their compact JSON text.
pub fn json_to_value(value: JsonValue) -> Value {
    match value {
        JsonValue::Null => Value::Null,
        JsonValue::Bool(b) => Value::Text(b.to_string()),
        JsonValue::Number(n) => Value::Number(n),
        JsonValue::String(s) => Value::Text(s),
        nested @ (JsonValue::Array(_) | JsonValue::Object(_)) => {
            Value::Text(nested.to_json_string())
        }
    }
}
