//! Delimited-text tokenizer
//!
//! Splits one physical line into fields:
//! - configurable delimiter, quote and escape characters
//! - quote characters toggle quoting and are not kept
//! - a doubled quote inside a quoted field yields one literal quote
//! - the escape character makes the next character literal
//! - fields are trimmed
//!
//! Multi-line quoted fields are not supported: a quote still open at end
//! of line is an unterminated field.

use super::errors::{CodecError, CodecResult};

/// Tokenizer for a single delimited line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DelimitedTokenizer {
    delimiter: char,
    quote: char,
    escape: char,
}

impl Default for DelimitedTokenizer {
    fn default() -> Self {
        Self {
            delimiter: ',',
            quote: '"',
            escape: '\\',
        }
    }
}

impl DelimitedTokenizer {
    pub fn new(delimiter: char, quote: char, escape: char) -> Self {
        Self {
            delimiter,
            quote,
            escape,
        }
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Tokenizes one line. `line_no` is used only for error context.
    ///
    /// # Errors
    ///
    /// - `UnterminatedQuote` if a quoted field is still open at end of line
    /// - `TruncatedEscape` if the line ends right after an escape character
    pub fn tokenize(&self, line: &str, line_no: usize) -> CodecResult<Vec<String>> {
        let mut fields = Vec::new();
        let mut current = String::new();
        let mut in_quotes = false;
        let mut chars = line.chars().peekable();

        while let Some(c) = chars.next() {
            if c == self.escape {
                match chars.next() {
                    Some(next) => current.push(next),
                    None => return Err(CodecError::TruncatedEscape { line: line_no }),
                }
                continue;
            }

            if c == self.quote {
                if in_quotes && chars.peek() == Some(&self.quote) {
                    chars.next();
                    current.push(self.quote);
                } else {
                    in_quotes = !in_quotes;
                }
                continue;
            }

            if c == self.delimiter && !in_quotes {
                fields.push(current.trim().to_string());
                current.clear();
                continue;
            }

            current.push(c);
        }

        if in_quotes {
            return Err(CodecError::UnterminatedQuote { line: line_no });
        }

        fields.push(current.trim().to_string());
        Ok(fields)
    }
}
