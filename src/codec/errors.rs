//! # Codec Errors

use thiserror::Error;

/// Result type for tokenizer and JSON codec operations
pub type CodecResult<T> = Result<T, CodecError>;

/// Raw structure could not be tokenized
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CodecError {
    // Delimited text
    #[error("Unterminated quoted field on line {line}")]
    UnterminatedQuote { line: usize },

    #[error("Truncated escape sequence at end of line {line}")]
    TruncatedEscape { line: usize },

    // JSON
    #[error("Unexpected character '{found}' at offset {offset}")]
    UnexpectedChar { offset: usize, found: char },

    #[error("Unexpected end of input at offset {offset}")]
    UnexpectedEnd { offset: usize },

    #[error("Unterminated string starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("Invalid escape sequence at offset {offset}")]
    InvalidEscape { offset: usize },

    #[error("Invalid number '{text}' at offset {offset}")]
    InvalidNumber { offset: usize, text: String },

    #[error("Trailing characters after document at offset {offset}")]
    TrailingCharacters { offset: usize },

    #[error("Expected {expected} but found {found}")]
    ShapeMismatch {
        expected: &'static str,
        found: &'static str,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_position() {
        let err = CodecError::UnterminatedQuote { line: 7 };
        assert!(err.to_string().contains("line 7"));

        let err = CodecError::UnexpectedChar { offset: 12, found: '}' };
        assert!(err.to_string().contains("offset 12"));
    }
}
