//! Hand-written input codecs
//!
//! - `DelimitedTokenizer`: one delimited line to fields
//! - JSON: document parser, compact writer, and the record line codec used
//!   by merge-sort spill runs

mod delimited;
mod errors;
mod json;

pub use delimited::DelimitedTokenizer;
pub use errors::{CodecError, CodecResult};
pub use json::{
    decode_record, encode_record, escape_json_string, json_to_value, parse_document,
    write_value, JsonValue,
};
