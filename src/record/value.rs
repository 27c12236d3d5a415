//! Field values and the shared value ordering
//!
//! A field holds a string, a number, or null. Numeric coercion is attempted
//! only where a typed comparison or aggregation needs it and falls back
//! silently when the text does not parse.

use std::cmp::Ordering;
use std::fmt;

/// A single field value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Number(f64),
    Text(String),
}

impl Value {
    /// Creates a text value
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Returns true for an explicit null
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Attempts numeric coercion.
    ///
    /// Text coerces when it parses as a finite `f64` after trimming.
    /// `NaN` and infinities never coerce.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Null => None,
            Value::Number(n) if n.is_finite() => Some(*n),
            Value::Number(_) => None,
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        }
    }

    /// Renders the value as a plain string.
    ///
    /// Null renders as the empty string; callers that must distinguish null
    /// from `""` check `is_null` first.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Number(n) => write!(f, "{}", format_number(*n)),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n as f64)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Number(n as f64)
    }
}

/// Formats a number without a trailing `.0` when it is integral.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Ordering class of a possibly-absent value.
///
/// absent/null < numeric < non-numeric text
fn class_of(v: Option<&Value>) -> (u8, Option<f64>) {
    match v {
        None | Some(Value::Null) => (0, None),
        Some(val) => match val.as_number() {
            Some(n) => (1, Some(n)),
            None => (2, None),
        },
    }
}

/// Compares two possibly-absent values.
///
/// Ordering rules:
/// - absent and null compare equal and lowest
/// - two numerics (after coercion) compare numerically
/// - two non-numerics compare as strings
/// - a numeric sorts before a non-numeric string
///
/// This is a total order, so it can drive both the in-memory sort and the
/// k-way merge without the two phases disagreeing.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let (a_class, a_num) = class_of(a);
    let (b_class, b_num) = class_of(b);

    if a_class != b_class {
        return a_class.cmp(&b_class);
    }

    match (a_num, b_num) {
        (Some(x), Some(y)) => x.total_cmp(&y),
        _ => match (a, b) {
            (Some(x), Some(y)) if a_class == 2 => x.render().cmp(&y.render()),
            _ => Ordering::Equal,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(Value::text(" 42 ").as_number(), Some(42.0));
        assert_eq!(Value::text("3.5").as_number(), Some(3.5));
        assert_eq!(Value::text("abc").as_number(), None);
        assert_eq!(Value::text("NaN").as_number(), None);
        assert_eq!(Value::text("inf").as_number(), None);
        assert_eq!(Value::Null.as_number(), None);
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(30.0), "30");
        assert_eq!(format_number(-2.0), "-2");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn test_compare_numeric_before_string() {
        let ten = Value::text("10");
        let nine = Value::Number(9.0);
        let word = Value::text("apple");

        assert_eq!(compare_values(Some(&nine), Some(&ten)), Ordering::Less);
        assert_eq!(compare_values(Some(&ten), Some(&word)), Ordering::Less);
        assert_eq!(compare_values(Some(&word), Some(&nine)), Ordering::Greater);
    }

    #[test]
    fn test_compare_missing_is_lowest() {
        let v = Value::Number(-1e9);
        assert_eq!(compare_values(None, Some(&v)), Ordering::Less);
        assert_eq!(compare_values(Some(&Value::Null), None), Ordering::Equal);
        assert_eq!(compare_values(Some(&Value::Null), Some(&Value::text(""))), Ordering::Less);
    }

    #[test]
    fn test_compare_strings_lexically() {
        let a = Value::text("alice");
        let b = Value::text("bob");
        assert_eq!(compare_values(Some(&a), Some(&b)), Ordering::Less);
    }
}
