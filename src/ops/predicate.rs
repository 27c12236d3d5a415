//! Filter predicates
//!
//! A predicate is a small expression tree of column/literal comparisons
//! joined by AND/OR/NOT. Evaluation never errors: absent or null fields and
//! type mismatches simply do not match.

use std::cmp::Ordering;

use crate::observability::coercion_skipped;
use crate::record::{Record, Value};

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Case-insensitive substring match on the rendered text
    Contains,
}

impl CompareOp {
    /// Parses an operator symbol or keyword
    pub fn parse(s: &str) -> Option<CompareOp> {
        match s.trim().to_ascii_lowercase().as_str() {
            "==" | "=" | "eq" => Some(CompareOp::Eq),
            "!=" | "<>" | "ne" => Some(CompareOp::Ne),
            ">" | "gt" => Some(CompareOp::Gt),
            ">=" | "gte" => Some(CompareOp::Gte),
            "<" | "lt" => Some(CompareOp::Lt),
            "<=" | "lte" => Some(CompareOp::Lte),
            "contains" => Some(CompareOp::Contains),
            _ => None,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Gte => ">=",
            CompareOp::Lt => "<",
            CompareOp::Lte => "<=",
            CompareOp::Contains => "contains",
        }
    }

    fn accepts(&self, ord: Ordering) -> bool {
        match self {
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Gte => ord != Ordering::Less,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Lte => ord != Ordering::Greater,
            CompareOp::Contains => false,
        }
    }
}

/// A boolean expression over one record
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        literal: Value,
    },
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    pub fn compare(column: impl Into<String>, op: CompareOp, literal: impl Into<Value>) -> Self {
        Predicate::Compare {
            column: column.into(),
            op,
            literal: literal.into(),
        }
    }

    pub fn eq(column: impl Into<String>, literal: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Eq, literal)
    }

    pub fn ne(column: impl Into<String>, literal: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Ne, literal)
    }

    pub fn gt(column: impl Into<String>, literal: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gt, literal)
    }

    pub fn gte(column: impl Into<String>, literal: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Gte, literal)
    }

    pub fn lt(column: impl Into<String>, literal: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lt, literal)
    }

    pub fn lte(column: impl Into<String>, literal: impl Into<Value>) -> Self {
        Self::compare(column, CompareOp::Lte, literal)
    }

    pub fn contains(column: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::compare(column, CompareOp::Contains, Value::Text(needle.into()))
    }

    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut all) => {
                all.push(other);
                Predicate::And(all)
            }
            p => Predicate::And(vec![p, other]),
        }
    }

    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut any) => {
                any.push(other);
                Predicate::Or(any)
            }
            p => Predicate::Or(vec![p, other]),
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Predicate::Not(Box::new(self))
    }

    /// Evaluates the predicate against one record
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Predicate::Compare {
                column,
                op,
                literal,
            } => match record.get(column) {
                Some(actual) => compare(column, actual, *op, literal),
                None => false,
            },
            Predicate::And(all) => all.iter().all(|p| p.matches(record)),
            Predicate::Or(any) => any.iter().any(|p| p.matches(record)),
            Predicate::Not(inner) => !inner.matches(record),
        }
    }

    /// Columns referenced anywhere in the tree
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Compare { column, .. } => {
                if !out.contains(&column.as_str()) {
                    out.push(column);
                }
            }
            Predicate::And(ps) | Predicate::Or(ps) => {
                for p in ps {
                    p.collect_columns(out);
                }
            }
            Predicate::Not(inner) => inner.collect_columns(out),
        }
    }
}

fn compare(column: &str, actual: &Value, op: CompareOp, literal: &Value) -> bool {
    if actual.is_null() || literal.is_null() {
        return false;
    }

    if op == CompareOp::Contains {
        let hay = actual.render().to_lowercase();
        return hay.contains(&literal.render().to_lowercase());
    }

    match (actual.as_number(), literal.as_number()) {
        (Some(a), Some(b)) => op.accepts(a.total_cmp(&b)),
        (None, None) => op.accepts(actual.render().cmp(&literal.render())),
        _ => {
            // Mixed types are never equal and never ordered
            coercion_skipped("filter", column);
            op == CompareOp::Ne
        }
    }
}

/// Keeps records matching `predicate`, preserving input order
pub fn filter(records: Vec<Record>, predicate: &Predicate) -> Vec<Record> {
    records.into_iter().filter(|r| predicate.matches(r)).collect()
}
