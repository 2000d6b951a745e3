//! The tagged value model flowing between Nucleus nodes.
//!
//! Equality is structural and type-strict (`1 ≠ 1.0 ≠ "1"`); lambdas compare
//! by identity. Ordering is total on numbers (mutually, as floats) and on
//! strings, element-wise on lists, and undefined elsewhere.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use crate::document::{FuzzyHit, GrepHit};

use super::ast::Expr;

/// A user lambda: single parameter, body expression, and a value-snapshot of
/// the free names it referenced at creation time.
#[derive(Debug, Clone)]
pub struct LambdaFn {
    pub param: String,
    pub body: Expr,
    pub captured: Vec<(String, Value)>,
}

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<Value>),
    Grep(GrepHit),
    Fuzzy(FuzzyHit),
    Lambda(Arc<LambdaFn>),
    /// String-keyed map preserving insertion order.
    Record(Vec<(String, Value)>),
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::List(_) => "list",
            Value::Grep(_) => "grep-hit",
            Value::Fuzzy(_) => "fuzzy-hit",
            Value::Lambda(_) => "lambda",
            Value::Record(_) => "record",
        }
    }

    /// `false`, `null`, `0`, `0.0`, `""`, and the empty list are falsey.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(v) => *v != 0,
            Value::Float(v) => *v != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::List(items) => !items.is_empty(),
            _ => true,
        }
    }

    /// The one documented implicit coercion: where a string is required, a
    /// grep hit (or fuzzy hit) stands in for its enclosing line.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            Value::Grep(hit) => Some(&hit.line),
            Value::Fuzzy(hit) => Some(&hit.line),
            _ => None,
        }
    }

    pub fn record_get(&self, key: &str) -> Option<&Value> {
        match self {
            Value::Record(pairs) => pairs.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Partial ordering: Int/Float mutually as floats, strings
    /// lexicographic, lists element-wise with the prefix rule.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.compare(y)? {
                        Ordering::Equal => continue,
                        non_eq => return Some(non_eq),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Grep(a), Value::Grep(b)) => a == b,
            (Value::Fuzzy(a), Value::Fuzzy(b)) => a == b,
            (Value::Lambda(a), Value::Lambda(b)) => Arc::ptr_eq(a, b),
            (Value::Record(a), Value::Record(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => {
                if v.fract() == 0.0 && v.is_finite() {
                    write!(f, "{v:.1}")
                } else {
                    write!(f, "{v}")
                }
            }
            Value::Str(s) => write!(f, "{s}"),
            Value::List(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "]")
            }
            Value::Grep(hit) => write!(f, "{}: {}", hit.line_num, hit.line),
            Value::Fuzzy(hit) => {
                write!(f, "{}: {} (score {})", hit.line_num, hit.line, hit.score)
            }
            Value::Lambda(l) => write!(f, "<lambda {}>", l.param),
            Value::Record(pairs) => {
                write!(f, "{{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nucleus::ast::sym;

    #[test]
    fn equality_is_type_strict() {
        assert_ne!(Value::Int(1), Value::Float(1.0));
        assert_ne!(Value::Int(1), Value::Str("1".into()));
        assert_eq!(Value::Int(1), Value::Int(1));
        assert_eq!(Value::Null, Value::Null);
    }

    #[test]
    fn list_equality_is_structural() {
        let a = Value::List(vec![Value::Int(1), Value::Str("x".into())]);
        let b = Value::List(vec![Value::Int(1), Value::Str("x".into())]);
        assert_eq!(a, b);
    }

    #[test]
    fn lambda_compares_by_identity() {
        let inner = LambdaFn {
            param: "x".into(),
            body: sym("x"),
            captured: Vec::new(),
        };
        let a = Arc::new(inner.clone());
        let l1 = Value::Lambda(a.clone());
        let l2 = Value::Lambda(a);
        let l3 = Value::Lambda(Arc::new(inner));
        assert_eq!(l1, l2);
        assert_ne!(l1, l3);
    }

    #[test]
    fn ordering_mixes_int_and_float() {
        assert_eq!(
            Value::Int(1).compare(&Value::Float(1.5)),
            Some(Ordering::Less)
        );
        assert_eq!(
            Value::Float(2.0).compare(&Value::Int(2)),
            Some(Ordering::Equal)
        );
    }

    #[test]
    fn ordering_on_lists_uses_prefix_rule() {
        let short = Value::List(vec![Value::Int(1)]);
        let long = Value::List(vec![Value::Int(1), Value::Int(2)]);
        assert_eq!(short.compare(&long), Some(Ordering::Less));
    }

    #[test]
    fn ordering_undefined_across_kinds() {
        assert_eq!(Value::Int(1).compare(&Value::Str("1".into())), None);
        assert_eq!(Value::Bool(true).compare(&Value::Bool(false)), None);
    }

    #[test]
    fn truthiness() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(!Value::Float(0.0).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(!Value::List(Vec::new()).is_truthy());
        assert!(Value::Int(-1).is_truthy());
        assert!(Value::Str(" ".into()).is_truthy());
    }

    #[test]
    fn grep_hit_promotes_to_line_text() {
        let hit = GrepHit {
            matched: "ERR".into(),
            line: "ERR in module".into(),
            line_num: 3,
            index: 0,
            groups: vec![],
        };
        assert_eq!(Value::Grep(hit).as_text(), Some("ERR in module"));
        assert_eq!(Value::Int(1).as_text(), None);
    }

    #[test]
    fn display_forms() {
        assert_eq!(Value::Float(3.0).to_string(), "3.0");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
        assert_eq!(
            Value::List(vec![Value::Int(1), Value::Int(2)]).to_string(),
            "[1, 2]"
        );
        assert_eq!(
            Value::Record(vec![("a".into(), Value::Int(1))]).to_string(),
            "{a: 1}"
        );
    }

    #[test]
    fn record_get_finds_key() {
        let r = Value::Record(vec![
            ("input".into(), Value::Str("$1,000".into())),
            ("output".into(), Value::Int(1000)),
        ]);
        assert_eq!(r.record_get("output"), Some(&Value::Int(1000)));
        assert_eq!(r.record_get("missing"), None);
    }
}
