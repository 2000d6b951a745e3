//! Composition templates. Each candidate is the body of a one-parameter
//! lambda (`x`), built from the same primitives the evaluator ships, so a
//! candidate that verifies is directly usable as a `Value::Lambda`.

use crate::nucleus::ast::{call, int_lit, str_lit, sym, Expr};
use crate::nucleus::value::Value;

use super::patterns::{
    DATE_PATTERNS, EXTRACTION_PATTERNS, SPLIT_DELIMITERS, SPLIT_INDEXES,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Int,
    Float,
    DateText,
    Text,
    Bool,
}

/// Output type inference from an example output value.
pub fn infer_output_kind(v: &Value) -> Option<OutputKind> {
    match v {
        Value::Int(_) => Some(OutputKind::Int),
        Value::Float(_) => Some(OutputKind::Float),
        Value::Bool(_) => Some(OutputKind::Bool),
        Value::Str(s) => {
            if is_date_shaped(s) {
                Some(OutputKind::DateText)
            } else {
                Some(OutputKind::Text)
            }
        }
        _ => None,
    }
}

fn is_date_shaped(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, c)| matches!(i, 4 | 7) || c.is_ascii_digit())
}

#[derive(Debug, Clone)]
pub struct Candidate {
    pub label: String,
    pub body: Expr,
}

impl Candidate {
    fn new(label: impl Into<String>, body: Expr) -> Self {
        Self {
            label: label.into(),
            body,
        }
    }
}

fn x() -> Expr {
    sym("x")
}

fn match_group(pattern: &str, group: i64) -> Expr {
    call("match", vec![x(), str_lit(pattern), int_lit(group)])
}

fn split_part(delimiter: &str, index: i64) -> Expr {
    call("split", vec![x(), str_lit(delimiter), int_lit(index)])
}

fn wrap(head: &str, inner: Expr) -> Expr {
    call(head, vec![inner])
}

/// Candidate lists, one inner vector per template, each ordered by pattern
/// index. The engine interleaves them pattern-major so enumeration order is
/// reproducible.
pub fn candidates_for(kind: OutputKind, examples: &[(Value, Value)]) -> Vec<Vec<Candidate>> {
    match kind {
        OutputKind::Int => vec![
            per_pattern("parseInt", |p| {
                wrap("parseInt", match_group(p, 1))
            }),
            per_pattern("parseCurrency", |p| {
                wrap("parseCurrency", match_group(p, 1))
            }),
            per_split("split->parseInt", |parts| wrap("parseInt", wrap("trim", parts))),
            vec![
                Candidate::new("parseInt(x)", wrap("parseInt", x())),
                Candidate::new("parseCurrency(x)", wrap("parseCurrency", x())),
            ],
        ],
        OutputKind::Float => vec![
            per_pattern("parseFloat", |p| {
                wrap("parseFloat", match_group(p, 1))
            }),
            per_pattern("strip-commas->parseFloat", |p| {
                wrap(
                    "parseFloat",
                    call(
                        "replace",
                        vec![match_group(p, 1), str_lit(","), str_lit("")],
                    ),
                )
            }),
            per_pattern("parseCurrency", |p| {
                wrap("parseCurrency", match_group(p, 1))
            }),
            // Group 0 keeps suffixes like `%` that parseNumber interprets.
            per_pattern("parseNumber0", |p| {
                wrap("parseNumber", match_group(p, 0))
            }),
            per_split("split->parseFloat", |parts| {
                wrap("parseFloat", wrap("trim", parts))
            }),
            per_split("split->parseNumber", |parts| {
                wrap("parseNumber", wrap("trim", parts))
            }),
            vec![
                Candidate::new("parseFloat(x)", wrap("parseFloat", x())),
                Candidate::new("parseNumber(x)", wrap("parseNumber", x())),
                Candidate::new("parseCurrency(x)", wrap("parseCurrency", x())),
            ],
        ],
        OutputKind::DateText => {
            let mut per_fmt: Vec<Vec<Candidate>> = Vec::new();
            for fmt in [None, Some("US"), Some("EU")] {
                let mut list: Vec<Candidate> = DATE_PATTERNS
                    .iter()
                    .map(|p| {
                        let extracted = match_group(p.pattern, 0);
                        let body = match fmt {
                            None => wrap("parseDate", extracted),
                            Some(f) => call("parseDate", vec![extracted, str_lit(f)]),
                        };
                        Candidate::new(
                            format!("parseDate[{}]{}", p.name, fmt.unwrap_or("")),
                            body,
                        )
                    })
                    .collect();
                let direct = match fmt {
                    None => wrap("parseDate", x()),
                    Some(f) => call("parseDate", vec![x(), str_lit(f)]),
                };
                list.push(Candidate::new(
                    format!("parseDate(x){}", fmt.unwrap_or("")),
                    direct,
                ));
                per_fmt.push(list);
            }
            per_fmt
        }
        OutputKind::Text => vec![
            per_pattern("group1", |p| match_group(p, 1)),
            per_pattern("group0", |p| match_group(p, 0)),
            per_pattern("trim-group1", |p| wrap("trim", match_group(p, 1))),
            per_split("split->trim", |parts| wrap("trim", parts)),
            vec![
                Candidate::new("trim(x)", wrap("trim", x())),
                Candidate::new("upper(x)", wrap("upper", x())),
                Candidate::new("lower(x)", wrap("lower", x())),
            ],
        ],
        OutputKind::Bool => vec![contains_candidates(examples)],
    }
}

fn per_pattern(label: &str, build: impl Fn(&str) -> Expr) -> Vec<Candidate> {
    EXTRACTION_PATTERNS
        .iter()
        .map(|p| Candidate::new(format!("{label}[{}]", p.name), build(p.pattern)))
        .collect()
}

fn per_split(label: &str, build: impl Fn(Expr) -> Expr) -> Vec<Candidate> {
    let mut out = Vec::new();
    for delim in SPLIT_DELIMITERS {
        for &index in SPLIT_INDEXES {
            out.push(Candidate::new(
                format!("{label}[{delim:?}][{index}]"),
                build(split_part(delim, index)),
            ));
        }
    }
    out
}

/// Bool outputs: try `contains` over tokens drawn from the inputs of
/// positive examples, in order of first appearance.
fn contains_candidates(examples: &[(Value, Value)]) -> Vec<Candidate> {
    let mut tokens: Vec<String> = Vec::new();
    for (input, output) in examples {
        if *output != Value::Bool(true) {
            continue;
        }
        let Some(text) = input.as_text() else { continue };
        for raw in text.split_whitespace() {
            let token = raw.trim_matches(|c: char| !c.is_alphanumeric());
            if token.len() >= 2 && !tokens.iter().any(|t| t == token) {
                tokens.push(token.to_string());
            }
        }
    }
    tokens
        .into_iter()
        .map(|token| {
            Candidate::new(
                format!("contains[{token}]"),
                call("contains", vec![x(), str_lit(&token)]),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn output_kind_inference() {
        assert_eq!(infer_output_kind(&Value::Int(5)), Some(OutputKind::Int));
        assert_eq!(
            infer_output_kind(&Value::Float(5.0)),
            Some(OutputKind::Float)
        );
        assert_eq!(
            infer_output_kind(&Value::Str("2024-01-15".into())),
            Some(OutputKind::DateText)
        );
        assert_eq!(
            infer_output_kind(&Value::Str("hello".into())),
            Some(OutputKind::Text)
        );
        assert_eq!(
            infer_output_kind(&Value::Bool(true)),
            Some(OutputKind::Bool)
        );
        assert_eq!(infer_output_kind(&Value::Null), None);
    }

    #[test]
    fn date_shape_is_strict() {
        assert!(is_date_shaped("2024-01-15"));
        assert!(!is_date_shaped("2024-1-15"));
        assert!(!is_date_shaped("20240115ab"));
    }

    #[test]
    fn int_candidates_stay_under_default_budget() {
        let total: usize = candidates_for(OutputKind::Int, &[])
            .iter()
            .map(|t| t.len())
            .sum();
        assert!(total <= 100, "{total} candidates");
        let total: usize = candidates_for(OutputKind::Float, &[])
            .iter()
            .map(|t| t.len())
            .sum();
        assert!(total <= 100, "{total} candidates");
    }

    #[test]
    fn candidate_bodies_are_printable_nucleus() {
        let lists = candidates_for(OutputKind::Int, &[]);
        let first = &lists[0][1];
        assert_eq!(
            first.body.to_source(),
            r#"(parseInt (match x "\\$\\s*([\\d,]+)" 1))"#
        );
    }

    #[test]
    fn bool_tokens_come_from_positive_examples() {
        let examples = vec![
            (
                Value::Str("status: FAILED now".into()),
                Value::Bool(true),
            ),
            (Value::Str("status: ok".into()), Value::Bool(false)),
        ];
        let lists = candidates_for(OutputKind::Bool, &examples);
        let labels: Vec<&str> = lists[0].iter().map(|c| c.label.as_str()).collect();
        assert!(labels.contains(&"contains[status]"));
        assert!(labels.contains(&"contains[FAILED]"));
        assert!(!labels.iter().any(|l| l.contains("ok")));
    }
}
