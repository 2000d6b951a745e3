//! The synthesis search: quarter→month specializer first, then a
//! deterministic pattern-major interleave over the template catalog.
//! Acceptance is strict Value equality, so `1000` never matches `1000.0`
//! or `"1000"`.

use std::sync::Arc;
use std::time::Instant;

use regex::Regex;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::nucleus::ast::{call, int_lit, str_lit, sym, Expr};
use crate::nucleus::env::Environment;
use crate::nucleus::eval::Evaluator;
use crate::nucleus::value::{LambdaFn, Value};

use super::templates::{candidates_for, infer_output_kind, Candidate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthDiagnostic {
    pub candidates_explored: usize,
    /// Index of the example that rejected the first enumerated candidate.
    pub first_failing_example: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SynthError {
    NeedsMoreExamples { received: usize },
    NoCandidate(SynthDiagnostic),
    Timeout,
}

/// Search for a composition mapping every example input to its output.
pub fn synthesize(
    examples: &[(Value, Value)],
    config: &EngineConfig,
    deadline: Option<Instant>,
) -> Result<Arc<LambdaFn>, SynthError> {
    if examples.len() < 2 {
        return Err(SynthError::NeedsMoreExamples {
            received: examples.len(),
        });
    }

    // Closed-form quarter→month mapping, checked before the generic search.
    if let Some(body) = quarter_month_body(examples) {
        return Ok(make_lambda(body));
    }

    let Some(kind) = infer_output_kind(&examples[0].1) else {
        return Err(SynthError::NoCandidate(SynthDiagnostic {
            candidates_explored: 0,
            first_failing_example: None,
        }));
    };

    let per_template = candidates_for(kind, examples);
    let rounds = per_template.iter().map(|t| t.len()).max().unwrap_or(0);

    let mut explored = 0;
    let mut first_failing = None;
    for round in 0..rounds {
        for template in &per_template {
            let Some(candidate) = template.get(round) else {
                continue;
            };
            if let Some(d) = deadline {
                if Instant::now() >= d {
                    return Err(SynthError::Timeout);
                }
            }
            if explored >= config.max_candidates {
                return Err(SynthError::NoCandidate(SynthDiagnostic {
                    candidates_explored: explored,
                    first_failing_example: first_failing,
                }));
            }
            explored += 1;
            match verify(candidate, examples, config, deadline)? {
                None => return Ok(make_lambda(candidate.body.clone())),
                Some(failing) => {
                    if first_failing.is_none() {
                        first_failing = Some(failing);
                    }
                }
            }
        }
    }

    Err(SynthError::NoCandidate(SynthDiagnostic {
        candidates_explored: explored,
        first_failing_example: first_failing,
    }))
}

fn make_lambda(body: Expr) -> Arc<LambdaFn> {
    Arc::new(LambdaFn {
        param: "x".into(),
        body,
        captured: Vec::new(),
    })
}

/// Forward-evaluate a candidate on every example. `None` = accepted;
/// `Some(i)` = example `i` rejected it.
fn verify(
    candidate: &Candidate,
    examples: &[(Value, Value)],
    config: &EngineConfig,
    deadline: Option<Instant>,
) -> Result<Option<usize>, SynthError> {
    let lambda = make_lambda(candidate.body.clone());
    let env = Environment::new(1);
    for (i, (input, expected)) in examples.iter().enumerate() {
        let mut ev = Evaluator::new(None, &env, config).with_deadline(deadline);
        match ev.apply_lambda(&lambda, input.clone()) {
            Ok(actual) => {
                if actual != *expected {
                    return Ok(Some(i));
                }
            }
            Err(EngineError::Timeout) => return Err(SynthError::Timeout),
            // A candidate that faults on some input simply fails it.
            Err(_) => return Ok(Some(i)),
        }
    }
    Ok(None)
}

/// Recognize `(Q[1-4]-YYYY, YYYY-MM)` example sets and emit the closed-form
/// mapping Q→{01,04,07,10} as a Nucleus body.
fn quarter_month_body(examples: &[(Value, Value)]) -> Option<Expr> {
    let re = Regex::new(r"^\s*Q([1-4])[-/\s](\d{4})\s*$").expect("static pattern");
    for (input, output) in examples {
        let text = input.as_text()?;
        let caps = re.captures(text)?;
        let month = match &caps[1] {
            "1" => "01",
            "2" => "04",
            "3" => "07",
            _ => "10",
        };
        let expected = format!("{}-{month}", &caps[2]);
        match output {
            Value::Str(s) if *s == expected => {}
            _ => return None,
        }
    }

    let pick = |q: &str, month: &str, otherwise: Expr| {
        call(
            "if",
            vec![
                call("eq?", vec![sym("q"), str_lit(q)]),
                str_lit(month),
                otherwise,
            ],
        )
    };
    let month_expr = pick("1", "01", pick("2", "04", pick("3", "07", str_lit("10"))));
    Some(call(
        "do",
        vec![
            call(
                "let",
                vec![
                    sym("y"),
                    call(
                        "match",
                        vec![sym("x"), str_lit(r"Q[1-4][-/\s](\d{4})"), int_lit(1)],
                    ),
                ],
            ),
            call(
                "let",
                vec![
                    sym("q"),
                    call("match", vec![sym("x"), str_lit(r"Q([1-4])"), int_lit(1)]),
                ],
            ),
            call("concat", vec![sym("y"), str_lit("-"), month_expr]),
        ],
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(lambda: &Arc<LambdaFn>, input: &str) -> Value {
        let config = EngineConfig::default();
        let env = Environment::new(1);
        let mut ev = Evaluator::new(None, &env, &config);
        ev.apply_lambda(lambda, Value::Str(input.into())).unwrap()
    }

    fn str_examples(pairs: &[(&str, Value)]) -> Vec<(Value, Value)> {
        pairs
            .iter()
            .map(|(i, o)| (Value::Str((*i).into()), o.clone()))
            .collect()
    }

    #[test]
    fn needs_at_least_two_examples() {
        let config = EngineConfig::default();
        let examples = str_examples(&[("$1,000", Value::Int(1000))]);
        assert!(matches!(
            synthesize(&examples, &config, None),
            Err(SynthError::NeedsMoreExamples { received: 1 })
        ));
    }

    #[test]
    fn synthesizes_currency_to_int() {
        let config = EngineConfig::default();
        let examples = str_examples(&[
            ("$1,000", Value::Int(1000)),
            ("$2,500", Value::Int(2500)),
            ("$10,000", Value::Int(10000)),
        ]);
        let lambda = synthesize(&examples, &config, None).unwrap();
        assert_eq!(apply(&lambda, "$5,000"), Value::Int(5000));
    }

    #[test]
    fn synthesizes_percentage_to_float() {
        let config = EngineConfig::default();
        let examples = str_examples(&[
            ("growth: 45%", Value::Float(0.45)),
            ("growth: 80%", Value::Float(0.80)),
        ]);
        let lambda = synthesize(&examples, &config, None).unwrap();
        assert_eq!(apply(&lambda, "growth: 10%"), Value::Float(0.10));
    }

    #[test]
    fn synthesizes_key_value_suffix() {
        let config = EngineConfig::default();
        let examples = str_examples(&[
            ("name: alpha", Value::Str("alpha".into())),
            ("name: beta", Value::Str("beta".into())),
        ]);
        let lambda = synthesize(&examples, &config, None).unwrap();
        assert_eq!(apply(&lambda, "name: gamma"), Value::Str("gamma".into()));
    }

    #[test]
    fn synthesizes_dates() {
        let config = EngineConfig::default();
        let examples = str_examples(&[
            ("due 15-Mar-24 latest", Value::Str("2024-03-15".into())),
            ("due 01-Jan-25 latest", Value::Str("2025-01-01".into())),
        ]);
        let lambda = synthesize(&examples, &config, None).unwrap();
        assert_eq!(
            apply(&lambda, "due 29-Feb-24 latest"),
            Value::Str("2024-02-29".into())
        );
    }

    #[test]
    fn synthesizes_bool_via_contains() {
        let config = EngineConfig::default();
        let examples = str_examples(&[
            ("level=FATAL disk", Value::Bool(true)),
            ("level=INFO disk", Value::Bool(false)),
            ("FATAL again", Value::Bool(true)),
        ]);
        let lambda = synthesize(&examples, &config, None).unwrap();
        assert_eq!(apply(&lambda, "a FATAL b"), Value::Bool(true));
        assert_eq!(apply(&lambda, "all fine"), Value::Bool(false));
    }

    #[test]
    fn contradictory_examples_yield_no_candidate() {
        let config = EngineConfig::default();
        let examples = str_examples(&[
            ("$1,000", Value::Int(1000)),
            ("$1,000", Value::Int(2000)),
        ]);
        match synthesize(&examples, &config, None) {
            Err(SynthError::NoCandidate(diag)) => {
                assert!(diag.candidates_explored > 0);
                assert!(diag.first_failing_example.is_some());
            }
            other => panic!("expected NoCandidate, got {other:?}"),
        }
    }

    #[test]
    fn budget_bounds_the_search() {
        let config = EngineConfig {
            max_candidates: 3,
            ..Default::default()
        };
        let examples = str_examples(&[
            ("no digits here", Value::Int(1)),
            ("none here either", Value::Int(2)),
        ]);
        match synthesize(&examples, &config, None) {
            Err(SynthError::NoCandidate(diag)) => {
                assert_eq!(diag.candidates_explored, 3)
            }
            other => panic!("expected NoCandidate, got {other:?}"),
        }
    }

    #[test]
    fn strict_equality_rejects_cross_type_matches() {
        let config = EngineConfig::default();
        // Outputs are floats; parseInt-based candidates must not win.
        let examples = str_examples(&[
            ("n: 10", Value::Float(10.0)),
            ("n: 20", Value::Float(20.0)),
        ]);
        let lambda = synthesize(&examples, &config, None).unwrap();
        assert_eq!(apply(&lambda, "n: 30"), Value::Float(30.0));
    }

    #[test]
    fn quarter_specializer_takes_precedence() {
        let config = EngineConfig::default();
        let examples = str_examples(&[
            ("Q1-2024", Value::Str("2024-01".into())),
            ("Q3-2024", Value::Str("2024-07".into())),
        ]);
        let lambda = synthesize(&examples, &config, None).unwrap();
        assert_eq!(apply(&lambda, "Q2-2025"), Value::Str("2025-04".into()));
        assert_eq!(apply(&lambda, "Q4-2023"), Value::Str("2023-10".into()));
    }

    #[test]
    fn quarter_specializer_rejects_wrong_mapping() {
        let examples = str_examples(&[
            ("Q1-2024", Value::Str("2024-02".into())),
            ("Q3-2024", Value::Str("2024-07".into())),
        ]);
        assert!(quarter_month_body(&examples).is_none());
    }

    #[test]
    fn enumeration_is_deterministic() {
        let config = EngineConfig::default();
        let examples = str_examples(&[
            ("v 1.5 end", Value::Float(1.5)),
            ("v 2.25 end", Value::Float(2.25)),
        ]);
        let a = synthesize(&examples, &config, None).unwrap();
        let b = synthesize(&examples, &config, None).unwrap();
        assert_eq!(a.body, b.body);
    }

    #[test]
    fn expired_deadline_times_out() {
        let config = EngineConfig::default();
        let examples = str_examples(&[
            ("$1", Value::Int(1)),
            ("$2", Value::Int(2)),
        ]);
        let past = Instant::now() - std::time::Duration::from_millis(1);
        assert!(matches!(
            synthesize(&examples, &config, Some(past)),
            Err(SynthError::Timeout)
        ));
    }
}
