//! The Nucleus evaluator: a tree-walking interpreter over the value model,
//! with the primitive library and per-call log buffer.
//!
//! `let` bindings made during a turn live in a scratch scope and only reach
//! the session environment when the top-level evaluation succeeds, so a
//! failed or timed-out turn leaves no partial state behind.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use crate::config::EngineConfig;
use crate::document::Document;
use crate::error::{EngineError, EngineResult};
use crate::synth::{self, SynthDiagnostic, SynthError};

use super::ast::{Expr, ExprKind, Span};
use super::env::Environment;
use super::numparse;
use super::strings;
use super::value::{LambdaFn, Value};

/// Everything a single evaluation produced.
pub struct EvalOutcome {
    pub result: EngineResult<Value>,
    pub logs: Vec<String>,
    /// `let` bindings committed by this turn, in binding order.
    pub bindings: Vec<(String, Value)>,
    /// Present when `synthesize-extractor` exhausted its budget.
    pub synth_failure: Option<SynthDiagnostic>,
}

pub struct Evaluator<'a> {
    doc: Option<&'a Document>,
    env: &'a Environment,
    config: &'a EngineConfig,
    deadline: Option<Instant>,
    scope: Vec<(String, Value)>,
    frames: Vec<HashMap<String, Value>>,
    logs: Vec<String>,
    synth_failure: Option<SynthDiagnostic>,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        doc: Option<&'a Document>,
        env: &'a Environment,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            doc,
            env,
            config,
            deadline: None,
            scope: Vec::new(),
            frames: Vec::new(),
            logs: Vec::new(),
            synth_failure: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    /// Evaluate one top-level expression and hand back the full outcome.
    pub fn run(mut self, expr: &Expr) -> EvalOutcome {
        let result = self.eval(expr);
        EvalOutcome {
            result,
            logs: self.logs,
            bindings: self.scope,
            synth_failure: self.synth_failure,
        }
    }

    pub fn eval(&mut self, expr: &Expr) -> EngineResult<Value> {
        self.check_deadline()?;
        match &expr.kind {
            ExprKind::Int(v) => Ok(Value::Int(*v)),
            ExprKind::Float(v) => Ok(Value::Float(*v)),
            ExprKind::Str(s) => Ok(Value::Str(s.clone())),
            ExprKind::Bool(b) => Ok(Value::Bool(*b)),
            ExprKind::Symbol(name) => {
                self.resolve(name).ok_or_else(|| EngineError::Unbound {
                    name: name.clone(),
                    span: expr.span,
                })
            }
            ExprKind::Call {
                head,
                head_span,
                args,
            } => self.eval_call(head, *head_span, args, expr.span),
        }
    }

    /// Apply a lambda to one argument. Captured names and the parameter form
    /// a fresh frame; `let` inside the body stays frame-local.
    pub fn apply_lambda(&mut self, lambda: &Arc<LambdaFn>, arg: Value) -> EngineResult<Value> {
        self.check_deadline()?;
        let mut frame: HashMap<String, Value> = lambda.captured.iter().cloned().collect();
        frame.insert(lambda.param.clone(), arg);
        self.frames.push(frame);
        let result = self.eval(&lambda.body);
        self.frames.pop();
        result
    }

    fn check_deadline(&self) -> EngineResult<()> {
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(EngineError::Timeout);
            }
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> Option<Value> {
        for frame in self.frames.iter().rev() {
            if let Some(v) = frame.get(name) {
                return Some(v.clone());
            }
        }
        for (k, v) in self.scope.iter().rev() {
            if k == name {
                return Some(v.clone());
            }
        }
        self.env.lookup(name)
    }

    fn eval_call(
        &mut self,
        head: &str,
        head_span: Span,
        args: &[Expr],
        span: Span,
    ) -> EngineResult<Value> {
        match head {
            "let" => return self.special_let(args, span),
            "lambda" => return self.special_lambda(args, span),
            "if" => return self.special_if(args, span),
            "do" => return self.special_do(args),
            _ => {}
        }

        // A binding that holds a lambda shadows any primitive of the same
        // name.
        if let Some(bound) = self.resolve(head) {
            return match bound {
                Value::Lambda(lambda) => {
                    self.arity_exact(head, span, args.len(), 1)?;
                    let arg = self.eval(&args[0])?;
                    self.apply_lambda(&lambda, arg)
                }
                other => Err(self.type_err(head, 0, "lambda", &other, head_span)),
            };
        }

        let mut vals = Vec::with_capacity(args.len());
        for arg in args {
            vals.push(self.eval(arg)?);
        }
        self.call_primitive(head, head_span, span, vals)
    }

    // ─── Special forms ──────────────────────────────────────────────────

    fn special_let(&mut self, args: &[Expr], span: Span) -> EngineResult<Value> {
        self.arity_exact("let", span, args.len(), 2)?;
        let name = match &args[0].kind {
            ExprKind::Symbol(name) => name.clone(),
            _ => {
                return Err(EngineError::Parse {
                    message: "let target must be a symbol".into(),
                    span: args[0].span,
                })
            }
        };
        if Environment::is_reserved(&name) {
            return Err(EngineError::ReservedName { name });
        }
        let value = self.eval(&args[1])?;
        if let Some(frame) = self.frames.last_mut() {
            frame.insert(name, value.clone());
        } else {
            self.scope.push((name, value.clone()));
        }
        Ok(value)
    }

    fn special_lambda(&mut self, args: &[Expr], span: Span) -> EngineResult<Value> {
        self.arity_exact("lambda", span, args.len(), 2)?;
        let param = match &args[0].kind {
            ExprKind::Symbol(name) => name.clone(),
            _ => {
                return Err(EngineError::Parse {
                    message: "lambda parameter must be a symbol".into(),
                    span: args[0].span,
                })
            }
        };
        if Environment::is_reserved(&param) {
            return Err(EngineError::ReservedName { name: param });
        }
        let body = args[1].clone();

        // Capture by value-snapshot of the referenced names only, not the
        // whole environment.
        let mut free = Vec::new();
        let mut bound = vec![param.clone()];
        collect_free_symbols(&body, &mut bound, &mut free);
        let captured = free
            .into_iter()
            .filter_map(|name| self.resolve(&name).map(|v| (name, v)))
            .collect();

        Ok(Value::Lambda(Arc::new(LambdaFn {
            param,
            body,
            captured,
        })))
    }

    fn special_if(&mut self, args: &[Expr], span: Span) -> EngineResult<Value> {
        self.arity_range("if", span, args.len(), 2, 3)?;
        let cond = self.eval(&args[0])?;
        if cond.is_truthy() {
            self.eval(&args[1])
        } else if let Some(alt) = args.get(2) {
            self.eval(alt)
        } else {
            Ok(Value::Null)
        }
    }

    fn special_do(&mut self, args: &[Expr]) -> EngineResult<Value> {
        let mut last = Value::Null;
        for arg in args {
            last = self.eval(arg)?;
        }
        Ok(last)
    }

    // ─── Primitive dispatch ─────────────────────────────────────────────

    fn call_primitive(
        &mut self,
        head: &str,
        head_span: Span,
        span: Span,
        vals: Vec<Value>,
    ) -> EngineResult<Value> {
        let n = vals.len();
        match head {
            // Search
            "grep" => {
                self.arity_exact(head, span, n, 1)?;
                let Some(pattern) = self.want_text(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                let doc = self.doc.ok_or(EngineError::NoDocument)?;
                let hits = doc.grep(&pattern, self.config.grep_flags)?;
                Ok(Value::List(hits.into_iter().map(Value::Grep).collect()))
            }
            "fuzzy-search" => {
                self.arity_range(head, span, n, 1, 2)?;
                let Some(query) = self.want_text(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                let limit = match vals.get(1) {
                    None | Some(Value::Null) => self.config.default_fuzzy_limit,
                    Some(v) => self
                        .want_int(head, 2, v, span)?
                        .map(|i| i.max(0) as usize)
                        .unwrap_or(self.config.default_fuzzy_limit),
                };
                let doc = self.doc.ok_or(EngineError::NoDocument)?;
                let hits = doc.fuzzy(&query, limit);
                Ok(Value::List(hits.into_iter().map(Value::Fuzzy).collect()))
            }
            "lines" => {
                self.arity_range(head, span, n, 1, 2)?;
                let doc = self.doc.ok_or(EngineError::NoDocument)?;
                let Some(start) = self.want_int(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                match vals.get(1) {
                    None => Ok(Value::Str(doc.line(start)?.to_string())),
                    Some(v) => {
                        let Some(end) = self.want_int(head, 2, v, span)? else {
                            return Ok(Value::Null);
                        };
                        Ok(Value::List(
                            doc.lines(start, end).into_iter().map(Value::Str).collect(),
                        ))
                    }
                }
            }
            "text-stats" => {
                self.arity_exact(head, span, n, 0)?;
                let doc = self.doc.ok_or(EngineError::NoDocument)?;
                let stats = doc.stats();
                let sample = |lines: Vec<String>| {
                    Value::List(lines.into_iter().map(Value::Str).collect())
                };
                Ok(Value::Record(vec![
                    ("length".into(), Value::Int(stats.length as i64)),
                    ("line_count".into(), Value::Int(stats.line_count as i64)),
                    (
                        "sample".into(),
                        Value::Record(vec![
                            ("start".into(), sample(stats.sample.start)),
                            ("middle".into(), sample(stats.sample.middle)),
                            ("end".into(), sample(stats.sample.end)),
                        ]),
                    ),
                ]))
            }

            // Collections
            "list" => Ok(Value::List(vals)),
            "record" => {
                if n % 2 != 0 {
                    return Err(EngineError::Arity {
                        head: head.into(),
                        expected: "an even number of".into(),
                        received: n,
                        span,
                    });
                }
                let mut pairs = Vec::with_capacity(n / 2);
                for chunk in vals.chunks(2) {
                    let Some(key) = self.want_text(head, 1, &chunk[0], span)? else {
                        return Ok(Value::Null);
                    };
                    pairs.push((key, chunk[1].clone()));
                }
                Ok(Value::Record(pairs))
            }
            "get" => {
                self.arity_exact(head, span, n, 2)?;
                if matches!(vals[0], Value::Null) {
                    return Ok(Value::Null);
                }
                let Some(key) = self.want_text(head, 2, &vals[1], span)? else {
                    return Ok(Value::Null);
                };
                match &vals[0] {
                    Value::Record(_) => {
                        Ok(vals[0].record_get(&key).cloned().unwrap_or(Value::Null))
                    }
                    other => Err(self.type_err(head, 1, "record", other, span)),
                }
            }
            "count" => {
                self.arity_exact(head, span, n, 1)?;
                match &vals[0] {
                    Value::Null => Ok(Value::Int(0)),
                    Value::List(items) => Ok(Value::Int(items.len() as i64)),
                    Value::Record(pairs) => Ok(Value::Int(pairs.len() as i64)),
                    other => match other.as_text() {
                        Some(s) => Ok(Value::Int(s.chars().count() as i64)),
                        None => Err(self.type_err(head, 1, "list or string", other, span)),
                    },
                }
            }
            "sum" => {
                self.arity_exact(head, span, n, 1)?;
                let Some(items) = self.want_list(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                Ok(sum_values(&items))
            }
            "filter" => {
                self.arity_exact(head, span, n, 2)?;
                let Some(items) = self.want_list(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                let Some(predicate) = self.want_lambda(head, 2, &vals[1], span)? else {
                    return Ok(Value::Null);
                };
                let mut kept = Vec::new();
                for item in items {
                    if self.apply_lambda(&predicate, item.clone())?.is_truthy() {
                        kept.push(item);
                    }
                }
                Ok(Value::List(kept))
            }
            "map" => {
                self.arity_exact(head, span, n, 2)?;
                let Some(items) = self.want_list(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                let Some(f) = self.want_lambda(head, 2, &vals[1], span)? else {
                    return Ok(Value::Null);
                };
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(self.apply_lambda(&f, item)?);
                }
                Ok(Value::List(out))
            }
            "reduce" => {
                self.arity_exact(head, span, n, 3)?;
                let Some(items) = self.want_list(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                let Some(f) = self.want_lambda(head, 3, &vals[2], span)? else {
                    return Ok(Value::Null);
                };
                let mut acc = vals[1].clone();
                for item in items {
                    // Single-parameter lambdas only: the folder is curried,
                    // (lambda acc (lambda x ...)).
                    let inner = match self.apply_lambda(&f, acc)? {
                        Value::Lambda(inner) => inner,
                        other => {
                            return Err(self.type_err(head, 3, "curried lambda", &other, span))
                        }
                    };
                    acc = self.apply_lambda(&inner, item)?;
                }
                Ok(acc)
            }
            "take" | "drop" => {
                self.arity_exact(head, span, n, 2)?;
                let Some(items) = self.want_list(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                let Some(k) = self.want_int(head, 2, &vals[1], span)? else {
                    return Ok(Value::Null);
                };
                let k = (k.max(0) as usize).min(items.len());
                let out = if head == "take" {
                    items[..k].to_vec()
                } else {
                    items[k..].to_vec()
                };
                Ok(Value::List(out))
            }
            "first" | "last" => {
                self.arity_exact(head, span, n, 1)?;
                let Some(items) = self.want_list(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                let picked = if head == "first" {
                    items.first()
                } else {
                    items.last()
                };
                Ok(picked.cloned().unwrap_or(Value::Null))
            }
            "reverse" => {
                self.arity_exact(head, span, n, 1)?;
                let Some(mut items) = self.want_list(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                items.reverse();
                Ok(Value::List(items))
            }
            "distinct" => {
                self.arity_exact(head, span, n, 1)?;
                let Some(items) = self.want_list(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                let mut out: Vec<Value> = Vec::new();
                for item in items {
                    if !out.contains(&item) {
                        out.push(item);
                    }
                }
                Ok(Value::List(out))
            }
            "sort" => {
                self.arity_exact(head, span, n, 1)?;
                let Some(mut items) = self.want_list(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                let mut incomparable = false;
                items.sort_by(|a, b| match a.compare(b) {
                    Some(ordering) => ordering,
                    None => {
                        incomparable = true;
                        std::cmp::Ordering::Equal
                    }
                });
                if incomparable {
                    return Err(self.type_err(
                        head,
                        1,
                        "comparable elements",
                        &vals[0],
                        span,
                    ));
                }
                Ok(Value::List(items))
            }
            "group-by" => {
                self.arity_exact(head, span, n, 2)?;
                let Some(items) = self.want_list(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                let Some(f) = self.want_lambda(head, 2, &vals[1], span)? else {
                    return Ok(Value::Null);
                };
                let mut groups: Vec<(String, Vec<Value>)> = Vec::new();
                for item in items {
                    let key = self.apply_lambda(&f, item.clone())?.to_string();
                    match groups.iter_mut().find(|(k, _)| *k == key) {
                        Some((_, bucket)) => bucket.push(item),
                        None => groups.push((key, vec![item])),
                    }
                }
                Ok(Value::Record(
                    groups
                        .into_iter()
                        .map(|(k, items)| (k, Value::List(items)))
                        .collect(),
                ))
            }
            "index" => {
                self.arity_exact(head, span, n, 2)?;
                let Some(items) = self.want_list(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                let Some(i) = self.want_int(head, 2, &vals[1], span)? else {
                    return Ok(Value::Null);
                };
                let len = items.len() as i64;
                let idx = if i < 0 { len + i } else { i };
                if idx < 0 || idx >= len {
                    return Ok(Value::Null);
                }
                Ok(items[idx as usize].clone())
            }

            // Strings
            "match" => {
                self.arity_exact(head, span, n, 3)?;
                let Some(text) = self.want_text(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                let Some(pattern) = self.want_text(head, 2, &vals[1], span)? else {
                    return Ok(Value::Null);
                };
                let Some(group) = self.want_int(head, 3, &vals[2], span)? else {
                    return Ok(Value::Null);
                };
                if group < 0 {
                    return Ok(Value::Null);
                }
                Ok(strings::regex_match(&text, &pattern, group as usize)?
                    .map(Value::Str)
                    .unwrap_or(Value::Null))
            }
            "replace" => {
                self.arity_exact(head, span, n, 3)?;
                let Some(text) = self.want_text(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                let Some(from) = self.want_text(head, 2, &vals[1], span)? else {
                    return Ok(Value::Null);
                };
                let Some(to) = self.want_text(head, 3, &vals[2], span)? else {
                    return Ok(Value::Null);
                };
                Ok(Value::Str(strings::regex_replace(&text, &from, &to)?))
            }
            "split" => {
                self.arity_range(head, span, n, 2, 3)?;
                let Some(text) = self.want_text(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                let Some(delim) = self.want_text(head, 2, &vals[1], span)? else {
                    return Ok(Value::Null);
                };
                let parts = strings::split(&text, &delim);
                match vals.get(2) {
                    None => Ok(Value::List(parts.into_iter().map(Value::Str).collect())),
                    Some(v) => {
                        let Some(i) = self.want_int(head, 3, v, span)? else {
                            return Ok(Value::Null);
                        };
                        Ok(strings::pick(&parts, i).map(Value::Str).unwrap_or(Value::Null))
                    }
                }
            }
            "contains" | "starts-with" | "ends-with" => {
                self.arity_exact(head, span, n, 2)?;
                let Some(text) = self.want_text(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                let Some(needle) = self.want_text(head, 2, &vals[1], span)? else {
                    return Ok(Value::Null);
                };
                let result = match head {
                    "contains" => text.contains(&needle),
                    "starts-with" => text.starts_with(&needle),
                    _ => text.ends_with(&needle),
                };
                Ok(Value::Bool(result))
            }
            "trim" | "upper" | "lower" => {
                self.arity_exact(head, span, n, 1)?;
                let Some(text) = self.want_text(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                let out = match head {
                    "trim" => text.trim().to_string(),
                    "upper" => text.to_uppercase(),
                    _ => text.to_lowercase(),
                };
                Ok(Value::Str(out))
            }
            "concat" => {
                self.arity_min(head, span, n, 1)?;
                let mut out = String::new();
                for (i, v) in vals.iter().enumerate() {
                    match v {
                        Value::Null => return Ok(Value::Null),
                        Value::Int(_) | Value::Float(_) | Value::Bool(_) => {
                            out.push_str(&v.to_string())
                        }
                        other => match other.as_text() {
                            Some(s) => out.push_str(s),
                            None => {
                                return Err(self.type_err(head, i + 1, "string", other, span))
                            }
                        },
                    }
                }
                Ok(Value::Str(out))
            }
            "join" => {
                self.arity_exact(head, span, n, 2)?;
                let Some(items) = self.want_list(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                let Some(sep) = self.want_text(head, 2, &vals[1], span)? else {
                    return Ok(Value::Null);
                };
                let mut parts = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match item {
                        Value::Int(_) | Value::Float(_) | Value::Bool(_) => {
                            parts.push(item.to_string())
                        }
                        other => match other.as_text() {
                            Some(s) => parts.push(s.to_string()),
                            None => {
                                return Err(self.type_err(head, 1, "list of strings", item, span)
                                    .with_position(i))
                            }
                        },
                    }
                }
                Ok(Value::Str(parts.join(&sep)))
            }
            "eq?" => {
                self.arity_exact(head, span, n, 2)?;
                Ok(Value::Bool(vals[0] == vals[1]))
            }
            "print" => {
                self.arity_min(head, span, n, 1)?;
                let line = vals
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(" ");
                self.logs.push(line);
                Ok(Value::Null)
            }

            // Numeric parsing
            "parseInt" => {
                self.arity_exact(head, span, n, 1)?;
                match &vals[0] {
                    Value::Null => Ok(Value::Null),
                    Value::Int(v) => Ok(Value::Int(*v)),
                    other => match other.as_text() {
                        Some(s) => Ok(numparse::parse_int(s)
                            .map(Value::Int)
                            .unwrap_or(Value::Null)),
                        None => Err(self.type_err(head, 1, "string", other, span)),
                    },
                }
            }
            "parseFloat" => {
                self.arity_exact(head, span, n, 1)?;
                match &vals[0] {
                    Value::Null => Ok(Value::Null),
                    Value::Int(v) => Ok(Value::Float(*v as f64)),
                    Value::Float(v) => Ok(Value::Float(*v)),
                    other => match other.as_text() {
                        Some(s) => Ok(numparse::parse_float(s)
                            .map(Value::Float)
                            .unwrap_or(Value::Null)),
                        None => Err(self.type_err(head, 1, "string", other, span)),
                    },
                }
            }
            "parseCurrency" => {
                self.arity_exact(head, span, n, 1)?;
                match &vals[0] {
                    Value::Null => Ok(Value::Null),
                    Value::Int(v) => Ok(Value::Int(*v)),
                    Value::Float(v) => Ok(Value::Float(*v)),
                    other => match other.as_text() {
                        Some(s) => Ok(numparse::parse_currency(s).unwrap_or(Value::Null)),
                        None => Err(self.type_err(head, 1, "string", other, span)),
                    },
                }
            }
            "parseNumber" => {
                self.arity_exact(head, span, n, 1)?;
                match &vals[0] {
                    Value::Null => Ok(Value::Null),
                    Value::Int(v) => Ok(Value::Int(*v)),
                    Value::Float(v) => Ok(Value::Float(*v)),
                    other => match other.as_text() {
                        Some(s) => Ok(numparse::parse_number(s)
                            .map(Value::Float)
                            .unwrap_or(Value::Null)),
                        None => Err(self.type_err(head, 1, "string", other, span)),
                    },
                }
            }
            "parseDate" => {
                self.arity_range(head, span, n, 1, 2)?;
                let Some(text) = self.want_text(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                let fmt = match vals.get(1) {
                    None | Some(Value::Null) => None,
                    Some(v) => self.want_text(head, 2, v, span)?,
                };
                Ok(numparse::parse_date(&text, fmt.as_deref())
                    .map(Value::Str)
                    .unwrap_or(Value::Null))
            }

            // Synthesis
            "synthesize-extractor" => {
                self.arity_exact(head, span, n, 1)?;
                let Some(items) = self.want_list(head, 1, &vals[0], span)? else {
                    return Ok(Value::Null);
                };
                let mut examples = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    let pair = match item {
                        Value::Record(_) => item
                            .record_get("input")
                            .zip(item.record_get("output"))
                            .map(|(a, b)| (a.clone(), b.clone())),
                        Value::List(pair) if pair.len() == 2 => {
                            Some((pair[0].clone(), pair[1].clone()))
                        }
                        _ => None,
                    };
                    match pair {
                        Some(pair) => examples.push(pair),
                        None => {
                            return Err(self
                                .type_err(head, 1, "record with input/output", item, span)
                                .with_position(i))
                        }
                    }
                }
                match synth::synthesize(&examples, self.config, self.deadline) {
                    Ok(lambda) => Ok(Value::Lambda(lambda)),
                    Err(SynthError::NeedsMoreExamples { received }) => {
                        Err(EngineError::NeedsMoreExamples { received })
                    }
                    Err(SynthError::Timeout) => Err(EngineError::Timeout),
                    Err(SynthError::NoCandidate(diagnostic)) => {
                        // The primitive itself evaluates to null; the turn's
                        // response carries the diagnostic.
                        self.synth_failure = Some(diagnostic);
                        Ok(Value::Null)
                    }
                }
            }

            _ => Err(EngineError::Unbound {
                name: head.to_string(),
                span: head_span,
            }),
        }
    }

    // ─── Argument helpers ───────────────────────────────────────────────

    fn arity_exact(&self, head: &str, span: Span, got: usize, want: usize) -> EngineResult<()> {
        if got != want {
            return Err(EngineError::Arity {
                head: head.into(),
                expected: want.to_string(),
                received: got,
                span,
            });
        }
        Ok(())
    }

    fn arity_range(
        &self,
        head: &str,
        span: Span,
        got: usize,
        min: usize,
        max: usize,
    ) -> EngineResult<()> {
        if got < min || got > max {
            return Err(EngineError::Arity {
                head: head.into(),
                expected: format!("{min} to {max}"),
                received: got,
                span,
            });
        }
        Ok(())
    }

    fn arity_min(&self, head: &str, span: Span, got: usize, min: usize) -> EngineResult<()> {
        if got < min {
            return Err(EngineError::Arity {
                head: head.into(),
                expected: format!("at least {min}"),
                received: got,
                span,
            });
        }
        Ok(())
    }

    fn type_err(
        &self,
        head: &str,
        position: usize,
        expected: &str,
        got: &Value,
        span: Span,
    ) -> EngineError {
        EngineError::Type {
            head: head.into(),
            position,
            expected: expected.into(),
            received: got.type_name().into(),
            span,
        }
    }

    /// None = the argument was null and the caller should propagate null.
    fn want_text(
        &self,
        head: &str,
        position: usize,
        v: &Value,
        span: Span,
    ) -> EngineResult<Option<String>> {
        match v {
            Value::Null => Ok(None),
            _ => v
                .as_text()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| self.type_err(head, position, "string", v, span)),
        }
    }

    fn want_int(
        &self,
        head: &str,
        position: usize,
        v: &Value,
        span: Span,
    ) -> EngineResult<Option<i64>> {
        match v {
            Value::Null => Ok(None),
            Value::Int(i) => Ok(Some(*i)),
            _ => Err(self.type_err(head, position, "int", v, span)),
        }
    }

    fn want_list(
        &self,
        head: &str,
        position: usize,
        v: &Value,
        span: Span,
    ) -> EngineResult<Option<Vec<Value>>> {
        match v {
            Value::Null => Ok(None),
            Value::List(items) => Ok(Some(items.clone())),
            _ => Err(self.type_err(head, position, "list", v, span)),
        }
    }

    fn want_lambda(
        &self,
        head: &str,
        position: usize,
        v: &Value,
        span: Span,
    ) -> EngineResult<Option<Arc<LambdaFn>>> {
        match v {
            Value::Null => Ok(None),
            Value::Lambda(l) => Ok(Some(l.clone())),
            _ => Err(self.type_err(head, position, "lambda", v, span)),
        }
    }
}

impl EngineError {
    fn with_position(self, position: usize) -> Self {
        match self {
            EngineError::Type {
                head,
                expected,
                received,
                span,
                ..
            } => EngineError::Type {
                head,
                position,
                expected,
                received,
                span,
            },
            other => other,
        }
    }
}

/// Sum with the `parseNumber` coercion rule; Int is preserved until a float
/// contribution appears, non-numeric elements are skipped.
fn sum_values(items: &[Value]) -> Value {
    let mut int_acc: i64 = 0;
    let mut float_acc: f64 = 0.0;
    let mut is_float = false;
    for item in items {
        match item {
            Value::Int(v) => {
                if is_float {
                    float_acc += *v as f64;
                } else {
                    int_acc += *v;
                }
            }
            Value::Float(v) => {
                if !is_float {
                    is_float = true;
                    float_acc = int_acc as f64;
                }
                float_acc += *v;
            }
            other => {
                if let Some(text) = other.as_text() {
                    if let Some(v) = numparse::parse_number(text) {
                        if !is_float {
                            is_float = true;
                            float_acc = int_acc as f64;
                        }
                        float_acc += v;
                    }
                }
            }
        }
    }
    if is_float {
        Value::Float(float_acc)
    } else {
        Value::Int(int_acc)
    }
}

fn collect_free_symbols(expr: &Expr, bound: &mut Vec<String>, out: &mut Vec<String>) {
    match &expr.kind {
        ExprKind::Symbol(name) => {
            if !bound.contains(name) && !out.contains(name) {
                out.push(name.clone());
            }
        }
        ExprKind::Call { head, args, .. } => {
            match head.as_str() {
                "lambda" if args.len() == 2 => {
                    if let ExprKind::Symbol(param) = &args[0].kind {
                        bound.push(param.clone());
                        collect_free_symbols(&args[1], bound, out);
                        bound.pop();
                        return;
                    }
                }
                "let" if args.len() == 2 => {
                    // The target symbol is a binding site, not a reference.
                    collect_free_symbols(&args[1], bound, out);
                    return;
                }
                _ => {}
            }
            if !bound.contains(head) && !out.contains(head) {
                out.push(head.clone());
            }
            for arg in args {
                collect_free_symbols(arg, bound, out);
            }
        }
        _ => {}
    }
}
