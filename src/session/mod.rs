//! Session — one document, one environment, one turn counter. Presents the
//! outward `load / execute / bindings / reset / stats` contract with the
//! uniform response shape transports serialize as-is.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::document::{Document, DocumentStats, FuzzyHit, GrepHit};
use crate::error::{EngineError, EngineResult};
use crate::nucleus::ast::Span;
use crate::nucleus::env::Environment;
use crate::nucleus::eval::Evaluator;
use crate::nucleus::parser;
use crate::nucleus::value::Value;

pub mod registry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadInfo {
    pub line_count: usize,
    pub length: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    pub kind: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub span: Option<Span>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BindingsDelta {
    pub added: Vec<String>,
    pub changed: Vec<String>,
}

/// Uniform per-request response. `value` is a bounded preview; the full
/// value stays in-session for subsequent queries.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
    pub logs: Vec<String>,
    pub turn: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bindings_delta: Option<BindingsDelta>,
}

pub struct Session {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    config: EngineConfig,
    document: Option<Document>,
    env: Environment,
    poisoned: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let now = Utc::now();
        let env = Environment::new(config.history_depth);
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            config,
            document: None,
            env,
            poisoned: false,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn has_document(&self) -> bool {
        self.document.is_some()
    }

    /// Ingest text as the session document. Replaces any previous document
    /// and resets bindings, history, and the turn counter.
    pub fn load_text(&mut self, text: impl Into<String>) -> LoadInfo {
        self.install(Document::from_text(text, None))
    }

    /// Ingest a file as the session document.
    pub async fn load_path(&mut self, path: impl AsRef<Path>) -> EngineResult<LoadInfo> {
        let doc = Document::from_path(path).await?;
        Ok(self.install(doc))
    }

    fn install(&mut self, doc: Document) -> LoadInfo {
        let info = LoadInfo {
            line_count: doc.line_count(),
            length: doc.len(),
        };
        tracing::debug!(
            session = %self.id,
            lines = info.line_count,
            bytes = info.length,
            "document loaded"
        );
        self.document = Some(doc);
        self.env.reset();
        self.updated_at = Utc::now();
        info
    }

    /// Parse, evaluate, and bind one expression. Every call advances the
    /// turn exactly once, success or failure.
    pub fn execute(&mut self, source: &str, timeout: Option<Duration>) -> Response {
        if self.poisoned {
            return Response {
                ok: false,
                value: None,
                error: Some(ErrorInfo {
                    kind: "InternalError".into(),
                    message: "session is poisoned; create a fresh session".into(),
                    span: None,
                    meta: None,
                }),
                logs: Vec::new(),
                turn: self.env.turn(),
                bindings_delta: None,
            };
        }
        self.updated_at = Utc::now();
        if self.document.is_none() {
            return self.error_turn(EngineError::NoDocument, Vec::new());
        }
        let deadline = timeout.map(|t| Instant::now() + t);

        let expr = match parser::parse(source) {
            Ok(expr) => expr,
            Err(err) => return self.error_turn(err, Vec::new()),
        };

        let outcome = Evaluator::new(self.document.as_ref(), &self.env, &self.config)
            .with_deadline(deadline)
            .run(&expr);

        match outcome.result {
            Ok(value) => {
                let mut added = Vec::new();
                let mut changed = Vec::new();
                for (name, bound) in outcome.bindings {
                    let existed = self.env.contains_user(&name);
                    if existed {
                        if !added.contains(&name) && !changed.contains(&name) {
                            changed.push(name.clone());
                        }
                    } else if !added.contains(&name) {
                        added.push(name.clone());
                    }
                    // Reserved names were rejected at `let` time.
                    let _ = self.env.bind(&name, bound);
                }
                let preview = preview_value(&value, &self.config);
                self.env.commit_success(value);

                let error = outcome.synth_failure.map(|d| ErrorInfo {
                    kind: "NoCandidate".into(),
                    message: format!(
                        "no composition satisfied all examples ({} candidates explored)",
                        d.candidates_explored
                    ),
                    span: None,
                    meta: Some(json!({
                        "candidates_explored": d.candidates_explored,
                        "first_failing_example": d.first_failing_example,
                    })),
                });
                let bindings_delta = if added.is_empty() && changed.is_empty() {
                    None
                } else {
                    Some(BindingsDelta { added, changed })
                };
                Response {
                    ok: true,
                    value: Some(preview),
                    error,
                    logs: outcome.logs,
                    turn: self.env.turn(),
                    bindings_delta,
                }
            }
            Err(err) => {
                if err.is_fatal() {
                    tracing::warn!(session = %self.id, error = %err, "session poisoned");
                    self.poisoned = true;
                }
                self.error_turn(err, outcome.logs)
            }
        }
    }

    /// Snapshot of user and reserved bindings as summarized previews; full
    /// values are never serialized here.
    pub fn bindings(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        for (name, value) in self.env.user_bindings() {
            out.insert(name.clone(), summarize(value));
        }
        out.insert("RESULTS".into(), summarize(self.env.results()));
        out.insert("TURN".into(), self.env.turn().to_string());
        for k in 1..=self.env.history_len() {
            if let Some(value) = self.env.history_get(k) {
                out.insert(format!("_{k}"), summarize(value));
            }
        }
        out
    }

    /// Clear all bindings and the turn counter; the document stays.
    pub fn reset(&mut self) {
        self.env.reset();
        self.updated_at = Utc::now();
        tracing::debug!(session = %self.id, "session reset");
    }

    pub fn stats(&self) -> EngineResult<DocumentStats> {
        self.document
            .as_ref()
            .map(Document::stats)
            .ok_or(EngineError::NoDocument)
    }

    fn error_turn(&mut self, err: EngineError, logs: Vec<String>) -> Response {
        self.env.commit_error(err.kind(), &err.to_string());
        Response {
            ok: false,
            value: None,
            error: Some(error_info(&err)),
            logs,
            turn: self.env.turn(),
            bindings_delta: None,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

fn error_info(err: &EngineError) -> ErrorInfo {
    let meta = match err {
        EngineError::Arity {
            expected, received, ..
        } => Some(json!({ "expected": expected, "received": received })),
        EngineError::Type {
            position,
            expected,
            received,
            ..
        } => Some(json!({
            "position": position,
            "expected": expected,
            "received": received,
        })),
        EngineError::Regex { pattern, .. } => Some(json!({ "pattern": pattern })),
        EngineError::LineOutOfRange {
            requested,
            line_count,
        } => Some(json!({ "requested": requested, "line_count": line_count })),
        EngineError::NoCandidate {
            candidates_explored,
            first_failing_example,
        } => Some(json!({
            "candidates_explored": candidates_explored,
            "first_failing_example": first_failing_example,
        })),
        _ => None,
    };
    ErrorInfo {
        kind: err.kind().into(),
        message: err.to_string(),
        span: err.span(),
        meta,
    }
}

/// Bounded preview of a value for the wire: lists cap with an explicit
/// truncation marker, strings cap with an `…` suffix.
fn preview_value(value: &Value, config: &EngineConfig) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => json!(b),
        Value::Int(v) => json!(v),
        Value::Float(v) => json!(v),
        Value::Str(s) => json!(truncate(s, config.preview_string_cap)),
        Value::List(items) => {
            let cap = config.preview_list_cap;
            let shown: Vec<serde_json::Value> = items
                .iter()
                .take(cap)
                .map(|v| preview_value(v, config))
                .collect();
            if items.len() > cap {
                json!({ "items": shown, "truncated": true, "total": items.len() })
            } else {
                serde_json::Value::Array(shown)
            }
        }
        Value::Grep(hit) => grep_preview(hit, config),
        Value::Fuzzy(hit) => fuzzy_preview(hit, config),
        Value::Lambda(l) => json!({
            "lambda": { "param": l.param, "body": l.body.to_source() }
        }),
        Value::Record(pairs) => {
            let mut map = serde_json::Map::new();
            for (k, v) in pairs {
                map.insert(k.clone(), preview_value(v, config));
            }
            serde_json::Value::Object(map)
        }
    }
}

fn grep_preview(hit: &GrepHit, config: &EngineConfig) -> serde_json::Value {
    json!({
        "match": truncate(&hit.matched, config.preview_string_cap),
        "line": truncate(&hit.line, config.preview_string_cap),
        "lineNum": hit.line_num,
        "index": hit.index,
        "groups": hit.groups,
    })
}

fn fuzzy_preview(hit: &FuzzyHit, config: &EngineConfig) -> serde_json::Value {
    json!({
        "line": truncate(&hit.line, config.preview_string_cap),
        "lineNum": hit.line_num,
        "score": hit.score,
    })
}

fn truncate(s: &str, cap: usize) -> String {
    if s.len() <= cap {
        return s.to_string();
    }
    let mut end = cap;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &s[..end])
}

/// One-line summary for `bindings()`; never the full value.
fn summarize(value: &Value) -> String {
    match value {
        Value::Null => "null".into(),
        Value::Bool(b) => b.to_string(),
        Value::Int(v) => v.to_string(),
        Value::Float(_) => value.to_string(),
        Value::Str(s) => format!("{:?}", truncate(s, 64)),
        Value::List(items) => format!("<List n={}>", items.len()),
        Value::Grep(hit) => format!("<GrepHit line={}>", hit.line_num),
        Value::Fuzzy(hit) => format!("<FuzzyHit line={}>", hit.line_num),
        Value::Lambda(l) => format!("<Lambda {}>", l.param),
        Value::Record(pairs) => format!("<Record n={}>", pairs.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_session(text: &str) -> Session {
        let mut session = Session::new();
        session.load_text(text);
        session
    }

    #[test]
    fn session_new_is_empty() {
        let session = Session::new();
        assert!(!session.id.is_empty());
        assert!(!session.has_document());
        assert!(matches!(session.stats(), Err(EngineError::NoDocument)));
    }

    #[test]
    fn load_reports_shape_and_resets() {
        let mut session = Session::new();
        session.load_text("a\nb\nc");
        session.execute("(count (list 1 2))", None);
        assert_eq!(session.bindings()["TURN"], "1");

        let info = session.load_text("x\ny");
        assert_eq!(info.line_count, 2);
        assert_eq!(info.length, 3);
        assert_eq!(session.bindings()["TURN"], "0");
        assert_eq!(session.bindings()["RESULTS"], "null");
    }

    #[test]
    fn execute_before_load_is_no_document() {
        let mut session = Session::new();
        let resp = session.execute(r#"(grep "x")"#, None);
        assert!(!resp.ok);
        assert_eq!(resp.error.unwrap().kind, "NoDocument");
        assert_eq!(resp.turn, 1);
    }

    #[test]
    fn execute_success_binds_results() {
        let mut session = loaded_session("one ERROR\ntwo\nthree ERROR");
        let resp = session.execute(r#"(grep "ERROR")"#, None);
        assert!(resp.ok);
        assert_eq!(resp.turn, 1);

        let resp = session.execute("(count RESULTS)", None);
        assert!(resp.ok);
        assert_eq!(resp.value.unwrap(), json!(2));
        assert_eq!(resp.turn, 2);
    }

    #[test]
    fn parse_error_advances_turn_keeps_results() {
        let mut session = loaded_session("x");
        session.execute("(count (list 1))", None);
        let resp = session.execute("(bogus", None);
        assert!(!resp.ok);
        let err = resp.error.unwrap();
        assert_eq!(err.kind, "ParseError");
        assert!(err.span.is_some());
        assert_eq!(resp.turn, 2);
        assert_eq!(session.bindings()["RESULTS"], "1");

        let resp = session.execute("(count (list 1 2))", None);
        assert!(resp.ok);
        assert_eq!(resp.turn, 3);
    }

    #[test]
    fn let_bindings_persist_and_report_delta() {
        let mut session = loaded_session("x");
        let resp = session.execute("(let total 42)", None);
        assert!(resp.ok);
        let delta = resp.bindings_delta.unwrap();
        assert_eq!(delta.added, vec!["total"]);
        assert!(delta.changed.is_empty());

        let resp = session.execute("(let total 43)", None);
        let delta = resp.bindings_delta.unwrap();
        assert!(delta.added.is_empty());
        assert_eq!(delta.changed, vec!["total"]);

        assert_eq!(session.bindings()["total"], "43");
    }

    #[test]
    fn failed_turn_commits_no_bindings() {
        let mut session = loaded_session("x");
        let resp = session.execute("(do (let temp 1) (count temp))", None);
        assert!(!resp.ok);
        assert!(!session.bindings().contains_key("temp"));
    }

    #[test]
    fn reserved_let_is_rejected() {
        let mut session = loaded_session("x");
        let resp = session.execute("(let RESULTS 1)", None);
        assert!(!resp.ok);
        assert_eq!(resp.error.unwrap().kind, "ReservedName");
    }

    #[test]
    fn logs_flow_through_response() {
        let mut session = loaded_session("x");
        let resp = session.execute(r#"(do (print "working") 1)"#, None);
        assert_eq!(resp.logs, vec!["working"]);
    }

    #[test]
    fn print_only_turn_keeps_results() {
        let mut session = loaded_session("x");
        session.execute("(count (list 1 2 3))", None);
        session.execute(r#"(print "checkpoint")"#, None);
        assert_eq!(session.bindings()["RESULTS"], "3");
        assert_eq!(session.bindings()["_1"], "null");
        assert_eq!(session.bindings()["_2"], "3");
    }

    #[test]
    fn reset_clears_bindings_keeps_document() {
        let mut session = loaded_session("line one");
        session.execute("(let x 5)", None);
        session.reset();
        assert!(session.bindings().get("x").is_none());
        assert_eq!(session.bindings()["TURN"], "0");
        assert!(session.has_document());
        assert_eq!(session.stats().unwrap().line_count, 1);
    }

    #[test]
    fn timeout_reports_and_advances() {
        let mut session = loaded_session("x");
        session.execute("(count (list 1))", None);
        let resp = session.execute("(count (list 1 2))", Some(Duration::ZERO));
        assert!(!resp.ok);
        assert_eq!(resp.error.unwrap().kind, "TimeoutError");
        assert_eq!(resp.turn, 2);
        assert_eq!(session.bindings()["RESULTS"], "1");
    }

    #[test]
    fn list_preview_truncates_with_flag() {
        let config = EngineConfig {
            preview_list_cap: 2,
            ..Default::default()
        };
        let mut session = Session::with_config(config);
        session.load_text("x");
        let resp = session.execute("(list 1 2 3 4)", None);
        let value = resp.value.unwrap();
        assert_eq!(value["truncated"], json!(true));
        assert_eq!(value["total"], json!(4));
        assert_eq!(value["items"], json!([1, 2]));
    }

    #[test]
    fn string_preview_truncates_with_marker() {
        let config = EngineConfig {
            preview_string_cap: 64,
            ..Default::default()
        };
        let mut session = Session::with_config(config);
        session.load_text("x");
        let resp = session.execute(r#"(replace "a" "a" "bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb")"#, None);
        let value = resp.value.unwrap();
        let s = value.as_str().unwrap();
        assert!(s.ends_with('…'));
        assert!(s.len() < 80);
    }

    #[test]
    fn bindings_summarize_not_serialize() {
        let mut session = loaded_session("a ERROR\nb ERROR");
        session.execute(r#"(grep "ERROR")"#, None);
        let bindings = session.bindings();
        assert_eq!(bindings["RESULTS"], "<List n=2>");
        assert_eq!(bindings["_1"], "<List n=2>");
    }

    #[test]
    fn synthesis_failure_is_null_with_diagnostic() {
        let mut session = loaded_session("x");
        let resp = session.execute(
            r#"(synthesize-extractor (list (record "input" "$1,000" "output" 1000) (record "input" "$1,000" "output" 2000)))"#,
            None,
        );
        assert!(resp.ok);
        assert_eq!(resp.value.unwrap(), serde_json::Value::Null);
        let err = resp.error.unwrap();
        assert_eq!(err.kind, "NoCandidate");
        assert!(err.meta.unwrap()["candidates_explored"].as_u64().unwrap() > 0);
    }

    #[test]
    fn synthesis_needs_examples_is_hard_error() {
        let mut session = loaded_session("x");
        let resp = session.execute(
            r#"(synthesize-extractor (list (record "input" "a" "output" 1)))"#,
            None,
        );
        assert!(!resp.ok);
        assert_eq!(resp.error.unwrap().kind, "NeedsMoreExamples");
    }

    #[tokio::test]
    async fn load_path_ingests_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.txt");
        tokio::fs::write(&path, "TOTAL: $5\nEND").await.unwrap();

        let mut session = Session::new();
        let info = session.load_path(&path).await.unwrap();
        assert_eq!(info.line_count, 2);
        let resp = session.execute(r#"(grep "total")"#, None);
        assert!(resp.ok);
    }
}
