//! Expression tree for Nucleus source, with source spans for error
//! reporting and a printer whose output reparses to the same tree.

use serde::{Deserialize, Serialize};

/// 1-indexed source location of a token or form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub line: u32,
    pub col: u32,
    pub len: u32,
}

impl Span {
    pub fn new(line: u32, col: u32, len: u32) -> Self {
        Self { line, col, len }
    }

    /// Span for expressions built in memory (synthesized lambdas).
    pub fn synthetic() -> Self {
        Self {
            line: 0,
            col: 0,
            len: 0,
        }
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

#[derive(Debug, Clone)]
pub enum ExprKind {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Symbol(String),
    Call {
        head: String,
        head_span: Span,
        args: Vec<Expr>,
    },
}

#[derive(Debug, Clone)]
pub struct Expr {
    pub kind: ExprKind,
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind, span: Span) -> Self {
        Self { kind, span }
    }

    /// Render back to source. `parse(to_source(parse(s)))` equals
    /// `parse(s)` structurally.
    pub fn to_source(&self) -> String {
        match &self.kind {
            ExprKind::Int(v) => v.to_string(),
            ExprKind::Float(v) => {
                if v.fract() == 0.0 && v.is_finite() {
                    format!("{v:.1}")
                } else {
                    format!("{v}")
                }
            }
            ExprKind::Str(s) => quote_string(s),
            ExprKind::Bool(b) => b.to_string(),
            ExprKind::Symbol(name) => name.clone(),
            ExprKind::Call { head, args, .. } => {
                let mut out = String::from("(");
                out.push_str(head);
                for arg in args {
                    out.push(' ');
                    out.push_str(&arg.to_source());
                }
                out.push(')');
                out
            }
        }
    }
}

/// Structural equality; spans are a reporting concern and do not
/// participate.
impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        match (&self.kind, &other.kind) {
            (ExprKind::Int(a), ExprKind::Int(b)) => a == b,
            (ExprKind::Float(a), ExprKind::Float(b)) => a == b,
            (ExprKind::Str(a), ExprKind::Str(b)) => a == b,
            (ExprKind::Bool(a), ExprKind::Bool(b)) => a == b,
            (ExprKind::Symbol(a), ExprKind::Symbol(b)) => a == b,
            (
                ExprKind::Call { head: h1, args: a1, .. },
                ExprKind::Call { head: h2, args: a2, .. },
            ) => h1 == h2 && a1 == a2,
            _ => false,
        }
    }
}

fn quote_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

// ─── Builders for synthesized expressions ───────────────────────────────────

pub fn sym(name: &str) -> Expr {
    Expr::new(ExprKind::Symbol(name.to_string()), Span::synthetic())
}

pub fn str_lit(s: &str) -> Expr {
    Expr::new(ExprKind::Str(s.to_string()), Span::synthetic())
}

pub fn int_lit(v: i64) -> Expr {
    Expr::new(ExprKind::Int(v), Span::synthetic())
}

pub fn call(head: &str, args: Vec<Expr>) -> Expr {
    Expr::new(
        ExprKind::Call {
            head: head.to_string(),
            head_span: Span::synthetic(),
            args,
        },
        Span::synthetic(),
    )
}
