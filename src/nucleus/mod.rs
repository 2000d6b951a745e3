//! Nucleus — the S-expression query language: parser, value model,
//! environment, and tree-walking evaluator.

pub mod ast;
pub mod env;
pub mod eval;
pub mod numparse;
pub mod parser;
pub mod strings;
pub mod value;

pub use ast::{Expr, ExprKind, Span};
pub use env::Environment;
pub use eval::{EvalOutcome, Evaluator};
pub use parser::parse;
pub use value::{LambdaFn, Value};
