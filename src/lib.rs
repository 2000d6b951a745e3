//! # nucleus-core
//!
//! Stateful document analysis engine driven by an external agent over many
//! small, chained queries. Load a document once, then issue composable
//! Nucleus expressions whose results persist across calls — only matching
//! fragments flow back, never the document itself.
//!
//! ## Quick Start
//!
//! ```rust
//! use nucleus_core::session::Session;
//!
//! let mut session = Session::new();
//! session.load_text("SALES_NORTH: $2,340,000\nSALES_SOUTH: $3,120,000");
//!
//! let resp = session.execute(r#"(grep "SALES_")"#, None);
//! assert!(resp.ok);
//!
//! // RESULTS carries the hits into the next turn.
//! let resp = session.execute(
//!     r#"(sum (map RESULTS (lambda x (parseCurrency (match x "\\$([\\d,]+)" 0)))))"#,
//!     None,
//! );
//! assert_eq!(resp.value.unwrap(), serde_json::json!(5_460_000));
//! ```
//!
//! ## Architecture
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`document`] | Owned text with line index: `line`/`lines`, stats, regex grep, fuzzy scan |
//! | [`nucleus`] | The query language: parser, value model, environment, evaluator |
//! | [`session`] | `load / execute / bindings / reset / stats` with the uniform response shape |
//! | [`synth`] | Example-driven extractor synthesis over composition templates |
//! | [`config`] | Engine knobs: history depth, preview caps, search budget, grep flags |
//! | [`error`] | Closed error set with thiserror: ParseError, ArityError, TypeError, … |
//!
//! ## The Turn Model
//!
//! Every `execute` is one turn. The engine parses exactly one expression,
//! evaluates it against the current environment, then atomically binds
//! `RESULTS` (last non-void value), rotates `_1…_N` history, and advances
//! `TURN` — on failures too, so the counter never lies. `let` bindings made
//! mid-turn only persist when the whole turn succeeds.
//!
//! ## Synthesis
//!
//! `(synthesize-extractor EXAMPLES)` searches a fixed catalog of primitive
//! compositions for one that maps every example input to its output under
//! strict equality, and returns it as an ordinary lambda. Candidates are
//! plain Nucleus expressions evaluated by the same interpreter, so what
//! verified during the search is exactly what runs afterwards.

pub mod config;
pub mod document;
pub mod error;
pub mod nucleus;
pub mod session;
pub mod synth;

pub use config::EngineConfig;
pub use document::{Document, DocumentStats, FuzzyHit, GrepFlags, GrepHit};
pub use error::{EngineError, EngineResult};
pub use nucleus::value::Value;
pub use session::{Response, Session};
