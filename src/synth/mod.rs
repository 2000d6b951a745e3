//! Example-driven extractor synthesis: a deterministic enumerator over
//! composition templates whose candidates are ordinary Nucleus lambda
//! bodies, verified with the same evaluator that runs live queries.

pub mod engine;
pub mod patterns;
pub mod templates;

pub use engine::{synthesize, SynthDiagnostic, SynthError};
