//! Binding environment: user bindings plus the engine-owned reserved names
//! `RESULTS`, `TURN`, and the `_1…_N` history window.

use std::collections::HashMap;
use std::collections::VecDeque;

use crate::error::{EngineError, EngineResult};

use super::value::Value;

pub struct Environment {
    vars: HashMap<String, Value>,
    /// Front is `_1` (most recent turn).
    history: VecDeque<Value>,
    results: Value,
    turn: u64,
    history_depth: usize,
}

impl Environment {
    pub fn new(history_depth: usize) -> Self {
        Self {
            vars: HashMap::new(),
            history: VecDeque::new(),
            results: Value::Null,
            turn: 0,
            history_depth: history_depth.max(1),
        }
    }

    /// Reserved names are read/write by the engine only.
    pub fn is_reserved(name: &str) -> bool {
        if name == "RESULTS" || name == "TURN" {
            return true;
        }
        name.len() > 1
            && name.starts_with('_')
            && name[1..].bytes().all(|b| b.is_ascii_digit())
    }

    pub fn lookup(&self, name: &str) -> Option<Value> {
        match name {
            "RESULTS" => Some(self.results.clone()),
            "TURN" => Some(Value::Int(self.turn as i64)),
            _ if Self::is_reserved(name) => {
                let k: usize = name[1..].parse().ok()?;
                if k == 0 || k > self.history_depth {
                    return None;
                }
                self.history.get(k - 1).cloned()
            }
            _ => self.vars.get(name).cloned(),
        }
    }

    pub fn bind(&mut self, name: &str, value: Value) -> EngineResult<()> {
        if Self::is_reserved(name) {
            return Err(EngineError::ReservedName {
                name: name.to_string(),
            });
        }
        self.vars.insert(name.to_string(), value);
        Ok(())
    }

    pub fn contains_user(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn user_bindings(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.vars.iter()
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    pub fn results(&self) -> &Value {
        &self.results
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn history_get(&self, k: usize) -> Option<&Value> {
        if k == 0 {
            return None;
        }
        self.history.get(k - 1)
    }

    /// End-of-turn commit for a successful evaluation: advance the turn,
    /// rotate history, and update `RESULTS` unless the value is null.
    pub fn commit_success(&mut self, value: Value) {
        self.turn += 1;
        if value != Value::Null {
            self.results = value.clone();
        }
        self.push_history(value);
    }

    /// End-of-turn commit for a failed evaluation: the turn still advances
    /// and the error is pushed into history; `RESULTS` is untouched.
    pub fn commit_error(&mut self, kind: &str, message: &str) {
        self.turn += 1;
        self.push_history(Value::Record(vec![
            ("error".into(), Value::Bool(true)),
            ("kind".into(), Value::Str(kind.to_string())),
            ("message".into(), Value::Str(message.to_string())),
        ]));
    }

    /// Clear bindings and the turn counter; the document is not ours to
    /// touch.
    pub fn reset(&mut self) {
        self.vars.clear();
        self.history.clear();
        self.results = Value::Null;
        self.turn = 0;
    }

    fn push_history(&mut self, value: Value) {
        self.history.push_front(value);
        self.history.truncate(self.history_depth);
    }
}
