//! String and extraction primitive bodies. Plain functions so the
//! synthesizer's forward evaluation and the evaluator share one
//! implementation.

use regex::Regex;

use crate::error::{EngineError, EngineResult};

fn compile(pattern: &str) -> EngineResult<Regex> {
    Regex::new(pattern).map_err(|e| EngineError::Regex {
        pattern: pattern.to_string(),
        message: e.to_string(),
    })
}

/// Capture group `group` of the first match (0 = whole match), or None when
/// the pattern misses or the group does not exist/participate.
pub fn regex_match(text: &str, pattern: &str, group: usize) -> EngineResult<Option<String>> {
    let re = compile(pattern)?;
    Ok(re
        .captures(text)
        .and_then(|caps| caps.get(group).map(|m| m.as_str().to_string())))
}

/// Global regex replace; the replacement is literal text.
pub fn regex_replace(text: &str, pattern: &str, replacement: &str) -> EngineResult<String> {
    let re = compile(pattern)?;
    Ok(re
        .replace_all(text, regex::NoExpand(replacement))
        .into_owned())
}

pub fn split(text: &str, delimiter: &str) -> Vec<String> {
    if delimiter.is_empty() {
        return text.chars().map(|c| c.to_string()).collect();
    }
    text.split(delimiter).map(|p| p.to_string()).collect()
}

/// Select one part; negative indexes count from the end; out of range is
/// None.
pub fn pick(parts: &[String], index: i64) -> Option<String> {
    let len = parts.len() as i64;
    let idx = if index < 0 { len + index } else { index };
    if idx < 0 || idx >= len {
        return None;
    }
    Some(parts[idx as usize].clone())
}
