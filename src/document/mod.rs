//! Document store — owns the loaded text, its line index, and the two scan
//! primitives (regex grep, fuzzy line match) everything else is built on.

use std::collections::HashSet;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Flags applied when compiling a grep pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrepFlags {
    pub global: bool,
    pub multiline: bool,
    pub case_insensitive: bool,
}

impl Default for GrepFlags {
    fn default() -> Self {
        Self {
            global: true,
            multiline: true,
            case_insensitive: true,
        }
    }
}

/// One regex match together with its enclosing line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrepHit {
    #[serde(rename = "match")]
    pub matched: String,
    pub line: String,
    #[serde(rename = "lineNum")]
    pub line_num: u32,
    /// Byte offset of the match start within the document.
    pub index: u32,
    /// Capture groups 1..N; group 0 lives in `matched` and is not duplicated.
    pub groups: Vec<String>,
}

/// One fuzzy-scored line; lower score = better.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuzzyHit {
    pub line: String,
    #[serde(rename = "lineNum")]
    pub line_num: u32,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleWindows {
    pub start: Vec<String>,
    pub middle: Vec<String>,
    pub end: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentStats {
    pub length: usize,
    pub line_count: usize,
    pub sample: SampleWindows,
}

/// An immutable loaded document: original text plus a precomputed 1-indexed
/// line table. Replaced wholesale by a subsequent load, never mutated.
#[derive(Debug, Clone)]
pub struct Document {
    text: String,
    /// Byte ranges (start, end) of each line, newline excluded.
    line_spans: Vec<(usize, usize)>,
    path: Option<String>,
}

impl Document {
    pub fn from_text(text: impl Into<String>, path: Option<String>) -> Self {
        let text = text.into();
        let line_spans = index_lines(&text);
        Self {
            text,
            line_spans,
            path,
        }
    }

    /// Read a document from disk. The path becomes the document's label.
    pub async fn from_path(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let text = tokio::fs::read_to_string(path).await?;
        Ok(Self::from_text(text, Some(path.display().to_string())))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn line_count(&self) -> usize {
        self.line_spans.len()
    }

    /// Text of the 1-indexed line `n`. Negative `n` counts from the end
    /// (`-1` is the last line). `0` and anything past either end fail.
    pub fn line(&self, n: i64) -> EngineResult<&str> {
        let count = self.line_spans.len() as i64;
        let idx = if n < 0 { count + n } else { n - 1 };
        if n == 0 || idx < 0 || idx >= count {
            return Err(EngineError::LineOutOfRange {
                requested: n,
                line_count: self.line_spans.len(),
            });
        }
        let (s, e) = self.line_spans[idx as usize];
        Ok(&self.text[s..e])
    }

    /// Inclusive slice of lines. Arguments are reordered so start ≤ end and
    /// clamped to valid bounds; if both fall out on the same side the result
    /// is empty. Negative endpoints count from the end.
    pub fn lines(&self, start: i64, end: i64) -> Vec<String> {
        let count = self.line_spans.len() as i64;
        let resolve = |n: i64| if n < 0 { count + n + 1 } else { n };
        let (a, b) = (resolve(start), resolve(end));
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        if hi < 1 || lo > count {
            return Vec::new();
        }
        let lo = lo.max(1) as usize;
        let hi = hi.min(count) as usize;
        self.line_spans[lo - 1..hi]
            .iter()
            .map(|&(s, e)| self.text[s..e].to_string())
            .collect()
    }

    pub fn stats(&self) -> DocumentStats {
        let n = self.line_spans.len();
        let window = |from: usize| -> Vec<String> {
            self.line_spans[from..(from + 5).min(n)]
                .iter()
                .map(|&(s, e)| self.text[s..e].to_string())
                .collect()
        };
        let start = window(0);
        let middle = window((n / 2).saturating_sub(2).min(n.saturating_sub(1)));
        let end = window(n.saturating_sub(5));
        DocumentStats {
            length: self.text.len(),
            line_count: n,
            sample: SampleWindows { start, middle, end },
        }
    }

    /// Run a regex over the whole document. Zero-width matches advance one
    /// position per step, so an empty pattern yields one hit per boundary.
    pub fn grep(&self, pattern: &str, flags: GrepFlags) -> EngineResult<Vec<GrepHit>> {
        let mut inline = String::new();
        if flags.case_insensitive {
            inline.push('i');
        }
        if flags.multiline {
            inline.push('m');
        }
        let compiled = if inline.is_empty() {
            pattern.to_string()
        } else {
            format!("(?{inline}){pattern}")
        };
        let re = Regex::new(&compiled).map_err(|e| EngineError::Regex {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })?;

        let mut hits = Vec::new();
        for caps in re.captures_iter(&self.text) {
            let m = caps.get(0).expect("group 0 always participates");
            let (line_num, line) = self.line_at_offset(m.start());
            hits.push(GrepHit {
                matched: m.as_str().to_string(),
                line,
                line_num,
                index: m.start() as u32,
                groups: (1..caps.len())
                    .map(|g| caps.get(g).map(|c| c.as_str().to_string()).unwrap_or_default())
                    .collect(),
            });
            if !flags.global {
                break;
            }
        }
        Ok(hits)
    }

    /// Top-`limit` fuzzy hits over distinct lines.
    ///
    /// Scoring is stable and documented: a case-folded substring match
    /// scores 0; otherwise the score is the edit distance between the query
    /// and the best-matching contiguous window of the line, plus
    /// 0.25 × (window length − query length) when the window is longer.
    /// Ties break toward the smaller line number.
    pub fn fuzzy(&self, query: &str, limit: usize) -> Vec<FuzzyHit> {
        let folded_query: Vec<char> = query.to_lowercase().chars().collect();
        let query_str: String = folded_query.iter().collect();

        let mut seen: HashSet<String> = HashSet::new();
        let mut hits: Vec<FuzzyHit> = Vec::new();
        for (i, &(s, e)) in self.line_spans.iter().enumerate() {
            let line = &self.text[s..e];
            let folded = line.to_lowercase();
            if !seen.insert(folded.clone()) {
                continue;
            }
            let score = if folded.contains(&query_str) {
                0.0
            } else {
                substring_distance(&folded_query, &folded)
            };
            hits.push(FuzzyHit {
                line: line.to_string(),
                line_num: (i + 1) as u32,
                score,
            });
        }
        hits.sort_by(|a, b| {
            a.score
                .partial_cmp(&b.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.line_num.cmp(&b.line_num))
        });
        hits.truncate(limit);
        hits
    }

    fn line_at_offset(&self, offset: usize) -> (u32, String) {
        if self.line_spans.is_empty() {
            return (1, String::new());
        }
        let idx = self
            .line_spans
            .partition_point(|&(s, _)| s <= offset)
            .saturating_sub(1);
        let (s, e) = self.line_spans[idx];
        ((idx + 1) as u32, self.text[s..e].to_string())
    }
}

fn index_lines(text: &str) -> Vec<(usize, usize)> {
    let bytes = text.as_bytes();
    let mut spans = Vec::new();
    let mut start = 0;
    for (i, &b) in bytes.iter().enumerate() {
        if b == b'\n' {
            let mut end = i;
            if end > start && bytes[end - 1] == b'\r' {
                end -= 1;
            }
            spans.push((start, end));
            start = i + 1;
        }
    }
    if start < text.len() {
        spans.push((start, text.len()));
    }
    spans
}

/// Minimum edit distance between `query` and any contiguous window of
/// `line`, with the window-length penalty folded in. Start-of-window is
/// free: the DP's first row is all zeros.
fn substring_distance(query: &[char], line: &str) -> f64 {
    let text: Vec<char> = line.chars().collect();
    let m = query.len();
    let n = text.len();
    if m == 0 {
        return 0.0;
    }
    if n == 0 {
        return m as f64;
    }

    // (cost, window_start) per column; row 0 starts a window at every j.
    let mut prev: Vec<(usize, usize)> = (0..=n).map(|j| (0, j)).collect();
    for i in 1..=m {
        let mut cur: Vec<(usize, usize)> = Vec::with_capacity(n + 1);
        cur.push((i, 0));
        for j in 1..=n {
            let subst_cost = if query[i - 1] == text[j - 1] { 0 } else { 1 };
            let mut best = (prev[j - 1].0 + subst_cost, prev[j - 1].1);
            let delete = (prev[j].0 + 1, prev[j].1);
            if delete.0 < best.0 {
                best = delete;
            }
            let insert = (cur[j - 1].0 + 1, cur[j - 1].1);
            if insert.0 < best.0 {
                best = insert;
            }
            cur.push(best);
        }
        prev = cur;
    }

    let mut best = f64::MAX;
    for (j, &(cost, start)) in prev.iter().enumerate() {
        let window = j.saturating_sub(start);
        let penalty = 0.25 * (window as f64 - m as f64).max(0.0);
        let score = cost as f64 + penalty;
        if score < best {
            best = score;
        }
    }
    best
}
