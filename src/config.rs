use serde::{Deserialize, Serialize};

use crate::document::GrepFlags;

/// Engine-wide knobs. Every field has a sensible default so embedders can
/// deserialize partial configs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How many `_k` history slots to keep.
    #[serde(default = "default_history_depth")]
    pub history_depth: usize,
    /// Synthesis search budget.
    #[serde(default = "default_max_candidates")]
    pub max_candidates: usize,
    /// `fuzzy-search` limit when none is given.
    #[serde(default = "default_fuzzy_limit")]
    pub default_fuzzy_limit: usize,
    /// Elements shown before a list preview truncates.
    #[serde(default = "default_preview_list_cap")]
    pub preview_list_cap: usize,
    /// Bytes shown before a string preview truncates.
    #[serde(default = "default_preview_string_cap")]
    pub preview_string_cap: usize,
    #[serde(default)]
    pub grep_flags: GrepFlags,
}

fn default_history_depth() -> usize {
    32
}

fn default_max_candidates() -> usize {
    100
}

fn default_fuzzy_limit() -> usize {
    10
}

fn default_preview_list_cap() -> usize {
    20
}

fn default_preview_string_cap() -> usize {
    4096
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            history_depth: default_history_depth(),
            max_candidates: default_max_candidates(),
            default_fuzzy_limit: default_fuzzy_limit(),
            preview_list_cap: default_preview_list_cap(),
            preview_string_cap: default_preview_string_cap(),
            grep_flags: GrepFlags::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.history_depth, 32);
        assert_eq!(config.max_candidates, 100);
        assert_eq!(config.default_fuzzy_limit, 10);
        assert_eq!(config.preview_list_cap, 20);
        assert_eq!(config.preview_string_cap, 4096);
        assert!(config.grep_flags.case_insensitive);
    }

    #[test]
    fn partial_config_deserializes() {
        let config: EngineConfig = serde_json::from_str(r#"{"history_depth": 8}"#).unwrap();
        assert_eq!(config.history_depth, 8);
        assert_eq!(config.max_candidates, 100);
    }
}
