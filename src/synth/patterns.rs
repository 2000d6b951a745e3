//! The fixed extraction-pattern catalog candidates draw from. Order is part
//! of the engine's determinism contract; append, don't reorder.

pub struct ExtractionPattern {
    pub name: &'static str,
    pub pattern: &'static str,
}

/// General value-shaped patterns; every one exposes group 1.
pub const EXTRACTION_PATTERNS: &[ExtractionPattern] = &[
    ExtractionPattern {
        name: "currency_decimal",
        pattern: r"\$\s*([\d,]+\.\d+)",
    },
    ExtractionPattern {
        name: "currency",
        pattern: r"\$\s*([\d,]+)",
    },
    ExtractionPattern {
        name: "eu_currency",
        pattern: r"[€£]\s*([\d.,]+)",
    },
    ExtractionPattern {
        name: "percentage",
        pattern: r"(-?[\d.]+)\s*%",
    },
    ExtractionPattern {
        name: "float",
        pattern: r"(-?\d+\.\d+)",
    },
    ExtractionPattern {
        name: "integer",
        pattern: r"(-?\d[\d,]*)",
    },
    ExtractionPattern {
        name: "key_value_number",
        pattern: r":\s*\$?\s*(-?[\d,.]+)",
    },
    ExtractionPattern {
        name: "key_value_suffix",
        pattern: r":\s*(.+)$",
    },
    ExtractionPattern {
        name: "quarter",
        pattern: r"(Q[1-4])[-/\s](\d{4})",
    },
    ExtractionPattern {
        name: "quoted",
        pattern: r#""([^"]*)""#,
    },
    ExtractionPattern {
        name: "word",
        pattern: r"([A-Za-z]+)",
    },
];

/// Date-shaped patterns, used with group 0 in front of `parseDate`.
pub const DATE_PATTERNS: &[ExtractionPattern] = &[
    ExtractionPattern {
        name: "iso_date",
        pattern: r"\d{4}-\d{2}-\d{2}",
    },
    ExtractionPattern {
        name: "slash_date",
        pattern: r"\d{1,2}/\d{1,2}/\d{4}",
    },
    ExtractionPattern {
        name: "month_name_date",
        pattern: r"[A-Za-z]{3,9}\.?\s+\d{1,2},?\s+\d{4}",
    },
    ExtractionPattern {
        name: "day_month_name_date",
        pattern: r"\d{1,2}\s+[A-Za-z]{3,9}\s+\d{4}",
    },
    ExtractionPattern {
        name: "day_abbrev_year",
        pattern: r"\d{1,2}-[A-Za-z]{3}-\d{2}",
    },
];

pub const SPLIT_DELIMITERS: &[&str] = &[":", ",", " ", "|", "=", "\t"];

pub const SPLIT_INDEXES: &[i64] = &[0, 1, 2, -1];

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn every_pattern_compiles() {
        for p in EXTRACTION_PATTERNS.iter().chain(DATE_PATTERNS) {
            assert!(Regex::new(p.pattern).is_ok(), "{} does not compile", p.name);
        }
    }

    #[test]
    fn extraction_patterns_have_a_group() {
        for p in EXTRACTION_PATTERNS {
            let re = Regex::new(p.pattern).unwrap();
            assert!(re.captures_len() >= 2, "{} lacks group 1", p.name);
        }
    }

    #[test]
    fn currency_pattern_pulls_digits() {
        let re = Regex::new(EXTRACTION_PATTERNS[1].pattern).unwrap();
        let caps = re.captures("total $1,234 due").unwrap();
        assert_eq!(&caps[1], "1,234");
    }
}
