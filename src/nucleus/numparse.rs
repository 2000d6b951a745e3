//! Numeric and date parsers. Permissive on input, `None` on anything
//! unrecognized; callers surface `None` as null.

use chrono::NaiveDate;

use super::value::Value;

/// Decimal integer with optional leading minus; commas stripped.
pub fn parse_int(s: &str) -> Option<i64> {
    let t = s.trim().replace(',', "");
    let digits = t.strip_prefix('-').unwrap_or(&t);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    t.parse().ok()
}

/// Permissive float: decimal point, scientific notation, commas stripped.
pub fn parse_float(s: &str) -> Option<f64> {
    let t = s.trim().replace(',', "");
    if t.is_empty() {
        return None;
    }
    // f64's parser accepts "inf"/"nan"; those are not numbers here.
    if !t.bytes().any(|b| b.is_ascii_digit()) {
        return None;
    }
    t.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Currency amount: one leading symbol stripped, `(X)` = `-X`, and the
/// US-vs-EU thousands/decimal convention detected from the position of the
/// last `,` relative to the last `.`. Integral literals (no decimal
/// separator) come back as Int, everything else as Float.
pub fn parse_currency(s: &str) -> Option<Value> {
    let mut t = s.trim();

    let mut negative = false;
    if t.starts_with('(') && t.ends_with(')') && t.len() >= 2 {
        negative = true;
        t = t[1..t.len() - 1].trim();
    }

    let mut chars = t.chars();
    if let Some(first) = chars.next() {
        if matches!(first, '$' | '€' | '£' | '¥') {
            t = chars.as_str().trim_start();
        }
    }

    if let Some(rest) = t.strip_prefix('-') {
        negative = !negative;
        t = rest.trim_start();
    }

    if t.is_empty() || !t.bytes().all(|b| b.is_ascii_digit() || b == b',' || b == b'.') {
        return None;
    }

    let last_comma = t.rfind(',');
    let last_dot = t.rfind('.');
    let (normalized, fractional) = match (last_comma, last_dot) {
        (Some(c), Some(d)) if c > d => {
            // EU: dots group thousands, comma is the decimal mark.
            (t.replace('.', "").replace(',', "."), true)
        }
        (Some(_), Some(_)) => (t.replace(',', ""), true),
        (Some(c), None) => {
            // A lone comma followed by exactly three digits reads as a
            // thousands separator; anything else is an EU decimal mark.
            let after = t.len() - c - 1;
            if after == 3 && t.matches(',').count() >= 1 && !t[..c].is_empty() {
                (t.replace(',', ""), false)
            } else {
                (t.replace(',', "."), true)
            }
        }
        (None, Some(_)) => {
            if t.matches('.').count() > 1 {
                // Multiple dots can only be EU thousands grouping.
                (t.replace('.', ""), false)
            } else {
                (t.to_string(), true)
            }
        }
        (None, None) => (t.to_string(), false),
    };

    let v: f64 = normalized.parse::<f64>().ok().filter(|v| v.is_finite())?;
    let v = if negative { -v } else { v };
    if fractional {
        Some(Value::Float(v))
    } else {
        Some(Value::Int(v as i64))
    }
}

/// `%` suffix divides by 100; otherwise as `parse_float`.
pub fn parse_number(s: &str) -> Option<f64> {
    let t = s.trim();
    if let Some(body) = t.strip_suffix('%') {
        return parse_float(body).map(|v| v / 100.0);
    }
    parse_float(t)
}

/// Recognized date shapes, normalized to `YYYY-MM-DD`. `fmt` selects the
/// slash convention: `US` = MM/DD/YYYY, `EU` = DD/MM/YYYY (US when absent).
pub fn parse_date(s: &str, fmt: Option<&str>) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    let eu = fmt.is_some_and(|f| f.eq_ignore_ascii_case("EU"));

    let date = iso(t)
        .or_else(|| slash(t, eu))
        .or_else(|| month_name(t))
        .or_else(|| day_month_name(t))
        .or_else(|| day_abbrev_year(t))?;
    Some(date.format("%Y-%m-%d").to_string())
}

fn iso(t: &str) -> Option<NaiveDate> {
    if t.len() == 10 && t.as_bytes()[4] == b'-' && t.as_bytes()[7] == b'-' {
        return NaiveDate::parse_from_str(t, "%Y-%m-%d").ok();
    }
    None
}

fn slash(t: &str, eu: bool) -> Option<NaiveDate> {
    if !t.contains('/') {
        return None;
    }
    let format = if eu { "%d/%m/%Y" } else { "%m/%d/%Y" };
    NaiveDate::parse_from_str(t, format).ok()
}

/// `Month D, YYYY` (full or abbreviated month, comma optional).
fn month_name(t: &str) -> Option<NaiveDate> {
    for format in ["%B %d, %Y", "%b %d, %Y", "%B %d %Y", "%b %d %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(t, format) {
            return Some(d);
        }
    }
    None
}

/// `D Month YYYY`.
fn day_month_name(t: &str) -> Option<NaiveDate> {
    for format in ["%d %B %Y", "%d %b %Y"] {
        if let Ok(d) = NaiveDate::parse_from_str(t, format) {
            return Some(d);
        }
    }
    None
}

/// `D-Mon-YY`; years below 50 land in 20YY, the rest in 19YY.
fn day_abbrev_year(t: &str) -> Option<NaiveDate> {
    let parts: Vec<&str> = t.split('-').collect();
    if parts.len() != 3 {
        return None;
    }
    let day: u32 = parts[0].parse().ok()?;
    let month = month_from_abbrev(parts[1])?;
    let yy: i32 = parts[2].parse().ok()?;
    if parts[2].len() != 2 {
        return None;
    }
    let year = if yy < 50 { 2000 + yy } else { 1900 + yy };
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_from_abbrev(s: &str) -> Option<u32> {
    match s.to_ascii_lowercase().as_str() {
        "jan" => Some(1),
        "feb" => Some(2),
        "mar" => Some(3),
        "apr" => Some(4),
        "may" => Some(5),
        "jun" => Some(6),
        "jul" => Some(7),
        "aug" => Some(8),
        "sep" => Some(9),
        "oct" => Some(10),
        "nov" => Some(11),
        "dec" => Some(12),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int_basic() {
        assert_eq!(parse_int("42"), Some(42));
        assert_eq!(parse_int("-17"), Some(-17));
        assert_eq!(parse_int("1,234,567"), Some(1_234_567));
        assert_eq!(parse_int(" 99 "), Some(99));
    }

    #[test]
    fn parse_int_rejects_non_integers() {
        assert_eq!(parse_int("12.5"), None);
        assert_eq!(parse_int("abc"), None);
        assert_eq!(parse_int(""), None);
        assert_eq!(parse_int("$5"), None);
    }

    #[test]
    fn parse_float_permissive() {
        assert_eq!(parse_float("3.5"), Some(3.5));
        assert_eq!(parse_float("-2"), Some(-2.0));
        assert_eq!(parse_float("1,234.5"), Some(1234.5));
        assert_eq!(parse_float("1e3"), Some(1000.0));
    }

    #[test]
    fn parse_float_rejects_junk() {
        assert_eq!(parse_float("inf"), None);
        assert_eq!(parse_float("nan"), None);
        assert_eq!(parse_float("abc"), None);
        assert_eq!(parse_float(""), None);
    }

    #[test]
    fn parse_currency_us() {
        assert_eq!(parse_currency("$1,000"), Some(Value::Int(1000)));
        assert_eq!(parse_currency("$2,340,000"), Some(Value::Int(2_340_000)));
        assert_eq!(parse_currency("$1,234.56"), Some(Value::Float(1234.56)));
        assert_eq!(parse_currency("1234.5"), Some(Value::Float(1234.5)));
    }

    #[test]
    fn parse_currency_eu() {
        assert_eq!(parse_currency("€1.234,56"), Some(Value::Float(1234.56)));
        assert_eq!(parse_currency("1.234.567"), Some(Value::Int(1_234_567)));
    }

    #[test]
    fn parse_currency_negatives() {
        assert_eq!(parse_currency("($1.234,56)"), Some(Value::Float(-1234.56)));
        assert_eq!(parse_currency("-$500"), Some(Value::Int(-500)));
        assert_eq!(parse_currency("($100)"), Some(Value::Int(-100)));
    }

    #[test]
    fn parse_currency_rejects_junk() {
        assert_eq!(parse_currency("hello"), None);
        assert_eq!(parse_currency("$"), None);
        assert_eq!(parse_currency(""), None);
    }

    #[test]
    fn parse_number_percent() {
        assert_eq!(parse_number("45%"), Some(0.45));
        assert_eq!(parse_number("-5%"), Some(-0.05));
        assert_eq!(parse_number("3.5"), Some(3.5));
        assert_eq!(parse_number("x%"), None);
    }

    #[test]
    fn parse_date_iso() {
        assert_eq!(parse_date("2024-03-15", None), Some("2024-03-15".into()));
        assert_eq!(parse_date("2024-13-01", None), None);
    }

    #[test]
    fn parse_date_slash_conventions() {
        assert_eq!(parse_date("03/04/2024", Some("US")), Some("2024-03-04".into()));
        assert_eq!(parse_date("03/04/2024", Some("EU")), Some("2024-04-03".into()));
        // FMT-less slash input reads as US.
        assert_eq!(parse_date("12/25/2024", None), Some("2024-12-25".into()));
    }

    #[test]
    fn parse_date_month_names() {
        assert_eq!(
            parse_date("March 5, 2024", None),
            Some("2024-03-05".into())
        );
        assert_eq!(parse_date("Jan 5, 2024", None), Some("2024-01-05".into()));
        assert_eq!(parse_date("5 March 2024", None), Some("2024-03-05".into()));
    }

    #[test]
    fn parse_date_abbrev_year_pivot() {
        assert_eq!(parse_date("15-Mar-24", None), Some("2024-03-15".into()));
        assert_eq!(parse_date("15-Mar-99", None), Some("1999-03-15".into()));
        assert_eq!(parse_date("15-Mar-49", None), Some("2049-03-15".into()));
        assert_eq!(parse_date("15-Mar-50", None), Some("1950-03-15".into()));
    }

    #[test]
    fn parse_date_validates_real_dates() {
        assert_eq!(parse_date("29-Feb-24", None), Some("2024-02-29".into()));
        assert_eq!(parse_date("30-Feb-24", None), None);
    }

    #[test]
    fn parse_date_unrecognized() {
        assert_eq!(parse_date("yesterday", None), None);
        assert_eq!(parse_date("", None), None);
    }
}
