//! Canonical text form of raw response codes.
//!
//! Extracts are inconsistent about numeric formatting (`1`, `1.0`, ` 01`), so
//! every lookup into a sentinel, level or custom map goes through
//! [`normalize_code`] first.

/// Normalize a raw cell into its canonical code text.
///
/// Returns `None` for empty cells. Integral numbers lose leading zeros and
/// trailing fractional zeros; other text is only trimmed.
///
/// ```
/// use survey_model::code::normalize_code;
///
/// assert_eq!(normalize_code(" 1.0 ").as_deref(), Some("1"));
/// assert_eq!(normalize_code("97").as_deref(), Some("97"));
/// assert_eq!(normalize_code("2.50").as_deref(), Some("2.5"));
/// assert_eq!(normalize_code("Agree").as_deref(), Some("Agree"));
/// assert_eq!(normalize_code("  "), None);
/// ```
pub fn normalize_code(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches('\u{feff}');
    if trimmed.is_empty() {
        return None;
    }
    match parse_number(trimmed) {
        Some(number) => Some(format_numeric(number)),
        None => Some(trimmed.to_string()),
    }
}

/// Parse numeric text, rejecting NaN and infinities.
pub fn parse_number(value: &str) -> Option<f64> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Formats a floating-point number as a string without trailing zeros.
pub fn format_numeric(v: f64) -> String {
    if v.fract() == 0.0 && v.abs() < 1e15 {
        return format!("{}", v as i64);
    }
    let s = format!("{v}");
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        s
    }
}
