use regex::Regex;

/// Coerces a numeric text field from an external table into a float.
///
/// Instrument exports and report tables carry values like `"12.3 min"`,
/// `">99.5"` or `"1,000"`; everything except digits, dots and signs is
/// stripped before parsing. Fields with no parsable numeric content yield
/// `None` instead of a silent default, so missing data stays visible to the
/// caller.
pub fn parse_numeric(field: &str) -> Option<f64> {
    let pattern = Regex::new(r"[^0-9eE.+-]+").unwrap();
    let cleaned = pattern.replace_all(field.trim(), "");
    cleaned.parse::<f64>().ok()
}

/// `parse_numeric` with a fallback for callers that need a value either way.
pub fn parse_numeric_or(field: &str, default: f64) -> f64 {
    parse_numeric(field).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_number() {
        assert_eq!(parse_numeric("12.34"), Some(12.34));
        assert_eq!(parse_numeric("  -5.5 "), Some(-5.5));
    }

    #[test]
    fn test_parse_with_units_and_separators() {
        assert_eq!(parse_numeric("12.3 min"), Some(12.3));
        assert_eq!(parse_numeric("1,000"), Some(1000.0));
        assert_eq!(parse_numeric(">99.5"), Some(99.5));
    }

    #[test]
    fn test_parse_invalid_is_none() {
        assert_eq!(parse_numeric(""), None);
        assert_eq!(parse_numeric("N/A"), None);
        assert_eq!(parse_numeric("1.2.3"), None);
    }

    #[test]
    fn test_parse_or_default() {
        assert_eq!(parse_numeric_or("no value", 7.5), 7.5);
        assert_eq!(parse_numeric_or("3.0", 7.5), 3.0);
    }
}
