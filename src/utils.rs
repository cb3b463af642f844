// Utility functions
use chrono::NaiveDate;

/// Parses a strict `YYYY-MM-DD` calendar date.
pub fn parse_iso_date(date_str: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d").ok()
}

/// Parses a monetary amount such as `"$2,000"` or `"949.99"`.
pub fn parse_amount(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Collapses runs of whitespace inside a line and drops blank lines.
pub fn tidy_text<'a>(fragments: impl IntoIterator<Item = &'a str>) -> String {
    fragments
        .into_iter()
        .map(|fragment| fragment.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turns a label into a file-name friendly slug.
pub fn to_kebab_case(text: &str) -> String {
    text.trim().to_lowercase().replace(' ', "-")
}
