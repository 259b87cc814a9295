use std::sync::LazyLock;

use regex::Regex;

use crate::table::{ColumnData, RowKey};

/// Trailing catalogue code such as `-0701012400`.
static CATALOGUE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(\d{10,})").expect("valid regex"));
/// Any digit run, allowing dotted groups (`1.2.3`).
static DIGITS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+(?:\.\d+)*)").expect("valid regex"));

/// Normalize a raw product identifier.
///
/// Prefers a dash-prefixed run of at least ten digits, then the first digit
/// run, then the trimmed text itself.
pub fn product_key(raw: &str) -> String {
    if let Some(code) = CATALOGUE_CODE.captures(raw).and_then(|c| c.get(1)) {
        return code.as_str().to_string();
    }
    if let Some(digits) = DIGITS.captures(raw).and_then(|c| c.get(1)) {
        return digits.as_str().to_string();
    }
    raw.trim().to_string()
}

/// Row keys from an identifier column. Missing identifiers fall back to the
/// row position.
pub fn row_keys_from(column: &ColumnData) -> Vec<RowKey> {
    match column {
        ColumnData::Text(values) => values
            .iter()
            .enumerate()
            .map(|(row, v)| match v.as_deref().map(str::trim) {
                Some(raw) if !raw.is_empty() => RowKey::Product(product_key(raw)),
                _ => RowKey::Position(row),
            })
            .collect(),
        ColumnData::Num(values) => values
            .iter()
            .enumerate()
            .map(|(row, v)| match v {
                Some(n) if n.is_finite() => RowKey::Product(number_code(*n)),
                _ => RowKey::Position(row),
            })
            .collect(),
    }
}

/// Render a numeric identifier cell as a code, without a trailing `.0`.
pub(crate) fn number_code(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}
