use broadcaster_core::CellValue;

/// Country code used when none is configured.
pub const DEFAULT_COUNTRY_CODE: &str = "+91";

/// Digits kept from the end of a phone number.
const SUBSCRIBER_DIGITS: usize = 10;

/// Normalizes a raw `telegram_id` cell to `{country_code}{last 10 digits}`.
///
/// Numeric coercion runs before the raw-string fallback, so spreadsheet
/// floats such as `919876543210.0` come out as `919876543210` instead of
/// gaining a trailing zero digit. Returns `None` for empty cells and for
/// values with fewer than ten digits.
pub fn normalize_phone(cell: &CellValue, country_code: &str) -> Option<String> {
    let raw = match cell {
        CellValue::Empty => return None,
        CellValue::Text(text) if text.is_empty() => return None,
        CellValue::Integer(n) => n.to_string(),
        CellValue::Number(n) => integer_string(*n).unwrap_or_else(|| n.to_string()),
        CellValue::Bool(b) => u8::from(*b).to_string(),
        CellValue::Text(text) => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(integer_string)
            .unwrap_or_else(|| text.clone()),
    };

    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() < SUBSCRIBER_DIGITS {
        return None;
    }
    Some(format!(
        "{country_code}{}",
        &digits[digits.len() - SUBSCRIBER_DIGITS..]
    ))
}

/// Truncates a finite float and prints it without a fractional part.
fn integer_string(value: f64) -> Option<String> {
    value.is_finite().then(|| format!("{:.0}", value.trunc()))
}
