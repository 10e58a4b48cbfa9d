/// Currency symbol used by the admin list columns.
pub const CURRENCY_SYMBOL: &str = "£";

/// Renders a raw attribute value as a currency cell: `£` plus a
/// thousands-grouped number with two decimals. Absent or non-numeric values
/// render as `£0.00`.
pub fn format_currency(raw: Option<&str>) -> String {
    let value = raw
        .and_then(|text| text.trim().parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(0.0);
    let sign = if value < 0.0 { "-" } else { "" };
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some(parts) => parts,
        None => (fixed.as_str(), "00"),
    };
    format!(
        "{CURRENCY_SYMBOL}{sign}{}.{frac_part}",
        group_thousands(int_part)
    )
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    let offset = digits.len() % 3;
    for (idx, ch) in digits.chars().enumerate() {
        if idx > 0 && idx % 3 == offset % 3 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
