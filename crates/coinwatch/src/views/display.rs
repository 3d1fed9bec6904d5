use crate::models::Currency;

pub const NOT_AVAILABLE: &str = "N/A";

/// Groups thousands and keeps at most three decimals. Missing or zero
/// figures (the backend substitutes 0 for unknown market caps) read "N/A".
pub fn format_amount(value: Option<f64>) -> String {
    match value {
        Some(v) if v != 0.0 && v.is_finite() => group_thousands(v, 3),
        _ => NOT_AVAILABLE.to_string(),
    }
}

pub fn format_money(currency: &Currency, value: Option<f64>) -> String {
    match value {
        Some(v) if v != 0.0 && v.is_finite() => format!("{}{}", currency.symbol, group_thousands(v, 3)),
        _ => NOT_AVAILABLE.to_string(),
    }
}

pub fn format_rank(rank: Option<u32>) -> String {
    rank.map(|r| r.to_string())
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

pub fn format_change(pct: Option<f64>) -> String {
    match pct {
        Some(p) if p.is_finite() => format!("{p:+.2}%"),
        _ => NOT_AVAILABLE.to_string(),
    }
}

fn group_thousands(value: f64, max_decimals: usize) -> String {
    let formatted = format!("{:.*}", max_decimals, value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((&formatted, ""));
    let frac_part = frac_part.trim_end_matches('0');

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && (int_part != "0" || !frac_part.is_empty()) { "-" } else { "" };
    if frac_part.is_empty() {
        format!("{sign}{grouped}")
    } else {
        format!("{sign}{grouped}.{frac_part}")
    }
}
