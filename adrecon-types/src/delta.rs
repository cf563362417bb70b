//! Delta-percentage grammar and shared metric arithmetic.
//!
//! This module is the only place where delta percentages are converted
//! between their numeric and serialized forms, and the only place where
//! eCPM is derived. Inside the system a delta is `Option<f64>`: `None` is
//! the null sentinel for "no comparable value" and is distinct from `0.0`.

use serde_json::Value;

/// Compute eCPM (revenue per thousand impressions), rounded to cents.
///
/// Returns `0.0` when there are no impressions.
#[must_use]
pub fn calculate_ecpm(revenue: f64, impressions: i64) -> f64 {
    if impressions <= 0 {
        return 0.0;
    }
    round2(revenue / impressions as f64 * 1000.0)
}

/// Signed percentage delta of `value` against `base`.
///
/// `None` when the base is zero; the comparison is undefined rather than
/// infinite in the data path (the `∞` spelling exists only for display).
#[must_use]
pub fn calculate_delta(base: f64, value: f64) -> Option<f64> {
    if base == 0.0 {
        return None;
    }
    Some((value - base) / base * 100.0)
}

/// Round to two decimal places.
#[must_use]
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Parse a serialized delta into the numeric domain.
///
/// Accepts `"+5.2%"`, `"-3.1%"`, bare numbers, and the null spellings
/// `"N/A"`, `"-"` and empty (→ `None`). `"∞"`/`"inf"` map to the matching
/// infinity so historical exports stay readable.
#[must_use]
pub fn parse_delta_pct(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().trim_end_matches('%').trim_start_matches('+').trim();
    if cleaned.is_empty() {
        return None;
    }
    match cleaned {
        "N/A" | "n/a" | "-" => return None,
        _ => {}
    }
    let lower = cleaned.to_ascii_lowercase();
    if lower.contains('∞') || lower.contains("inf") {
        return Some(if lower.starts_with('-') {
            f64::NEG_INFINITY
        } else {
            f64::INFINITY
        });
    }
    cleaned.parse::<f64>().ok()
}

/// Render a delta for display: explicit `+` sign, one decimal, `∞` literals,
/// `N/A` for the null sentinel.
#[must_use]
pub fn format_delta(delta: Option<f64>) -> String {
    match delta {
        None => "N/A".to_string(),
        Some(d) if d == f64::INFINITY => "∞".to_string(),
        Some(d) if d == f64::NEG_INFINITY => "-∞".to_string(),
        Some(d) if d > 0.0 => format!("+{d:.1}%"),
        Some(d) => format!("{d:.1}%"),
    }
}

/// Defensive float coercion for JSON payloads.
///
/// Several networks return metrics as numbers, several as numeric strings,
/// and a few omit the field entirely; anything unparseable counts as zero.
#[must_use]
pub fn coerce_f64(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().replace(',', "").parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// Defensive integer coercion for JSON payloads; see [`coerce_f64`].
#[must_use]
pub fn coerce_i64(value: Option<&Value>) -> i64 {
    match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .unwrap_or(0),
        Some(Value::String(s)) => {
            let trimmed = s.trim().replace(',', "");
            trimmed
                .parse::<i64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().map(|f| f.round() as i64))
                .unwrap_or(0)
        }
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn ecpm_basics() {
        assert_eq!(calculate_ecpm(100.0, 50_000), 2.0);
        assert_eq!(calculate_ecpm(100.0, 0), 0.0);
        assert_eq!(calculate_ecpm(0.0, 1000), 0.0);
    }

    #[test]
    fn delta_null_on_zero_base() {
        assert_eq!(calculate_delta(0.0, 100.0), None);
        assert_eq!(calculate_delta(100.0, 110.0), Some(10.0));
        let d = calculate_delta(50.0, 48.5).unwrap();
        assert!((d - -3.0).abs() < 1e-9);
    }

    #[test]
    fn grammar_round_trips() {
        assert_eq!(parse_delta_pct("+10.5%"), Some(10.5));
        assert_eq!(parse_delta_pct("-5.2%"), Some(-5.2));
        assert_eq!(parse_delta_pct("3.4"), Some(3.4));
        assert_eq!(parse_delta_pct("N/A"), None);
        assert_eq!(parse_delta_pct("-"), None);
        assert_eq!(parse_delta_pct(""), None);
        assert_eq!(parse_delta_pct("∞"), Some(f64::INFINITY));
        assert_eq!(parse_delta_pct("-inf"), Some(f64::NEG_INFINITY));

        assert_eq!(format_delta(Some(10.5)), "+10.5%");
        assert_eq!(format_delta(Some(-5.2)), "-5.2%");
        assert_eq!(format_delta(None), "N/A");
        assert_eq!(format_delta(Some(f64::INFINITY)), "∞");
    }

    #[test]
    fn coercion_accepts_strings_and_numbers() {
        assert_eq!(coerce_f64(Some(&json!(1.5))), 1.5);
        assert_eq!(coerce_f64(Some(&json!("1.5"))), 1.5);
        assert_eq!(coerce_f64(Some(&json!("1,234.5"))), 1234.5);
        assert_eq!(coerce_f64(Some(&json!(null))), 0.0);
        assert_eq!(coerce_f64(None), 0.0);

        assert_eq!(coerce_i64(Some(&json!(12))), 12);
        assert_eq!(coerce_i64(Some(&json!("12"))), 12);
        assert_eq!(coerce_i64(Some(&json!("9,800"))), 9800);
        assert_eq!(coerce_i64(Some(&json!("12.6"))), 13);
        assert_eq!(coerce_i64(Some(&json!(true))), 0);
    }
}
