use adrecon_types::delta::{calculate_delta, calculate_ecpm, format_delta, parse_delta_pct};
use proptest::prelude::*;

proptest! {
    #[test]
    fn delta_formats_parse_back(delta in -5000.0f64..5000.0) {
        let rendered = format_delta(Some(delta));
        let parsed = parse_delta_pct(&rendered).unwrap();
        // One decimal of display precision.
        prop_assert!((parsed - delta).abs() < 0.051, "{delta} -> {rendered} -> {parsed}");
    }

    #[test]
    fn delta_sign_follows_direction(base in 0.01f64..100_000.0, value in 0.0f64..100_000.0) {
        let delta = calculate_delta(base, value).unwrap();
        if value > base {
            prop_assert!(delta > 0.0);
        } else if value < base {
            prop_assert!(delta < 0.0);
        } else {
            prop_assert_eq!(delta, 0.0);
        }
    }

    #[test]
    fn ecpm_is_nonnegative_and_bounded(revenue in 0.0f64..1_000_000.0, impressions in 1i64..1_000_000_000) {
        let ecpm = calculate_ecpm(revenue, impressions);
        prop_assert!(ecpm >= 0.0);
        // Rounding to cents can only move the value by half a cent.
        let exact = revenue / impressions as f64 * 1000.0;
        prop_assert!((ecpm - exact).abs() <= 0.005 + f64::EPSILON * exact.abs());
    }
}

#[test]
fn zero_base_is_null_not_infinite() {
    assert_eq!(calculate_delta(0.0, 42.0), None);
    assert_eq!(format_delta(calculate_delta(0.0, 42.0)), "N/A");
}
