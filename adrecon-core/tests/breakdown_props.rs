use adrecon_core::BreakdownBuilder;
use adrecon_types::{AdType, Network, Platform};
use chrono::NaiveDate;
use proptest::prelude::*;

fn arb_platform() -> impl Strategy<Value = Platform> {
    prop_oneof![Just(Platform::Android), Just(Platform::Ios)]
}

fn arb_ad_type() -> impl Strategy<Value = AdType> {
    prop_oneof![
        Just(AdType::Banner),
        Just(AdType::Interstitial),
        Just(AdType::Rewarded)
    ]
}

proptest! {
    // Platform totals must equal the sum of their ad-type cells, and the
    // overall totals the sum of the platform totals, within cent rounding.
    #[test]
    fn accumulation_levels_agree(
        rows in prop::collection::vec(
            (arb_platform(), arb_ad_type(), 0.0f64..500.0, 0i64..100_000),
            0..40,
        )
    ) {
        let mut builder = BreakdownBuilder::new(Network::Unity);
        for (platform, ad_type, revenue, impressions) in &rows {
            builder.record(*platform, *ad_type, *revenue, *impressions);
        }
        let start = NaiveDate::from_ymd_opt(2026, 1, 8).unwrap();
        let out = builder.finish(start, start);

        for (_, scope) in out.platforms.iter() {
            let cell_rev: f64 = scope.ad_totals.iter().map(|(_, m)| m.revenue).sum();
            let cell_imp: i64 = scope.ad_totals.iter().map(|(_, m)| m.impressions).sum();
            prop_assert!((scope.revenue - cell_rev).abs() <= 0.01 + 1e-9);
            prop_assert_eq!(scope.impressions, cell_imp);
        }

        let plat_rev: f64 = out.platforms.iter().map(|(_, s)| s.revenue).sum();
        let plat_imp: i64 = out.platforms.iter().map(|(_, s)| s.impressions).sum();
        prop_assert!((out.revenue - plat_rev).abs() <= 0.02 + 1e-9);
        prop_assert_eq!(out.impressions, plat_imp);
    }

    // eCPM at every level is exactly 1000 * revenue / impressions of that
    // level (to cent rounding), and zero where there are no impressions.
    #[test]
    fn ecpm_derivation_holds(
        rows in prop::collection::vec(
            (arb_platform(), arb_ad_type(), 0.0f64..500.0, 0i64..100_000),
            0..20,
        )
    ) {
        let mut builder = BreakdownBuilder::new(Network::Moloco);
        for (platform, ad_type, revenue, impressions) in &rows {
            builder.record(*platform, *ad_type, *revenue, *impressions);
        }
        let start = NaiveDate::from_ymd_opt(2026, 1, 8).unwrap();
        let out = builder.finish(start, start);

        // Revenue is rounded to cents after eCPM derivation, so allow the
        // half-cent-per-impression slack that rounding can introduce.
        let check = |revenue: f64, impressions: i64, ecpm: f64| {
            if impressions > 0 {
                let exact = revenue / impressions as f64 * 1000.0;
                (ecpm - exact).abs() <= 5.0 / impressions as f64 + 0.01
            } else {
                ecpm == 0.0
            }
        };

        prop_assert!(check(out.revenue, out.impressions, out.ecpm));
        for (_, scope) in out.platforms.iter() {
            prop_assert!(check(scope.revenue, scope.impressions, scope.ecpm));
            for (_, cell) in scope.ad_totals.iter() {
                prop_assert!(check(cell.revenue, cell.impressions, cell.ecpm));
            }
        }
    }
}
