use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};

use adrecon::reconcile::{RunSummary, reconcile};
use adrecon_core::{BreakdownBuilder, NetworkFetcher};
use adrecon_max::{MaxComparisonRow, MediatorBreakdown};
use adrecon_types::delta::{calculate_ecpm, format_delta};
use adrecon_types::{AdType, Network, Platform};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let day: NaiveDate = "2026-01-08".parse()?;

    // 1. A MAX baseline as the mediator would report it.
    let mediator = MediatorBreakdown {
        totals: BreakdownBuilder::new(Network::Applovin).finish(day, day),
        comparison_rows: vec![
            MaxComparisonRow {
                date: day,
                application: "MyApp (iOS)".into(),
                platform: Platform::Ios,
                network: Network::Unity,
                ad_type: AdType::Rewarded,
                impressions: 10_000,
                revenue: 50.0,
                ecpm: calculate_ecpm(50.0, 10_000),
            },
            MaxComparisonRow {
                date: day,
                application: "MyApp (iOS)".into(),
                platform: Platform::Ios,
                network: Network::Pangle,
                ad_type: AdType::Interstitial,
                impressions: 6000,
                revenue: 30.0,
                ecpm: calculate_ecpm(30.0, 6000),
            },
        ],
        unresolved_networks: 0,
        columns_used: "day,package_name,network,ad_format,estimated_revenue,impressions,platform"
            .into(),
    };

    // 2. Network-side breakdowns from the mock fetchers: Unity answers,
    //    Pangle has nothing for the placement.
    let unity = adrecon_mock::single_cell(
        Network::Unity,
        day,
        Platform::Ios,
        AdType::Rewarded,
        48.5,
        9800,
    )
    .without_daily_split();

    let mut results = BTreeMap::new();
    results.insert(Network::Unity, unity.fetch(day, day).await);

    // 3. Join the two sides.
    let mut summary = RunSummary::new(day, day);
    let rows = reconcile(&mediator, &results, day, day, Utc::now(), &mut summary);

    // 4. Print the comparison.
    for row in &rows {
        println!(
            "{} {} {} {:<14} max ${:>8.2} vs net ${:>8.2}  rev {}",
            row.date,
            row.network,
            row.platform,
            row.ad_type.to_string(),
            row.max_revenue,
            row.network_revenue,
            format_delta(row.rev_delta_pct),
        );
    }

    Ok(())
}
