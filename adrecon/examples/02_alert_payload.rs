use chrono::{NaiveDate, Utc};

use adrecon::ComparisonRow;
use adrecon::alert::build_payload;
use adrecon::reconcile::{NetworkStatus, RunSummary};
use adrecon_types::config::{AlertingConfig, ValidationConfig};
use adrecon_types::{AdType, Network, Platform};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let day: NaiveDate = "2026-01-08".parse()?;
    let fetched_at = Utc::now();

    // A breaching Unity placement next to a quiet Meta one.
    let rows = vec![
        ComparisonRow::build(
            day,
            Network::Unity,
            Platform::Ios,
            AdType::Rewarded,
            "MyApp (iOS)".into(),
            200.0,
            40_000,
            Some((150.0, 30_000)),
            None,
            fetched_at,
        ),
        ComparisonRow::build(
            day,
            Network::Meta,
            Platform::Android,
            AdType::Banner,
            "MyApp (Android)".into(),
            80.0,
            160_000,
            Some((79.0, 158_000)),
            None,
            fetched_at,
        ),
    ];

    let mut summary = RunSummary::new(day, day);
    for row in &rows {
        summary.networks.insert(
            row.network,
            NetworkStatus {
                network: row.network,
                ok: true,
                error_class: None,
                error: None,
                last_available_date: Some(day),
            },
        );
    }

    let payload = build_payload(
        &rows,
        &summary,
        &ValidationConfig::default(),
        &AlertingConfig::default(),
        Utc::now(),
        None,
    );

    println!("{}", serde_json::to_string_pretty(&payload)?);
    Ok(())
}
