use chrono::{NaiveDate, Utc};

use adrecon::ComparisonRow;
use adrecon::alert::{AlertHeader, Severity, build_error_payload, build_payload};
use adrecon::reconcile::{NetworkStatus, RunSummary};
use adrecon_types::config::{AlertingConfig, ValidationConfig};
use adrecon_types::{AdType, Network, Platform};

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn row(
    date: &str,
    network: Network,
    application: &str,
    max_revenue: f64,
    max_impressions: i64,
    network_side: Option<(f64, i64)>,
) -> ComparisonRow {
    ComparisonRow::build(
        d(date),
        network,
        Platform::Ios,
        AdType::Rewarded,
        application.to_string(),
        max_revenue,
        max_impressions,
        network_side,
        None,
        Utc::now(),
    )
}

fn summary_for(rows: &[ComparisonRow], start: &str, end: &str) -> RunSummary {
    let mut summary = RunSummary::new(d(start), d(end));
    for r in rows {
        summary.networks.entry(r.network).or_insert(NetworkStatus {
            network: r.network,
            ok: true,
            error_class: None,
            error: None,
            last_available_date: Some(d(end)),
        });
    }
    summary.row_count = rows.len();
    summary
}

fn validation() -> ValidationConfig {
    ValidationConfig {
        threshold_pct: 10.0,
        min_revenue_floor: 25.0,
        date_range_days: 7,
    }
}

#[test]
fn floor_keeps_small_rows_out_of_breaches() {
    // A 40% drift on $10 of revenue is noise, not a breach; the floor also
    // counts rows that never got network data.
    let rows = vec![
        row(
            "2026-01-08",
            Network::Unity,
            "MyApp (iOS)",
            10.0,
            2000,
            Some((6.0, 1200)),
        ),
        row("2026-01-08", Network::Unity, "Other App (iOS)", 4.0, 800, None),
    ];
    let summary = summary_for(&rows, "2026-01-08", "2026-01-08");

    let payload = build_payload(
        &rows,
        &summary,
        &validation(),
        &AlertingConfig::default(),
        Utc::now(),
        None,
    );

    assert_eq!(payload.header, AlertHeader::AllNormal);
    assert!(payload.exceeded.is_empty());
    assert_eq!(payload.normal.len(), 1);
    assert!(!payload.normal[0].threshold_exceeded);
    assert_eq!(payload.context.low_revenue_rows, 2);
    assert_eq!(payload.context.checked_rows, 0);
}

#[test]
fn breaches_rank_networks_by_revenue_desc() {
    let rows = vec![
        // Unity: big revenue, -12% drift.
        row("2026-01-08", Network::Unity, "MyApp (iOS)", 200.0, 40_000, Some((176.0, 35_200))),
        // Mintegral: smaller revenue, +60% drift.
        row("2026-01-08", Network::Mintegral, "MyApp (iOS)", 100.0, 20_000, Some((160.0, 31_000))),
        // Meta: inside the threshold.
        row("2026-01-08", Network::Meta, "MyApp (iOS)", 300.0, 60_000, Some((295.0, 59_500))),
    ];
    let summary = summary_for(&rows, "2026-01-08", "2026-01-08");

    let payload = build_payload(
        &rows,
        &summary,
        &validation(),
        &AlertingConfig::default(),
        Utc::now(),
        None,
    );

    assert_eq!(payload.header, AlertHeader::ThresholdExceeded);
    assert_eq!(payload.context.breached_networks, 2);
    assert_eq!(payload.context.breached_rows, 2);

    // Exceeded networks in MAX-revenue order.
    let order: Vec<Network> = payload.exceeded.iter().map(|b| b.network).collect();
    assert_eq!(order, vec![Network::Unity, Network::Mintegral]);
    assert_eq!(payload.normal.len(), 1);
    assert_eq!(payload.normal[0].network, Network::Meta);

    // Severity tiers follow |rev delta|: 12% is major, 60% critical.
    assert_eq!(payload.exceeded[0].breaches[0].severity, Severity::Major);
    assert_eq!(payload.exceeded[1].breaches[0].severity, Severity::Critical);

    // Aggregate block math.
    let unity = &payload.exceeded[0];
    assert_eq!(unity.total_max_revenue, 200.0);
    assert_eq!(unity.total_network_revenue, 176.0);
    assert!((unity.rev_delta_pct.unwrap() - -12.0).abs() < 1e-9);
}

#[test]
fn coverage_accounts_for_uncompared_revenue() {
    let rows = vec![
        row("2026-01-08", Network::Unity, "MyApp (iOS)", 75.0, 15_000, Some((75.0, 15_000))),
        row("2026-01-08", Network::Pangle, "MyApp (iOS)", 25.0, 5000, None),
    ];
    let summary = summary_for(&rows, "2026-01-08", "2026-01-08");

    let payload = build_payload(
        &rows,
        &summary,
        &validation(),
        &AlertingConfig::default(),
        Utc::now(),
        None,
    );

    let coverage = payload.coverage.unwrap();
    assert_eq!(coverage.all_max_revenue, 100.0);
    assert_eq!(coverage.compared_max_revenue, 75.0);
    assert_eq!(coverage.missing_revenue, 25.0);
    assert!((coverage.coverage_pct - 75.0).abs() < 1e-9);
    assert_eq!(coverage.networks_with_missing, vec!["Pangle Bidding"]);

    let daily = payload.daily_summary.unwrap();
    assert_eq!(daily.date, d("2026-01-08"));
    assert_eq!(daily.total_max_revenue, 100.0);
    assert_eq!(daily.total_network_revenue, 75.0);
    assert_eq!(daily.networks, vec!["Unity Bidding"]);
}

#[test]
fn failed_networks_form_their_own_group() {
    let rows = vec![row(
        "2026-01-08",
        Network::Moloco,
        "MyApp (iOS)",
        60.0,
        12_000,
        None,
    )];
    let mut summary = summary_for(&rows, "2026-01-08", "2026-01-08");
    summary.networks.insert(
        Network::Moloco,
        NetworkStatus {
            network: Network::Moloco,
            ok: false,
            error_class: Some("auth".into()),
            error: Some("moloco authentication failed: bad password".into()),
            last_available_date: None,
        },
    );

    let payload = build_payload(
        &rows,
        &summary,
        &validation(),
        &AlertingConfig::default(),
        Utc::now(),
        None,
    );

    assert_eq!(payload.failed.len(), 1);
    assert_eq!(payload.failed[0].network, Network::Moloco);
    assert_eq!(payload.failed[0].class, "auth");
    // The network still shows in the normal listing with baseline-only
    // totals rather than disappearing.
    assert_eq!(payload.header, AlertHeader::AllNormal);
}

#[test]
fn multi_day_windows_aggregate_per_placement() {
    // Per-day drift alternates but the aggregate stays inside the
    // threshold; a multi-day report must not flag this network.
    let rows = vec![
        row("2026-01-07", Network::Unity, "MyApp (iOS)", 100.0, 20_000, Some((115.0, 23_000))),
        row("2026-01-08", Network::Unity, "MyApp (iOS)", 100.0, 20_000, Some((90.0, 18_000))),
    ];
    let summary = summary_for(&rows, "2026-01-07", "2026-01-08");

    let payload = build_payload(
        &rows,
        &summary,
        &validation(),
        &AlertingConfig::default(),
        Utc::now(),
        None,
    );

    assert!(payload.context.multi_day);
    assert_eq!(payload.header, AlertHeader::AllNormal);
    let block = &payload.normal[0];
    assert_eq!(block.total_max_revenue, 200.0);
    assert_eq!(block.total_network_revenue, 205.0);
    assert!((block.rev_delta_pct.unwrap() - 2.5).abs() < 1e-9);
}

#[test]
fn payload_is_deterministic_for_identical_inputs() {
    let rows = vec![
        row("2026-01-08", Network::Unity, "MyApp (iOS)", 200.0, 40_000, Some((160.0, 32_000))),
        row("2026-01-08", Network::Pangle, "MyApp (iOS)", 30.0, 6000, None),
    ];
    let summary = summary_for(&rows, "2026-01-08", "2026-01-08");
    let generated_at = Utc::now();

    let a = build_payload(&rows, &summary, &validation(), &AlertingConfig::default(), generated_at, None);
    let b = build_payload(&rows, &summary, &validation(), &AlertingConfig::default(), generated_at, None);
    assert_eq!(
        serde_json::to_string(&a).unwrap(),
        serde_json::to_string(&b).unwrap()
    );
}

#[test]
fn mediator_failure_payload_truncates_the_error() {
    let long_error = "x".repeat(1000);
    let payload = build_error_payload(
        &long_error,
        d("2026-01-08"),
        d("2026-01-08"),
        &validation(),
        &AlertingConfig::default(),
        Utc::now(),
    );
    assert_eq!(payload.header, AlertHeader::MediatorFailure);
    assert_eq!(payload.error.as_ref().unwrap().len(), 300);
    assert!(payload.coverage.is_none());
    assert!(payload.daily_summary.is_none());
}

#[test]
fn export_warning_is_carried_into_context() {
    let rows = vec![row(
        "2026-01-08",
        Network::Unity,
        "MyApp (iOS)",
        60.0,
        12_000,
        Some((60.0, 12_000)),
    )];
    let summary = summary_for(&rows, "2026-01-08", "2026-01-08");
    let payload = build_payload(
        &rows,
        &summary,
        &validation(),
        &AlertingConfig::default(),
        Utc::now(),
        Some("export failed: bucket unreachable".into()),
    );
    assert_eq!(
        payload.context.export_warning.as_deref(),
        Some("export failed: bucket unreachable")
    );
}
