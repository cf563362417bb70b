use chrono::{NaiveDate, TimeZone, Utc};
use polars::prelude::*;

use adrecon::ComparisonRow;
use adrecon::export::{LocalStore, PartitionWriter, SCHEMA_COLUMNS, rows_to_dataframe};
use adrecon_types::{AdType, Network, Platform};

fn d(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn sample_rows() -> Vec<ComparisonRow> {
    let fetched_at = Utc.with_ymd_and_hms(2026, 1, 9, 6, 30, 0).unwrap();
    vec![
        ComparisonRow::build(
            d("2026-01-08"),
            Network::Unity,
            Platform::Ios,
            AdType::Rewarded,
            "MyApp (iOS)".into(),
            50.0,
            10_000,
            Some((48.5, 9800)),
            None,
            fetched_at,
        ),
        ComparisonRow::build(
            d("2026-01-08"),
            Network::Pangle,
            Platform::Android,
            AdType::Interstitial,
            "MyApp (Android)".into(),
            30.0,
            6000,
            None,
            None,
            fetched_at,
        ),
        ComparisonRow::build(
            d("2026-01-08"),
            Network::Meta,
            Platform::Android,
            AdType::Banner,
            "MyApp (Android)".into(),
            8.0,
            20_000,
            Some((7.5, 19_000)),
            Some("00:00-23:00 UTC (24/24)".into()),
            fetched_at,
        ),
    ]
}

#[test]
fn dataframe_schema_matches_declaration() {
    let df = rows_to_dataframe(&sample_rows()).unwrap();
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();
    assert_eq!(names, SCHEMA_COLUMNS.to_vec());

    assert_eq!(df.column("date").unwrap().dtype(), &DataType::Date);
    assert_eq!(df.column("network").unwrap().dtype(), &DataType::String);
    assert_eq!(df.column("max_revenue").unwrap().dtype(), &DataType::Float64);
    assert_eq!(
        df.column("max_impressions").unwrap().dtype(),
        &DataType::Int64
    );
    assert_eq!(
        df.column("rev_delta_pct").unwrap().dtype(),
        &DataType::Float64
    );
    assert_eq!(
        df.column("fetched_at").unwrap().dtype(),
        &DataType::Datetime(TimeUnit::Microseconds, None)
    );
}

#[tokio::test]
async fn partition_round_trips_with_null_placement() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path());
    let writer = PartitionWriter::replacing(Box::new(store), "network_data");

    let rows = sample_rows();
    let key = writer
        .write_partition(d("2026-01-08"), &rows)
        .await
        .unwrap()
        .unwrap();
    assert!(key.starts_with("network_data/dt=2026-01-08/comparison_data_"));
    assert!(key.ends_with(".parquet"));

    let file = std::fs::File::open(dir.path().join(&key)).unwrap();
    let df = ParquetReader::new(file).finish().unwrap();
    assert_eq!(df.height(), rows.len());

    // Row order is preserved: Unity, Pangle, Meta as emitted.
    let networks = df.column("network").unwrap().str().unwrap();
    assert_eq!(networks.get(0), Some("Unity Bidding"));
    assert_eq!(networks.get(1), Some("Pangle Bidding"));
    assert_eq!(networks.get(2), Some("Meta Bidding"));

    // Null placement survives: the Pangle row has null deltas, not zeros.
    let rev_delta = df.column("rev_delta_pct").unwrap().f64().unwrap();
    assert!((rev_delta.get(0).unwrap() - -3.0).abs() < 0.01);
    assert_eq!(rev_delta.get(1), None);

    let hour_range = df.column("hour_range").unwrap().str().unwrap();
    assert_eq!(hour_range.get(0), None);
    assert_eq!(hour_range.get(2), Some("00:00-23:00 UTC (24/24)"));

    let imps = df.column("network_impressions").unwrap().i64().unwrap();
    assert_eq!(imps.get(0), Some(9800));
    assert_eq!(imps.get(1), Some(0));
}

#[tokio::test]
async fn replace_leaves_exactly_one_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let writer =
        PartitionWriter::replacing(Box::new(LocalStore::new(dir.path())), "network_data");
    let rows = sample_rows();

    writer.write_partition(d("2026-01-08"), &rows).await.unwrap();
    // Second run over the same date: the prior artifact must be gone.
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    writer.write_partition(d("2026-01-08"), &rows).await.unwrap();

    let partition_dir = dir.path().join("network_data/dt=2026-01-08");
    let files: Vec<_> = std::fs::read_dir(&partition_dir).unwrap().collect();
    assert_eq!(files.len(), 1, "exactly one logical snapshot");

    let file = std::fs::File::open(files[0].as_ref().unwrap().path()).unwrap();
    let df = ParquetReader::new(file).finish().unwrap();
    assert_eq!(df.height(), rows.len());
}

#[tokio::test]
async fn append_mode_keeps_prior_runs() {
    let dir = tempfile::tempdir().unwrap();
    let writer =
        PartitionWriter::appending(Box::new(LocalStore::new(dir.path())), "network_data");
    let rows = sample_rows();

    writer.write_partition(d("2026-01-08"), &rows).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(1100)).await;
    writer.write_partition(d("2026-01-08"), &rows).await.unwrap();

    let partition_dir = dir.path().join("network_data/dt=2026-01-08");
    assert_eq!(std::fs::read_dir(&partition_dir).unwrap().count(), 2);
}

#[tokio::test]
async fn empty_partition_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let writer =
        PartitionWriter::replacing(Box::new(LocalStore::new(dir.path())), "network_data");
    let written = writer.write_partition(d("2026-01-08"), &[]).await.unwrap();
    assert_eq!(written, None);
    assert!(!dir.path().join("network_data").exists());
}

#[tokio::test]
async fn missing_base_directory_is_created_on_write() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("does/not/exist/yet");
    let writer = PartitionWriter::replacing(Box::new(LocalStore::new(&nested)), "network_data");
    writer
        .write_partition(d("2026-01-08"), &sample_rows())
        .await
        .unwrap();
    assert!(nested.join("network_data/dt=2026-01-08").exists());
}
