//! Columnar export: one Snappy Parquet artifact per date partition, laid
//! out as `<prefix>/dt=YYYY-MM-DD/comparison_data_<timestamp>.parquet`.
//!
//! Remote writes are an idempotent replace: list the partition, delete
//! everything, upload the new artifact. The steps are not atomic; the
//! postcondition is that a successful write leaves exactly one logical
//! snapshot. Dry-run (local) mode appends a new timestamped file instead.

mod gcs;
mod store;

pub use gcs::GcsStore;
pub use store::{LocalStore, ObjectStore};

use chrono::{NaiveDate, Utc};
use polars::prelude::*;
use tracing::{info, warn};

use adrecon_types::AdreconError;

use crate::comparison::ComparisonRow;

/// Column names in emission order; the artifact schema is exactly this.
pub const SCHEMA_COLUMNS: [&str; 16] = [
    "date",
    "network",
    "platform",
    "ad_type",
    "application",
    "max_revenue",
    "max_impressions",
    "max_ecpm",
    "network_revenue",
    "network_impressions",
    "network_ecpm",
    "rev_delta_pct",
    "imp_delta_pct",
    "ecpm_delta_pct",
    "hour_range",
    "fetched_at",
];

/// Build the partition DataFrame, preserving row order.
pub fn rows_to_dataframe(rows: &[ComparisonRow]) -> Result<DataFrame, AdreconError> {
    let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).expect("epoch");
    let to_export = |e: PolarsError| AdreconError::Export(e.to_string());

    let dates: Vec<i32> = rows
        .iter()
        .map(|r| (r.date - epoch).num_days() as i32)
        .collect();
    let fetched: Vec<i64> = rows
        .iter()
        .map(|r| r.fetched_at.timestamp_micros())
        .collect();

    let columns = vec![
        Int32Chunked::from_vec("date".into(), dates)
            .into_date()
            .into_series()
            .into_column(),
        Series::new(
            "network".into(),
            rows.iter()
                .map(|r| r.network.display_name().to_string())
                .collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "platform".into(),
            rows.iter()
                .map(|r| r.platform.as_str().to_string())
                .collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "ad_type".into(),
            rows.iter()
                .map(|r| r.ad_type.as_str().to_string())
                .collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "application".into(),
            rows.iter().map(|r| r.application.clone()).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "max_revenue".into(),
            rows.iter().map(|r| r.max_revenue).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "max_impressions".into(),
            rows.iter().map(|r| r.max_impressions).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "max_ecpm".into(),
            rows.iter().map(|r| r.max_ecpm).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "network_revenue".into(),
            rows.iter().map(|r| r.network_revenue).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "network_impressions".into(),
            rows.iter().map(|r| r.network_impressions).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "network_ecpm".into(),
            rows.iter().map(|r| r.network_ecpm).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "rev_delta_pct".into(),
            rows.iter().map(|r| r.rev_delta_pct).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "imp_delta_pct".into(),
            rows.iter().map(|r| r.imp_delta_pct).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "ecpm_delta_pct".into(),
            rows.iter().map(|r| r.ecpm_delta_pct).collect::<Vec<_>>(),
        )
        .into_column(),
        Series::new(
            "hour_range".into(),
            rows.iter().map(|r| r.hour_range.clone()).collect::<Vec<_>>(),
        )
        .into_column(),
        Int64Chunked::from_vec("fetched_at".into(), fetched)
            .into_datetime(TimeUnit::Microseconds, None)
            .into_series()
            .into_column(),
    ];

    DataFrame::new(columns).map_err(to_export)
}

fn dataframe_to_parquet(mut df: DataFrame) -> Result<Vec<u8>, AdreconError> {
    let mut buffer: Vec<u8> = Vec::new();
    ParquetWriter::new(&mut buffer)
        .with_compression(ParquetCompression::Snappy)
        .finish(&mut df)
        .map_err(|e| AdreconError::Export(e.to_string()))?;
    Ok(buffer)
}

/// Writes date partitions through an [`ObjectStore`].
pub struct PartitionWriter {
    store: Box<dyn ObjectStore>,
    prefix: String,
    replace: bool,
}

impl PartitionWriter {
    /// A writer that replaces partitions (the remote/production mode).
    #[must_use]
    pub fn replacing(store: Box<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            replace: true,
        }
    }

    /// A writer that appends timestamped files without deleting (dry-run
    /// mode).
    #[must_use]
    pub fn appending(store: Box<dyn ObjectStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
            replace: false,
        }
    }

    fn partition_prefix(&self, date: NaiveDate) -> String {
        format!("{}/dt={date}/", self.prefix.trim_end_matches('/'))
    }

    /// Write one partition. Returns the artifact key, or `None` when there
    /// were no rows to write.
    ///
    /// # Errors
    /// [`AdreconError::Export`] on any store or encoding failure.
    pub async fn write_partition(
        &self,
        date: NaiveDate,
        rows: &[ComparisonRow],
    ) -> Result<Option<String>, AdreconError> {
        if rows.is_empty() {
            warn!(%date, "no rows for partition, skipping write");
            return Ok(None);
        }

        let bytes = dataframe_to_parquet(rows_to_dataframe(rows)?)?;
        let partition = self.partition_prefix(date);

        if self.replace {
            let existing = self.store.list(&partition).await?;
            for key in &existing {
                self.store.delete(key).await?;
            }
            if !existing.is_empty() {
                info!(%date, deleted = existing.len(), "replaced prior snapshot");
            }
        }

        let key = format!(
            "{partition}comparison_data_{}.parquet",
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        self.store.put(&key, bytes).await?;
        info!(%date, rows = rows.len(), key, "partition written");
        Ok(Some(key))
    }
}
