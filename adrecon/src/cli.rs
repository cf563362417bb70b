//! Command-line surface.

use std::path::PathBuf;

use chrono::{Days, NaiveDate, Utc};
use clap::Parser;

use adrecon_types::AdreconError;

/// Reconcile MAX mediation revenue against each network's own reporting
/// API, export date partitions, and alert on drift.
#[derive(Debug, Parser)]
#[command(name = "adrecon", version, about)]
pub struct Cli {
    /// First day of the window, inclusive (default: end - date_range_days + 1).
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub start_date: Option<NaiveDate>,

    /// Last day of the window, inclusive (default: yesterday, UTC).
    #[arg(long, value_name = "YYYY-MM-DD")]
    pub end_date: Option<NaiveDate>,

    /// Suppress alert delivery (the payload is still built and logged).
    #[arg(long = "no-slack", alias = "no-alert")]
    pub no_slack: bool,

    /// Suppress the partition write.
    #[arg(long = "no-export")]
    pub no_export: bool,

    /// Run as a daemon on the configured times of day.
    #[arg(long)]
    pub schedule: bool,

    /// Resume a backfill from the checkpoint file.
    #[arg(long)]
    pub resume: bool,

    /// Checkpoint file location.
    #[arg(long, value_name = "PATH", default_value = crate::checkpoint::DEFAULT_CHECKPOINT_FILE)]
    pub checkpoint: PathBuf,

    /// Write partitions to the local filesystem instead of the remote store.
    #[arg(long)]
    pub dry_run: bool,

    /// Configuration file.
    #[arg(long, value_name = "PATH", default_value = "config.toml")]
    pub config: PathBuf,
}

impl Cli {
    /// Resolve the effective reporting window.
    ///
    /// # Errors
    /// [`AdreconError::Config`] when start is after end.
    pub fn window(&self, default_range_days: i64) -> Result<(NaiveDate, NaiveDate), AdreconError> {
        let end = self
            .end_date
            .unwrap_or_else(|| yesterday_utc());
        let span = default_range_days.max(1) as u64;
        let start = self.start_date.unwrap_or_else(|| {
            end.checked_sub_days(Days::new(span - 1)).unwrap_or(end)
        });
        if start > end {
            return Err(AdreconError::config(format!(
                "start date {start} is after end date {end}"
            )));
        }
        Ok((start, end))
    }
}

fn yesterday_utc() -> NaiveDate {
    Utc::now()
        .date_naive()
        .checked_sub_days(Days::new(1))
        .unwrap_or_else(|| Utc::now().date_naive())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_window_is_honoured() {
        let cli = Cli::parse_from([
            "adrecon",
            "--start-date",
            "2026-01-01",
            "--end-date",
            "2026-01-08",
        ]);
        let (start, end) = cli.window(7).unwrap();
        assert_eq!(start, "2026-01-01".parse().unwrap());
        assert_eq!(end, "2026-01-08".parse().unwrap());
    }

    #[test]
    fn default_start_trails_end_by_range() {
        let cli = Cli::parse_from(["adrecon", "--end-date", "2026-01-08"]);
        let (start, end) = cli.window(7).unwrap();
        assert_eq!(end, "2026-01-08".parse().unwrap());
        assert_eq!(start, "2026-01-02".parse().unwrap());
    }

    #[test]
    fn single_day_window_is_valid() {
        let cli = Cli::parse_from([
            "adrecon",
            "--start-date",
            "2026-01-08",
            "--end-date",
            "2026-01-08",
        ]);
        let (start, end) = cli.window(7).unwrap();
        assert_eq!(start, end);
    }

    #[test]
    fn inverted_window_is_rejected() {
        let cli = Cli::parse_from([
            "adrecon",
            "--start-date",
            "2026-01-09",
            "--end-date",
            "2026-01-08",
        ]);
        assert!(cli.window(7).is_err());
    }

    #[test]
    fn flag_aliases_parse() {
        let cli = Cli::parse_from(["adrecon", "--no-alert", "--no-export", "--dry-run"]);
        assert!(cli.no_slack);
        assert!(cli.no_export);
        assert!(cli.dry_run);
    }
}
