//! Times-of-day scheduling for daemon mode.

use chrono::{DateTime, Days, NaiveTime, Utc};
use tracing::{info, warn};

use adrecon_types::AdreconError;
use adrecon_types::config::SchedulingConfig;

/// The next wall-clock instant at or after `now` matching one of the
/// configured times. All arithmetic is UTC.
#[must_use]
pub fn next_run_after(now: DateTime<Utc>, times: &[NaiveTime]) -> DateTime<Utc> {
    let today = now.date_naive();
    let mut candidates: Vec<DateTime<Utc>> = Vec::new();
    for time in times {
        for day in [today, today.checked_add_days(Days::new(1)).unwrap_or(today)] {
            let candidate = day.and_time(*time).and_utc();
            if candidate > now {
                candidates.push(candidate);
            }
        }
    }
    candidates
        .into_iter()
        .min()
        // Degenerate config (no times) falls back to one day out.
        .unwrap_or_else(|| now + chrono::Duration::days(1))
}

/// Run `job` forever on the configured schedule.
///
/// # Errors
/// Only configuration errors (unparseable times) abort the loop; job
/// failures are logged and the loop continues to the next slot.
pub async fn run_on_schedule<F, Fut>(config: &SchedulingConfig, mut job: F) -> Result<(), AdreconError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<(), AdreconError>>,
{
    let times = config.parsed_times()?;
    if !config.timezone.eq_ignore_ascii_case("utc") {
        warn!(timezone = %config.timezone, "only UTC scheduling is supported, coercing");
    }

    loop {
        let now = Utc::now();
        let next = next_run_after(now, &times);
        let wait = (next - now).to_std().unwrap_or_default();
        info!(%next, wait_secs = wait.as_secs(), "sleeping until next scheduled run");
        tokio::time::sleep(wait).await;

        if let Err(e) = job().await {
            warn!(error = %e, "scheduled run failed, continuing");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    #[test]
    fn picks_the_next_slot_today() {
        let now = Utc.with_ymd_and_hms(2026, 1, 8, 10, 0, 0).unwrap();
        let next = next_run_after(now, &[t("09:30"), t("17:30")]);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 8, 17, 30, 0).unwrap());
    }

    #[test]
    fn wraps_to_tomorrow_after_the_last_slot() {
        let now = Utc.with_ymd_and_hms(2026, 1, 8, 18, 0, 0).unwrap();
        let next = next_run_after(now, &[t("09:30"), t("17:30")]);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 9, 9, 30, 0).unwrap());
    }

    #[test]
    fn exact_boundary_moves_forward() {
        let now = Utc.with_ymd_and_hms(2026, 1, 8, 9, 30, 0).unwrap();
        let next = next_run_after(now, &[t("09:30")]);
        assert_eq!(next, Utc.with_ymd_and_hms(2026, 1, 9, 9, 30, 0).unwrap());
    }
}
