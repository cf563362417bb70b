//! End-to-end run driver: fetch everything concurrently, reconcile, export
//! per-date partitions, build and deliver the alert.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use adrecon_core::{RawBreakdown, ServiceAccountKey, TokenCache};
use adrecon_max::MaxFetcher;
use adrecon_networks::build_enabled_fetchers;
use adrecon_types::{AdreconError, AppConfig, Network};

use crate::alert::{self, AlertPayload, AlertSink};
use crate::checkpoint::Checkpoint;
use crate::comparison::ComparisonRow;
use crate::export::{GcsStore, LocalStore, ObjectStore, PartitionWriter};
use crate::reconcile::{self, RunState, RunSummary};

/// Knobs for one run, usually derived from CLI flags.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// First day, inclusive.
    pub start: NaiveDate,
    /// Last day, inclusive.
    pub end: NaiveDate,
    /// Whether partitions are written at all.
    pub export: bool,
    /// Whether the alert is delivered to the webhook.
    pub alert: bool,
    /// Local filesystem export instead of the remote store.
    pub dry_run: bool,
    /// Overall deadline for the fetch phase.
    pub deadline: Option<Duration>,
    /// Checkpoint to update after each exported date, when backfilling.
    pub checkpoint: Option<Checkpoint>,
}

impl RunOptions {
    /// A single-window run with defaults for everything else.
    #[must_use]
    pub fn window(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start,
            end,
            export: true,
            alert: true,
            dry_run: false,
            deadline: None,
            checkpoint: None,
        }
    }
}

/// What a completed (or degraded) run produced.
#[derive(Debug)]
pub struct RunOutcome {
    /// Full run summary including the state machine log.
    pub summary: RunSummary,
    /// The emitted comparison rows.
    pub rows: Vec<ComparisonRow>,
    /// The alert payload (error payload on mediator failure).
    pub payload: AlertPayload,
    /// Artifact keys written this run.
    pub artifacts: Vec<String>,
}

/// Execute one reconciliation run with fetchers built from the config.
///
/// Peripheral failures (single networks, export, alert delivery) degrade
/// the run; mediator and configuration failures abort it.
///
/// # Errors
/// Fatal errors only, mapped to exit codes by the caller.
pub async fn execute(config: &AppConfig, options: RunOptions) -> Result<RunOutcome, AdreconError> {
    let tokens = Arc::new(TokenCache::new(&config.credentials_dir));
    let fetchers = build_enabled_fetchers(config, &tokens);
    let mediator = MaxFetcher::new(config.mediator.clone());
    execute_with(config, options, &mediator, fetchers).await
}

/// Execute one run with explicit collaborators (the seam tests use).
///
/// # Errors
/// See [`execute`].
pub async fn execute_with(
    config: &AppConfig,
    options: RunOptions,
    mediator: &MaxFetcher,
    fetchers: Vec<Box<dyn adrecon_core::NetworkFetcher>>,
) -> Result<RunOutcome, AdreconError> {
    let mut summary = RunSummary::new(options.start, options.end);
    let fetched_at = Utc::now();

    summary.transition(RunState::Fetching);
    let fetch_phase = fetch_all(mediator, fetchers, options.start, options.end);
    let (mediator_result, network_results) = match options.deadline {
        Some(deadline) => match tokio::time::timeout(deadline, fetch_phase).await {
            Ok(results) => results,
            Err(_) => {
                summary.fail("run deadline exceeded, outstanding fetches cancelled");
                let payload = alert::build_error_payload(
                    "run deadline exceeded",
                    options.start,
                    options.end,
                    &config.validation,
                    &config.alerting,
                    Utc::now(),
                );
                maybe_deliver(&config.alerting, options.alert, &payload).await;
                return Err(AdreconError::mediator("run deadline exceeded"));
            }
        },
        None => fetch_phase.await,
    };

    let mediator_breakdown = match mediator_result {
        Ok(breakdown) => breakdown,
        Err(e) => {
            // Mediator failure is fatal: emit the error payload, write no
            // partition.
            error!(error = %e, "mediator fetch failed");
            summary.fail(e.to_string());
            let payload = alert::build_error_payload(
                &e.to_string(),
                options.start,
                options.end,
                &config.validation,
                &config.alerting,
                Utc::now(),
            );
            maybe_deliver(&config.alerting, options.alert, &payload).await;
            return Err(e);
        }
    };

    summary.transition(RunState::Reconciling);
    let rows = reconcile::reconcile(
        &mediator_breakdown,
        &network_results,
        options.start,
        options.end,
        fetched_at,
        &mut summary,
    );

    summary.transition(RunState::Exporting);
    let mut artifacts = Vec::new();
    let mut export_warning = None;
    if options.export && config.export.enabled {
        match build_writer(config, options.dry_run).await {
            Ok(writer) => {
                let mut date = options.start;
                while date <= options.end {
                    let day_rows: Vec<ComparisonRow> =
                        rows.iter().filter(|r| r.date == date).cloned().collect();
                    match writer.write_partition(date, &day_rows).await {
                        Ok(Some(key)) => {
                            artifacts.push(key);
                            if let Some(checkpoint) = &options.checkpoint {
                                if let Err(e) = checkpoint.save(date) {
                                    warn!(error = %e, "checkpoint save failed");
                                }
                            }
                        }
                        Ok(None) => {}
                        Err(e) => {
                            // Export failure is fatal for the export step
                            // only; the alert still goes out with a warning.
                            error!(error = %e, %date, "partition write failed");
                            export_warning = Some(e.to_string());
                            break;
                        }
                    }
                    date = match date.succ_opt() {
                        Some(next) => next,
                        None => break,
                    };
                }
            }
            Err(e) => {
                error!(error = %e, "export destination unavailable");
                export_warning = Some(e.to_string());
            }
        }
    } else {
        info!("export suppressed");
    }

    summary.transition(RunState::Alerting);
    let payload = alert::build_payload(
        &rows,
        &summary,
        &config.validation,
        &config.alerting,
        Utc::now(),
        export_warning,
    );
    maybe_deliver(&config.alerting, options.alert, &payload).await;

    summary.transition(RunState::Done);
    Ok(RunOutcome {
        summary,
        rows,
        payload,
        artifacts,
    })
}

async fn fetch_all(
    mediator: &MaxFetcher,
    fetchers: Vec<Box<dyn adrecon_core::NetworkFetcher>>,
    start: NaiveDate,
    end: NaiveDate,
) -> (
    Result<adrecon_max::MediatorBreakdown, AdreconError>,
    BTreeMap<Network, Result<RawBreakdown, AdreconError>>,
) {
    let mut set: JoinSet<(Network, Result<RawBreakdown, AdreconError>)> = JoinSet::new();
    for fetcher in fetchers {
        set.spawn(async move {
            let network = fetcher.network();
            let result = fetcher.fetch(start, end).await;
            (network, result)
        });
    }

    // The mediator runs on this task, concurrent with the set.
    let mediator_result = mediator.fetch_report(start, end).await;

    let mut network_results = BTreeMap::new();
    while let Some(joined) = set.join_next().await {
        match joined {
            Ok((network, result)) => {
                if let Err(e) = &result {
                    warn!(%network, error = %e, "network fetch failed");
                }
                network_results.insert(network, result);
            }
            Err(e) => warn!(error = %e, "fetch task panicked"),
        }
    }

    (mediator_result, network_results)
}

async fn build_writer(config: &AppConfig, dry_run: bool) -> Result<PartitionWriter, AdreconError> {
    let prefix = config.export.prefix.clone();
    let bucket = if dry_run { None } else { config.export.bucket.clone() };
    let Some(bucket) = bucket else {
        let store: Box<dyn ObjectStore> = Box::new(LocalStore::new(&config.export.local_root));
        // Local mode appends; each run keeps its own timestamped file.
        return Ok(PartitionWriter::appending(store, prefix));
    };

    let key_path = config.export.service_account_path.as_ref().ok_or_else(|| {
        AdreconError::Export("remote export needs export.service_account_path".to_string())
    })?;
    let key = ServiceAccountKey::load(key_path)
        .await
        .map_err(|e| AdreconError::Export(e.to_string()))?;
    let store: Box<dyn ObjectStore> = Box::new(GcsStore::new(bucket, key));
    Ok(PartitionWriter::replacing(store, prefix))
}

async fn maybe_deliver(
    alerting: &adrecon_types::config::AlertingConfig,
    enabled: bool,
    payload: &AlertPayload,
) {
    if !enabled {
        info!("alert delivery suppressed");
        return;
    }
    match AlertSink::from_config(alerting) {
        Some(sink) => {
            if let Err(e) = sink.deliver(payload).await {
                warn!(error = %e, "alert delivery failed");
            }
        }
        None => info!("no webhook configured, alert payload not delivered"),
    }
}
