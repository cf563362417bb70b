use std::process::ExitCode;

use chrono::Days;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use adrecon::checkpoint::Checkpoint;
use adrecon::cli::Cli;
use adrecon::pidlock::PidLock;
use adrecon::{RunOptions, config_file, execute, schedule};
use adrecon_types::{AdreconError, AppConfig};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "run failed");
            ExitCode::from(e.exit_code() as u8)
        }
    }
}

fn run(cli: Cli) -> Result<(), AdreconError> {
    let config = config_file::load(&cli.config)?;
    let runtime = tokio::runtime::Runtime::new().map_err(AdreconError::Io)?;
    runtime.block_on(run_async(cli, config))
}

async fn run_async(cli: Cli, config: AppConfig) -> Result<(), AdreconError> {
    let _lock = PidLock::acquire_default()?;

    if cli.schedule {
        let scheduling = config.scheduling.clone();
        return schedule::run_on_schedule(&scheduling, || {
            let config = config.clone();
            let cli_snapshot = options_from_cli(&cli, &config, None);
            async move {
                let options = cli_snapshot?;
                execute(&config, options).await.map(|outcome| {
                    info!(
                        rows = outcome.rows.len(),
                        artifacts = outcome.artifacts.len(),
                        "scheduled run complete"
                    );
                })
            }
        })
        .await;
    }

    let checkpoint = Checkpoint::new(&cli.checkpoint);
    let resume_from = if cli.resume { checkpoint.load() } else { None };
    let options = options_from_cli(&cli, &config, resume_from.map(|d| (d, checkpoint.clone())))?;

    let outcome = execute(&config, options).await?;
    info!(
        rows = outcome.rows.len(),
        artifacts = outcome.artifacts.len(),
        breached = outcome.payload.context.breached_rows,
        failed_networks = outcome.payload.failed.len(),
        "run complete"
    );
    // Discrepancies are a successful run; only fatal errors change the
    // exit code.
    Ok(())
}

fn options_from_cli(
    cli: &Cli,
    config: &AppConfig,
    resume: Option<(chrono::NaiveDate, Checkpoint)>,
) -> Result<RunOptions, AdreconError> {
    let (mut start, end) = cli.window(config.validation.date_range_days)?;
    let mut checkpoint = None;
    if let Some((last_done, cp)) = resume {
        if let Some(next) = last_done.checked_add_days(Days::new(1)) {
            if next > start {
                info!(%last_done, resuming_from = %next, "resuming from checkpoint");
                start = next;
            }
        }
        if start > end {
            // Checkpoint already covers the window; re-run the final day,
            // the replace is idempotent.
            info!("checkpoint covers the window, re-running the final day");
            start = end;
        }
        checkpoint = Some(cp);
    } else if cli.resume {
        checkpoint = Some(Checkpoint::new(&cli.checkpoint));
    }

    let mut options = RunOptions::window(start, end);
    options.export = !cli.no_export;
    options.alert = !cli.no_slack;
    options.dry_run = cli.dry_run;
    options.checkpoint = checkpoint;
    Ok(options)
}
