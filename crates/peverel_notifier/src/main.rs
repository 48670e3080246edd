//! Notifier entry point.
//!
//! # Responsibility
//! - Load `.env`, parse configuration and start logging.
//! - Wire the SQLite store, system clock and SMTP dispatcher into the
//!   scheduler and run it until ctrl-c.

use clap::Parser;
use log::{error, info};
use peverel_core::{init_logging, SqliteTaskStore, SystemClock};
use peverel_notifier::{Cli, DigestScheduler, NotifierConfig, SmtpDispatcher};
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env is fine; real environment variables still apply.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config = match NotifierConfig::from_cli(cli) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("peverel-notifier: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = init_logging(&config.log_level, &config.log_output) {
        eprintln!("peverel-notifier: failed to initialize logging: {err}");
        return ExitCode::FAILURE;
    }

    let store = match SqliteTaskStore::connect(&config.db_path) {
        Ok(store) => store,
        Err(err) => {
            error!("event=store_open module=main status=error error={err}");
            return ExitCode::FAILURE;
        }
    };

    let dispatcher = match SmtpDispatcher::from_settings(&config.smtp) {
        Ok(dispatcher) => dispatcher,
        Err(err) => {
            error!("event=dispatcher_init module=main status=error error={err}");
            return ExitCode::FAILURE;
        }
    };

    let scheduler = DigestScheduler::new(
        store,
        SystemClock,
        dispatcher,
        config.recipients.clone(),
        config.schedule,
    )
    .with_horizon_days(config.horizon_days);

    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("event=shutdown_signal module=main status=ok");
            signal_cancel.cancel();
        }
    });

    scheduler.run(cancel).await;
    info!("event=app_exit module=main status=ok");
    ExitCode::SUCCESS
}
