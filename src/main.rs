//! npm-name-check - npm package name availability checker.
//!
//! CLI entry point.

use clap::Parser;
use npm_name_check::notify::{ConsoleOutput, ProgressObserver};
use npm_name_check::{check_syntax_only, CancelToken, Config, ValidationStatus, Validator};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

/// Exit code for errors that stopped validation.
const EXIT_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    // Set up logging
    let filter = if config.verbose {
        EnvFilter::new("npm_name_check=debug,info")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output = ConsoleOutput::new(config.json);
    let name = config.package_name.clone();

    if config.syntax_only {
        let result = check_syntax_only(&name);
        output.print_result(&result);
        return exit_code(result.status);
    }

    let cancel = CancelToken::new();
    spawn_signal_handler(cancel.clone());

    let endpoints = match config.endpoints() {
        Ok(endpoints) => endpoints,
        Err(e) => {
            error!("Invalid registry URL: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let observer = Arc::new(ProgressObserver::new(!config.json && !config.quiet));
    let mut validator =
        match Validator::connect(config.sync_config(), endpoints, &config.client_options()) {
            Ok(v) => v.with_observer(observer).with_cancel_token(cancel),
            Err(e) => {
                error!("Failed to create validator: {}", e);
                return ExitCode::from(EXIT_ERROR);
            }
        };

    match validator.validate(&name).await {
        Ok(result) => {
            output.print_result(&result);
            exit_code(result.status)
        }
        Err(e) => {
            output.print_error(&name, &e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn exit_code(status: ValidationStatus) -> ExitCode {
    match status {
        ValidationStatus::Valid | ValidationStatus::Available => ExitCode::SUCCESS,
        ValidationStatus::Invalid | ValidationStatus::Unavailable => ExitCode::FAILURE,
    }
}

/// First SIGINT/SIGTERM cancels the download; a second one exits at once.
fn spawn_signal_handler(cancel: CancelToken) {
    tokio::spawn(async move {
        if wait_for_signal().await.is_err() {
            warn!("Failed to listen for shutdown signals");
            return;
        }
        eprintln!("\nSignal received, stopping download (snapshot left unchanged)...");
        cancel.cancel();

        if wait_for_signal().await.is_ok() {
            std::process::exit(130);
        }
    });
}

#[cfg(unix)]
async fn wait_for_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    tokio::select! {
        _ = sigterm.recv() => {},
        _ = sigint.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
