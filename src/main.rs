//! `DuelJack` - turn-based duel session engine for chat bots

use std::sync::Arc;
use std::sync::atomic::{AtomicI32, Ordering};

use clap::Parser;
use tokio_util::sync::CancellationToken;

use dueljack::cli::args::{Cli, LogFormatChoice};
use dueljack::cli::commands;
use dueljack::error::ExitCode;
use dueljack::observability::{LogFormat, init_logging};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if !cli.quiet {
        let format = match cli.log_format {
            LogFormatChoice::Human => LogFormat::Human,
            LogFormatChoice::Json => LogFormat::Json,
        };
        init_logging(format, cli.verbose, cli.color);
    }

    let cancel = CancellationToken::new();
    let signalled = Arc::new(AtomicI32::new(ExitCode::SUCCESS));

    // First signal drains, second forces exit
    {
        let cancel = cancel.clone();
        let signalled = Arc::clone(&signalled);
        tokio::spawn(async move {
            let code = next_signal().await;
            signalled.store(code, Ordering::SeqCst);
            eprintln!("\nShutting down gracefully... (press Ctrl+C again to force)");
            cancel.cancel();

            std::process::exit(next_signal().await);
        });
    }

    match commands::dispatch(cli, cancel).await {
        Ok(()) => std::process::exit(signalled.load(Ordering::SeqCst)),
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(e.exit_code());
        }
    }
}

/// Waits for SIGINT or SIGTERM and returns the matching exit code.
async fn next_signal() -> i32 {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => return ExitCode::INTERRUPTED,
                _ = sigterm.recv() => return ExitCode::TERMINATED,
            }
        }
    }

    let _ = tokio::signal::ctrl_c().await;
    ExitCode::INTERRUPTED
}
