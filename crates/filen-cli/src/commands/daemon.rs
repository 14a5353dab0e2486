//! Daemon command - run the scheduled trash purge until interrupted

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::commands::AppContext;
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct DaemonCommand {
    /// Minutes between purge sweeps (overrides `trash.purge_interval_minutes`)
    #[arg(long)]
    pub interval_minutes: Option<u64>,
}

impl DaemonCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let service = ctx.service().await?;

        let interval = match self.interval_minutes {
            Some(minutes) => Duration::from_secs(minutes.max(1).saturating_mul(60)),
            None => ctx.config.trash.purge_interval(),
        };

        let shutdown = CancellationToken::new();
        let signal_token = shutdown.clone();
        tokio::spawn(async move {
            shutdown_signal(signal_token).await;
        });

        service.start_scheduled_purge(interval);
        formatter.success(&format!(
            "Purging expired trash every {} minutes (Ctrl+C to stop)",
            interval.as_secs() / 60
        ));

        shutdown.cancelled().await;
        service.stop_scheduled_purge();
        info!("Scheduled purge stopped");
        Ok(())
    }
}

/// Resolves on SIGINT or SIGTERM and cancels `token`
async fn shutdown_signal(token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C)"),
        _ = terminate => info!("Received SIGTERM"),
    }

    token.cancel();
}
