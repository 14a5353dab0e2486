//! Trash command - move to the local trash, delete, purge and inspect it

use anyhow::Result;
use clap::Subcommand;
use filen_core::domain::SyncLocation;
use filen_fs::LocalFsService;
use tracing::info;

use crate::commands::{absolute, require_location, AppContext};
use crate::output::{format_bytes, get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum TrashCommand {
    /// Move a path into its location's local trash
    Move {
        /// Path inside a configured sync location
        path: String,
    },
    /// Delete a path permanently, bypassing the trash
    Delete {
        /// Path to delete
        path: String,
    },
    /// Remove everything from the trash
    Empty {
        /// Only this location root (defaults to every location)
        #[arg(long)]
        location: Option<String>,
    },
    /// Remove trash entries older than the retention period
    Purge {
        /// Only this location root (defaults to every location)
        #[arg(long)]
        location: Option<String>,
    },
    /// Show the last recorded trash size
    Size {
        /// Only this location root (defaults to every location)
        #[arg(long)]
        location: Option<String>,
    },
}

impl TrashCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let service = ctx.service().await?;
        match self {
            TrashCommand::Move { path } => {
                let path = absolute(path)?;
                let location = require_location(&service, &path).await?;
                info!(path = %path, "Moving to trash");
                service.move_to_trash(&path, &location).await?;
                report_done(format, "moved", path.as_str());
            }
            TrashCommand::Delete { path } => {
                let path = absolute(path)?;
                info!(path = %path, "Deleting permanently");
                service.permanently_delete(&path).await?;
                report_done(format, "deleted", path.as_str());
            }
            TrashCommand::Empty { location } => {
                purge(&service, location.as_deref(), true, format).await?;
            }
            TrashCommand::Purge { location } => {
                purge(&service, location.as_deref(), false, format).await?;
            }
            TrashCommand::Size { location } => {
                size(&service, location.as_deref(), format).await?;
            }
        }
        Ok(())
    }
}

fn report_done(format: OutputFormat, action: &str, path: &str) {
    let formatter = get_formatter(format);
    if format.is_json() {
        formatter.print_json(&serde_json::json!({ "success": true, "action": action, "path": path }));
    } else {
        formatter.success(&format!("{path} {action}"));
    }
}

async fn selected_locations(
    service: &LocalFsService,
    root: Option<&str>,
) -> Result<Vec<SyncLocation>> {
    match root {
        Some(root) => {
            let root = absolute(root)?;
            Ok(vec![require_location(service, &root).await?])
        }
        None => Ok(service.sync_locations().await?),
    }
}

async fn purge(
    service: &LocalFsService,
    root: Option<&str>,
    purge_all: bool,
    format: OutputFormat,
) -> Result<()> {
    let formatter = get_formatter(format);
    let mut results = Vec::new();

    for location in selected_locations(service, root).await? {
        let report = service.purge_expired_or_all(&location, purge_all).await?;
        if !format.is_json() {
            formatter.success(&format!(
                "{}: {} removed, {} failed, {} left",
                location.local_path,
                report.deleted,
                report.failed,
                format_bytes(report.remaining_bytes)
            ));
        }
        results.push(serde_json::json!({
            "location": location.uuid.to_string(),
            "root": location.local_path.as_str(),
            "report": report,
        }));
    }

    if format.is_json() {
        formatter.print_json(&serde_json::Value::Array(results));
    } else if results.is_empty() {
        formatter.info("No sync locations configured");
    }
    Ok(())
}

async fn size(service: &LocalFsService, root: Option<&str>, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let mut results = Vec::new();

    for location in selected_locations(service, root).await? {
        let bytes = service.trash_size(&location).await?;
        formatter.info(&format!("{}: {}", location.local_path, format_bytes(bytes)));
        results.push(serde_json::json!({
            "location": location.uuid.to_string(),
            "root": location.local_path.as_str(),
            "bytes": bytes,
        }));
    }

    if format.is_json() {
        formatter.print_json(&serde_json::Value::Array(results));
    }
    Ok(())
}
