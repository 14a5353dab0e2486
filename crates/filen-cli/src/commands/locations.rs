//! Locations command - register, list and remove sync locations

use anyhow::{Context, Result};
use clap::Subcommand;
use filen_core::domain::{LocationId, SyncLocation};
use tracing::info;

use crate::commands::{absolute, AppContext};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum LocationsCommand {
    /// Register a local directory paired with a remote folder
    Add {
        /// Local root directory
        path: String,
        /// Identifier of the remote folder
        #[arg(long)]
        remote: String,
    },
    /// List configured locations
    List,
    /// Remove a location and its persisted state
    Remove {
        /// Location UUID
        uuid: String,
    },
}

impl LocationsCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let service = ctx.service().await?;

        match self {
            LocationsCommand::Add { path, remote } => {
                let root = absolute(path)?;
                let exists = service.exists(&root).await?;
                if !exists {
                    anyhow::bail!("{root} does not exist");
                }
                let location = SyncLocation::new(root, remote.as_str());
                info!(location = %location.uuid, "Registering sync location");
                service.add_sync_location(location.clone()).await?;

                if format.is_json() {
                    formatter.print_json(&serde_json::to_value(&location)?);
                } else {
                    formatter.success(&format!(
                        "Added {} ({})",
                        location.local_path, location.uuid
                    ));
                }
            }
            LocationsCommand::List => {
                let locations = service.sync_locations().await?;
                if format.is_json() {
                    formatter.print_json(&serde_json::to_value(&locations)?);
                } else if locations.is_empty() {
                    formatter.info("No sync locations configured");
                } else {
                    for location in &locations {
                        formatter.info(&format!(
                            "{}  {}  -> {}",
                            location.uuid, location.local_path, location.remote_folder_id
                        ));
                    }
                }
            }
            LocationsCommand::Remove { uuid } => {
                let id: LocationId = uuid
                    .parse()
                    .with_context(|| format!("Invalid location id '{uuid}'"))?;
                let removed = service.remove_sync_location(&id).await?;

                if format.is_json() {
                    formatter.print_json(&serde_json::json!({
                        "uuid": uuid,
                        "removed": removed,
                    }));
                } else if removed {
                    formatter.success(&format!("Removed {uuid}"));
                } else {
                    formatter.warn(&format!("No location with id {uuid}"));
                }
            }
        }
        Ok(())
    }
}
