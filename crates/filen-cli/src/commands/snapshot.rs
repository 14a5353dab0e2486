//! Snapshot command - build or reuse the tree of a sync location

use anyhow::Result;
use clap::Args;
use tracing::info;

use crate::commands::{absolute, location_at, location_for, AppContext};
use crate::output::{format_bytes, get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct SnapshotCommand {
    /// Root directory of a configured sync location (not a subdirectory)
    pub root: String,

    /// Walk the tree even if no local change was recorded
    #[arg(long)]
    pub force: bool,

    /// Print every file and folder
    #[arg(long)]
    pub list: bool,
}

impl SnapshotCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let service = ctx.service().await?;
        let root = absolute(&self.root)?;
        let locations = service.sync_locations().await?;
        // A subtree walk would be stored as the whole location's tree
        let location = match location_at(&locations, &root) {
            Some(location) => location.clone(),
            None => match location_for(&locations, &root) {
                Some(parent) => anyhow::bail!(
                    "{root} is inside sync location {}; snapshot its root instead",
                    parent.local_path
                ),
                None => anyhow::bail!(
                    "{root} is not a configured sync location (see `filen-localfs locations add`)"
                ),
            },
        };

        info!(root = %root, force = self.force, "Taking snapshot");
        let snapshot = service.snapshot(&root, &location, self.force).await?;
        let tree = &snapshot.tree;

        if format.is_json() {
            let mut json = serde_json::json!({
                "location": location.uuid.to_string(),
                "root": root.as_str(),
                "changed": snapshot.changed,
                "files": tree.files.len(),
                "folders": tree.folders.len(),
                "total_bytes": tree.total_file_bytes(),
            });
            if self.list {
                json["tree"] = serde_json::to_value(tree.as_ref())?;
            }
            formatter.print_json(&json);
            return Ok(());
        }

        let verb = if snapshot.changed { "Rebuilt" } else { "Reused" };
        formatter.success(&format!("{verb} snapshot of {root}"));
        formatter.info(&format!(
            "{} files, {} folders, {}",
            tree.files.len(),
            tree.folders.len(),
            format_bytes(tree.total_file_bytes())
        ));

        if self.list {
            let mut folders: Vec<_> = tree.folders.keys().collect();
            folders.sort();
            for folder in folders {
                formatter.info(&format!("{folder}/"));
            }
            let mut files: Vec<_> = tree.files.iter().collect();
            files.sort_by(|a, b| a.0.cmp(b.0));
            for (path, entry) in files {
                formatter.info(&format!("{path}  ({})", format_bytes(entry.size)));
            }
        }
        Ok(())
    }
}
