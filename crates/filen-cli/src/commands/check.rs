//! Check command - explain whether a path is eligible for sync

use anyhow::Result;
use clap::Args;
use filen_fs::path_policy::PathPolicy;

use crate::commands::{absolute, AppContext};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Sync location root
    pub root: String,
    /// Path to check (absolute, or relative to the working directory)
    pub path: String,
}

impl CheckCommand {
    pub async fn execute(&self, ctx: &AppContext, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        let service = ctx.service().await?;
        let root = absolute(&self.root)?;
        let path = absolute(&self.path)?;

        let relative = path.relative_to(&root)?;
        let reason = service.exclusion_reason(&root, &path).await?;
        let valid_name = PathPolicy::is_valid_path(&relative);

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "path": path.as_str(),
                "relative": relative,
                "included": reason.is_none(),
                "reason": reason.map(|r| r.to_string()),
                "portable_name": valid_name,
            }));
            return Ok(());
        }

        match reason {
            None => formatter.success(&format!("{relative} is included in snapshots")),
            Some(reason) => formatter.warn(&format!("{relative} is excluded: {reason}")),
        }
        if !valid_name {
            formatter.warn("name contains characters or device names reserved on Windows");
        }
        Ok(())
    }
}
