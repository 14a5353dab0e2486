//! Issue sink port (driven/secondary port)
//!
//! The scanner reports per-entry failures here and never waits for the
//! outcome, so the method is synchronous and infallible. Implementations that
//! need I/O should queue internally.

use crate::domain::Issue;

/// Receives issues found during scans and trash maintenance
pub trait IIssueSink: Send + Sync {
    /// Records an issue; must not block
    fn report_issue(&self, issue: Issue);
}
