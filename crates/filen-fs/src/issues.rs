//! Issue sink adapters

use std::sync::Mutex;

use filen_core::domain::{Issue, IssueSeverity};
use filen_core::ports::IIssueSink;
use tracing::{error, info, warn};

/// Forwards issues to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingIssueSink;

impl IIssueSink for TracingIssueSink {
    fn report_issue(&self, issue: Issue) {
        match issue.severity {
            IssueSeverity::Info => info!(
                path = %issue.path,
                error = %issue.error,
                "{}", issue.message
            ),
            IssueSeverity::Warning => warn!(
                path = %issue.path,
                error = %issue.error,
                "{}", issue.message
            ),
            IssueSeverity::Error | IssueSeverity::Critical => error!(
                path = %issue.path,
                error = %issue.error,
                severity = ?issue.severity,
                "{}", issue.message
            ),
        }
    }
}

/// Keeps every reported issue in memory
///
/// Used by the CLI to print what a scan skipped, and by tests.
#[derive(Debug, Default)]
pub struct CollectingIssueSink {
    issues: Mutex<Vec<Issue>>,
}

impl CollectingIssueSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the issues reported so far
    pub fn issues(&self) -> Vec<Issue> {
        self.issues
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.issues.lock().map(|guard| guard.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl IIssueSink for CollectingIssueSink {
    fn report_issue(&self, issue: Issue) {
        if let Ok(mut guard) = self.issues.lock() {
            guard.push(issue);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filen_core::domain::NormalizedPath;

    #[test]
    fn test_collecting_sink_keeps_order() {
        let sink = CollectingIssueSink::new();
        let err = std::io::Error::from(std::io::ErrorKind::PermissionDenied);
        for name in ["/a", "/b"] {
            sink.report_issue(Issue::local(
                IssueSeverity::Warning,
                NormalizedPath::new(name),
                &err,
                "stat failed",
            ));
        }

        let issues = sink.issues();
        assert_eq!(sink.len(), 2);
        assert_eq!(issues[0].path.as_str(), "/a");
        assert_eq!(issues[1].path.as_str(), "/b");
    }
}
