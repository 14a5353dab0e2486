//! Issues reported while scanning or mutating the local tree
//!
//! Issues are fire-and-forget: the scanner hands them to an
//! [`IIssueSink`](crate::ports::IIssueSink) and keeps going.

use std::fmt::Display;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::newtypes::NormalizedPath;

/// How bad an issue is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

/// Which side of the sync produced the issue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSource {
    Local,
    Remote,
}

/// A single reported issue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Issue {
    pub id: Uuid,
    pub severity: IssueSeverity,
    pub source: IssueSource,
    pub path: NormalizedPath,
    /// Rendered underlying error, including the OS code when there is one
    pub error: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl Issue {
    /// Builds a local-side issue stamped with the current time
    pub fn local(
        severity: IssueSeverity,
        path: NormalizedPath,
        error: &dyn Display,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            severity,
            source: IssueSource::Local,
            path,
            error: error.to_string(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}
