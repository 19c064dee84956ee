//! Bottle build reports.
//!
//! A [`BottleReport`] records the inputs and outcome of one `(ref, tag)` build
//! attempt. It is written next to the bottle as `<base>.bottle.json` and later
//! read back by [`crate::checksums`] to assemble a formula's bottle block.
//!
//! # Checkpoints
//!
//! The same file is overwritten as the run progresses:
//!
//! ```text
//! planned  ->  built (sha256 recorded)  ->  uploaded
//! ```
//!
//! [`ReportWriter`] remembers the last checkpoint it persisted and refuses to
//! go backwards, so a later phase can never be clobbered by a stale one.

use crate::error::{BottleError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Planned,
    Failed,
}

/// Provenance record for one bottle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BottleReport {
    #[serde(rename = "ref")]
    pub reference: String,
    pub formula: String,
    pub version: String,
    #[serde(default)]
    pub tag: String,

    pub bottle_file: String,
    pub json_file: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nexus_url_bottle: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nexus_url_json: String,

    pub status: Status,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl BottleReport {
    /// Mark the report failed. Clears any recorded checksum.
    pub fn fail(&mut self, error: impl Into<String>) {
        let mut error = error.into();
        if error.trim().is_empty() {
            error = "unknown error".to_string();
        }
        self.status = Status::Failed;
        self.error = Some(error);
        self.sha256 = None;
    }

    /// Attach the checksum of a freshly built bottle.
    pub fn record_sha256(&mut self, sha256: impl Into<String>) {
        debug_assert_ne!(self.status, Status::Failed, "failed reports carry no checksum");
        self.sha256 = Some(sha256.into());
    }

    pub fn is_failed(&self) -> bool {
        self.status == Status::Failed
    }

    /// `failed` implies an error and no checksum; a checksum implies not failed.
    pub fn is_consistent(&self) -> bool {
        match self.status {
            Status::Failed => {
                self.error.as_deref().is_some_and(|e| !e.is_empty()) && self.sha256.is_none()
            }
            Status::Planned => self.error.is_none(),
        }
    }

    /// Serialize with two-space indentation and a trailing newline.
    pub fn to_json(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    pub fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read(path).map_err(|e| BottleError::io("read report", path, e))?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

/// Points in the run at which the report is persisted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Checkpoint {
    Planned,
    Built,
    Uploaded,
}

impl Checkpoint {
    pub fn as_str(self) -> &'static str {
        match self {
            Checkpoint::Planned => "planned",
            Checkpoint::Built => "built",
            Checkpoint::Uploaded => "uploaded",
        }
    }
}

/// Overwrites the report file at each checkpoint
#[derive(Debug)]
pub struct ReportWriter {
    path: PathBuf,
    last: Option<Checkpoint>,
}

impl ReportWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn last_checkpoint(&self) -> Option<Checkpoint> {
        self.last
    }

    /// Replace the file contents with `report`.
    ///
    /// Rewriting the same checkpoint is allowed; moving to an earlier one is not.
    pub async fn write(&mut self, report: &BottleReport, checkpoint: Checkpoint) -> Result<()> {
        if let Some(last) = self.last
            && checkpoint < last
        {
            return Err(BottleError::ReportRegression {
                later: last.as_str(),
                earlier: checkpoint.as_str(),
            });
        }

        let body = report.to_json()?;
        tokio::fs::write(&self.path, body)
            .await
            .map_err(|e| BottleError::io("write report", &self.path, e))?;

        tracing::debug!(
            path = %self.path.display(),
            checkpoint = checkpoint.as_str(),
            "report written"
        );
        self.last = Some(checkpoint);
        Ok(())
    }
}
