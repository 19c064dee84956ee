//! Gathering bottle checksums from reports in the workdir.

use crate::error::{BottleError, Result};
use crate::naming::REPORT_SUFFIX;
use crate::report::BottleReport;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// tag -> sha256
pub type ChecksumSet = BTreeMap<String, String>;

/// Report files named `{formula}-*.bottle.json`, oldest first.
///
/// Ordering is by modification time, then by filename, so a later build for
/// the same tag overrides an earlier one regardless of directory order.
fn report_files(workdir: &Path, formula: &str) -> Result<Vec<PathBuf>> {
    let prefix = format!("{}-", formula);
    let entries =
        std::fs::read_dir(workdir).map_err(|e| BottleError::io("read directory", workdir, e))?;

    let mut files: Vec<(SystemTime, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            let name = entry.file_name();
            let name = name.to_string_lossy();
            name.len() > prefix.len() + REPORT_SUFFIX.len()
                && name.starts_with(&prefix)
                && name.ends_with(REPORT_SUFFIX)
        })
        .map(|entry| {
            let modified = entry
                .metadata()
                .and_then(|m| m.modified())
                .unwrap_or(SystemTime::UNIX_EPOCH);
            (modified, entry.path())
        })
        .collect();
    files.sort();

    Ok(files.into_iter().map(|(_, path)| path).collect())
}

/// Collect tag -> sha256 for `formula` from every report in `workdir`.
///
/// Unreadable reports and reports without tag or checksum are skipped, as are
/// reports recorded for a different formula that happens to share the prefix.
pub fn collect(workdir: &Path, formula: &str) -> Result<ChecksumSet> {
    let files = report_files(workdir, formula)?;
    if files.is_empty() {
        return Err(BottleError::NoChecksums(format!(
            "no bottle reports found: {}",
            workdir.join(format!("{}-*{}", formula, REPORT_SUFFIX)).display()
        )));
    }

    let mut out = ChecksumSet::new();
    for path in &files {
        let report = match BottleReport::read(path) {
            Ok(report) => report,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping report");
                continue;
            }
        };
        if report.formula != formula {
            continue;
        }
        let tag = report.tag.trim();
        let sha = report.sha256.as_deref().map(str::trim).unwrap_or_default();
        if tag.is_empty() || sha.is_empty() {
            continue;
        }
        if let Some(previous) = out.insert(tag.to_string(), sha.to_string())
            && previous != sha
        {
            tracing::debug!(tag, path = %path.display(), "newer report overrides checksum");
        }
    }

    if out.is_empty() {
        return Err(BottleError::NoChecksums(
            "no sha256 entries found in reports (missing sha256?)".to_string(),
        ));
    }
    Ok(out)
}
