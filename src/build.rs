//! Building a bottle with `brew`.
//!
//! The build runs in a fresh `work-*` directory under the output workdir:
//!
//! 1. `brew uninstall --ignore-dependencies <ref>` (best effort)
//! 2. `brew install --build-bottle <ref>`
//! 3. `brew bottle --no-rebuild <ref>` (writes the tarball into the work dir)
//! 4. pick the produced `*.bottle.tar.gz`, rename it to its canonical name in
//!    the workdir and hash it
//!
//! The work directory is removed when the build finishes or fails, unless the
//! caller asked to keep it.

use crate::brew::Brew;
use crate::error::{BottleError, Result};
use crate::naming::BOTTLE_SUFFIX;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// Result of a successful build
#[derive(Debug, Clone)]
pub struct BuiltBottle {
    pub path: PathBuf,
    pub sha256: String,
    /// Set when the work directory was retained
    pub kept_workdir: Option<PathBuf>,
}

/// Scratch directory owned by one build
enum WorkDir {
    Scoped(TempDir),
    Kept(PathBuf),
}

impl WorkDir {
    fn create(parent: &Path, keep: bool) -> Result<Self> {
        let temp = tempfile::Builder::new()
            .prefix("work-")
            .tempdir_in(parent)
            .map_err(|e| BottleError::io("create temp workdir in", parent, e))?;
        if keep {
            Ok(WorkDir::Kept(temp.keep()))
        } else {
            Ok(WorkDir::Scoped(temp))
        }
    }

    fn path(&self) -> &Path {
        match self {
            WorkDir::Scoped(temp) => temp.path(),
            WorkDir::Kept(path) => path,
        }
    }
}

fn spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg} [{elapsed}]") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    pb
}

/// Build `reference` and place the bottle at `workdir/bottle_name`.
pub async fn build_bottle(
    brew: &Brew,
    reference: &str,
    workdir: &Path,
    bottle_name: &str,
    keep_work: bool,
) -> Result<BuiltBottle> {
    let work = WorkDir::create(workdir, keep_work)?;
    tracing::info!(reference, work = %work.path().display(), "building bottle");

    // Nothing to uninstall is the common case on a clean runner
    if let Err(e) = brew.uninstall(reference).await {
        match &e {
            BottleError::Command {
                exit_code, stderr, ..
            } => tracing::warn!(reference, exit_code, stderr = %stderr.trim(), "uninstall failed"),
            other => tracing::warn!(reference, error = %other, "uninstall failed"),
        }
    }

    let pb = spinner(format!("brew install --build-bottle {}", reference));
    let installed = brew.install_build_bottle(reference, work.path()).await;
    pb.finish_and_clear();
    installed?;

    let pb = spinner(format!("brew bottle {}", reference));
    let bottled = brew.bottle(reference, work.path()).await;
    pb.finish_and_clear();
    bottled?;

    let produced = find_bottle(work.path())?;
    let target = workdir.join(bottle_name);
    tokio::fs::rename(&produced, &target)
        .await
        .map_err(|e| BottleError::io("move bottle to", &target, e))?;
    tracing::debug!(from = %produced.display(), to = %target.display(), "bottle moved");

    let sha256 = file_sha256(&target).await?;

    let kept_workdir = match work {
        WorkDir::Kept(path) => Some(path),
        WorkDir::Scoped(_) => None,
    };

    Ok(BuiltBottle {
        path: target,
        sha256,
        kept_workdir,
    })
}

/// Newest `*.bottle.tar.gz` directly inside `dir`.
///
/// With several candidates the most recently modified wins; candidates that
/// cannot be stat'ed (such as dangling symlinks) are ignored, and if none of
/// them can be the result is `ArtifactUnreadable`.
pub fn find_bottle(dir: &Path) -> Result<PathBuf> {
    let entries = std::fs::read_dir(dir).map_err(|e| BottleError::io("read directory", dir, e))?;

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| {
            entry.file_name().to_string_lossy().ends_with(BOTTLE_SUFFIX)
                && entry
                    .file_type()
                    .is_ok_and(|t| t.is_file() || t.is_symlink())
        })
        .map(|entry| entry.path())
        .collect();
    candidates.sort();

    match candidates.len() {
        0 => return Err(BottleError::ArtifactNotFound(dir.to_path_buf())),
        1 => return Ok(candidates.swap_remove(0)),
        _ => {}
    }

    let mut dated: Vec<(PathBuf, SystemTime)> = candidates
        .into_iter()
        .filter_map(|path| {
            let meta = std::fs::metadata(&path).ok().filter(|m| m.is_file())?;
            Some((path, meta.modified().ok()?))
        })
        .collect();
    if dated.is_empty() {
        return Err(BottleError::ArtifactUnreadable(dir.to_path_buf()));
    }

    // Stable sort keeps name order among equal timestamps
    dated.sort_by(|a, b| b.1.cmp(&a.1));
    Ok(dated.swap_remove(0).0)
}

/// Hex-encoded SHA-256 of a file's contents
pub async fn file_sha256(path: &Path) -> Result<String> {
    use sha2::{Digest, Sha256};
    use tokio::io::AsyncReadExt;

    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| BottleError::io("open for hashing", path, e))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0; 8192];

    loop {
        let n = file
            .read(&mut buffer)
            .await
            .map_err(|e| BottleError::io("hash", path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}
