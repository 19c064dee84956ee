//! Invoking the external `brew` tool.
//!
//! Every subcommand goes through [`run`], which captures stdout and stderr and
//! turns a non-zero exit into [`BottleError::Command`]. Whether such a failure
//! is fatal is decided by the caller: the builder swallows a failed uninstall
//! but aborts on a failed install or bottle step.

use crate::error::{BottleError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Captured result of a finished process
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
}

/// Run `bin args...` to completion, optionally inside `dir`.
///
/// The child is killed if the returned future is dropped, so cancelling the
/// surrounding run also stops the tool.
pub async fn run(bin: &Path, args: &[&str], dir: Option<&Path>) -> Result<CommandOutput> {
    let command_line = format!("{} {}", bin.display(), args.join(" "));
    tracing::debug!(command = %command_line, dir = ?dir, "running");

    let mut cmd = Command::new(bin);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(dir) = dir {
        cmd.current_dir(dir);
    }

    let output = cmd.output().await.map_err(|source| BottleError::Spawn {
        command: command_line.clone(),
        source,
    })?;

    let captured = CommandOutput {
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        // Killed by a signal: no exit code, report a generic failure
        exit_code: output.status.code().unwrap_or(1),
    };

    if !output.status.success() {
        return Err(BottleError::Command {
            command: command_line,
            exit_code: captured.exit_code,
            stderr: captured.stderr,
        });
    }
    Ok(captured)
}

#[derive(Debug, Deserialize)]
struct InfoV2 {
    #[serde(default)]
    formulae: Vec<InfoFormula>,
}

#[derive(Debug, Deserialize)]
struct InfoFormula {
    #[serde(default)]
    versions: InfoVersions,
}

#[derive(Debug, Default, Deserialize)]
struct InfoVersions {
    #[serde(default)]
    stable: Option<String>,
}

/// Extract the first formula's stable version from `brew info --json=v2`.
///
/// Some brew wrappers print a banner before the JSON document, so parsing
/// starts at the first `{`.
pub fn parse_stable_version(stdout: &str, reference: &str) -> Result<String> {
    let not_found = |reason: String| BottleError::VersionNotFound {
        formula: reference.to_string(),
        reason,
    };

    let start = stdout
        .find('{')
        .ok_or_else(|| not_found(format!("no JSON found in output {:?}", stdout)))?;

    let info: InfoV2 = serde_json::from_str(&stdout[start..])
        .map_err(|e| not_found(format!("parse brew info json: {}", e)))?;

    info.formulae
        .into_iter()
        .next()
        .and_then(|f| f.versions.stable)
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| not_found("no stable version found".to_string()))
}

/// Thin client over the `brew` binary
#[derive(Debug, Clone)]
pub struct Brew {
    bin: PathBuf,
}

impl Brew {
    pub fn new(bin: impl Into<PathBuf>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn bin(&self) -> &Path {
        &self.bin
    }

    /// Current stable version of `reference` according to brew.
    pub async fn formula_version(&self, reference: &str) -> Result<String> {
        let output = run(&self.bin, &["info", "--json=v2", reference], None)
            .await
            .map_err(|e| BottleError::VersionNotFound {
                formula: reference.to_string(),
                reason: format!("brew info failed: {}", e),
            })?;
        parse_stable_version(&output.stdout, reference)
    }

    pub async fn uninstall(&self, reference: &str) -> Result<CommandOutput> {
        run(
            &self.bin,
            &["uninstall", "--ignore-dependencies", reference],
            None,
        )
        .await
    }

    pub async fn install_build_bottle(&self, reference: &str, dir: &Path) -> Result<CommandOutput> {
        run(&self.bin, &["install", "--build-bottle", reference], Some(dir)).await
    }

    pub async fn bottle(&self, reference: &str, dir: &Path) -> Result<CommandOutput> {
        run(&self.bin, &["bottle", "--no-rebuild", reference], Some(dir)).await
    }
}
