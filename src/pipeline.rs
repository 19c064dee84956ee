//! The bottling run: plan, build, patch formula, upload.
//!
//! ```text
//! plan ──▶ report(planned) ──┬─ failed plan ──────────────▶ PlanFailed
//!                            ├─ --dry-run ────────────────▶ DryRun
//!                            └─ [build ──▶ report(built)]
//!                               [update formula]
//!                               [upload ──▶ report(uploaded)] ──▶ Finished
//! ```
//!
//! Every phase runs to completion before the next one starts. Errors from the
//! build, formula patch and upload phases abort the run.

use crate::brew::Brew;
use crate::build::{self, BuiltBottle};
use crate::checksums;
use crate::config::{Mode, Settings};
use crate::bottle_block::{self, PatchOutcome};
use crate::error::{BottleError, Result};
use crate::formula::{self, FormulaRef};
use crate::naming;
use crate::plan;
use crate::report::{Checkpoint, ReportWriter};
use crate::upload::{Credentials, Uploader, join_url};
use colored::Colorize;
use std::path::{Path, PathBuf};

/// Terminal state of a run
#[derive(Debug)]
pub enum Outcome {
    /// Version resolution failed; only the failed report was written
    PlanFailed { report: PathBuf, error: String },
    /// Planned report written, nothing else done
    DryRun { report: PathBuf },
    Finished {
        report: PathBuf,
        built: Option<BuiltBottle>,
        patched_formula: Option<(PathBuf, PatchOutcome)>,
        uploaded: bool,
    },
    /// Existing workdir files were uploaded
    Published { bottle_url: String, report_url: String },
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::PlanFailed { .. } => 1,
            _ => 0,
        }
    }
}

fn credentials(settings: &Settings) -> Result<&Credentials> {
    settings
        .credentials
        .as_ref()
        .ok_or_else(|| BottleError::Config("Nexus user or Nexus pass is empty".to_string()))
}

pub async fn run(settings: &Settings) -> Result<Outcome> {
    tokio::fs::create_dir_all(&settings.workdir)
        .await
        .map_err(|e| BottleError::io("create workdir", &settings.workdir, e))?;

    match &settings.mode {
        Mode::PublishExisting => publish_existing(settings).await,
        Mode::Formula(reference) => run_formula(settings, reference).await,
    }
}

async fn run_formula(settings: &Settings, reference: &FormulaRef) -> Result<Outcome> {
    let brew = Brew::new(&settings.brew_bin);
    let reference_str = reference.to_string();

    let plan = plan::plan(&brew, &reference_str, &settings.tag, &settings.nexus_base).await;
    let mut writer = ReportWriter::new(settings.workdir.join(&plan.json_name));
    writer.write(&plan.report, Checkpoint::Planned).await?;
    let report_path = writer.path().to_path_buf();

    if plan.is_failed() {
        let error = plan.report.error.clone().unwrap_or_default();
        eprintln!("{} plan failed: {}", "error:".red().bold(), error);
        println!("{} {}", "wrote:".green(), report_path.display());
        return Ok(Outcome::PlanFailed {
            report: report_path,
            error,
        });
    }

    if settings.dry_run {
        if settings.build_bottle || settings.upload || settings.update_formula {
            tracing::warn!("--dry-run set, ignoring --build-bottle/--upload/--update-formula");
            eprintln!(
                "{} --dry-run set, ignoring --build-bottle/--upload/--update-formula",
                "note:".yellow()
            );
        }
        println!("{} {}", "wrote:".green(), report_path.display());
        return Ok(Outcome::DryRun {
            report: report_path,
        });
    }

    let mut report = plan.report;
    let mut built = None;

    if settings.build_bottle {
        let result = build::build_bottle(
            &brew,
            &reference_str,
            &settings.workdir,
            &plan.bottle_name,
            settings.keep_work,
        )
        .await;

        match result {
            Ok(bottle) => {
                report.record_sha256(&bottle.sha256);
                writer.write(&report, Checkpoint::Built).await?;
                if let Some(kept) = &bottle.kept_workdir {
                    println!("{} {}", "keeping workdir:".yellow(), kept.display());
                }
                println!("{} {}", "wrote:".green(), bottle.path.display());
                built = Some(bottle);
            }
            Err(e) => {
                report.fail(e.to_string());
                writer.write(&report, Checkpoint::Built).await?;
                return Err(e);
            }
        }
    }

    let mut patched_formula = None;
    if settings.update_formula {
        if built.is_some() {
            patched_formula = Some(update_formula(settings, reference.name())?);
        } else {
            tracing::warn!("--update-formula needs a build in the same run, skipping");
            eprintln!(
                "{} --update-formula needs --build-bottle, skipping formula update",
                "note:".yellow()
            );
        }
    }

    let mut uploaded = false;
    if settings.upload {
        let credentials = credentials(settings)?;
        // Without a build in this run the bottle is expected at its canonical path
        let bottle_path = built
            .as_ref()
            .map(|b| b.path.clone())
            .unwrap_or_else(|| settings.workdir.join(&plan.bottle_name));

        let uploader = Uploader::new()?;
        uploader
            .put_file(&report.nexus_url_bottle, &bottle_path, credentials)
            .await?;
        uploader
            .put_file(&report.nexus_url_json, &report_path, credentials)
            .await?;
        println!("{} {}", "upload bottle to:".cyan(), report.nexus_url_bottle);
        println!("{} {}", "upload json to:".cyan(), report.nexus_url_json);

        writer.write(&report, Checkpoint::Uploaded).await?;
        uploaded = true;
    }

    println!("{} {}", "wrote:".green(), report_path.display());
    Ok(Outcome::Finished {
        report: report_path,
        built,
        patched_formula,
        uploaded,
    })
}

fn update_formula(settings: &Settings, name: &str) -> Result<(PathBuf, PatchOutcome)> {
    let tap_workdir = settings.tap_workdir.as_deref().ok_or_else(|| {
        BottleError::Config("--update-formula requires --tap-workdir or TAP_WORKDIR".to_string())
    })?;

    let shas = checksums::collect(&settings.workdir, name)?;
    let path = formula::formula_path(tap_workdir, name, &settings.shard_prefix)?;
    let outcome = bottle_block::replace_bottle_block(&path, &settings.root_url, &shas)?;
    println!(
        "{} {} ({} bottles)",
        "updated formula:".green(),
        path.display(),
        shas.len()
    );
    Ok((path, outcome))
}

async fn publish_existing(settings: &Settings) -> Result<Outcome> {
    let credentials = credentials(settings)?;
    let workdir: &Path = &settings.workdir;

    let bottle_path = build::find_bottle(workdir)?;
    let bottle_file = bottle_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let json_file = naming::report_for_bottle(&bottle_file)
        .ok_or_else(|| BottleError::ArtifactNotFound(workdir.to_path_buf()))?;
    let json_path = workdir.join(&json_file);

    tokio::fs::metadata(&json_path)
        .await
        .map_err(|e| BottleError::io("bottle json file not found", &json_path, e))?;

    let bottle_url = join_url(&settings.nexus_base, &bottle_file);
    let report_url = join_url(&settings.nexus_base, &json_file);

    let uploader = Uploader::new()?;
    uploader.put_file(&bottle_url, &bottle_path, credentials).await?;
    uploader.put_file(&report_url, &json_path, credentials).await?;

    println!("{} {}", "upload bottle to:".cyan(), bottle_url);
    println!("{} {}", "upload bottle json to:".cyan(), report_url);
    Ok(Outcome::Published {
        bottle_url,
        report_url,
    })
}
