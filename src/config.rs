//! Command-line and environment configuration.
//!
//! Flags override environment variables. Everything is parsed once into
//! [`Settings`]; nothing downstream reads the environment.

use crate::error::{BottleError, Result};
use crate::formula::FormulaRef;
use crate::upload::Credentials;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "bottler")]
#[command(author, version, about = "Build Homebrew bottles and publish them to Nexus", long_about = None)]
pub struct Cli {
    /// Formula reference (owner/tap/formula)
    #[arg(long = "ref", env = "BOTTLE_REF", value_name = "REF")]
    pub reference: Option<String>,

    /// Bottle tag (platform identifier)
    #[arg(long, env = "DEFAULT_TAG")]
    pub tag: Option<String>,

    /// Directory for bottles and reports
    #[arg(long, env = "DEFAULT_WORKDIR", default_value = "./dist")]
    pub workdir: PathBuf,

    /// Nexus repository base URL
    #[arg(long, env = "NEXUS_BASE_URL")]
    pub nexus_base: Option<String>,

    /// Nexus user
    #[arg(long, env = "NEXUS_USER")]
    pub nexus_user: Option<String>,

    /// Nexus password
    #[arg(long, env = "NEXUS_PASS", hide_env_values = true)]
    pub nexus_pass: Option<String>,

    /// brew executable
    #[arg(long, env = "BREW_BIN", default_value = "brew")]
    pub brew_bin: PathBuf,

    /// Local tap checkout containing Formula/
    #[arg(long, env = "TAP_WORKDIR")]
    pub tap_workdir: Option<PathBuf>,

    /// root_url written into the bottle block (defaults to the Nexus base, empty omits it)
    #[arg(long, env = "BOTTLE_ROOT_URL")]
    pub root_url: Option<String>,

    /// Name prefix ignored when picking the Formula/<letter>/ shard
    #[arg(long, env = "FORMULA_SHARD_PREFIX", default_value = "")]
    pub formula_shard_prefix: String,

    /// Only write the planned report
    #[arg(long)]
    pub dry_run: bool,

    /// Build the bottle (install --build-bottle + bottle)
    #[arg(long)]
    pub build_bottle: bool,

    /// Upload bottle and report to Nexus
    #[arg(long)]
    pub upload: bool,

    /// Keep the temporary build directory
    #[arg(long)]
    pub keep_work: bool,

    /// Rewrite the formula's bottle block from the reports in the workdir
    #[arg(long)]
    pub update_formula: bool,

    /// Upload the newest existing bottle and report from the workdir, without building
    #[arg(long)]
    pub publish_existing: bool,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

/// What the run does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
    /// Plan, then optionally build, patch and upload one formula
    Formula(FormulaRef),
    /// Publish bottle + report already present in the workdir
    PublishExisting,
}

/// Validated configuration for one run
#[derive(Debug, Clone)]
pub struct Settings {
    pub mode: Mode,
    pub tag: String,
    pub workdir: PathBuf,
    pub nexus_base: String,
    pub root_url: String,
    pub brew_bin: PathBuf,
    pub tap_workdir: Option<PathBuf>,
    pub shard_prefix: String,
    pub credentials: Option<Credentials>,
    pub dry_run: bool,
    pub build_bottle: bool,
    pub upload: bool,
    pub keep_work: bool,
    pub update_formula: bool,
}

fn required(value: Option<String>, what: &str, hint: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(BottleError::Config(format!("missing {}. Set {}", what, hint))),
    }
}

impl Settings {
    pub fn from_cli(cli: Cli) -> Result<Self> {
        let tag = required(cli.tag, "tag", "--tag or DEFAULT_TAG")?;
        if cli.workdir.as_os_str().is_empty() {
            return Err(BottleError::Config(
                "missing workdir. Set --workdir or DEFAULT_WORKDIR".to_string(),
            ));
        }
        let nexus_base = required(cli.nexus_base, "nexus base", "--nexus-base or NEXUS_BASE_URL")?;

        let mode = if cli.publish_existing {
            Mode::PublishExisting
        } else {
            let reference = required(cli.reference, "reference", "--ref or BOTTLE_REF")?;
            Mode::Formula(FormulaRef::parse(&reference)?)
        };

        let credentials = match (cli.nexus_user, cli.nexus_pass) {
            (Some(user), Some(pass)) if !user.is_empty() && !pass.is_empty() => {
                Some(Credentials::new(user, pass))
            }
            _ => None,
        };
        if (cli.upload || cli.publish_existing) && credentials.is_none() {
            return Err(BottleError::Config(
                "uploading requires NEXUS_USER and NEXUS_PASS".to_string(),
            ));
        }

        if cli.update_formula && !cli.publish_existing && cli.tap_workdir.is_none() {
            return Err(BottleError::Config(
                "--update-formula requires --tap-workdir or TAP_WORKDIR".to_string(),
            ));
        }

        let root_url = cli.root_url.unwrap_or_else(|| nexus_base.clone());

        let mut settings = Settings {
            mode,
            tag,
            workdir: cli.workdir,
            nexus_base,
            root_url,
            brew_bin: cli.brew_bin,
            tap_workdir: cli.tap_workdir,
            shard_prefix: cli.formula_shard_prefix,
            credentials,
            dry_run: cli.dry_run,
            build_bottle: cli.build_bottle,
            upload: cli.upload,
            keep_work: cli.keep_work,
            update_formula: cli.update_formula,
        };

        // Publishing existing files never builds and is never a dry run
        if settings.mode == Mode::PublishExisting {
            settings.dry_run = false;
            settings.build_bottle = false;
            settings.keep_work = false;
            settings.update_formula = false;
            settings.upload = true;
        }

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Settings> {
        let mut argv = vec!["bottler"];
        argv.extend_from_slice(args);
        Settings::from_cli(Cli::try_parse_from(argv).unwrap())
    }

    const BASE: [&str; 4] = ["--tag", "arm64_sonoma", "--nexus-base", "https://n/b"];

    fn with_base<'a>(extra: &[&'a str]) -> Vec<&'a str> {
        let mut args: Vec<&'a str> = BASE.to_vec();
        args.extend_from_slice(extra);
        args
    }

    #[test]
    fn test_minimal_settings() {
        let settings = parse(&with_base(&["--ref", "acme/core/widget"])).unwrap();
        assert_eq!(
            settings.mode,
            Mode::Formula(FormulaRef::parse("acme/core/widget").unwrap())
        );
        assert_eq!(settings.root_url, "https://n/b");
        assert!(!settings.build_bottle);
        assert!(settings.credentials.is_none());
    }

    #[test]
    fn test_missing_ref_is_config_error() {
        let err = parse(&with_base(&[])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_invalid_ref_is_config_error() {
        let err = parse(&with_base(&["--ref", "widget"])).unwrap_err();
        assert!(matches!(err, BottleError::InvalidRef(_)));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_upload_requires_credentials() {
        let err = parse(&with_base(&["--ref", "a/b/c", "--upload"])).unwrap_err();
        assert!(matches!(err, BottleError::Config(_)));

        let ok = parse(&with_base(&[
            "--ref",
            "a/b/c",
            "--upload",
            "--nexus-user",
            "ci",
            "--nexus-pass",
            "pw",
        ]))
        .unwrap();
        assert!(ok.upload);
        assert!(!ok.build_bottle, "upload does not imply a build");
    }

    #[test]
    fn test_update_formula_requires_tap_workdir() {
        let err = parse(&with_base(&["--ref", "a/b/c", "--update-formula"])).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn test_empty_root_url_is_kept() {
        let settings = parse(&with_base(&["--ref", "a/b/c", "--root-url", ""])).unwrap();
        assert_eq!(settings.root_url, "");
    }

    #[test]
    fn test_publish_existing_overrides_flags() {
        let settings = parse(&with_base(&[
            "--publish-existing",
            "--dry-run",
            "--build-bottle",
            "--nexus-user",
            "ci",
            "--nexus-pass",
            "pw",
        ]))
        .unwrap();
        assert_eq!(settings.mode, Mode::PublishExisting);
        assert!(settings.upload);
        assert!(!settings.dry_run);
        assert!(!settings.build_bottle);
    }
}
