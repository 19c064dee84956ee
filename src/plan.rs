//! Planning: resolve the version and derive every name and URL for a build.
//!
//! Planning never touches the filesystem or network beyond the `brew info`
//! query. When the version cannot be resolved the plan still carries a full
//! report (status `failed`, version `unknown`) so there is always something to
//! persist.

use crate::brew::Brew;
use crate::error::Result;
use crate::formula;
use crate::naming;
use crate::report::{BottleReport, Status};
use crate::upload::join_url;

pub const UNKNOWN_VERSION: &str = "unknown";

#[derive(Debug, Clone)]
pub struct Plan {
    pub report: BottleReport,
    pub bottle_name: String,
    pub json_name: String,
}

impl Plan {
    pub fn is_failed(&self) -> bool {
        self.report.is_failed()
    }
}

/// Resolve the version of `reference` through brew and build the plan.
pub async fn plan(brew: &Brew, reference: &str, tag: &str, nexus_base: &str) -> Plan {
    let version = brew.formula_version(reference).await;
    if let Err(e) = &version {
        tracing::warn!(reference, error = %e, "version resolution failed");
    }
    plan_with_version(reference, tag, nexus_base, version)
}

/// Build the plan from an already resolved (or failed) version lookup.
pub fn plan_with_version(
    reference: &str,
    tag: &str,
    nexus_base: &str,
    version: Result<String>,
) -> Plan {
    let short = formula::short_name(reference);
    let (version, failure) = match version {
        Ok(v) => (v, None),
        Err(e) => (UNKNOWN_VERSION.to_string(), Some(e.to_string())),
    };

    let bottle_name = naming::bottle_tar_gz(short, &version, tag);
    let json_name = naming::bottle_json(short, &version, tag);

    let mut report = BottleReport {
        reference: reference.to_string(),
        formula: short.to_string(),
        version,
        tag: tag.to_string(),
        bottle_file: bottle_name.clone(),
        json_file: json_name.clone(),
        nexus_url_bottle: join_url(nexus_base, &bottle_name),
        nexus_url_json: join_url(nexus_base, &json_name),
        status: Status::Planned,
        error: None,
        sha256: None,
    };
    if let Some(error) = failure {
        report.fail(error);
    }

    Plan {
        report,
        bottle_name,
        json_name,
    }
}
