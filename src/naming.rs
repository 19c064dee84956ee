//! Canonical bottle and report filenames.
//!
//! Every artifact produced for a `(formula, version, tag)` triple shares one
//! base name, `{formula}-{version}.{tag}.bottle`, so the tarball and its report
//! always sit next to each other in the workdir and on the repository:
//!
//! ```text
//! widget-1.2.3.macos-13.bottle.tar.gz
//! widget-1.2.3.macos-13.bottle.json
//! ```

pub const BOTTLE_SUFFIX: &str = ".bottle.tar.gz";
pub const REPORT_SUFFIX: &str = ".bottle.json";

/// Shared base name without extension
pub fn base(formula: &str, version: &str, tag: &str) -> String {
    format!("{}-{}.{}.bottle", formula, version, tag)
}

/// Bottle tarball filename
pub fn bottle_tar_gz(formula: &str, version: &str, tag: &str) -> String {
    base(formula, version, tag) + ".tar.gz"
}

/// Report filename
pub fn bottle_json(formula: &str, version: &str, tag: &str) -> String {
    base(formula, version, tag) + ".json"
}

/// Report filename that belongs to an existing bottle filename.
///
/// Returns `None` when `bottle_file` does not carry the `.bottle.tar.gz` suffix
/// or has nothing in front of it.
pub fn report_for_bottle(bottle_file: &str) -> Option<String> {
    let stem = bottle_file.strip_suffix(BOTTLE_SUFFIX)?;
    if stem.is_empty() {
        return None;
    }
    Some(format!("{}{}", stem, REPORT_SUFFIX))
}
