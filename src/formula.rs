//! Formula references and locating formula files in a tap checkout.

use crate::error::{BottleError, Result};
use std::fmt;
use std::path::{Path, PathBuf};

/// A fully qualified `owner/tap/formula` reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormulaRef {
    owner: String,
    tap: String,
    name: String,
}

impl FormulaRef {
    pub fn parse(reference: &str) -> Result<Self> {
        let parts: Vec<&str> = reference.split('/').collect();
        if parts.len() != 3 || parts.iter().any(|p| p.trim().is_empty()) {
            return Err(BottleError::InvalidRef(reference.to_string()));
        }
        Ok(Self {
            owner: parts[0].to_string(),
            tap: parts[1].to_string(),
            name: parts[2].to_string(),
        })
    }

    /// `owner/tap`
    pub fn tap(&self) -> String {
        format!("{}/{}", self.owner, self.tap)
    }

    /// Short formula name
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for FormulaRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.owner, self.tap, self.name)
    }
}

/// Short name of a reference: its last path segment
pub fn short_name(reference: &str) -> &str {
    reference.rsplit('/').next().unwrap_or(reference)
}

/// Shard directory letter for `name`, ignoring `shard_prefix`.
fn shard_letter(name: &str, shard_prefix: &str) -> Option<String> {
    let stripped = if shard_prefix.is_empty() {
        name
    } else {
        name.strip_prefix(shard_prefix).unwrap_or(name)
    };
    let base = if stripped.is_empty() { name } else { stripped };
    base.chars().next().map(|c| c.to_lowercase().to_string())
}

/// Locate `<name>.rb` inside a tap checkout.
///
/// Tries the sharded layout `Formula/<letter>/<name>.rb` first, then the flat
/// `Formula/<name>.rb`, then the repository root.
pub fn formula_path(tap_workdir: &Path, name: &str, shard_prefix: &str) -> Result<PathBuf> {
    let filename = format!("{}.rb", name);
    let formula_dir = tap_workdir.join("Formula");

    let mut candidates = Vec::new();
    if let Some(letter) = shard_letter(name, shard_prefix) {
        candidates.push(formula_dir.join(letter).join(&filename));
    }
    candidates.push(formula_dir.join(&filename));
    candidates.push(tap_workdir.join(&filename));

    for candidate in &candidates {
        if candidate.is_file() {
            tracing::debug!(path = %candidate.display(), "found formula");
            return Ok(candidate.clone());
        }
    }

    Err(BottleError::FormulaNotFound(candidates.swap_remove(0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_ref() {
        let r = FormulaRef::parse("acme/core/widget").unwrap();
        assert_eq!(r.tap(), "acme/core");
        assert_eq!(r.name(), "widget");
        assert_eq!(r.to_string(), "acme/core/widget");
    }

    #[test]
    fn test_parse_ref_invalid() {
        assert!(FormulaRef::parse("widget").is_err());
        assert!(FormulaRef::parse("acme/widget").is_err());
        assert!(FormulaRef::parse("a/b/c/d").is_err());
        assert!(FormulaRef::parse("acme//widget").is_err());
    }

    #[test]
    fn test_short_name() {
        assert_eq!(short_name("acme/core/widget"), "widget");
        assert_eq!(short_name("widget"), "widget");
    }

    #[test]
    fn test_shard_letter_strips_prefix() {
        assert_eq!(shard_letter("gov-srt", "gov-").as_deref(), Some("s"));
        assert_eq!(shard_letter("gov-", "gov-").as_deref(), Some("g"));
        assert_eq!(shard_letter("Widget", "").as_deref(), Some("w"));
    }

    #[test]
    fn test_formula_path_prefers_sharded_layout() {
        let temp = TempDir::new().unwrap();
        let sharded = temp.path().join("Formula/s/gov-srt.rb");
        std::fs::create_dir_all(sharded.parent().unwrap()).unwrap();
        std::fs::write(&sharded, "class GovSrt < Formula\nend\n").unwrap();
        std::fs::write(temp.path().join("Formula/gov-srt.rb"), "flat").unwrap();

        assert_eq!(formula_path(temp.path(), "gov-srt", "gov-").unwrap(), sharded);
    }

    #[test]
    fn test_formula_path_flat_fallback() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("Formula")).unwrap();
        let flat = temp.path().join("Formula/widget.rb");
        std::fs::write(&flat, "").unwrap();
        assert_eq!(formula_path(temp.path(), "widget", "").unwrap(), flat);
    }

    #[test]
    fn test_formula_path_missing() {
        let temp = TempDir::new().unwrap();
        let err = formula_path(temp.path(), "widget", "").unwrap_err();
        match err {
            BottleError::FormulaNotFound(p) => assert!(p.ends_with("Formula/w/widget.rb")),
            other => panic!("unexpected error: {}", other),
        }
    }
}
