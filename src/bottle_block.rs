//! Rewriting the `bottle do ... end` block of a formula.
//!
//! The formula is treated as plain lines. The first line that reads
//! `bottle do` (optionally commented out) opens the block and the next line
//! that reads `end` (optionally commented, optionally followed by a comment)
//! closes it. The whole range is replaced by a freshly rendered, uncommented
//! block:
//!
//! ```ruby
//!   bottle do
//!     root_url "https://nexus.example/repository/bottles"
//!     sha256 cellar: :any, arm64_sonoma: "9f2c..."
//!     sha256 cellar: :any_skip_relocation, x86_64_linux: "41ad..."
//!   end
//! ```
//!
//! Formulae without a block get one inserted before the first `depends_on`,
//! or appended at the end. Entries are sorted by tag, so patching a file with
//! the same checksums twice yields identical bytes.

use crate::checksums::ChecksumSet;
use crate::error::{BottleError, Result};
use regex::Regex;
use std::path::Path;
use std::sync::LazyLock;

static BOTTLE_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:#\s*)?bottle\s+do\s*$").expect("regex for bottle block start")
});

static BOTTLE_END: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:#\s*)?end\s*(?:#.*)?$").expect("regex for bottle block end")
});

static DEPENDS_ON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*depends_on\b").expect("regex for depends_on"));

/// Where the bottle block sits, by zero-based line index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockLocation {
    NotFound,
    /// Inclusive line range
    Found { start: usize, end: usize },
    /// A start marker with no end marker after it
    Unterminated { start: usize },
}

/// How the block ended up in the formula
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    Replaced,
    InsertedBeforeDependsOn,
    Appended,
}

pub fn locate_block<S: AsRef<str>>(lines: &[S]) -> BlockLocation {
    let Some(start) = lines
        .iter()
        .position(|line| BOTTLE_START.is_match(line.as_ref()))
    else {
        return BlockLocation::NotFound;
    };

    match lines[start + 1..]
        .iter()
        .position(|line| BOTTLE_END.is_match(line.as_ref()))
    {
        Some(offset) => BlockLocation::Found {
            start,
            end: start + 1 + offset,
        },
        None => BlockLocation::Unterminated { start },
    }
}

/// Cellar qualifier for a tag.
///
/// Linux bottles are built relocatable and skip cellar relocation.
pub fn cellar_for(tag: &str) -> &'static str {
    if tag.contains("linux") {
        ":any_skip_relocation"
    } else {
        ":any"
    }
}

/// Render the block lines. An empty or blank `root_url` is left out.
pub fn render_block(root_url: &str, shas: &ChecksumSet) -> Vec<String> {
    let mut out = Vec::with_capacity(shas.len() + 3);
    out.push("  bottle do".to_string());

    if !root_url.trim().is_empty() {
        out.push(format!("    root_url \"{}\"", root_url));
    }

    // BTreeMap iteration is already sorted by tag
    for (tag, sha) in shas {
        out.push(format!(
            "    sha256 cellar: {}, {}: \"{}\"",
            cellar_for(tag),
            tag,
            sha
        ));
    }

    out.push("  end".to_string());
    out
}

/// Patch formula source text in memory.
///
/// On an unterminated block returns the zero-based line of its start marker.
pub fn patch_text(
    text: &str,
    root_url: &str,
    shas: &ChecksumSet,
) -> std::result::Result<(String, PatchOutcome), usize> {
    let lines: Vec<&str> = text.lines().collect();
    let block = render_block(root_url, shas);

    let mut out: Vec<&str> = Vec::with_capacity(lines.len() + block.len() + 2);
    let outcome = match locate_block(&lines) {
        BlockLocation::Unterminated { start } => return Err(start),
        BlockLocation::Found { start, end } => {
            out.extend_from_slice(&lines[..start]);
            out.extend(block.iter().map(String::as_str));
            out.extend_from_slice(&lines[end + 1..]);
            PatchOutcome::Replaced
        }
        BlockLocation::NotFound => {
            match lines.iter().position(|line| DEPENDS_ON.is_match(line)) {
                Some(anchor) => {
                    out.extend_from_slice(&lines[..anchor]);
                    if anchor > 0 && !lines[anchor - 1].trim().is_empty() {
                        out.push("");
                    }
                    out.extend(block.iter().map(String::as_str));
                    out.push("");
                    out.extend_from_slice(&lines[anchor..]);
                    PatchOutcome::InsertedBeforeDependsOn
                }
                None => {
                    out.extend_from_slice(&lines);
                    out.push("");
                    out.extend(block.iter().map(String::as_str));
                    PatchOutcome::Appended
                }
            }
        }
    };

    let mut patched = out.join("\n");
    patched.push('\n');
    Ok((patched, outcome))
}

/// Replace (or insert) the bottle block of the formula at `path`.
pub fn replace_bottle_block(path: &Path, root_url: &str, shas: &ChecksumSet) -> Result<PatchOutcome> {
    let text = std::fs::read_to_string(path).map_err(|e| BottleError::io("read formula", path, e))?;

    let (patched, outcome) = patch_text(&text, root_url, shas).map_err(|line| {
        BottleError::MalformedFormula {
            path: path.to_path_buf(),
            line: line + 1,
        }
    })?;

    if patched == text {
        tracing::debug!(path = %path.display(), "bottle block already up to date");
        return Ok(outcome);
    }

    std::fs::write(path, patched).map_err(|e| BottleError::io("write formula", path, e))?;
    tracing::info!(path = %path.display(), ?outcome, tags = shas.len(), "bottle block updated");
    Ok(outcome)
}
