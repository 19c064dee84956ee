use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BottleError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid ref {0:?}, expected owner/tap/formula")]
    InvalidRef(String),

    #[error("version not found for {formula}: {reason}")]
    VersionNotFound { formula: String, reason: String },

    #[error("{command} failed with exit code {exit_code}: {stderr}")]
    Command {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("failed to run {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no bottle tar.gz found in {}", .0.display())]
    ArtifactNotFound(PathBuf),

    #[error("multiple bottles found in {}, but none could be stat'ed", .0.display())]
    ArtifactUnreadable(PathBuf),

    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error("upload to {url} failed: status={status} body={body:?}")]
    UploadRejected {
        url: String,
        status: u16,
        body: String,
    },

    #[error("found bottle start on line {line} but cannot find bottle end in {}", path.display())]
    MalformedFormula { path: PathBuf, line: usize },

    #[error("no checksums available: {0}")]
    NoChecksums(String),

    #[error("formula file not found: {}", .0.display())]
    FormulaNotFound(PathBuf),

    #[error("refusing to overwrite {later} report with {earlier} report")]
    ReportRegression {
        later: &'static str,
        earlier: &'static str,
    },

    #[error("cancelled")]
    Cancelled,
}

impl BottleError {
    /// Wrap an I/O error with the operation and the path it touched.
    pub fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BottleError::Io {
            action,
            path: path.into(),
            source,
        }
    }

    /// Process exit code for this error.
    ///
    /// Configuration problems exit with 2 so wrappers can tell "fix your flags"
    /// apart from a failed build or upload.
    pub fn exit_code(&self) -> i32 {
        match self {
            BottleError::Config(_) | BottleError::InvalidRef(_) => 2,
            BottleError::Cancelled => 130,
            _ => 1,
        }
    }
}

pub type Result<T> = std::result::Result<T, BottleError>;
