//! Publishing bottles and reports to a Nexus raw repository.
//!
//! Uploads are a single authenticated `PUT {base}/{filename}` with the file as
//! the request body. The repository overwrites existing assets, so repeating an
//! upload is harmless. There is no retry: the first failure is returned.

use crate::error::{BottleError, Result};
use std::path::Path;

/// Maximum number of response body bytes kept for diagnostics
pub const ERROR_BODY_LIMIT: usize = 4096;

/// Join `base` and `part` with exactly one `/`.
pub fn join_url(base: &str, part: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        part.trim_start_matches('/')
    )
}

/// Basic-auth credentials for the repository
#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub pass: String,
}

impl Credentials {
    pub fn new(user: impl Into<String>, pass: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            pass: pass.into(),
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("pass", &"<redacted>")
            .finish()
    }
}

fn build_client(user_agent: &str) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .build()
        .map_err(BottleError::HttpClient)
}

#[derive(Debug, Clone)]
pub struct Uploader {
    client: reqwest::Client,
}

impl Uploader {
    pub fn new() -> Result<Self> {
        let client = build_client(&format!("brew-bottler/{}", env!("CARGO_PKG_VERSION")))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Stream the file at `path` to `url`.
    ///
    /// Any 2xx status is success. Other statuses fail with the first
    /// [`ERROR_BODY_LIMIT`] bytes of the response body.
    pub async fn put_file(&self, url: &str, path: &Path, credentials: &Credentials) -> Result<()> {
        let file = tokio::fs::File::open(path)
            .await
            .map_err(|e| BottleError::io("open upload file", path, e))?;
        let size = file
            .metadata()
            .await
            .map_err(|e| BottleError::io("stat upload file", path, e))?
            .len();

        tracing::debug!(url, path = %path.display(), size, "uploading");

        let http_error = |source| BottleError::Http {
            url: url.to_string(),
            source,
        };

        let mut response = self
            .client
            .put(url)
            .basic_auth(&credentials.user, Some(&credentials.pass))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .header(reqwest::header::CONTENT_LENGTH, size)
            .body(reqwest::Body::from(file))
            .send()
            .await
            .map_err(http_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let mut body = Vec::new();
        while body.len() < ERROR_BODY_LIMIT {
            match response.chunk().await {
                Ok(Some(chunk)) => body.extend_from_slice(&chunk),
                // The status is what matters; a body we cannot read stays empty
                Ok(None) | Err(_) => break,
            }
        }
        body.truncate(ERROR_BODY_LIMIT);

        Err(BottleError::UploadRejected {
            url: url.to_string(),
            status: status.as_u16(),
            body: String::from_utf8_lossy(&body).into_owned(),
        })
    }
}
