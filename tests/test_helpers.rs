// Test helpers for isolated testing
// Provides a throwaway workdir, tap checkout, fake brew and fake Nexus

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Isolated test environment using temporary directories
/// Automatically cleaned up when dropped (RAII pattern)
pub struct TestEnvironment {
    pub temp_dir: TempDir,
    pub workdir: PathBuf,
    pub tap: PathBuf,
    pub bin: PathBuf,
}

/// How the fake brew behaves
pub struct FakeBrew<'a> {
    /// Stable version reported by `brew info`, `None` for an empty result
    pub version: Option<&'a str>,
    /// Exit code of `brew install --build-bottle`
    pub install_exit: i32,
    /// Tarball name written by `brew bottle`
    pub bottle_name: &'a str,
}

impl Default for FakeBrew<'_> {
    fn default() -> Self {
        Self {
            version: Some("1.2.3"),
            install_exit: 0,
            bottle_name: "widget--1.2.3.macos-13.bottle.tar.gz",
        }
    }
}

impl TestEnvironment {
    /// Creates:
    /// - temp/
    ///   - dist/   (bottles and reports)
    ///   - tap/    (tap checkout with Formula/)
    ///   - bin/    (fake brew)
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().to_path_buf();
        let workdir = root.join("dist");
        let tap = root.join("tap");
        let bin = root.join("bin");

        std::fs::create_dir_all(tap.join("Formula")).unwrap();
        std::fs::create_dir_all(&bin).unwrap();

        Self {
            temp_dir,
            workdir,
            tap,
            bin,
        }
    }

    /// Write a formula into the sharded tap layout and return its path.
    pub fn write_formula(&self, name: &str, contents: &str) -> PathBuf {
        let letter = name.chars().next().unwrap().to_string();
        let path = self.tap.join("Formula").join(letter).join(format!("{}.rb", name));
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Install a shell script standing in for brew and return its path.
    ///
    /// Every invocation is appended to `bin/brew.log`.
    #[cfg(unix)]
    pub fn fake_brew(&self, fake: FakeBrew<'_>) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let info = match fake.version {
            Some(v) => format!(
                r#"{{"formulae":[{{"name":"widget","versions":{{"stable":"{}"}}}}],"casks":[]}}"#,
                v
            ),
            None => r#"{"formulae":[]}"#.to_string(),
        };
        let log = self.bin.join("brew.log");
        let script = format!(
            r#"#!/bin/sh
echo "$*" >> '{log}'
case "$1" in
  info)
    echo "==> Tapping internal mirror"
    echo '{info}'
    ;;
  uninstall)
    echo "Error: No such keg" >&2
    exit 1
    ;;
  install)
    echo "install failed hard" >&2
    exit {install_exit}
    ;;
  bottle)
    printf 'bottle-bytes' > '{bottle}'
    ;;
esac
"#,
            log = log.display(),
            info = info,
            install_exit = fake.install_exit,
            bottle = fake.bottle_name,
        );

        let path = self.bin.join("brew");
        std::fs::write(&path, script).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    /// Lines logged by the fake brew
    pub fn brew_calls(&self) -> Vec<String> {
        std::fs::read_to_string(self.bin.join("brew.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    pub fn workdir_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(&self.workdir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

/// One request seen by [`FakeNexus`]
#[derive(Debug, Clone)]
pub struct Received {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Vec<u8>,
}

/// Minimal HTTP server answering every request with a fixed status
pub struct FakeNexus {
    pub base_url: String,
    handle: tokio::task::JoinHandle<Vec<Received>>,
}

impl FakeNexus {
    /// Serve `requests` requests, then stop.
    pub async fn start(requests: usize, status: u16) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let mut received = Vec::new();
            for _ in 0..requests {
                let (mut socket, _) = listener.accept().await.unwrap();
                received.push(read_request(&mut socket).await);
                let reply = format!(
                    "HTTP/1.1 {} Fake\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok",
                    status
                );
                let _ = socket.write_all(reply.as_bytes()).await;
                let _ = socket.shutdown().await;
            }
            received
        });

        Self {
            base_url: format!("http://{}/repository/bottles/", addr),
            handle,
        }
    }

    pub async fn received(self) -> Vec<Received> {
        self.handle.await.unwrap()
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> Received {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before headers");
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.lines();
    let mut request_line = lines.next().unwrap().split_whitespace();
    let method = request_line.next().unwrap().to_string();
    let path = request_line.next().unwrap().to_string();

    let mut length = 0usize;
    let mut authorization = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                length = value.trim().parse().unwrap();
            } else if name.eq_ignore_ascii_case("authorization") {
                authorization = Some(value.trim().to_string());
            }
        }
    }

    let mut body = buf[header_end..].to_vec();
    while body.len() < length {
        let n = socket.read(&mut chunk).await.unwrap();
        assert!(n > 0, "connection closed before body");
        body.extend_from_slice(&chunk[..n]);
    }

    Received {
        method,
        path,
        authorization,
        body,
    }
}

pub fn path_str(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_creates_directories() {
        let env = TestEnvironment::new();

        assert!(env.tap.join("Formula").exists());
        assert!(env.bin.exists());
        // The workdir is created by the run itself
        assert!(!env.workdir.exists());
    }

    #[test]
    fn test_environment_cleanup() {
        let tap_path = {
            let env = TestEnvironment::new();
            env.tap.clone()
        };

        assert!(!tap_path.exists());
    }

    #[test]
    fn test_write_formula_uses_shard() {
        let env = TestEnvironment::new();
        let path = env.write_formula("widget", "class Widget < Formula\nend\n");
        assert!(path.ends_with("Formula/w/widget.rb"));
    }
}
