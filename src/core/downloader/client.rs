use std::path::{Path, PathBuf};

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::http::build_http_client;

/// Transport capability the install pipeline drives.
///
/// Implementations write the body of `url` to `dest`, creating parent
/// directories as needed. Verification is the caller's job.
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn download(&self, url: &str, dest: &Path) -> LauncherResult<()>;
}

/// A single file to fetch, with optional integrity metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadEntry {
    pub url: String,
    pub dest: PathBuf,
    pub sha1: Option<String>,
    pub size: Option<u64>,
}

impl DownloadEntry {
    pub fn new(url: impl Into<String>, dest: impl Into<PathBuf>) -> Self {
        Self {
            url: url.into(),
            dest: dest.into(),
            sha1: None,
            size: None,
        }
    }

    pub fn with_sha1(mut self, sha1: impl Into<String>) -> Self {
        self.sha1 = Some(sha1.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

/// reqwest-backed downloader that streams bodies to disk.
pub struct HttpDownloader {
    client: Client,
}

impl HttpDownloader {
    pub fn new() -> LauncherResult<Self> {
        Ok(Self {
            client: build_http_client()?,
        })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(&self, url: &str, dest: &Path) -> LauncherResult<()> {
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LauncherError::io(parent, e))?;
        }

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let part = part_path(dest);
        if let Err(e) = stream_to(response, &part).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(e);
        }
        tokio::fs::rename(&part, dest)
            .await
            .map_err(|e| LauncherError::io(dest, e))?;

        debug!("Downloaded: {} -> {:?}", url, dest);
        Ok(())
    }
}

/// Sibling of `dest` the body is streamed into before it replaces `dest`.
fn part_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    dest.with_file_name(format!("{}.part-{}", name, uuid::Uuid::new_v4().simple()))
}

async fn stream_to(response: reqwest::Response, path: &Path) -> LauncherResult<()> {
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| LauncherError::io(path, e))?;
    let mut body = response.bytes_stream();
    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        file.write_all(&chunk)
            .await
            .map_err(|e| LauncherError::io(path, e))?;
    }
    file.flush().await.map_err(|e| LauncherError::io(path, e))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Serve one raw HTTP response, then hang up.
    async fn serve_once(response: &'static [u8]) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; 4096];
            let _ = socket.read(&mut request).await;
            socket.write_all(response).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{}/file", addr)
    }

    fn local_downloader() -> HttpDownloader {
        HttpDownloader::with_client(Client::builder().no_proxy().build().unwrap())
    }

    fn leftover_parts(dir: &Path) -> usize {
        std::fs::read_dir(dir)
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().contains(".part-"))
            .count()
    }

    #[tokio::test]
    async fn complete_body_replaces_destination() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("manifest.json");
        std::fs::write(&dest, b"old").unwrap();
        let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\nConnection: close\r\n\r\nfresh").await;

        local_downloader().download(&url, &dest).await.unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"fresh");
        assert_eq!(leftover_parts(dir.path()), 0);
    }

    #[tokio::test]
    async fn truncated_body_keeps_previous_file() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("manifest.json");
        std::fs::write(&dest, b"{\"cached\":true}").unwrap();
        let url = serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\npartial").await;

        let result = local_downloader().download(&url, &dest).await;

        assert!(result.is_err());
        assert_eq!(std::fs::read(&dest).unwrap(), b"{\"cached\":true}");
        assert_eq!(leftover_parts(dir.path()), 0);
    }

    #[tokio::test]
    async fn error_status_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("lib.jar");
        let url = serve_once(b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n").await;

        let err = local_downloader().download(&url, &dest).await.unwrap_err();

        assert!(matches!(err, LauncherError::DownloadFailed { status: 404, .. }));
        assert!(!dest.exists());
    }
}
