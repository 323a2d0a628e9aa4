// In-memory downloader used by unit tests across the crate.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;

use super::Downloader;
use crate::core::error::{LauncherError, LauncherResult};

#[derive(Default)]
pub struct MemoryDownloader {
    files: Mutex<HashMap<String, Vec<u8>>>,
    calls: Mutex<Vec<String>>,
}

impl MemoryDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn serve(&self, url: &str, body: impl Into<Vec<u8>>) {
        self.files.lock().unwrap().insert(url.to_string(), body.into());
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn reset_calls(&self) {
        self.calls.lock().unwrap().clear();
    }
}

#[async_trait]
impl Downloader for MemoryDownloader {
    async fn download(&self, url: &str, dest: &Path) -> LauncherResult<()> {
        self.calls.lock().unwrap().push(url.to_string());
        let body = self.files.lock().unwrap().get(url).cloned();
        let Some(body) = body else {
            return Err(LauncherError::DownloadFailed {
                url: url.to_string(),
                status: 404,
            });
        };
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(dest, body).await?;
        Ok(())
    }
}
