// ─── Version Manifest ───
// Remote catalog of concrete versions plus the `latest` pointers.

use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};

pub const VERSION_MANIFEST_URL: &str =
    "https://piston-meta.mojang.com/mc/game/version_manifest_v2.json";

/// Top-level version manifest. Immutable once fetched.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionManifest {
    pub latest: LatestVersions,
    pub versions: Vec<VersionEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LatestVersions {
    pub release: String,
    pub snapshot: String,
}

/// A single entry in the manifest.
#[derive(Debug, Clone, Deserialize)]
pub struct VersionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub version_type: String,
    #[serde(rename = "releaseTime", default)]
    pub release_time: String,
    pub url: String,
    #[serde(default)]
    pub sha1: Option<String>,
}

impl VersionManifest {
    /// Download the manifest to `cache_path` and parse it. When the download
    /// fails, a previously cached copy is used instead.
    pub async fn fetch(
        downloader: &dyn Downloader,
        url: &str,
        cache_path: &Path,
    ) -> LauncherResult<Self> {
        info!("Fetching version manifest from {}", url);
        if let Err(e) = downloader.download(url, cache_path).await {
            if !cache_path.is_file() {
                return Err(e);
            }
            warn!("Manifest download failed ({}), using cached copy", e);
        }

        let raw = tokio::fs::read_to_string(cache_path)
            .await
            .map_err(|e| LauncherError::io(cache_path, e))?;
        let manifest: VersionManifest = serde_json::from_str(&raw)?;

        info!(
            "Loaded {} versions from manifest (release {}, snapshot {})",
            manifest.versions.len(),
            manifest.latest.release,
            manifest.latest.snapshot
        );
        Ok(manifest)
    }

    /// Find a specific version entry by ID (e.g. "1.20.4").
    pub fn find_version(&self, id: &str) -> Option<&VersionEntry> {
        self.versions.iter().find(|v| v.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manifest_parses_entries_with_and_without_sha1() {
        let json = r#"{
            "latest": { "release": "1.20.4", "snapshot": "24w03a" },
            "versions": [
                {
                    "id": "24w03a",
                    "type": "snapshot",
                    "releaseTime": "2024-01-17T12:00:00+00:00",
                    "url": "https://example.com/24w03a.json"
                },
                {
                    "id": "1.20.4",
                    "type": "release",
                    "releaseTime": "2023-12-07T08:00:00+00:00",
                    "url": "https://example.com/1.20.4.json",
                    "sha1": "abc123"
                }
            ]
        }"#;
        let manifest: VersionManifest = serde_json::from_str(json).unwrap();
        assert_eq!(manifest.latest.release, "1.20.4");
        assert_eq!(manifest.versions[0].version_type, "snapshot");
        assert_eq!(
            manifest.find_version("1.20.4").unwrap().sha1.as_deref(),
            Some("abc123")
        );
        assert!(manifest.find_version("1.0").is_none());
    }

    #[tokio::test]
    async fn failed_download_falls_back_to_cached_copy() {
        use crate::core::downloader::testing::MemoryDownloader;

        let dir = tempfile::tempdir().unwrap();
        let cache = dir.path().join("version_manifest_v2.json");
        let downloader = MemoryDownloader::new();

        let missing = VersionManifest::fetch(&downloader, "https://example.com/m.json", &cache).await;
        assert!(missing.is_err());

        std::fs::write(
            &cache,
            r#"{"latest":{"release":"1.20.4","snapshot":"1.20.4"},"versions":[]}"#,
        )
        .unwrap();
        let cached = VersionManifest::fetch(&downloader, "https://example.com/m.json", &cache)
            .await
            .unwrap();
        assert_eq!(cached.latest.release, "1.20.4");
    }
}
