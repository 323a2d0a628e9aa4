use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::core::downloader::DownloadEntry;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::state::LauncherPaths;

const RESOURCES_URL: &str = "https://resources.download.minecraft.net";

/// Top-level asset index JSON structure.
#[derive(Debug, Deserialize)]
pub struct AssetIndex {
    pub objects: HashMap<String, AssetObject>,
}

#[derive(Debug, Deserialize)]
pub struct AssetObject {
    pub hash: String,
    pub size: u64,
}

impl AssetIndex {
    pub async fn read(path: &Path) -> LauncherResult<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LauncherError::io(path, e))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// One download per distinct object, stored under `objects/<xx>/<hash>`.
    pub fn object_entries(&self, paths: &LauncherPaths) -> Vec<DownloadEntry> {
        let mut seen = std::collections::HashSet::new();
        let mut entries = Vec::new();

        for obj in self.objects.values() {
            if obj.hash.len() < 2 || !seen.insert(obj.hash.as_str()) {
                continue;
            }
            let hash_prefix = &obj.hash[..2];
            let url = format!("{}/{}/{}", RESOURCES_URL, hash_prefix, obj.hash);
            entries.push(
                DownloadEntry::new(url, paths.asset_object_path(&obj.hash))
                    .with_sha1(&obj.hash)
                    .with_size(obj.size),
            );
        }

        entries.sort_by(|a, b| a.url.cmp(&b.url));
        entries
    }
}
