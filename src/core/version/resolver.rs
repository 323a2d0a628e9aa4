// ─── Version Resolver ───
// Turns a symbolic or concrete version request into an installed version id.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::info;

use super::manifest::{VersionEntry, VersionManifest, VERSION_MANIFEST_URL};
use crate::core::downloader::Downloader;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::install::InstallPipeline;

const MANIFEST_CACHE_FILE: &str = "version_manifest_v2.json";

/// What the caller asked to launch or export.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum VersionRequest {
    LatestRelease,
    LatestSnapshot,
    Concrete(String),
}

impl VersionRequest {
    pub fn is_symbolic(&self) -> bool {
        !matches!(self, VersionRequest::Concrete(_))
    }
}

impl FromStr for VersionRequest {
    type Err = LauncherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "" => Err(LauncherError::Resolution("empty version request".into())),
            "latest-release" => Ok(VersionRequest::LatestRelease),
            "latest-snapshot" => Ok(VersionRequest::LatestSnapshot),
            id => Ok(VersionRequest::Concrete(id.to_string())),
        }
    }
}

impl fmt::Display for VersionRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionRequest::LatestRelease => write!(f, "latest-release"),
            VersionRequest::LatestSnapshot => write!(f, "latest-snapshot"),
            VersionRequest::Concrete(id) => write!(f, "{}", id),
        }
    }
}

/// Resolves requests and hands installation off to the pipeline.
///
/// The remote manifest is fetched at most once per resolver unless
/// [`invalidate`](Self::invalidate) is called.
pub struct VersionResolver {
    pipeline: Arc<InstallPipeline>,
    downloader: Arc<dyn Downloader>,
    manifest_url: String,
    manifest: Mutex<Option<Arc<VersionManifest>>>,
}

impl VersionResolver {
    pub fn new(pipeline: Arc<InstallPipeline>, downloader: Arc<dyn Downloader>) -> Self {
        Self {
            pipeline,
            downloader,
            manifest_url: VERSION_MANIFEST_URL.to_string(),
            manifest: Mutex::new(None),
        }
    }

    pub fn with_manifest_url(mut self, url: impl Into<String>) -> Self {
        self.manifest_url = url.into();
        self
    }

    pub fn pipeline(&self) -> &InstallPipeline {
        &self.pipeline
    }

    /// The cached manifest, fetching it on first use.
    pub async fn ensure_manifest(&self) -> LauncherResult<Arc<VersionManifest>> {
        let mut cached = self.manifest.lock().await;
        if let Some(manifest) = cached.as_ref() {
            return Ok(manifest.clone());
        }

        let cache_path = self.pipeline.paths().versions_dir().join(MANIFEST_CACHE_FILE);
        let manifest = Arc::new(
            VersionManifest::fetch(self.downloader.as_ref(), &self.manifest_url, &cache_path)
                .await?,
        );
        *cached = Some(manifest.clone());
        Ok(manifest)
    }

    pub async fn invalidate(&self) {
        *self.manifest.lock().await = None;
    }

    /// Resolve without installing anything.
    pub async fn resolve_id(&self, request: &VersionRequest) -> LauncherResult<String> {
        match request {
            VersionRequest::Concrete(id) => Ok(id.clone()),
            symbolic => Ok(self.latest_entry(symbolic).await?.id),
        }
    }

    /// Resolve `request` and make sure the result is fully installed.
    pub async fn resolve(&self, request: &VersionRequest) -> LauncherResult<String> {
        match request {
            VersionRequest::Concrete(id) => {
                self.pipeline.ensure_dependencies(id).await?;
                Ok(id.clone())
            }
            symbolic => {
                let entry = self.latest_entry(symbolic).await?;
                if self.pipeline.is_installed(&entry.id) {
                    self.pipeline.ensure_dependencies(&entry.id).await?;
                } else {
                    self.pipeline.ensure_full_install(&entry).await?;
                }
                info!("Resolved {} to {}", request, entry.id);
                Ok(entry.id)
            }
        }
    }

    async fn latest_entry(&self, request: &VersionRequest) -> LauncherResult<VersionEntry> {
        let manifest = self.ensure_manifest().await?;
        let id = match request {
            VersionRequest::LatestRelease => &manifest.latest.release,
            VersionRequest::LatestSnapshot => &manifest.latest.snapshot,
            VersionRequest::Concrete(id) => id,
        };

        manifest.find_version(id).cloned().ok_or_else(|| {
            LauncherError::Resolution(format!(
                "{} points at {}, which the version manifest does not list",
                request, id
            ))
        })
    }
}
