use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::info;

use super::paths::LauncherPaths;
use crate::core::archive::{self, ExportOptions, ImportReport};
use crate::core::downloader::{Downloader, HttpDownloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::install::InstallPipeline;
use crate::core::launch::{LaunchOutcome, LaunchSupervisor, ProcessWorker};
use crate::core::profile::ProfileStore;
use crate::core::resource::{Resource, ResourceCatalog, ResourceKind};
use crate::core::version::{VersionRequest, VersionResolver};

/// Every launcher component, wired once over one data root.
///
/// Index mutations and exports go through the catalog lock, so an export never
/// observes a half-finished uninstall of the same id.
pub struct AppState {
    pub paths: LauncherPaths,
    pub catalog: Mutex<ResourceCatalog>,
    pub profiles: Arc<RwLock<ProfileStore>>,
    pub pipeline: Arc<InstallPipeline>,
    pub resolver: Arc<VersionResolver>,
    pub launcher: LaunchSupervisor,
}

impl AppState {
    pub async fn open(root: impl Into<PathBuf>, downloader: Arc<dyn Downloader>) -> LauncherResult<Self> {
        let paths = LauncherPaths::new(root);
        tokio::fs::create_dir_all(paths.root())
            .await
            .map_err(|e| LauncherError::io(paths.root(), e))?;
        info!("Opening launcher data at {:?}", paths.root());

        let catalog = ResourceCatalog::open(paths.clone()).await?;
        let profiles = Arc::new(RwLock::new(ProfileStore::open(&paths).await?));
        let pipeline = Arc::new(InstallPipeline::new(paths.clone(), downloader.clone()));
        let resolver = Arc::new(VersionResolver::new(pipeline.clone(), downloader));
        let launcher = LaunchSupervisor::new(
            resolver.clone(),
            profiles.clone(),
            Arc::new(ProcessWorker),
        );

        Ok(Self {
            paths,
            catalog: Mutex::new(catalog),
            profiles,
            pipeline,
            resolver,
            launcher,
        })
    }

    /// The platform data root with the HTTP downloader.
    pub async fn open_default() -> LauncherResult<Self> {
        let downloader = Arc::new(HttpDownloader::new()?);
        Self::open(LauncherPaths::default_root(), downloader).await
    }

    /// Launch whatever the most recently used profile points at.
    pub async fn launch_selected(&self) -> LauncherResult<LaunchOutcome> {
        let request = self.profiles.read().await.selected_version_request()?;
        self.launcher.launch(&request).await
    }

    pub async fn export_resource(&self, kind: ResourceKind, id: &str, dest: &Path) -> LauncherResult<()> {
        let catalog = self.catalog.lock().await;
        let resource = find_resource(&catalog, kind, id)?;
        archive::export_resource(&catalog, &resource, dest).await
    }

    pub async fn export_version(
        &self,
        request: &VersionRequest,
        options: &ExportOptions,
        dest: &Path,
    ) -> LauncherResult<()> {
        let catalog = self.catalog.lock().await;
        archive::export_version(&catalog, &self.resolver, request, options, dest).await
    }

    pub async fn import_bundle(&self, bundle: &Path) -> LauncherResult<ImportReport> {
        let mut catalog = self.catalog.lock().await;
        archive::import_bundle(&mut catalog, bundle).await
    }

    pub async fn uninstall(&self, kind: ResourceKind, id: &str) -> LauncherResult<Option<Resource>> {
        self.catalog.lock().await.uninstall(kind, id).await
    }
}

fn find_resource(catalog: &ResourceCatalog, kind: ResourceKind, id: &str) -> LauncherResult<Resource> {
    catalog
        .index(kind)?
        .get(id)
        .cloned()
        .ok_or_else(|| LauncherError::Other(format!("no {} with id '{}' is installed", kind, id)))
}
