// ─── Install Pipeline ───
// Compiles a version descriptor into download steps and runs them to completion.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures_util::stream::{self, StreamExt, TryStreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info, warn};

use crate::core::assets::AssetIndex;
use crate::core::downloader::{DownloadEntry, Downloader};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::state::LauncherPaths;
use crate::core::store::sha1_file;
use crate::core::version::{VersionEntry, VersionJson};

/// Parallel downloads per pipeline run.
pub const DEFAULT_CONCURRENCY: usize = 5;

/// Emitted after every finished step (downloaded or skipped).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallProgress {
    pub completed: usize,
    pub total: usize,
    pub url: String,
}

/// Totals for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    pub version_id: String,
    pub planned: usize,
    pub downloaded: usize,
    pub skipped: usize,
}

impl InstallReport {
    fn absorb(&mut self, other: StepTotals) {
        self.planned += other.planned;
        self.downloaded += other.downloaded;
        self.skipped += other.skipped;
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct StepTotals {
    planned: usize,
    downloaded: usize,
    skipped: usize,
}

enum StepOutcome {
    Downloaded,
    Skipped,
}

/// Ensures version descriptors, client jars, libraries and assets are on disk.
///
/// Any failed step aborts the run and surfaces that error. Files already
/// written stay on disk; correct files are detected and skipped on retry.
pub struct InstallPipeline {
    paths: LauncherPaths,
    downloader: Arc<dyn Downloader>,
    concurrency: usize,
    progress: Option<UnboundedSender<InstallProgress>>,
}

impl InstallPipeline {
    pub fn new(paths: LauncherPaths, downloader: Arc<dyn Downloader>) -> Self {
        Self {
            paths,
            downloader,
            concurrency: DEFAULT_CONCURRENCY,
            progress: None,
        }
    }

    pub fn with_concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    pub fn with_progress(mut self, tx: UnboundedSender<InstallProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    pub fn paths(&self) -> &LauncherPaths {
        &self.paths
    }

    /// A version counts as installed once its descriptor is on disk.
    pub fn is_installed(&self, version_id: &str) -> bool {
        self.paths.version_json(version_id).is_file()
    }

    /// Install a version that may not exist locally at all.
    pub async fn ensure_full_install(&self, entry: &VersionEntry) -> LauncherResult<InstallReport> {
        info!("Installing client {}", entry.id);

        let mut descriptor = DownloadEntry::new(&entry.url, self.paths.version_json(&entry.id));
        if let Some(sha1) = &entry.sha1 {
            descriptor = descriptor.with_sha1(sha1);
        }
        let descriptor_totals = self.run_steps(vec![descriptor]).await?;

        let mut report = self.ensure_dependencies(&entry.id).await?;
        report.absorb(descriptor_totals);

        info!(
            "Client {} installed ({} downloaded, {} already present)",
            entry.id, report.downloaded, report.skipped
        );
        Ok(report)
    }

    /// Download whatever an installed descriptor references but is missing.
    pub async fn ensure_dependencies(&self, version_id: &str) -> LauncherResult<InstallReport> {
        let version = VersionJson::load(&self.paths, version_id).await?;
        let mut report = InstallReport {
            version_id: version_id.to_string(),
            ..Default::default()
        };

        // Phase 1: everything named directly by the descriptor.
        let mut steps = Vec::new();
        if let Some(client) = version.client_download() {
            let jar_id = version.jar_version_id(version_id);
            steps.push(
                DownloadEntry::new(&client.url, self.paths.client_jar(jar_id))
                    .with_sha1(&client.sha1)
                    .with_size(client.size),
            );
        }
        for lib in version.library_artifacts() {
            let mut step = DownloadEntry::new(&lib.url, self.paths.libraries_dir().join(&lib.path));
            if let Some(sha1) = lib.sha1 {
                step = step.with_sha1(sha1);
            }
            if let Some(size) = lib.size {
                step = step.with_size(size);
            }
            steps.push(step);
        }
        let index_path = version.asset_index.as_ref().map(|info| {
            let path = self.paths.asset_index_path(&info.id);
            let mut step = DownloadEntry::new(&info.url, &path);
            if let Some(sha1) = &info.sha1 {
                step = step.with_sha1(sha1);
            }
            steps.push(step);
            path
        });
        report.absorb(self.run_steps(steps).await?);

        // Phase 2: asset objects, known only once the index is on disk.
        if let Some(index_path) = index_path {
            let index = AssetIndex::read(&index_path).await?;
            report.absorb(self.run_steps(index.object_entries(&self.paths)).await?);
        }

        debug!(
            "Dependencies of {}: {} planned, {} downloaded, {} skipped",
            version_id, report.planned, report.downloaded, report.skipped
        );
        Ok(report)
    }

    async fn run_steps(&self, steps: Vec<DownloadEntry>) -> LauncherResult<StepTotals> {
        let total = steps.len();
        if total == 0 {
            return Ok(StepTotals::default());
        }
        debug!("Running {} download steps, concurrency={}", total, self.concurrency);

        let completed = AtomicUsize::new(0);
        let outcomes: Vec<StepOutcome> = stream::iter(steps)
            .map(|step| self.run_step(step, &completed, total))
            .buffer_unordered(self.concurrency)
            .try_collect()
            .await?;

        let downloaded = outcomes
            .iter()
            .filter(|o| matches!(o, StepOutcome::Downloaded))
            .count();
        Ok(StepTotals {
            planned: total,
            downloaded,
            skipped: total - downloaded,
        })
    }

    async fn run_step(
        &self,
        step: DownloadEntry,
        completed: &AtomicUsize,
        total: usize,
    ) -> LauncherResult<StepOutcome> {
        let outcome = if is_present(&step).await? {
            StepOutcome::Skipped
        } else {
            self.downloader.download(&step.url, &step.dest).await?;
            verify(&step).await?;
            StepOutcome::Downloaded
        };

        let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(tx) = &self.progress {
            let _ = tx.send(InstallProgress {
                completed: done,
                total,
                url: step.url.clone(),
            });
        }
        Ok(outcome)
    }
}

/// Whether `step.dest` already holds the expected bytes.
async fn is_present(step: &DownloadEntry) -> LauncherResult<bool> {
    let metadata = match tokio::fs::metadata(&step.dest).await {
        Ok(m) if m.is_file() => m,
        _ => return Ok(false),
    };

    if let Some(size) = step.size {
        if metadata.len() != size {
            return Ok(false);
        }
    }
    match &step.sha1 {
        Some(expected) => Ok(sha1_file(&step.dest).await?.eq_ignore_ascii_case(expected)),
        None => Ok(true),
    }
}

/// Check a fresh download; a bad file is deleted so a retry starts clean.
async fn verify(step: &DownloadEntry) -> LauncherResult<()> {
    let Some(expected) = &step.sha1 else {
        return Ok(());
    };
    let actual = sha1_file(&step.dest).await?;
    if actual.eq_ignore_ascii_case(expected) {
        return Ok(());
    }

    warn!("Discarding corrupt download {:?}", step.dest);
    let _ = tokio::fs::remove_file(&step.dest).await;
    Err(LauncherError::Sha1Mismatch {
        path: step.dest.clone(),
        expected: expected.clone(),
        actual,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::downloader::testing::MemoryDownloader;
    use crate::core::store::sha1_bytes;

    const JAR: &[u8] = b"client jar bytes";
    const LIB: &[u8] = b"library bytes";
    const SOUND: &[u8] = b"ogg";

    fn descriptor() -> serde_json::Value {
        serde_json::json!({
            "id": "1.20.4",
            "mainClass": "net.minecraft.client.main.Main",
            "downloads": { "client": {
                "url": "https://piston-data.example/client.jar",
                "sha1": sha1_bytes(JAR),
                "size": JAR.len()
            }},
            "libraries": [{
                "name": "com.example:lib:1.0",
                "downloads": { "artifact": {
                    "path": "com/example/lib/1.0/lib-1.0.jar",
                    "url": "https://libraries.example/lib-1.0.jar",
                    "sha1": sha1_bytes(LIB),
                    "size": LIB.len()
                }}
            }],
            "assetIndex": { "id": "12", "url": "https://meta.example/12.json" }
        })
    }

    fn serve_all(downloader: &MemoryDownloader) {
        let sound_hash = sha1_bytes(SOUND);
        downloader.serve("https://meta.example/1.20.4.json", descriptor().to_string());
        downloader.serve("https://piston-data.example/client.jar", JAR);
        downloader.serve("https://libraries.example/lib-1.0.jar", LIB);
        downloader.serve(
            "https://meta.example/12.json",
            serde_json::json!({ "objects": { "a.ogg": { "hash": sound_hash, "size": SOUND.len() } } })
                .to_string(),
        );
        downloader.serve(
            &format!("https://resources.download.minecraft.net/{}/{}", &sound_hash[..2], sound_hash),
            SOUND,
        );
    }

    fn entry() -> VersionEntry {
        VersionEntry {
            id: "1.20.4".into(),
            version_type: "release".into(),
            release_time: String::new(),
            url: "https://meta.example/1.20.4.json".into(),
            sha1: None,
        }
    }

    #[tokio::test]
    async fn full_install_downloads_everything_then_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LauncherPaths::new(dir.path());
        let downloader = Arc::new(MemoryDownloader::new());
        serve_all(&downloader);

        let pipeline = InstallPipeline::new(paths.clone(), downloader.clone());
        let report = pipeline.ensure_full_install(&entry()).await.unwrap();

        assert_eq!(report.downloaded, 5);
        assert!(paths.client_jar("1.20.4").is_file());
        assert!(paths.libraries_dir().join("com/example/lib/1.0/lib-1.0.jar").is_file());
        assert!(pipeline.is_installed("1.20.4"));

        downloader.reset_calls();
        let again = pipeline.ensure_full_install(&entry()).await.unwrap();
        assert_eq!(again.downloaded, 0);
        assert_eq!(again.skipped, 5);
        // Only the descriptor without a known sha1 is compared by presence.
        assert!(downloader.calls().is_empty());
    }

    #[tokio::test]
    async fn second_dependency_pass_makes_no_network_calls() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LauncherPaths::new(dir.path());
        let downloader = Arc::new(MemoryDownloader::new());
        serve_all(&downloader);

        let json_path = paths.version_json("1.20.4");
        std::fs::create_dir_all(json_path.parent().unwrap()).unwrap();
        std::fs::write(&json_path, descriptor().to_string()).unwrap();

        let pipeline = InstallPipeline::new(paths, downloader.clone());
        let first = pipeline.ensure_dependencies("1.20.4").await.unwrap();
        assert_eq!(first.downloaded, 4);

        downloader.reset_calls();
        let second = pipeline.ensure_dependencies("1.20.4").await.unwrap();
        assert_eq!(second.downloaded, 0);
        assert!(downloader.calls().is_empty());
    }

    #[tokio::test]
    async fn hash_mismatch_aborts_and_removes_the_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LauncherPaths::new(dir.path());
        let downloader = Arc::new(MemoryDownloader::new());
        serve_all(&downloader);
        downloader.serve("https://piston-data.example/client.jar", b"tampered".to_vec());

        let pipeline = InstallPipeline::new(paths.clone(), downloader);
        let err = pipeline.ensure_full_install(&entry()).await.unwrap_err();

        assert!(matches!(err, LauncherError::Sha1Mismatch { .. }));
        assert!(!paths.client_jar("1.20.4").exists());
    }

    #[tokio::test]
    async fn missing_remote_file_surfaces_first_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LauncherPaths::new(dir.path());
        let downloader = Arc::new(MemoryDownloader::new());

        let pipeline = InstallPipeline::new(paths, downloader);
        let err = pipeline.ensure_full_install(&entry()).await.unwrap_err();
        assert!(matches!(err, LauncherError::DownloadFailed { status: 404, .. }));
    }

    #[tokio::test]
    async fn progress_reports_every_step() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LauncherPaths::new(dir.path());
        let downloader = Arc::new(MemoryDownloader::new());
        serve_all(&downloader);

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let pipeline = InstallPipeline::new(paths, downloader)
            .with_concurrency(2)
            .with_progress(tx);
        pipeline.ensure_full_install(&entry()).await.unwrap();
        drop(pipeline);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(events.len(), 5);
        assert!(events.iter().all(|e| e.completed <= e.total));
    }
}
