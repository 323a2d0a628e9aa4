// ─── Launch Supervisor ───
// ready -> launching -> launched | ready. One launch attempt at a time.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use super::job::{LaunchOutcome, LaunchSpec, LaunchStatus, ProcessExit, WorkerMessage};
use super::worker::LaunchWorker;
use crate::core::auth::SessionProvider;
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::version::{VersionRequest, VersionResolver};

pub struct LaunchSupervisor {
    resolver: Arc<VersionResolver>,
    sessions: Arc<dyn SessionProvider>,
    worker: Arc<dyn LaunchWorker>,
    detached: bool,
    status: Arc<watch::Sender<LaunchStatus>>,
    busy: Arc<AtomicBool>,
    last_exit: Arc<Mutex<Option<ProcessExit>>>,
}

/// Returns the supervisor to `Ready` unless the attempt reached `Launched`.
struct Reservation {
    status: Arc<watch::Sender<LaunchStatus>>,
    busy: Arc<AtomicBool>,
    armed: bool,
}

impl Reservation {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.armed {
            self.status.send_replace(LaunchStatus::Ready);
            self.busy.store(false, Ordering::SeqCst);
        }
    }
}

impl LaunchSupervisor {
    pub fn new(
        resolver: Arc<VersionResolver>,
        sessions: Arc<dyn SessionProvider>,
        worker: Arc<dyn LaunchWorker>,
    ) -> Self {
        let (status, _) = watch::channel(LaunchStatus::Ready);
        Self {
            resolver,
            sessions,
            worker,
            detached: true,
            status: Arc::new(status),
            busy: Arc::new(AtomicBool::new(false)),
            last_exit: Arc::new(Mutex::new(None)),
        }
    }

    /// Keep the game in the launcher's process group.
    pub fn attached(mut self) -> Self {
        self.detached = false;
        self
    }

    pub fn status(&self) -> LaunchStatus {
        *self.status.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<LaunchStatus> {
        self.status.subscribe()
    }

    pub fn last_exit(&self) -> Option<ProcessExit> {
        self.last_exit.lock().ok().and_then(|exit| *exit)
    }

    /// Resolve, install and start `request`.
    ///
    /// Resolves once the worker reports the process started. A second call
    /// before the supervisor is back to `Ready` fails with `AlreadyLaunching`
    /// and leaves the first attempt alone.
    pub async fn launch(&self, request: &VersionRequest) -> LauncherResult<LaunchOutcome> {
        if self
            .busy
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            let status = self.status();
            warn!("Rejecting launch of {} while {:?}", request, status);
            return Err(LauncherError::AlreadyLaunching(format!("{:?}", status).to_lowercase()));
        }
        let reservation = Reservation {
            status: self.status.clone(),
            busy: self.busy.clone(),
            armed: true,
        };

        info!("Launch requested for {}", request);
        let session = self.sessions.current_session().await?;
        let java = self.sessions.java_settings().await?;
        let version_id = self.resolver.resolve(request).await?;

        let spec = LaunchSpec {
            version_id: version_id.clone(),
            java_path: java.java_path,
            jvm_args: java.jvm_args,
            max_memory_mb: java.max_memory_mb,
            access_token: session.access_token,
            profile_id: session.uuid,
            profile_name: session.username,
            user_type: session.user_type,
            properties: "{}".into(),
            game_dir: self.resolver.pipeline().paths().root().to_path_buf(),
            detached: self.detached,
        };

        let (tx, mut rx) = mpsc::unbounded_channel();
        self.status.send_replace(LaunchStatus::Launching);
        self.worker.start(spec, tx);

        // The first terminal message settles this attempt; later ones go to the relay.
        let pid = loop {
            match rx.recv().await {
                Some(WorkerMessage::Error { error }) => {
                    return Err(LauncherError::Launch(error));
                }
                Some(WorkerMessage::Launched { pid }) => break pid,
                Some(WorkerMessage::Exit { code, signal }) => {
                    self.record_exit(ProcessExit { code, signal });
                    return Err(LauncherError::Launch(format!(
                        "game process for {} exited before it was reported started",
                        version_id
                    )));
                }
                None => {
                    return Err(LauncherError::Launch(
                        "launch worker stopped without reporting".into(),
                    ));
                }
            }
        };

        self.status.send_replace(LaunchStatus::Launched);
        reservation.disarm();
        self.watch_exit(version_id.clone(), rx);

        info!("Launched {} (pid {})", version_id, pid);
        Ok(LaunchOutcome { version_id, pid })
    }

    fn record_exit(&self, exit: ProcessExit) {
        if let Ok(mut last) = self.last_exit.lock() {
            *last = Some(exit);
        }
    }

    fn watch_exit(&self, version_id: String, mut rx: mpsc::UnboundedReceiver<WorkerMessage>) {
        let status = self.status.clone();
        let busy = self.busy.clone();
        let last_exit = self.last_exit.clone();

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                match message {
                    WorkerMessage::Exit { code, signal } => {
                        let exit = ProcessExit { code, signal };
                        if exit.is_clean() {
                            info!("Game {} closed", version_id);
                        } else {
                            warn!("Game {} ended with {:?}", version_id, exit);
                        }
                        if let Ok(mut last) = last_exit.lock() {
                            *last = Some(exit);
                        }
                        break;
                    }
                    other => warn!("Ignoring late worker message {:?}", other),
                }
            }
            status.send_replace(LaunchStatus::Ready);
            busy.store(false, Ordering::SeqCst);
        });
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use std::sync::Mutex as StdMutex;

    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::core::auth::{JavaSettings, LaunchAccountProfile};
    use crate::core::downloader::testing::MemoryDownloader;
    use crate::core::install::InstallPipeline;
    use crate::core::state::LauncherPaths;

    struct StaticSessions;

    #[async_trait]
    impl SessionProvider for StaticSessions {
        async fn current_session(&self) -> LauncherResult<LaunchAccountProfile> {
            Ok(LaunchAccountProfile::offline("Steve").sanitized())
        }

        async fn java_settings(&self) -> LauncherResult<JavaSettings> {
            Ok(JavaSettings {
                java_path: PathBuf::from("java"),
                jvm_args: vec![],
                max_memory_mb: 1024,
            })
        }
    }

    /// Holds each start until `release` is notified, then plays the script.
    /// Senders are kept afterwards, like a process that is still running.
    struct ScriptedWorker {
        script: Vec<WorkerMessage>,
        release: Arc<Notify>,
        specs: StdMutex<Vec<LaunchSpec>>,
        open: Arc<StdMutex<Vec<mpsc::UnboundedSender<WorkerMessage>>>>,
    }

    impl ScriptedWorker {
        fn new(script: Vec<WorkerMessage>) -> Arc<Self> {
            Arc::new(Self {
                script,
                release: Arc::new(Notify::new()),
                specs: StdMutex::new(Vec::new()),
                open: Arc::new(StdMutex::new(Vec::new())),
            })
        }
    }

    impl LaunchWorker for ScriptedWorker {
        fn start(&self, spec: LaunchSpec, events: mpsc::UnboundedSender<WorkerMessage>) {
            self.specs.lock().unwrap().push(spec);
            let script = self.script.clone();
            let release = self.release.clone();
            let open = self.open.clone();
            tokio::spawn(async move {
                release.notified().await;
                for message in script {
                    let _ = events.send(message);
                }
                open.lock().unwrap().push(events);
            });
        }
    }

    fn install_minimal(root: &Path) {
        let paths = LauncherPaths::new(root);
        std::fs::create_dir_all(paths.version_dir("1.20.4")).unwrap();
        std::fs::write(
            paths.version_json("1.20.4"),
            serde_json::json!({ "id": "1.20.4", "mainClass": "net.minecraft.client.main.Main" })
                .to_string(),
        )
        .unwrap();
    }

    fn supervisor(root: &Path, worker: Arc<ScriptedWorker>) -> LaunchSupervisor {
        install_minimal(root);
        let downloader = Arc::new(MemoryDownloader::new());
        let pipeline = Arc::new(InstallPipeline::new(LauncherPaths::new(root), downloader.clone()));
        let resolver = Arc::new(VersionResolver::new(pipeline, downloader));
        LaunchSupervisor::new(resolver, Arc::new(StaticSessions), worker)
    }

    fn concrete() -> VersionRequest {
        VersionRequest::Concrete("1.20.4".into())
    }

    async fn wait_for(rx: &mut watch::Receiver<LaunchStatus>, wanted: LaunchStatus) {
        while *rx.borrow_and_update() != wanted {
            rx.changed().await.unwrap();
        }
    }

    #[tokio::test]
    async fn second_launch_while_launching_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let worker = ScriptedWorker::new(vec![WorkerMessage::Launched { pid: 42 }]);
        let supervisor = Arc::new(supervisor(dir.path(), worker.clone()));
        let mut status = supervisor.subscribe();

        let first = tokio::spawn({
            let supervisor = supervisor.clone();
            async move { supervisor.launch(&concrete()).await }
        });
        wait_for(&mut status, LaunchStatus::Launching).await;

        let second = supervisor.launch(&concrete()).await;
        assert!(matches!(second, Err(LauncherError::AlreadyLaunching(_))));
        assert_eq!(supervisor.status(), LaunchStatus::Launching);

        worker.release.notify_one();
        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome, LaunchOutcome { version_id: "1.20.4".into(), pid: 42 });
        assert_eq!(supervisor.status(), LaunchStatus::Launched);
        assert_eq!(worker.specs.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn worker_error_returns_to_ready() {
        let dir = tempfile::tempdir().unwrap();
        let worker = ScriptedWorker::new(vec![WorkerMessage::Error { error: "no java".into() }]);
        let supervisor = supervisor(dir.path(), worker.clone());
        worker.release.notify_one();

        let err = supervisor.launch(&concrete()).await.unwrap_err();
        assert!(matches!(err, LauncherError::Launch(ref msg) if msg == "no java"));
        assert_eq!(supervisor.status(), LaunchStatus::Ready);

        // The reservation is released, so a retry reaches the worker again.
        worker.release.notify_one();
        assert!(supervisor.launch(&concrete()).await.is_err());
        assert_eq!(worker.specs.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn exit_is_recorded_and_returns_to_ready() {
        let dir = tempfile::tempdir().unwrap();
        let worker = ScriptedWorker::new(vec![
            WorkerMessage::Launched { pid: 7 },
            WorkerMessage::Exit { code: Some(1), signal: None },
        ]);
        let supervisor = supervisor(dir.path(), worker.clone());
        let mut status = supervisor.subscribe();
        worker.release.notify_one();

        supervisor.launch(&concrete()).await.unwrap();
        wait_for(&mut status, LaunchStatus::Ready).await;

        assert_eq!(supervisor.last_exit(), Some(ProcessExit { code: Some(1), signal: None }));
        let spec = worker.specs.lock().unwrap()[0].clone();
        assert_eq!(spec.profile_name, "Steve");
        assert_eq!(spec.max_memory_mb, 1024);
        assert!(spec.detached);
        assert_eq!(spec.game_dir, dir.path());
    }

    #[tokio::test]
    async fn attached_supervisor_asks_for_attached_process() {
        let dir = tempfile::tempdir().unwrap();
        let worker = ScriptedWorker::new(vec![WorkerMessage::Launched { pid: 9 }]);
        let supervisor = supervisor(dir.path(), worker.clone()).attached();
        worker.release.notify_one();

        supervisor.launch(&concrete()).await.unwrap();
        assert!(!worker.specs.lock().unwrap()[0].detached);
    }

    #[tokio::test]
    async fn unknown_version_fails_before_launching() {
        let dir = tempfile::tempdir().unwrap();
        let worker = ScriptedWorker::new(vec![]);
        let supervisor = supervisor(dir.path(), worker.clone());

        let err = supervisor
            .launch(&VersionRequest::Concrete("0.0.1".into()))
            .await
            .unwrap_err();
        assert!(matches!(err, LauncherError::Resolution(_)));
        assert_eq!(supervisor.status(), LaunchStatus::Ready);
        assert!(worker.specs.lock().unwrap().is_empty());
    }
}
