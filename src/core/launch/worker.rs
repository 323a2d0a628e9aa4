// ─── Launch Worker ───
// Starts and watches the game process on a dedicated thread, reporting back
// over a channel only.

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

use super::command::{check_java, prepare_command};
use super::job::{LaunchSpec, WorkerMessage};

/// The isolated execution context behind the supervisor.
///
/// `start` returns immediately. The worker then sends `Error` or `Launched`,
/// and after `Launched` exactly one `Exit`.
pub trait LaunchWorker: Send + Sync {
    fn start(&self, spec: LaunchSpec, events: UnboundedSender<WorkerMessage>);
}

/// Spawns the real game process.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessWorker;

impl LaunchWorker for ProcessWorker {
    fn start(&self, spec: LaunchSpec, events: UnboundedSender<WorkerMessage>) {
        let thread_events = events.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("launch-{}", spec.version_id))
            .spawn(move || run_on_own_runtime(spec, thread_events));

        if let Err(e) = spawned {
            let _ = events.send(WorkerMessage::Error {
                error: format!("cannot start launch worker: {}", e),
            });
        }
    }
}

fn run_on_own_runtime(spec: LaunchSpec, events: UnboundedSender<WorkerMessage>) {
    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = events.send(WorkerMessage::Error {
                error: format!("cannot start worker runtime: {}", e),
            });
            return;
        }
    };
    runtime.block_on(supervise_process(spec, events));
}

async fn supervise_process(spec: LaunchSpec, events: UnboundedSender<WorkerMessage>) {
    let fail = |error: String| {
        error!("Launch of {} failed: {}", spec.version_id, error);
        let _ = events.send(WorkerMessage::Error { error });
    };

    if let Err(e) = check_java(&spec.java_path) {
        fail(e.to_string());
        return;
    }
    let command = match prepare_command(&spec).await {
        Ok(command) => command,
        Err(e) => {
            fail(e.to_string());
            return;
        }
    };

    let mut child = match command.to_command(spec.detached).spawn() {
        Ok(child) => child,
        Err(e) => {
            fail(format!("cannot spawn {:?}: {}", command.program, e));
            return;
        }
    };

    let pid = child.id().unwrap_or_default();
    info!("Game {} started (pid {})", spec.version_id, pid);
    let _ = events.send(WorkerMessage::Launched { pid });

    let stdout = child
        .stdout
        .take()
        .map(|out| tokio::spawn(relay_lines(out, spec.version_id.clone(), false)));
    let stderr = child
        .stderr
        .take()
        .map(|err| tokio::spawn(relay_lines(err, spec.version_id.clone(), true)));

    let status = child.wait().await;
    for relay in [stdout, stderr].into_iter().flatten() {
        let _ = relay.await;
    }

    let message = match status {
        Ok(status) => {
            info!("Game {} exited with {}", spec.version_id, status);
            WorkerMessage::Exit {
                code: status.code(),
                signal: exit_signal(&status),
            }
        }
        Err(e) => {
            warn!("Lost track of game {}: {}", spec.version_id, e);
            WorkerMessage::Exit {
                code: None,
                signal: None,
            }
        }
    };
    let _ = events.send(message);
}

async fn relay_lines<R>(stream: R, version_id: String, is_stderr: bool)
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if is_stderr => warn!(target: "game", "[{}] {}", version_id, line),
            Ok(Some(line)) => info!(target: "game", "[{}] {}", version_id, line),
            Ok(None) => break,
            Err(e) => {
                warn!("Stopped relaying output of {}: {}", version_id, e);
                break;
            }
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: &std::process::ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: &std::process::ExitStatus) -> Option<i32> {
    None
}
