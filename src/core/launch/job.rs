// ─── Launch Job ───
// Values that cross the worker boundary.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Everything the worker needs to start the game. Built once per launch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaunchSpec {
    /// Concrete, installed version id.
    pub version_id: String,
    pub java_path: PathBuf,
    /// Extra JVM arguments from the profile, placed before the descriptor's own.
    pub jvm_args: Vec<String>,
    /// 0 leaves the heap size to the JVM.
    pub max_memory_mb: u32,
    pub access_token: String,
    pub profile_id: String,
    pub profile_name: String,
    pub user_type: String,
    /// JSON object passed as `${user_properties}`.
    pub properties: String,
    /// Launcher data root; also the game's working directory.
    pub game_dir: PathBuf,
    /// Spawn the game in its own process group so it outlives the launcher.
    pub detached: bool,
}

/// One message from the worker. `Error` and `Launched` end the launch attempt,
/// `Exit` ends the process.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum WorkerMessage {
    Error { error: String },
    Launched { pid: u32 },
    Exit { code: Option<i32>, signal: Option<i32> },
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LaunchStatus {
    Ready,
    Launching,
    Launched,
}

/// How the last game process ended. Informational; a non-zero code is not a failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProcessExit {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

impl ProcessExit {
    pub fn is_clean(&self) -> bool {
        self.code == Some(0) && self.signal.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LaunchOutcome {
    pub version_id: String,
    pub pid: u32,
}
