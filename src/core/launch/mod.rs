pub mod classpath;
pub mod command;
pub mod job;
pub mod supervisor;
pub mod worker;

pub use classpath::{build_classpath, extract_natives};
pub use command::{prepare_command, LaunchCommand};
pub use job::{LaunchOutcome, LaunchSpec, LaunchStatus, ProcessExit, WorkerMessage};
pub use supervisor::LaunchSupervisor;
pub use worker::{LaunchWorker, ProcessWorker};
