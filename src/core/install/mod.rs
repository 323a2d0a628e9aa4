pub mod pipeline;

pub use pipeline::{InstallPipeline, InstallProgress, InstallReport, DEFAULT_CONCURRENCY};
