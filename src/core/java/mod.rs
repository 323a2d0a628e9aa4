// ─── Java Runtime ───
// Picks the java executable a launch will use.

use std::path::{Path, PathBuf};

use tracing::debug;

fn java_exe() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

/// Resolve the java binary for a launch.
///
/// Order: the configured path if it exists, `$JAVA_HOME/bin/java`, the
/// first `java` on `PATH`, and finally the bare command name.
pub fn resolve_java_path(configured: Option<&Path>) -> PathBuf {
    if let Some(path) = configured {
        if path.is_file() {
            return path.to_path_buf();
        }
        debug!("Configured java {:?} does not exist, searching", path);
    }

    if let Some(home) = std::env::var_os("JAVA_HOME") {
        let candidate = PathBuf::from(home).join("bin").join(java_exe());
        if candidate.is_file() {
            return candidate;
        }
    }

    find_on_path(java_exe(), std::env::var_os("PATH").as_deref())
        .unwrap_or_else(|| PathBuf::from(java_exe()))
}

fn find_on_path(exe: &str, path_var: Option<&std::ffi::OsStr>) -> Option<PathBuf> {
    std::env::split_paths(path_var?)
        .map(|dir| dir.join(exe))
        .find(|candidate| candidate.is_file())
}
