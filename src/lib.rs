pub mod core;

use tracing_subscriber::EnvFilter;

pub use crate::core::error::{LauncherError, LauncherResult};
pub use crate::core::state::AppState;

/// Install the fmt subscriber. `RUST_LOG` overrides the default filter.
/// Calling it again is a no-op.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pure_launcher_core=debug")),
        )
        .try_init();
}
