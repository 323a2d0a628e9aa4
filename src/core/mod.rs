// ─── PureLauncher Core ───
// Library backend of a Minecraft launcher.
//
// Architecture:
//   core/
//     store/      Content-addressed files + JSON persistence helpers
//     resource/   Resource model, per-kind indices, catalog
//     archive/    Portable zip bundles (export/import)
//     version/    Mojang manifest, version JSON, request resolution
//     install/    Download pipeline for clients, libraries, assets
//     downloader/ Download capability + reqwest implementation
//     assets/     Asset index parsing
//     maven/      Maven coordinates for legacy libraries
//     profile/    launcher_profiles.json + extra config
//     auth/       Account variants and launch sessions
//     java/       Java executable lookup
//     launch/     Command builder, process worker, supervisor
//     state/      Data root layout and component wiring

pub mod archive;
pub mod assets;
pub mod auth;
pub mod downloader;
pub mod error;
pub mod http;
pub mod install;
pub mod java;
pub mod launch;
pub mod maven;
pub mod profile;
pub mod resource;
pub mod state;
pub mod store;
pub mod version;
