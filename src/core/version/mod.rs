pub mod manifest;
pub mod resolver;
pub mod version_file;

pub use manifest::{LatestVersions, VersionEntry, VersionManifest, VERSION_MANIFEST_URL};
pub use resolver::{VersionRequest, VersionResolver};
pub use version_file::{LibraryArtifact, LibraryEntry, VersionJson};
