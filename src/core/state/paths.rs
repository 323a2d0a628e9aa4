use std::path::{Path, PathBuf};

use crate::core::resource::ResourceKind;

const APP_DIR_NAME: &str = ".minecraft";
const LAUNCH_PROFILE: &str = "launcher_profiles.json";
const EXTRA_CONFIG: &str = "pure_launcher_config.json";
const INDEX_FILE: &str = "resources.json";

/// On-disk layout of a launcher data root.
///
/// ```text
/// <root>/
///   versions/<id>/<id>.json, <id>.jar, mods/, natives/
///   versions/resources.json
///   libraries/
///   assets/indexes/, assets/objects/<xx>/<hash>
///   mods/<sha1>, mods/resources.json
///   resourcepacks/<sha1>, resourcepacks/resources.json
///   saves/<world>/
///   launcher_profiles.json
/// ```
#[derive(Debug, Clone)]
pub struct LauncherPaths {
    root: PathBuf,
}

impl LauncherPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// `<data dir>/.minecraft`, or `./.minecraft` when the platform has no data dir.
    pub fn default_root() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR_NAME)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn versions_dir(&self) -> PathBuf {
        self.root.join("versions")
    }

    pub fn version_dir(&self, id: &str) -> PathBuf {
        self.versions_dir().join(id)
    }

    pub fn version_json(&self, id: &str) -> PathBuf {
        self.version_dir(id).join(format!("{}.json", id))
    }

    pub fn client_jar(&self, id: &str) -> PathBuf {
        self.version_dir(id).join(format!("{}.jar", id))
    }

    pub fn version_mods_dir(&self, id: &str) -> PathBuf {
        self.version_dir(id).join("mods")
    }

    pub fn natives_dir(&self, id: &str) -> PathBuf {
        self.version_dir(id).join("natives")
    }

    pub fn libraries_dir(&self) -> PathBuf {
        self.root.join("libraries")
    }

    pub fn assets_dir(&self) -> PathBuf {
        self.root.join("assets")
    }

    pub fn asset_index_path(&self, index_id: &str) -> PathBuf {
        self.assets_dir()
            .join("indexes")
            .join(format!("{}.json", index_id))
    }

    pub fn asset_object_path(&self, hash: &str) -> PathBuf {
        let prefix = hash.get(..2).unwrap_or(hash);
        self.assets_dir().join("objects").join(prefix).join(hash)
    }

    pub fn mods_dir(&self) -> PathBuf {
        self.root.join("mods")
    }

    pub fn resource_packs_dir(&self) -> PathBuf {
        self.root.join("resourcepacks")
    }

    pub fn saves_dir(&self) -> PathBuf {
        self.root.join("saves")
    }

    /// Content-store directory for an indexed kind. Worlds have none.
    pub fn store_dir(&self, kind: ResourceKind) -> Option<PathBuf> {
        match kind {
            ResourceKind::Mod => Some(self.mods_dir()),
            ResourceKind::ResourcePack => Some(self.resource_packs_dir()),
            ResourceKind::Version => Some(self.versions_dir()),
            ResourceKind::World => None,
        }
    }

    pub fn index_path(&self, kind: ResourceKind) -> Option<PathBuf> {
        self.store_dir(kind).map(|dir| dir.join(INDEX_FILE))
    }

    pub fn launch_profile_path(&self) -> PathBuf {
        self.root.join(LAUNCH_PROFILE)
    }

    pub fn extra_config_path(&self) -> PathBuf {
        self.root.join(EXTRA_CONFIG)
    }
}
