use std::collections::BTreeMap;

use tracing::{info, warn};

use super::index::ResourceIndex;
use super::model::{Resource, ResourceKind};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::state::LauncherPaths;
use crate::core::store::{is_sha1_hex, HashStore};

/// The indices of every indexed kind, each paired with its content store.
///
/// One writer per kind is assumed. Two callers exporting and uninstalling the
/// same id concurrently is not coordinated here; serialize them by holding the
/// catalog behind one lock.
#[derive(Debug)]
pub struct ResourceCatalog {
    paths: LauncherPaths,
    indices: BTreeMap<ResourceKind, ResourceIndex>,
}

impl ResourceCatalog {
    /// Load every index, backing up and resetting any that are unreadable.
    pub async fn open(paths: LauncherPaths) -> LauncherResult<Self> {
        let mut indices = BTreeMap::new();
        for kind in ResourceKind::INDEXED {
            let path = paths
                .index_path(kind)
                .ok_or_else(|| not_indexed(kind))?;
            let mut index = ResourceIndex::load(path).await;
            index.recover().await?;
            indices.insert(kind, index);
        }
        Ok(Self { paths, indices })
    }

    pub fn paths(&self) -> &LauncherPaths {
        &self.paths
    }

    pub fn index(&self, kind: ResourceKind) -> LauncherResult<&ResourceIndex> {
        self.indices.get(&kind).ok_or_else(|| not_indexed(kind))
    }

    pub fn index_mut(&mut self, kind: ResourceKind) -> LauncherResult<&mut ResourceIndex> {
        self.indices.get_mut(&kind).ok_or_else(|| not_indexed(kind))
    }

    pub fn store(&self, kind: ResourceKind) -> LauncherResult<HashStore> {
        self.paths
            .store_dir(kind)
            .map(HashStore::new)
            .ok_or_else(|| not_indexed(kind))
    }

    pub async fn save(&mut self, kind: ResourceKind) -> LauncherResult<()> {
        self.index_mut(kind)?.save().await
    }

    pub async fn save_all(&mut self) -> LauncherResult<()> {
        for index in self.indices.values_mut() {
            index.save().await?;
        }
        Ok(())
    }

    /// Uninstall `id`, deleting stored payloads no other entry references.
    pub async fn uninstall(&mut self, kind: ResourceKind, id: &str) -> LauncherResult<Option<Resource>> {
        let store = self.store(kind)?;
        let index = self.index_mut(kind)?;
        let Some(removed) = index.remove(id) else {
            return Ok(None);
        };

        for hash in &removed.hashes {
            if !is_sha1_hex(hash) {
                warn!("Ignoring malformed hash {:?} on '{}'", hash, id);
                continue;
            }
            if index.find_by_hash(hash).is_none() {
                store.remove(hash).await?;
            }
        }
        index.save().await?;

        info!("Uninstalled {} '{}'", kind, id);
        Ok(Some(removed))
    }
}

fn not_indexed(kind: ResourceKind) -> LauncherError {
    LauncherError::Other(format!("{} resources are not indexed", kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn open_creates_empty_indices_and_rejects_worlds() {
        let dir = tempfile::tempdir().unwrap();
        let catalog = ResourceCatalog::open(LauncherPaths::new(dir.path())).await.unwrap();

        assert!(catalog.index(ResourceKind::Mod).unwrap().is_empty());
        assert!(catalog.index(ResourceKind::World).is_err());
        assert!(catalog.store(ResourceKind::World).is_err());
    }

    #[tokio::test]
    async fn uninstall_keeps_payloads_shared_with_other_entries() {
        let dir = tempfile::tempdir().unwrap();
        let mut catalog = ResourceCatalog::open(LauncherPaths::new(dir.path())).await.unwrap();

        let src = dir.path().join("shared.jar");
        std::fs::write(&src, b"shared").unwrap();
        let store = catalog.store(ResourceKind::Mod).unwrap();
        let hash = store.insert_file(&src).await.unwrap();

        let index = catalog.index_mut(ResourceKind::Mod).unwrap();
        index.put(Resource::new("a", ResourceKind::Mod).with_hash(&hash));
        index.put(Resource::new("b", ResourceKind::Mod).with_hash(&hash));

        catalog.uninstall(ResourceKind::Mod, "a").await.unwrap();
        assert!(store.contains(&hash));

        catalog.uninstall(ResourceKind::Mod, "b").await.unwrap();
        assert!(!store.contains(&hash));
        assert!(catalog.uninstall(ResourceKind::Mod, "b").await.unwrap().is_none());
    }
}
