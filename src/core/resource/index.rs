// ─── Resource Index ───
// Persisted map from logical resource id to its metadata, one file per kind.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use super::model::{Resource, ResourceKind};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::store::{backup_corrupt, load_json, sha1_file, write_json_atomic, JsonLoad};

/// In-memory view of one index file.
///
/// The file is loaded wholesale and rewritten wholesale. Saving re-reads the
/// file first: entries put since the last save replace their on-disk record,
/// ids this index never loaded are carried over untouched.
#[derive(Debug)]
pub struct ResourceIndex {
    path: PathBuf,
    entries: BTreeMap<String, Resource>,
    /// Ids put since the last save.
    dirty: BTreeSet<String>,
    /// Ids removed since the last save.
    removed: BTreeSet<String>,
    load_problem: Option<String>,
}

impl ResourceIndex {
    pub fn empty(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entries: BTreeMap::new(),
            dirty: BTreeSet::new(),
            removed: BTreeSet::new(),
            load_problem: None,
        }
    }

    /// Read the index file. A missing or unreadable file yields an empty
    /// index; `load_problem` tells the caller whether recovery is needed.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let mut index = Self::empty(path);
        match load_json::<Map<String, Value>>(&index.path).await {
            JsonLoad::Loaded(map) => {
                index.entries = parse_entries(map);
                debug!("Loaded {} entries from {:?}", index.entries.len(), index.path);
            }
            JsonLoad::Missing => {}
            JsonLoad::Corrupt(reason) => {
                warn!("Resource index {:?} is unreadable: {}", index.path, reason);
                index.load_problem = Some(reason);
            }
        }
        index
    }

    /// Move a damaged index file aside so the next save starts clean.
    pub async fn recover(&mut self) -> LauncherResult<()> {
        if self.load_problem.take().is_some() && self.path.exists() {
            backup_corrupt(&self.path).await?;
        }
        Ok(())
    }

    pub fn load_problem(&self) -> Option<&str> {
        self.load_problem.as_deref()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Rewrite the file from memory, keeping ids other tools added since `load`.
    pub async fn save(&mut self) -> LauncherResult<()> {
        let mut document = match load_json::<Map<String, Value>>(&self.path).await {
            JsonLoad::Loaded(map) => map,
            _ => Map::new(),
        };
        for id in &self.removed {
            document.remove(id);
        }
        for (id, resource) in &self.entries {
            if self.dirty.contains(id) || !document.contains_key(id) {
                document.insert(id.clone(), serde_json::to_value(resource)?);
            }
        }

        let document = Value::Object(document);
        write_json_atomic(&self.path, &document).await?;
        if let Value::Object(map) = document {
            self.entries = parse_entries(map);
        }
        self.dirty.clear();
        self.removed.clear();
        debug!("Saved {} entries to {:?}", self.entries.len(), self.path);
        Ok(())
    }

    /// Insert or overwrite the entry keyed by `resource.id`.
    pub fn put(&mut self, resource: Resource) -> Option<Resource> {
        let id = resource.id.clone();
        self.removed.remove(&id);
        self.dirty.insert(id.clone());
        self.entries.insert(id, resource)
    }

    pub fn remove(&mut self, id: &str) -> Option<Resource> {
        let removed = self.entries.remove(id);
        self.dirty.remove(id);
        self.removed.insert(id.to_string());
        removed
    }

    pub fn get(&self, id: &str) -> Option<&Resource> {
        self.entries.get(id)
    }

    pub fn find<P>(&self, predicate: P) -> Vec<&Resource>
    where
        P: Fn(&Resource) -> bool,
    {
        self.entries.values().filter(|r| predicate(r)).collect()
    }

    pub fn find_by_hash(&self, hash: &str) -> Option<&Resource> {
        self.entries.values().find(|r| r.hashes.contains(hash))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Register a local file that has no manifest. The id is the file stem.
    pub async fn record_unidentified(
        &mut self,
        file: &Path,
        kind: ResourceKind,
    ) -> LauncherResult<Resource> {
        let id = file
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .ok_or_else(|| LauncherError::Other(format!("No file name in {:?}", file)))?;
        let hash = sha1_file(file).await?;

        let mut resource = self
            .entries
            .get(&id)
            .cloned()
            .unwrap_or_else(|| Resource::new(&id, kind));
        resource.hashes.insert(hash);
        self.put(resource.clone());
        info!("Recorded unidentified {} '{}'", kind, id);
        Ok(resource)
    }
}

fn parse_entries(map: Map<String, Value>) -> BTreeMap<String, Resource> {
    let mut entries = BTreeMap::new();
    for (id, value) in map {
        match serde_json::from_value::<Resource>(value) {
            Ok(mut resource) => {
                // The map key is authoritative for identity.
                resource.id = id.clone();
                entries.insert(id, resource);
            }
            Err(e) => warn!("Skipping malformed index entry '{}': {}", id, e),
        }
    }
    entries
}
