use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::error::{LauncherError, LauncherResult};

/// Kind tag of an installable asset. Serialized as the manifest `type` field.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKind {
    Mod,
    ResourcePack,
    World,
    Version,
}

impl ResourceKind {
    /// Kinds that own a content store and an index file.
    pub const INDEXED: [ResourceKind; 3] = [
        ResourceKind::Mod,
        ResourceKind::ResourcePack,
        ResourceKind::Version,
    ];

    pub fn is_indexed(self) -> bool {
        !matches!(self, ResourceKind::World)
    }

    /// File extension used for loose files of this kind in a game directory.
    pub fn file_extension(self) -> Option<&'static str> {
        match self {
            ResourceKind::Mod => Some("jar"),
            ResourceKind::ResourcePack => Some("zip"),
            _ => None,
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::Mod => write!(f, "Mod"),
            ResourceKind::ResourcePack => write!(f, "ResourcePack"),
            ResourceKind::World => write!(f, "World"),
            ResourceKind::Version => write!(f, "Version"),
        }
    }
}

/// One installed or importable resource.
///
/// `hashes` lists every binary artifact backing the resource (for example
/// several builds of one mod); each must exist in the content store.
/// `source` holds the original manifest text when the resource came from a
/// known manifest, and is exported verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
    #[serde(default)]
    pub hashes: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urls: Option<Vec<String>>,

    // ── Display fields ──
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mc_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Resolver cache. Never leaves this machine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolved_id: Option<String>,

    /// Manifest fields this launcher does not model.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Fields stripped from a synthesized export manifest.
const LOCAL_ONLY_FIELDS: &[&str] = &["resolvedId"];

impl Resource {
    pub fn new(id: impl Into<String>, kind: ResourceKind) -> Self {
        Self {
            id: id.into(),
            kind,
            hashes: BTreeSet::new(),
            source: None,
            urls: None,
            title: None,
            version: None,
            mc_version: None,
            description: None,
            resolved_id: None,
            extra: Map::new(),
        }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hashes.insert(hash.into());
        self
    }

    /// Parse a bundle manifest.
    ///
    /// `verbatim` marks a `resource-manifest` entry: its exact text is kept in
    /// `source` so re-exporting reproduces the original bytes.
    pub fn from_manifest_bytes(bytes: &[u8], verbatim: bool) -> LauncherResult<Self> {
        let mut resource: Resource = serde_json::from_slice(bytes)?;
        if resource.id.trim().is_empty() {
            return Err(LauncherError::InvalidBundle("manifest has an empty id".into()));
        }
        resource.resolved_id = None;
        if verbatim {
            let text = String::from_utf8(bytes.to_vec()).map_err(|_| {
                LauncherError::InvalidBundle("resource-manifest is not UTF-8".into())
            })?;
            resource.source = Some(text);
        }
        Ok(resource)
    }

    /// Minimal JSON manifest for resources without an original manifest.
    pub fn export_manifest(&self) -> LauncherResult<Value> {
        let mut value = serde_json::to_value(self)?;
        if let Value::Object(map) = &mut value {
            for field in LOCAL_ONLY_FIELDS {
                map.remove(*field);
            }
        }
        Ok(value)
    }
}

/// A loose file found next to a version, described without a known manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LocalResourceStub {
    pub id: String,
    pub hash: String,
    #[serde(rename = "type")]
    pub kind: ResourceKind,
}

impl LocalResourceStub {
    pub fn into_resource(self) -> Resource {
        Resource::new(self.id, self.kind).with_hash(self.hash)
    }
}
