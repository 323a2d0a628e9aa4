// ─── Bundle Export ───
// Every export is planned in memory first, then streamed to `<dest>.partial`
// on the blocking pool and renamed into place once the zip is finished.

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info, warn};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::layout::{
    payload_entry, INSTALL_PAGE, INSTALL_PAGE_HTML, LOCAL_RESOURCE, LOCAL_RESOURCES,
    RESOURCE_MANIFEST, RESOURCE_MANIFEST_JSON, WORLD_MANIFEST, WORLD_PREFIX,
};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::install::DEFAULT_CONCURRENCY;
use crate::core::resource::{LocalResourceStub, Resource, ResourceCatalog, ResourceKind};
use crate::core::store::{hash_files, is_content_addressed_name, sha1_file};
use crate::core::version::{VersionRequest, VersionResolver};

#[derive(Debug, Clone)]
pub struct ExportOptions {
    /// Bundle loose mods and resource packs found next to the version.
    pub include_local_resources: bool,
}

impl Default for ExportOptions {
    fn default() -> Self {
        Self {
            include_local_resources: true,
        }
    }
}

enum EntryBody {
    Bytes(Vec<u8>),
    File(PathBuf),
}

struct BundleEntry {
    name: String,
    body: EntryBody,
}

/// Ordered entry list. Duplicate names keep the first body.
#[derive(Default)]
struct BundlePlan {
    entries: Vec<BundleEntry>,
    names: HashSet<String>,
}

impl BundlePlan {
    fn push(&mut self, name: String, body: EntryBody) {
        if self.names.insert(name.clone()) {
            self.entries.push(BundleEntry { name, body });
        }
    }

    fn bytes(&mut self, name: &str, bytes: impl Into<Vec<u8>>) {
        self.push(name.to_string(), EntryBody::Bytes(bytes.into()));
    }

    fn json<T: Serialize>(&mut self, name: &str, value: &T) -> LauncherResult<()> {
        self.bytes(name, serde_json::to_vec(value)?);
        Ok(())
    }

    fn file(&mut self, name: String, path: PathBuf) {
        self.push(name, EntryBody::File(path));
    }

    /// Original manifest text when known, otherwise a synthesized one.
    fn manifest(&mut self, resource: &Resource) -> LauncherResult<()> {
        match &resource.source {
            Some(source) => self.bytes(RESOURCE_MANIFEST, source.as_bytes()),
            None => self.json(RESOURCE_MANIFEST_JSON, &resource.export_manifest()?)?,
        }
        Ok(())
    }

    fn install_page(&mut self) {
        self.bytes(INSTALL_PAGE, INSTALL_PAGE_HTML);
    }

    async fn write(self, dest: &Path) -> LauncherResult<()> {
        let partial = partial_path(dest);
        let count = self.entries.len();
        let target = partial.clone();
        let result = tokio::task::spawn_blocking(move || write_zip(&target, self.entries)).await?;

        if let Err(e) = result {
            let _ = tokio::fs::remove_file(&partial).await;
            return Err(e);
        }
        tokio::fs::rename(&partial, dest)
            .await
            .map_err(|e| LauncherError::io(dest, e))?;
        info!("Wrote bundle {:?} ({} entries)", dest, count);
        Ok(())
    }
}

fn partial_path(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    dest.with_file_name(format!("{}.partial", name))
}

fn write_zip(dest: &Path, entries: Vec<BundleEntry>) -> LauncherResult<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
    }
    let file = std::fs::File::create(dest).map_err(|e| LauncherError::io(dest, e))?;
    let mut zip = ZipWriter::new(std::io::BufWriter::new(file));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    for entry in entries {
        zip.start_file(entry.name.as_str(), options)?;
        match entry.body {
            EntryBody::Bytes(bytes) => zip
                .write_all(&bytes)
                .map_err(|e| LauncherError::io(dest, e))?,
            EntryBody::File(path) => {
                let mut src =
                    std::fs::File::open(&path).map_err(|e| LauncherError::io(&path, e))?;
                std::io::copy(&mut src, &mut zip).map_err(|e| LauncherError::io(&path, e))?;
            }
        }
        debug!("Bundled {}", entry.name);
    }

    // Not done until the central directory is written and the file is on disk.
    let mut out = zip.finish()?;
    out.flush().map_err(|e| LauncherError::io(dest, e))?;
    out.get_ref()
        .sync_all()
        .map_err(|e| LauncherError::io(dest, e))?;
    Ok(())
}

/// Add every payload of `resource` present in its content store.
fn embed_payloads(plan: &mut BundlePlan, catalog: &ResourceCatalog, resource: &Resource) {
    let Ok(store) = catalog.store(resource.kind) else {
        return;
    };
    for hash in &resource.hashes {
        match store.path_for(hash) {
            Ok(path) if path.is_file() => plan.file(payload_entry(hash), path),
            _ => warn!(
                "Payload {} of '{}' is missing from the store, exporting without it",
                hash, resource.id
            ),
        }
    }
}

/// Export one indexed resource with its stored payloads.
pub async fn export_resource(
    catalog: &ResourceCatalog,
    resource: &Resource,
    dest: &Path,
) -> LauncherResult<()> {
    info!("Exporting {} '{}' to {:?}", resource.kind, resource.id, dest);
    let mut plan = BundlePlan::default();
    plan.manifest(resource)?;
    embed_payloads(&mut plan, catalog, resource);
    plan.install_page();
    plan.write(dest).await
}

/// Export a loose file that has no manifest.
pub async fn export_unidentified(file: &Path, kind: ResourceKind, dest: &Path) -> LauncherResult<()> {
    let id = file
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .ok_or_else(|| LauncherError::Other(format!("No file name in {:?}", file)))?;
    let hash = sha1_file(file).await?;
    info!("Exporting unidentified {} '{}' to {:?}", kind, id, dest);

    let mut plan = BundlePlan::default();
    plan.file(payload_entry(&hash), file.to_path_buf());
    plan.json(LOCAL_RESOURCE, &LocalResourceStub { id, hash, kind })?;
    plan.install_page();
    plan.write(dest).await
}

/// Export a world folder.
pub async fn export_world(world_dir: &Path, dest: &Path) -> LauncherResult<()> {
    let name = world_dir
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| LauncherError::Other(format!("No folder name in {:?}", world_dir)))?;
    info!("Exporting world '{}' to {:?}", name, dest);

    let root = world_dir.to_path_buf();
    let files = tokio::task::spawn_blocking(move || collect_files(&root)).await??;

    let mut plan = BundlePlan::default();
    plan.bytes(WORLD_MANIFEST, name.as_bytes());
    for file in files {
        let Ok(rel) = file.strip_prefix(world_dir) else {
            continue;
        };
        let rel: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().to_string())
            .collect();
        plan.file(format!("{}{}", WORLD_PREFIX, rel.join("/")), file);
    }
    plan.install_page();
    plan.write(dest).await
}

fn collect_files(dir: &Path) -> LauncherResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let entries = std::fs::read_dir(&current).map_err(|e| LauncherError::io(&current, e))?;
        for entry in entries {
            let path = entry.map_err(|e| LauncherError::io(&current, e))?.path();
            if path.is_dir() {
                pending.push(path);
            } else {
                files.push(path);
            }
        }
    }
    files.sort();
    Ok(files)
}

/// Export a version with its manifest and, optionally, the loose mods and
/// resource packs that were not installed through a manifest.
///
/// A version with no index entry that the remote manifest lists gets a
/// vanilla stub manifest. Anything else is exported as-is with a warning.
pub async fn export_version(
    catalog: &ResourceCatalog,
    resolver: &VersionResolver,
    request: &VersionRequest,
    options: &ExportOptions,
    dest: &Path,
) -> LauncherResult<()> {
    let version_id = resolver.resolve_id(request).await?;
    info!("Exporting version {} to {:?}", version_id, dest);
    let mut plan = BundlePlan::default();

    match catalog.index(ResourceKind::Version)?.get(&version_id) {
        Some(resource) => {
            plan.manifest(resource)?;
            embed_payloads(&mut plan, catalog, resource);
        }
        None => match resolver.ensure_manifest().await {
            Ok(manifest) if manifest.find_version(&version_id).is_some() => {
                plan.json(RESOURCE_MANIFEST_JSON, &vanilla_stub(&version_id))?;
            }
            Ok(_) => warn!(
                "Version {} was not installed by this launcher, the export may be incomplete",
                version_id
            ),
            Err(e) => warn!(
                "Cannot check {} against the version manifest ({}), the export may be incomplete",
                version_id, e
            ),
        },
    }

    if options.include_local_resources {
        let paths = catalog.paths();
        let scans = [
            (ResourceKind::Mod, paths.version_mods_dir(&version_id)),
            (ResourceKind::ResourcePack, paths.resource_packs_dir()),
        ];

        let mut stubs = Vec::new();
        for (kind, dir) in scans {
            let files = loose_files(&dir, kind).await?;
            for (path, hash) in hash_files(files, DEFAULT_CONCURRENCY).await? {
                let id = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().to_string())
                    .unwrap_or_default();
                plan.file(payload_entry(&hash), path);
                stubs.push(LocalResourceStub { id, hash, kind });
            }
        }
        if !stubs.is_empty() {
            plan.json(LOCAL_RESOURCES, &stubs)?;
        }
    }

    plan.install_page();
    plan.write(dest).await
}

fn vanilla_stub(version_id: &str) -> serde_json::Value {
    serde_json::json!({
        "type": ResourceKind::Version,
        "mcVersion": version_id,
        "id": version_id,
        "$vanilla": true,
    })
}

/// Files of `kind` in `dir` that are not already content-addressed.
async fn loose_files(dir: &Path, kind: ResourceKind) -> LauncherResult<Vec<PathBuf>> {
    let Some(ext) = kind.file_extension() else {
        return Ok(Vec::new());
    };
    if !dir.is_dir() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| LauncherError::io(dir, e))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| LauncherError::io(dir, e))?
    {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_string();
        let matches_ext = path.extension().is_some_and(|e| e == ext);
        if path.is_file() && matches_ext && !is_content_addressed_name(&name) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
