// ─── Bundle Import ───
// Payloads are staged and re-hashed before anything is registered. A single
// mismatching entry rejects the whole bundle and leaves the indices untouched.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::{Component, Path, PathBuf};

use sha1::{Digest, Sha1};
use tracing::{info, warn};
use zip::ZipArchive;

use super::layout::{
    FILES_PREFIX, LOCAL_RESOURCE, LOCAL_RESOURCES, RESOURCE_MANIFEST, RESOURCE_MANIFEST_JSON,
    WORLD_MANIFEST, WORLD_PREFIX,
};
use crate::core::error::{LauncherError, LauncherResult};
use crate::core::resource::{LocalResourceStub, Resource, ResourceCatalog, ResourceKind};
use crate::core::store::is_sha1_hex;

const STAGING_DIR: &str = ".staging";
const COPY_CHUNK: usize = 64 * 1024;

/// What an import added.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Id of the bundle's primary manifest, if it had one.
    pub manifest_id: Option<String>,
    /// Every index entry created or updated.
    pub registered: Vec<(ResourceKind, String)>,
    /// Number of payload files carried by the bundle.
    pub files: usize,
    /// Where a world bundle was extracted.
    pub world: Option<PathBuf>,
}

/// Everything read out of the zip, not yet committed anywhere.
#[derive(Default)]
struct StagedBundle {
    payloads: Vec<String>,
    manifest: Option<Resource>,
    stubs: Vec<LocalResourceStub>,
    world_name: Option<String>,
}

/// Import a bundle into `catalog` (and `saves/` for worlds).
pub async fn import_bundle(catalog: &mut ResourceCatalog, bundle: &Path) -> LauncherResult<ImportReport> {
    info!("Importing bundle {:?}", bundle);
    let staging = catalog
        .paths()
        .root()
        .join(STAGING_DIR)
        .join(uuid::Uuid::new_v4().simple().to_string());

    let result = import_staged(catalog, bundle, &staging).await;
    if staging.exists() {
        let _ = tokio::fs::remove_dir_all(&staging).await;
    }

    match &result {
        Ok(report) => info!(
            "Imported {:?}: {} entries registered, {} files",
            bundle,
            report.registered.len(),
            report.files
        ),
        Err(e) => warn!("Rejected bundle {:?}: {}", bundle, e),
    }
    result
}

async fn import_staged(
    catalog: &mut ResourceCatalog,
    bundle: &Path,
    staging: &Path,
) -> LauncherResult<ImportReport> {
    let source = bundle.to_path_buf();
    let target = staging.to_path_buf();
    let staged = tokio::task::spawn_blocking(move || stage_bundle(&source, &target)).await??;

    if let Some(name) = staged.world_name {
        return install_world(catalog, staging, &name, staged.payloads.len()).await;
    }

    if staged.manifest.is_none() && staged.stubs.is_empty() {
        return Err(LauncherError::InvalidBundle(
            "bundle has no resource manifest".into(),
        ));
    }

    // Hashes become store file names; anything else is rejected outright.
    let claimed = staged
        .manifest
        .iter()
        .flat_map(|resource| resource.hashes.iter())
        .chain(staged.stubs.iter().map(|stub| &stub.hash));
    for hash in claimed {
        if !is_sha1_hex(hash) {
            return Err(LauncherError::InvalidBundle(format!(
                "{:?} is not a lowercase SHA-1",
                hash
            )));
        }
    }

    // Decide where every payload goes before touching any store.
    let mut placements: BTreeMap<String, Vec<ResourceKind>> = BTreeMap::new();
    if let Some(resource) = &staged.manifest {
        if !resource.kind.is_indexed() {
            return Err(LauncherError::InvalidBundle(format!(
                "'{}' is a {} manifest, which has no content store",
                resource.id, resource.kind
            )));
        }
        let store = catalog.store(resource.kind)?;
        for hash in &resource.hashes {
            if !staged.payloads.contains(hash) && !store.contains(hash) {
                return Err(LauncherError::InvalidBundle(format!(
                    "'{}' references payload {} which the bundle does not carry",
                    resource.id, hash
                )));
            }
            placements.entry(hash.clone()).or_default().push(resource.kind);
        }
    }
    for stub in &staged.stubs {
        if !stub.kind.is_indexed() || !staged.payloads.contains(&stub.hash) {
            return Err(LauncherError::InvalidBundle(format!(
                "local resource '{}' has no payload {}",
                stub.id, stub.hash
            )));
        }
        placements.entry(stub.hash.clone()).or_default().push(stub.kind);
    }

    for (hash, kinds) in &placements {
        let staged_file = staging.join(hash);
        let mut adopted: Option<PathBuf> = None;
        for kind in kinds {
            let store = catalog.store(*kind)?;
            if store.contains(hash) {
                if adopted.is_none() {
                    adopted = Some(store.path_for(hash)?);
                }
                continue;
            }
            match &adopted {
                Some(existing) => {
                    store.insert_file(existing).await?;
                }
                None if staged_file.exists() => {
                    adopted = Some(store.adopt_verified(&staged_file, hash).await?);
                }
                None => {}
            }
        }
    }
    for hash in &staged.payloads {
        if !placements.contains_key(hash) {
            warn!("Bundle payload {} is not referenced by any manifest, skipping", hash);
        }
    }

    let mut report = ImportReport {
        files: staged.payloads.len(),
        ..Default::default()
    };
    let mut touched = Vec::new();

    if let Some(resource) = staged.manifest {
        report.manifest_id = Some(resource.id.clone());
        report.registered.push((resource.kind, resource.id.clone()));
        touched.push(resource.kind);
        catalog.index_mut(resource.kind)?.put(resource);
    }
    for stub in staged.stubs {
        let index = catalog.index_mut(stub.kind)?;
        let resource = match index.get(&stub.id).cloned() {
            Some(mut existing) => {
                existing.hashes.insert(stub.hash.clone());
                existing
            }
            None => stub.clone().into_resource(),
        };
        index.put(resource);
        report.registered.push((stub.kind, stub.id));
        touched.push(stub.kind);
    }

    touched.sort();
    touched.dedup();
    for kind in touched {
        catalog.save(kind).await?;
    }
    Ok(report)
}

async fn install_world(
    catalog: &ResourceCatalog,
    staging: &Path,
    name: &str,
    files: usize,
) -> LauncherResult<ImportReport> {
    let saves = catalog.paths().saves_dir();
    let dest = saves.join(name);
    if dest.exists() {
        return Err(LauncherError::Other(format!("World '{}' already exists", name)));
    }
    tokio::fs::create_dir_all(&saves)
        .await
        .map_err(|e| LauncherError::io(&saves, e))?;

    let extracted = staging.join("world");
    if extracted.exists() {
        tokio::fs::rename(&extracted, &dest)
            .await
            .map_err(|e| LauncherError::io(&dest, e))?;
    } else {
        tokio::fs::create_dir_all(&dest)
            .await
            .map_err(|e| LauncherError::io(&dest, e))?;
    }

    info!("Installed world '{}' to {:?}", name, dest);
    Ok(ImportReport {
        files,
        world: Some(dest),
        ..Default::default()
    })
}

/// Read every entry, writing payloads and world files under `staging`.
fn stage_bundle(bundle: &Path, staging: &Path) -> LauncherResult<StagedBundle> {
    let file = std::fs::File::open(bundle).map_err(|e| LauncherError::io(bundle, e))?;
    let mut archive = ZipArchive::new(std::io::BufReader::new(file))?;
    std::fs::create_dir_all(staging).map_err(|e| LauncherError::io(staging, e))?;

    let mut staged = StagedBundle::default();
    let mut manifest_raw: Option<(Vec<u8>, bool)> = None;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();

        if let Some(claimed) = name.strip_prefix(FILES_PREFIX) {
            if entry.is_dir() {
                continue;
            }
            if !is_sha1_hex(claimed) {
                return Err(LauncherError::InvalidBundle(format!(
                    "payload entry {} is not named by a SHA-1",
                    name
                )));
            }
            let dest = staging.join(claimed);
            let actual = copy_hashing(&mut entry, &dest)?;
            if actual != claimed {
                let expected = claimed.to_string();
                return Err(LauncherError::Integrity {
                    entry: name,
                    expected,
                    actual,
                });
            }
            if !staged.payloads.iter().any(|h| h == claimed) {
                staged.payloads.push(claimed.to_string());
            }
            continue;
        }

        if name.starts_with(WORLD_PREFIX) {
            let rel = world_relative_path(&name)?;
            let dest = staging.join("world").join(rel);
            if entry.is_dir() {
                std::fs::create_dir_all(&dest).map_err(|e| LauncherError::io(&dest, e))?;
            } else {
                copy_hashing(&mut entry, &dest)?;
            }
            continue;
        }

        match name.as_str() {
            RESOURCE_MANIFEST => manifest_raw = Some((read_all(&mut entry, &name)?, true)),
            RESOURCE_MANIFEST_JSON => {
                if manifest_raw.is_none() {
                    manifest_raw = Some((read_all(&mut entry, &name)?, false));
                }
            }
            LOCAL_RESOURCES => {
                let stubs: Vec<LocalResourceStub> =
                    serde_json::from_slice(&read_all(&mut entry, &name)?)?;
                staged.stubs.extend(stubs);
            }
            LOCAL_RESOURCE => {
                let stub: LocalResourceStub = serde_json::from_slice(&read_all(&mut entry, &name)?)?;
                staged.stubs.push(stub);
            }
            WORLD_MANIFEST => {
                let raw = String::from_utf8(read_all(&mut entry, &name)?).map_err(|_| {
                    LauncherError::InvalidBundle("world-manifest is not UTF-8".into())
                })?;
                staged.world_name = Some(validate_world_name(raw.trim())?);
            }
            _ => {}
        }
    }

    if let Some((bytes, verbatim)) = manifest_raw {
        staged.manifest = Some(Resource::from_manifest_bytes(&bytes, verbatim)?);
    }
    Ok(staged)
}

fn read_all(entry: &mut impl Read, name: &str) -> LauncherResult<Vec<u8>> {
    let mut bytes = Vec::new();
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| LauncherError::InvalidBundle(format!("{}: {}", name, e)))?;
    Ok(bytes)
}

/// Copy `reader` to `dest` and return the SHA-1 of what was written.
fn copy_hashing(reader: &mut impl Read, dest: &Path) -> LauncherResult<String> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(|e| LauncherError::io(parent, e))?;
    }
    let mut out = std::fs::File::create(dest).map_err(|e| LauncherError::io(dest, e))?;
    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; COPY_CHUNK];
    loop {
        let n = reader.read(&mut buf).map_err(|e| LauncherError::io(dest, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
        out.write_all(&buf[..n])
            .map_err(|e| LauncherError::io(dest, e))?;
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Path of a `world/...` entry relative to the world folder. Anything that
/// could land outside it is rejected.
fn world_relative_path(name: &str) -> LauncherResult<PathBuf> {
    let rel = Path::new(&name[WORLD_PREFIX.len()..]);
    let mut clean = PathBuf::new();
    for component in rel.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            _ => {
                return Err(LauncherError::InvalidBundle(format!(
                    "world entry {} escapes the world folder",
                    name
                )))
            }
        }
    }
    Ok(clean)
}

fn validate_world_name(name: &str) -> LauncherResult<String> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(name.to_string()),
        _ => Err(LauncherError::InvalidBundle(format!(
            "invalid world name '{}'",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::archive::export::{export_resource, export_unidentified, export_world};
    use crate::core::archive::layout::{payload_entry, INSTALL_PAGE};
    use crate::core::state::LauncherPaths;
    use crate::core::store::sha1_bytes;
    use zip::write::SimpleFileOptions;

    async fn catalog(dir: &Path) -> ResourceCatalog {
        ResourceCatalog::open(LauncherPaths::new(dir)).await.unwrap()
    }

    fn entry_names(bundle: &Path) -> Vec<String> {
        let archive = ZipArchive::new(std::fs::File::open(bundle).unwrap()).unwrap();
        archive.file_names().map(str::to_string).collect()
    }

    fn read_entry(bundle: &Path, name: &str) -> Vec<u8> {
        let mut archive = ZipArchive::new(std::fs::File::open(bundle).unwrap()).unwrap();
        let mut bytes = Vec::new();
        archive.by_name(name).unwrap().read_to_end(&mut bytes).unwrap();
        bytes
    }

    fn write_bundle(path: &Path, entries: &[(&str, &[u8])]) {
        let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
        for (name, body) in entries {
            zip.start_file(*name, SimpleFileOptions::default()).unwrap();
            zip.write_all(body).unwrap();
        }
        zip.finish().unwrap();
    }

    #[tokio::test]
    async fn sample_pack_round_trips() {
        let src = tempfile::tempdir().unwrap();
        let mut source = catalog(src.path()).await;
        let payload = src.path().join("sample.zip");
        std::fs::write(&payload, b"sample pack contents").unwrap();
        let hash = source
            .store(ResourceKind::ResourcePack)
            .unwrap()
            .insert_file(&payload)
            .await
            .unwrap();
        let resource = Resource::new("sample-pack", ResourceKind::ResourcePack).with_hash(&hash);
        source
            .index_mut(ResourceKind::ResourcePack)
            .unwrap()
            .put(resource.clone());

        let bundle = src.path().join("out").join("sample-pack.zip");
        export_resource(&source, &resource, &bundle).await.unwrap();
        assert!(!src.path().join("out").join("sample-pack.zip.partial").exists());

        let names = entry_names(&bundle);
        assert!(names.contains(&payload_entry(&hash)));
        assert!(names.contains(&RESOURCE_MANIFEST_JSON.to_string()));
        assert!(names.contains(&INSTALL_PAGE.to_string()));

        let dst = tempfile::tempdir().unwrap();
        let mut fresh = catalog(dst.path()).await;
        let report = import_bundle(&mut fresh, &bundle).await.unwrap();
        assert_eq!(report.manifest_id.as_deref(), Some("sample-pack"));
        assert_eq!(report.files, 1);

        let index = fresh.index(ResourceKind::ResourcePack).unwrap();
        assert_eq!(index.len(), 1);
        let imported = index.get("sample-pack").unwrap();
        assert_eq!(imported.kind, ResourceKind::ResourcePack);
        assert_eq!(imported.hashes, resource.hashes);
        assert!(fresh
            .store(ResourceKind::ResourcePack)
            .unwrap()
            .verify(&hash)
            .await
            .unwrap());

        let reopened = catalog(dst.path()).await;
        assert!(reopened
            .index(ResourceKind::ResourcePack)
            .unwrap()
            .get("sample-pack")
            .is_some());
    }

    #[tokio::test]
    async fn known_manifest_is_exported_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let source = catalog(dir.path()).await;
        let text = r#"{ "id": "sodium", "type": "Mod", "urls": ["https://cdn.example/sodium.jar"] }"#;
        let resource = Resource::from_manifest_bytes(text.as_bytes(), true).unwrap();

        let bundle = dir.path().join("sodium.zip");
        export_resource(&source, &resource, &bundle).await.unwrap();
        assert_eq!(read_entry(&bundle, RESOURCE_MANIFEST), text.as_bytes());
        assert!(!entry_names(&bundle).contains(&RESOURCE_MANIFEST_JSON.to_string()));

        let other = tempfile::tempdir().unwrap();
        let mut fresh = catalog(other.path()).await;
        import_bundle(&mut fresh, &bundle).await.unwrap();
        let imported = fresh.index(ResourceKind::Mod).unwrap().get("sodium").unwrap().clone();
        assert_eq!(imported.source.as_deref(), Some(text));
    }

    #[tokio::test]
    async fn tampered_payload_rejects_whole_bundle() {
        let dir = tempfile::tempdir().unwrap();
        let claimed = sha1_bytes(b"the real jar");
        let manifest = serde_json::json!({ "id": "evil", "type": "Mod", "hashes": [claimed] });
        let manifest = manifest.to_string();
        let bundle = dir.path().join("evil.zip");
        let payload_name = payload_entry(&claimed);
        write_bundle(
            &bundle,
            &[
                (RESOURCE_MANIFEST_JSON, manifest.as_bytes()),
                (payload_name.as_str(), &b"something else"[..]),
            ],
        );

        let root = dir.path().join("mc");
        let mut fresh = catalog(&root).await;
        let err = import_bundle(&mut fresh, &bundle).await.unwrap_err();
        match err {
            LauncherError::Integrity { entry, expected, actual } => {
                assert_eq!(entry, payload_name);
                assert_eq!(expected, claimed);
                assert_eq!(actual, sha1_bytes(b"something else"));
            }
            other => panic!("expected integrity error, got {other:?}"),
        }

        assert!(fresh.index(ResourceKind::Mod).unwrap().is_empty());
        assert!(!fresh.store(ResourceKind::Mod).unwrap().contains(&claimed));
        assert!(!root.join("mods").join("resources.json").exists());
        let leftovers = std::fs::read_dir(root.join(STAGING_DIR)).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn manifest_without_payload_is_invalid() {
        let dir = tempfile::tempdir().unwrap();
        let missing = sha1_bytes(b"not shipped");
        let manifest = serde_json::json!({ "id": "thin", "type": "Mod", "hashes": [missing] });
        let bundle = dir.path().join("thin.zip");
        write_bundle(&bundle, &[(RESOURCE_MANIFEST_JSON, manifest.to_string().as_bytes())]);

        let mut fresh = catalog(&dir.path().join("mc")).await;
        let err = import_bundle(&mut fresh, &bundle).await.unwrap_err();
        assert!(matches!(err, LauncherError::InvalidBundle(_)));
        assert!(fresh.index(ResourceKind::Mod).unwrap().is_empty());
    }

    #[tokio::test]
    async fn hashes_naming_other_files_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("mc");
        let mut fresh = catalog(&root).await;
        fresh
            .index_mut(ResourceKind::Mod)
            .unwrap()
            .put(Resource::new("keep-me", ResourceKind::Mod));
        fresh.save(ResourceKind::Mod).await.unwrap();

        for hash in ["resources.json", "../launcher_profiles.json"] {
            let manifest = serde_json::json!({ "id": "evil", "type": "Mod", "hashes": [hash] });
            let bundle = dir.path().join("evil.zip");
            write_bundle(&bundle, &[(RESOURCE_MANIFEST_JSON, manifest.to_string().as_bytes())]);

            let err = import_bundle(&mut fresh, &bundle).await.unwrap_err();
            assert!(matches!(err, LauncherError::InvalidBundle(_)), "{hash}");
        }

        let stub = serde_json::json!({ "id": "evil", "hash": "resources.json", "type": "Mod" });
        let bundle = dir.path().join("evil-stub.zip");
        write_bundle(&bundle, &[(LOCAL_RESOURCE, stub.to_string().as_bytes())]);
        let err = import_bundle(&mut fresh, &bundle).await.unwrap_err();
        assert!(matches!(err, LauncherError::InvalidBundle(_)));

        assert!(fresh.uninstall(ResourceKind::Mod, "evil").await.unwrap().is_none());
        let reopened = catalog(&root).await;
        assert!(reopened.index(ResourceKind::Mod).unwrap().get("keep-me").is_some());
    }

    #[tokio::test]
    async fn unidentified_file_registers_stub() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("coolmod.jar");
        std::fs::write(&jar, b"jar bytes").unwrap();
        let bundle = dir.path().join("coolmod.zip");
        export_unidentified(&jar, ResourceKind::Mod, &bundle).await.unwrap();
        assert!(entry_names(&bundle).contains(&LOCAL_RESOURCE.to_string()));

        let mut fresh = catalog(&dir.path().join("mc")).await;
        let report = import_bundle(&mut fresh, &bundle).await.unwrap();
        assert_eq!(report.manifest_id, None);
        assert_eq!(report.registered, vec![(ResourceKind::Mod, "coolmod".to_string())]);

        let hash = sha1_bytes(b"jar bytes");
        let entry = fresh.index(ResourceKind::Mod).unwrap().get("coolmod").unwrap();
        assert!(entry.hashes.contains(&hash));
        assert!(fresh.store(ResourceKind::Mod).unwrap().contains(&hash));
    }

    #[tokio::test]
    async fn world_round_trips_into_saves() {
        let dir = tempfile::tempdir().unwrap();
        let world = dir.path().join("My World");
        std::fs::create_dir_all(world.join("region")).unwrap();
        std::fs::write(world.join("level.dat"), b"level").unwrap();
        std::fs::write(world.join("region").join("r.0.0.mca"), b"chunks").unwrap();

        let bundle = dir.path().join("world.zip");
        export_world(&world, &bundle).await.unwrap();
        assert_eq!(read_entry(&bundle, WORLD_MANIFEST), b"My World");

        let root = dir.path().join("mc");
        let mut fresh = catalog(&root).await;
        let report = import_bundle(&mut fresh, &bundle).await.unwrap();
        let installed = root.join("saves").join("My World");
        assert_eq!(report.world.as_deref(), Some(installed.as_path()));
        assert_eq!(std::fs::read(installed.join("region").join("r.0.0.mca")).unwrap(), b"chunks");

        // Same name again is refused rather than merged.
        assert!(import_bundle(&mut fresh, &bundle).await.is_err());
    }

    #[tokio::test]
    async fn world_entries_cannot_escape() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("bad-world.zip");
        write_bundle(
            &bundle,
            &[(WORLD_MANIFEST, &b"w"[..]), ("world/../../escaped.txt", &b"x"[..])],
        );

        let root = dir.path().join("mc");
        let mut fresh = catalog(&root).await;
        let err = import_bundle(&mut fresh, &bundle).await.unwrap_err();
        assert!(matches!(err, LauncherError::InvalidBundle(_)));
        assert!(!root.join("saves").join("w").exists());
        assert!(!dir.path().join("escaped.txt").exists());
    }

    #[test]
    fn world_names_must_be_single_components() {
        assert!(validate_world_name("New World").is_ok());
        assert!(validate_world_name("../up").is_err());
        assert!(validate_world_name("a/b").is_err());
        assert!(validate_world_name("").is_err());
    }
}
