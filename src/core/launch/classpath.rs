// ─── Classpath Builder ───
// Resolves the launch classpath and extracts native libraries.

use std::collections::HashSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::core::error::{LauncherError, LauncherResult};
use crate::core::state::LauncherPaths;
use crate::core::version::VersionJson;

/// Platform-specific Java classpath separator.
pub fn classpath_separator() -> &'static str {
    if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    }
}

/// Allowed non-native libraries in descriptor order, then the client jar.
///
/// Libraries missing on disk are skipped with a warning; a missing client jar
/// is a launch error.
pub fn build_classpath(
    paths: &LauncherPaths,
    version: &VersionJson,
    version_id: &str,
) -> LauncherResult<String> {
    let libraries_dir = paths.libraries_dir();
    let mut entries = Vec::new();

    for artifact in version.library_artifacts() {
        if artifact.native {
            continue;
        }
        let jar = libraries_dir.join(&artifact.path);
        if !jar.is_file() {
            warn!("Library {} missing at {:?}, leaving it off the classpath", artifact.name, jar);
            continue;
        }
        entries.push(path_str(&jar));
    }

    let jar_id = version.jar_version_id(version_id);
    let client_jar = paths.client_jar(jar_id);
    if !client_jar.is_file() {
        return Err(LauncherError::Launch(format!(
            "client jar for {} not found at {:?}",
            jar_id, client_jar
        )));
    }
    entries.push(path_str(&client_jar));

    dedup_preserving_order(&mut entries);
    debug!("Classpath for {}: {} entries", version_id, entries.len());
    Ok(entries.join(classpath_separator()))
}

fn dedup_preserving_order(entries: &mut Vec<String>) {
    let mut seen = HashSet::new();
    entries.retain(|entry| {
        let key = if cfg!(target_os = "windows") {
            entry.to_lowercase()
        } else {
            entry.clone()
        };
        seen.insert(key)
    });
}

/// Unpack `.dll`/`.so`/`.dylib` files from the native jars of `version` into a
/// fresh `versions/<id>/natives` directory.
pub async fn extract_natives(
    paths: &LauncherPaths,
    version: &VersionJson,
    version_id: &str,
) -> LauncherResult<PathBuf> {
    let natives_dir = paths.natives_dir(version_id);
    if natives_dir.exists() {
        tokio::fs::remove_dir_all(&natives_dir)
            .await
            .map_err(|e| LauncherError::io(&natives_dir, e))?;
    }
    tokio::fs::create_dir_all(&natives_dir)
        .await
        .map_err(|e| LauncherError::io(&natives_dir, e))?;

    let libraries_dir = paths.libraries_dir();
    let jars: Vec<PathBuf> = version
        .library_artifacts()
        .into_iter()
        .filter(|a| a.native)
        .map(|a| libraries_dir.join(&a.path))
        .collect();

    let dest_dir = natives_dir.clone();
    let extracted = tokio::task::spawn_blocking(move || -> LauncherResult<usize> {
        let mut count = 0;
        for jar in &jars {
            if !jar.is_file() {
                warn!("Native jar missing at {:?}", jar);
                continue;
            }
            count += extract_native_jar(jar, &dest_dir)?;
        }
        Ok(count)
    })
    .await??;

    debug!("Extracted {} native files for {}", extracted, version_id);
    Ok(natives_dir)
}

fn extract_native_jar(jar: &Path, dest_dir: &Path) -> LauncherResult<usize> {
    let file = std::fs::File::open(jar).map_err(|e| LauncherError::io(jar, e))?;
    let mut archive = match zip::ZipArchive::new(file) {
        Ok(archive) => archive,
        Err(e) => {
            warn!("Cannot open native jar {:?}: {}", jar, e);
            return Ok(0);
        }
    };

    let mut count = 0;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        let name = entry.name().to_string();

        // Only top-level files; jars keep signatures and nested dirs we never load.
        if name.contains("META-INF") || name.contains('/') || name.contains('\\') {
            continue;
        }
        if !is_native_library(&name) {
            continue;
        }

        let dest = dest_dir.join(&name);
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| LauncherError::io(jar, e))?;
        std::fs::write(&dest, bytes).map_err(|e| LauncherError::io(&dest, e))?;
        count += 1;
    }
    Ok(count)
}

fn is_native_library(name: &str) -> bool {
    [".dll", ".so", ".dylib", ".jnilib"]
        .iter()
        .any(|ext| name.ends_with(ext))
}

/// Absolute path text suitable for JVM arguments.
pub fn path_str(path: &Path) -> String {
    let resolved = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let text = resolved.to_string_lossy().to_string();

    #[cfg(target_os = "windows")]
    {
        // Java mishandles extended-length `\\?\C:\...` classpath entries.
        if let Some(stripped) = text.strip_prefix(r"\\?\") {
            return stripped.to_string();
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn descriptor(libraries: serde_json::Value) -> VersionJson {
        serde_json::from_value(serde_json::json!({
            "id": "1.8.9",
            "mainClass": "net.minecraft.client.main.Main",
            "libraries": libraries
        }))
        .unwrap()
    }

    fn library(name: &str, path: &str) -> serde_json::Value {
        serde_json::json!({
            "name": name,
            "downloads": {
                "artifact": {
                    "path": path,
                    "sha1": "0000000000000000000000000000000000000000",
                    "size": 1,
                    "url": format!("https://libraries.example/{}", path)
                }
            }
        })
    }

    fn touch(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"jar").unwrap();
    }

    #[test]
    fn classpath_lists_present_libraries_then_client_jar() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LauncherPaths::new(dir.path());
        touch(&paths.libraries_dir().join("a/a/1/a-1.jar"));
        touch(&paths.client_jar("1.8.9"));
        let version = descriptor(serde_json::json!([
            library("a:a:1", "a/a/1/a-1.jar"),
            library("b:b:1", "b/b/1/b-1.jar"),
            library("a:a:1", "a/a/1/a-1.jar")
        ]));

        let classpath = build_classpath(&paths, &version, "1.8.9").unwrap();
        let entries: Vec<&str> = classpath.split(classpath_separator()).collect();
        assert_eq!(entries.len(), 2);
        assert!(entries[0].ends_with("a-1.jar"));
        assert!(entries[1].ends_with("1.8.9.jar"));
    }

    #[test]
    fn missing_client_jar_is_a_launch_error() {
        let dir = tempfile::tempdir().unwrap();
        let paths = LauncherPaths::new(dir.path());
        let version = descriptor(serde_json::json!([]));

        let err = build_classpath(&paths, &version, "1.8.9").unwrap_err();
        assert!(matches!(err, LauncherError::Launch(_)));
    }

    #[test]
    fn only_top_level_native_files_are_extracted() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("natives.jar");
        {
            let mut writer = zip::ZipWriter::new(std::fs::File::create(&jar).unwrap());
            let options = zip::write::SimpleFileOptions::default();
            for name in ["liblwjgl.so", "lwjgl.dll", "META-INF/MANIFEST.MF", "nested/x.so", "readme.txt"] {
                writer.start_file(name, options).unwrap();
                writer.write_all(b"native").unwrap();
            }
            writer.finish().unwrap();
        }
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();

        assert_eq!(extract_native_jar(&jar, &out).unwrap(), 2);
        assert!(out.join("liblwjgl.so").is_file());
        assert!(out.join("lwjgl.dll").is_file());
        assert!(!out.join("readme.txt").exists());
    }
}
