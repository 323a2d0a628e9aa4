// ─── JSON Files ───
// Whole-file JSON persistence shared by the resource indices and the profile store.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::warn;

use crate::core::error::{LauncherError, LauncherResult};

/// Result of reading a JSON file that is allowed to be absent or damaged.
#[derive(Debug)]
pub enum JsonLoad<T> {
    Loaded(T),
    Missing,
    Corrupt(String),
}

impl<T> JsonLoad<T> {
    pub fn ok(self) -> Option<T> {
        match self {
            JsonLoad::Loaded(v) => Some(v),
            _ => None,
        }
    }
}

/// Read and parse `path`. Absence and parse failures are reported, not raised.
pub async fn load_json<T: DeserializeOwned>(path: &Path) -> JsonLoad<T> {
    let raw = match tokio::fs::read_to_string(path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return JsonLoad::Missing,
        Err(e) => return JsonLoad::Corrupt(e.to_string()),
    };

    match serde_json::from_str(&raw) {
        Ok(v) => JsonLoad::Loaded(v),
        Err(e) => JsonLoad::Corrupt(e.to_string()),
    }
}

/// Rename a damaged file out of the way as `<name>.<unix-millis>.bak`.
pub async fn backup_corrupt(path: &Path) -> LauncherResult<PathBuf> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let backup = path.with_file_name(format!(
        "{}.{}.bak",
        file_name,
        chrono::Utc::now().timestamp_millis()
    ));

    tokio::fs::rename(path, &backup)
        .await
        .map_err(|e| LauncherError::io(path, e))?;
    warn!("Backed up unreadable {:?} to {:?}", path, backup);
    Ok(backup)
}

/// Recursively merge `overlay` into `base`.
///
/// Objects merge key by key; every other value (arrays included) is replaced.
pub fn deep_merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base_map), Value::Object(overlay_map)) => {
            for (key, value) in overlay_map {
                match base_map.get_mut(&key) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

/// Write `value` over whatever is currently on disk, preserving keys the
/// in-memory value does not know about.
///
/// `drop_keys` are top-level keys removed from the on-disk state before merging.
/// Returns the merged document as written.
pub async fn write_json_merged(
    path: &Path,
    value: Value,
    drop_keys: &[String],
) -> LauncherResult<Value> {
    let mut current = match load_json::<Value>(path).await {
        JsonLoad::Loaded(v @ Value::Object(_)) => v,
        _ => Value::Object(Default::default()),
    };

    if let Value::Object(map) = &mut current {
        for key in drop_keys {
            map.remove(key);
        }
    }

    deep_merge(&mut current, value);
    write_json_atomic(path, &current).await?;
    Ok(current)
}

/// Write pretty JSON to a sibling temp file and rename it into place.
pub async fn write_json_atomic(path: &Path, value: &Value) -> LauncherResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| LauncherError::io(parent, e))?;
    }

    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4().simple()));
    tokio::fs::write(&tmp, json)
        .await
        .map_err(|e| LauncherError::io(&tmp, e))?;
    tokio::fs::rename(&tmp, path)
        .await
        .map_err(|e| LauncherError::io(path, e))?;
    Ok(())
}
