// ─── Content Hashing ───
// SHA-1 identities for installed binary resources.

use std::path::{Path, PathBuf};

use futures_util::stream::{self, StreamExt, TryStreamExt};
use sha1::{Digest, Sha1};
use tokio::io::AsyncReadExt;

use crate::core::error::{LauncherError, LauncherResult};

const READ_CHUNK: usize = 64 * 1024;

/// Length of a lowercase hex SHA-1 digest.
pub const SHA1_HEX_LEN: usize = 40;

/// Hash a file by streaming it through SHA-1.
pub async fn sha1_file(path: &Path) -> LauncherResult<String> {
    let mut file = tokio::fs::File::open(path)
        .await
        .map_err(|e| LauncherError::io(path, e))?;

    let mut hasher = Sha1::new();
    let mut buf = vec![0u8; READ_CHUNK];
    loop {
        let n = file
            .read(&mut buf)
            .await
            .map_err(|e| LauncherError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

pub fn sha1_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// `true` for exactly 40 lowercase hex characters.
pub fn is_sha1_hex(s: &str) -> bool {
    s.len() == SHA1_HEX_LEN && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b))
}

/// Whether a file name is already content-addressed (`<sha1>` or `<sha1>.<ext>`).
pub fn is_content_addressed_name(file_name: &str) -> bool {
    let stem = match file_name.split_once('.') {
        Some((stem, _)) => stem,
        None => file_name,
    };
    is_sha1_hex(stem)
}

/// Hash many files with bounded parallelism. Output order matches input order.
pub async fn hash_files(
    paths: Vec<PathBuf>,
    concurrency: usize,
) -> LauncherResult<Vec<(PathBuf, String)>> {
    stream::iter(paths)
        .map(|path| async move {
            let hash = sha1_file(&path).await?;
            Ok::<_, LauncherError>((path, hash))
        })
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

/// Flat content-addressed directory: every file is named by its own SHA-1.
#[derive(Debug, Clone)]
pub struct HashStore {
    root: PathBuf,
}

impl HashStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Location of `hash` in the store. Anything but a lowercase SHA-1 is
    /// refused, so a hash can never name a file outside the store.
    pub fn path_for(&self, hash: &str) -> LauncherResult<PathBuf> {
        if !is_sha1_hex(hash) {
            return Err(LauncherError::InvalidHash(hash.to_string()));
        }
        Ok(self.root.join(hash))
    }

    pub fn contains(&self, hash: &str) -> bool {
        self.path_for(hash).map_or(false, |path| path.is_file())
    }

    /// Re-hash a stored file and compare against its name.
    pub async fn verify(&self, hash: &str) -> LauncherResult<bool> {
        let Ok(path) = self.path_for(hash) else {
            return Ok(false);
        };
        if !path.is_file() {
            return Ok(false);
        }
        Ok(sha1_file(&path).await? == hash)
    }

    /// Copy `src` into the store under its own hash. Existing entries are kept.
    pub async fn insert_file(&self, src: &Path) -> LauncherResult<String> {
        let hash = sha1_file(src).await?;
        let dest = self.path_for(&hash)?;
        if !dest.exists() {
            self.ensure_root().await?;
            self.copy_into(src, &dest).await?;
        }
        Ok(hash)
    }

    /// Move an already-verified staged file into the store.
    pub async fn adopt_verified(&self, staged: &Path, hash: &str) -> LauncherResult<PathBuf> {
        let dest = self.path_for(hash)?;
        if dest.exists() {
            let _ = tokio::fs::remove_file(staged).await;
            return Ok(dest);
        }
        self.ensure_root().await?;
        if tokio::fs::rename(staged, &dest).await.is_err() {
            // Staging may live on another filesystem.
            self.copy_into(staged, &dest).await?;
            let _ = tokio::fs::remove_file(staged).await;
        }
        Ok(dest)
    }

    pub async fn remove(&self, hash: &str) -> LauncherResult<()> {
        let path = self.path_for(hash)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(LauncherError::io(path, e)),
        }
    }

    /// Copy through a temp file in the store root, so `dest` only ever
    /// appears complete.
    async fn copy_into(&self, src: &Path, dest: &Path) -> LauncherResult<()> {
        let part = self
            .root
            .join(format!(".part-{}", uuid::Uuid::new_v4().simple()));
        if let Err(e) = tokio::fs::copy(src, &part).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(LauncherError::io(&part, e));
        }
        if let Err(e) = tokio::fs::rename(&part, dest).await {
            let _ = tokio::fs::remove_file(&part).await;
            return Err(LauncherError::io(dest, e));
        }
        Ok(())
    }

    async fn ensure_root(&self) -> LauncherResult<()> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| LauncherError::io(&self.root, e))
    }
}
