//! Logo asset lifecycle: upload, normalization, replacement and sweeping.

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, RgbaImage};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use crate::config::AssetSettings;
use crate::error::{Error, Result};

const LOGO_PREFIX: &str = "logos";

/// Reference to a normalized logo held by an [`AssetStore`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogoAsset {
    pub key: String,
    /// blake3 of the stored PNG, so a replaced file never aliases a cached render
    pub digest: String,
}

/// Storage for uploaded assets. Keys are relative, `/`-separated paths.
pub trait AssetStore: Send + Sync {
    fn store(&self, key: &str, bytes: &[u8]) -> Result<()>;
    fn load(&self, key: &str) -> Result<Vec<u8>>;
    fn exists(&self, key: &str) -> bool;
    fn delete(&self, key: &str) -> Result<()>;
    fn last_modified(&self, key: &str) -> Result<SystemTime>;
    /// Every key below `prefix`
    fn keys(&self, prefix: &str) -> Result<Vec<String>>;
}

// === Filesystem Store ===

pub struct FsAssetStore {
    root: PathBuf,
}

impl FsAssetStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let is_plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !is_plain {
            return Err(Error::Asset(format!("invalid asset key '{}'", key)));
        }
        Ok(self.root.join(relative))
    }
}

impl AssetStore for FsAssetStore {
    fn store(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, bytes)?;
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        fs::read(&path).map_err(|e| Error::Asset(format!("cannot read '{}': {}", key, e)))
    }

    fn exists(&self, key: &str) -> bool {
        self.path_for(key).map(|p| p.is_file()).unwrap_or(false)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn last_modified(&self, key: &str) -> Result<SystemTime> {
        let path = self.path_for(key)?;
        Ok(fs::metadata(&path)?.modified()?)
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let dir = self.path_for(prefix)?;
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let name = entry.file_name();
                keys.push(format!("{}/{}", prefix, name.to_string_lossy()));
            }
        }
        keys.sort();
        Ok(keys)
    }
}

// === In-Memory Store ===

/// Process-local store, mostly useful for previews and tests
#[derive(Default)]
pub struct MemoryAssetStore {
    entries: Mutex<HashMap<String, (Vec<u8>, SystemTime)>>,
}

impl MemoryAssetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with an explicit modification time
    pub fn store_at(&self, key: &str, bytes: &[u8], modified: SystemTime) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), (bytes.to_vec(), modified));
    }
}

impl AssetStore for MemoryAssetStore {
    fn store(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.store_at(key, bytes, SystemTime::now());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Vec<u8>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| Error::Asset(format!("asset '{}' not found", key)))
    }

    fn exists(&self, key: &str) -> bool {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.contains_key(key)
    }

    fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.remove(key);
        Ok(())
    }

    fn last_modified(&self, key: &str) -> Result<SystemTime> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .map(|(_, modified)| *modified)
            .ok_or_else(|| Error::Asset(format!("asset '{}' not found", key)))
    }

    fn keys(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let dir = format!("{}/", prefix);
        let mut keys: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(&dir))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }
}

// === Logo Library ===

/// Upload, load and expiry of logo assets on top of a store
#[derive(Clone)]
pub struct LogoLibrary {
    store: Arc<dyn AssetStore>,
    max_dimension: u32,
    max_upload_bytes: usize,
    retention: Duration,
}

impl LogoLibrary {
    pub fn new(store: Arc<dyn AssetStore>, settings: &AssetSettings) -> Self {
        Self {
            store,
            max_dimension: settings.max_logo_dimension.max(1),
            max_upload_bytes: settings.max_upload_bytes,
            retention: Duration::from_secs(settings.retention_secs),
        }
    }

    pub fn store(&self) -> &Arc<dyn AssetStore> {
        &self.store
    }

    /// Normalize and store an uploaded logo, deleting the one it replaces
    pub fn upload(&self, bytes: &[u8], previous: Option<&LogoAsset>) -> Result<LogoAsset> {
        if bytes.len() > self.max_upload_bytes {
            return Err(Error::validation(
                "logo",
                format!(
                    "upload is {} bytes, the limit is {}",
                    bytes.len(),
                    self.max_upload_bytes
                ),
            ));
        }

        let normalized = normalize_logo(bytes, self.max_dimension)?;
        let mut png = Vec::new();
        DynamicImage::ImageRgba8(normalized).write_to(&mut Cursor::new(&mut png), ImageFormat::Png)?;

        let digest = blake3::hash(&png).to_hex().to_string();
        let key = format!("{}/{}.png", LOGO_PREFIX, &digest[..16]);
        self.store.store(&key, &png)?;
        debug!("stored logo {} ({} bytes)", key, png.len());

        if let Some(old) = previous {
            if old.key != key {
                if let Err(e) = self.store.delete(&old.key) {
                    warn!("could not delete replaced logo {}: {}", old.key, e);
                }
            }
        }

        Ok(LogoAsset { key, digest })
    }

    pub fn remove(&self, asset: &LogoAsset) -> Result<()> {
        self.store.delete(&asset.key)
    }

    /// Read and decode a logo. Every failure is an [`Error::Asset`].
    pub fn load(&self, asset: &LogoAsset) -> Result<DynamicImage> {
        let bytes = self
            .store
            .load(&asset.key)
            .map_err(|e| Error::Asset(e.to_string()))?;
        image::load_from_memory(&bytes)
            .map_err(|e| Error::Asset(format!("logo '{}' is unreadable: {}", asset.key, e)))
    }

    /// Delete logos older than the retention window; returns how many went.
    /// Assets that disappear mid-sweep are skipped.
    pub fn sweep(&self, now: SystemTime) -> Result<usize> {
        let mut removed = 0;
        for key in self.store.keys(LOGO_PREFIX)? {
            let modified = match self.store.last_modified(&key) {
                Ok(m) => m,
                Err(_) => continue,
            };
            let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
            if age > self.retention {
                self.store.delete(&key)?;
                debug!("swept logo {} (age {}s)", key, age.as_secs());
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Center the image on a transparent square canvas, bounded to `max_dimension`
pub fn normalize_logo(bytes: &[u8], max_dimension: u32) -> Result<RgbaImage> {
    let logo = image::load_from_memory(bytes)
        .map_err(|e| Error::validation("logo", format!("not a readable image: {}", e)))?
        .to_rgba8();

    let (w, h) = logo.dimensions();
    let side = w.max(h);
    let mut canvas = RgbaImage::new(side, side);
    imageops::overlay(
        &mut canvas,
        &logo,
        ((side - w) / 2) as i64,
        ((side - h) / 2) as i64,
    );

    if side > max_dimension {
        canvas = imageops::resize(&canvas, max_dimension, max_dimension, FilterType::Lanczos3);
    }

    Ok(canvas)
}
