//! Media source backed by a local directory tree.
//!
//! Files that share a stem inside one directory form one asset, so
//! `IMG_0001.HEIC` + `IMG_0001.MOV` is a live photo with two resources.
//! Asset ids are derived from the stem path relative to the root, which
//! keeps them stable across refreshes.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, warn};

use super::{AuthorizationStatus, MediaSource, ProgressFn};
use crate::domain::{Asset, AssetId, MediaKind, PixelSize, Resource, Thumbnail};
use crate::error::{LibraryError, Result};

/// Still-image extensions recognised by default
pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "heic", "heif", "gif", "tif", "tiff", "webp", "dng",
];

/// Video extensions recognised by default
pub const VIDEO_EXTENSIONS: &[&str] = &["mov", "mp4", "m4v", "avi"];

const COPY_CHUNK_SIZE: usize = 64 * 1024;

/// Local directory media source
pub struct LocalDirectoryProvider {
    /// Root directory to scan
    root: PathBuf,

    /// Lowercase extensions to include
    extensions: Vec<String>,

    /// Files backing each asset, rebuilt on every enumeration
    index: Mutex<HashMap<AssetId, Vec<PathBuf>>>,
}

impl LocalDirectoryProvider {
    /// Create a provider with the default extension set
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let extensions = IMAGE_EXTENSIONS
            .iter()
            .chain(VIDEO_EXTENSIONS)
            .map(|e| e.to_string())
            .collect();
        Self::with_extensions(root, extensions)
    }

    /// Create a provider that only picks up the given extensions
    pub fn with_extensions(root: impl Into<PathBuf>, extensions: Vec<String>) -> Self {
        Self {
            root: root.into(),
            extensions: extensions.into_iter().map(|e| e.to_lowercase()).collect(),
            index: Mutex::new(HashMap::new()),
        }
    }

    /// Root directory being scanned
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn is_media_file(&self, path: &Path) -> bool {
        extension_of(path)
            .map(|ext| self.extensions.iter().any(|e| *e == ext))
            .unwrap_or(false)
    }

    fn files_for(&self, id: &AssetId) -> Option<Vec<PathBuf>> {
        let index = self.index.lock().unwrap_or_else(|e| e.into_inner());
        index.get(id).cloned()
    }

    /// Walk the tree and group media files by `<relative dir>/<stem>`
    async fn scan(&self) -> std::io::Result<BTreeMap<String, Vec<PathBuf>>> {
        let mut groups: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if dir != self.root => {
                    warn!(dir = %dir.display(), error = %e, "Skipping unreadable directory");
                    continue;
                }
                Err(e) => return Err(e),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = match entry.file_type().await {
                    Ok(t) => t,
                    Err(_) => continue,
                };

                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }

                if !file_type.is_file() || !self.is_media_file(&path) {
                    continue;
                }

                let relative = path.strip_prefix(&self.root).unwrap_or(&path);
                let key = relative
                    .with_extension("")
                    .to_string_lossy()
                    .replace('\\', "/");
                groups.entry(key).or_default().push(path);
            }
        }

        Ok(groups)
    }

    async fn build_asset(&self, key: &str, mut files: Vec<PathBuf>) -> Asset {
        // Still image first so it is the primary resource
        files.sort_by_key(|p| (!is_image(p), p.clone()));

        let has_image = files.iter().any(|p| is_image(p));
        let has_video = files.iter().any(|p| is_video(p));
        let kind = match (has_image, has_video) {
            (true, true) => MediaKind::LivePhoto,
            (true, false) => MediaKind::Image,
            (false, true) => MediaKind::Video,
            (false, false) => MediaKind::Other,
        };

        let mut asset = Asset::new(AssetId::from_key(key), kind);
        let mut oldest: Option<SystemTime> = None;

        for path in &files {
            let filename = path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string();
            let mut resource = Resource::new(filename, path.to_string_lossy());

            match fs::metadata(path).await {
                Ok(metadata) => {
                    resource = resource.with_byte_size(metadata.len());
                    if let Ok(modified) = metadata.modified() {
                        oldest = Some(oldest.map_or(modified, |o| o.min(modified)));
                    }
                }
                Err(e) => warn!(path = %path.display(), error = %e, "Failed to stat media file"),
            }

            asset.resources.push(resource);
        }

        if let Some(time) = oldest {
            asset.created_at = Some(DateTime::<Utc>::from(time));
        }

        asset
    }
}

#[async_trait]
impl MediaSource for LocalDirectoryProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn authorization_status(&self) -> AuthorizationStatus {
        match fs::metadata(&self.root).await {
            Ok(m) if m.is_dir() => AuthorizationStatus::Authorized,
            _ => AuthorizationStatus::Denied,
        }
    }

    async fn request_authorization(&self) -> AuthorizationStatus {
        // Nobody to ask; access is whatever the filesystem allows
        self.authorization_status().await
    }

    async fn enumerate(&self) -> Result<Vec<Asset>> {
        let groups = self
            .scan()
            .await
            .map_err(|e| LibraryError::EnumerationFailed(format!("{}: {}", self.root.display(), e)))?;

        let mut assets = Vec::with_capacity(groups.len());
        let mut index = HashMap::with_capacity(groups.len());

        for (key, files) in groups {
            let asset = self.build_asset(&key, files).await;
            index.insert(
                asset.id.clone(),
                asset.resources.iter().map(|r| PathBuf::from(&r.locator)).collect(),
            );
            assets.push(asset);
        }

        debug!(root = %self.root.display(), count = assets.len(), "Enumerated local assets");
        *self.index.lock().unwrap_or_else(|e| e.into_inner()) = index;

        Ok(assets)
    }

    async fn fetch_image(&self, asset: &AssetId, target: PixelSize) -> Option<Thumbnail> {
        let files = self.files_for(asset)?;
        let still = files.iter().find(|p| is_image(p))?;

        match fs::read(still).await {
            Ok(bytes) => Some(Thumbnail::new(target, bytes)),
            Err(e) => {
                warn!(%asset, path = %still.display(), error = %e, "Failed to read image");
                None
            }
        }
    }

    async fn write_resource(
        &self,
        resource: &Resource,
        destination: &Path,
        progress: &ProgressFn<'_>,
    ) -> Result<()> {
        let fail = |e: std::io::Error| LibraryError::write_failed(destination, e);

        let mut source = File::open(&resource.locator).await.map_err(fail)?;
        let total = source.metadata().await.map_err(fail)?.len();
        let mut target = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(destination)
            .await
            .map_err(fail)?;

        let mut buffer = vec![0u8; COPY_CHUNK_SIZE];
        let mut written = 0u64;

        loop {
            let n = source.read(&mut buffer).await.map_err(fail)?;
            if n == 0 {
                break;
            }
            target.write_all(&buffer[..n]).await.map_err(fail)?;
            written += n as u64;
            if total > 0 {
                progress(written as f64 / total as f64);
            }
        }

        target.flush().await.map_err(fail)?;
        progress(1.0);

        Ok(())
    }

    async fn create_directory(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)
            .await
            .map_err(|e| LibraryError::create_dir_failed(path, e))
    }

    async fn delete_assets(&self, ids: &[AssetId]) -> Result<()> {
        let mut doomed = Vec::with_capacity(ids.len());
        for id in ids {
            let files = self
                .files_for(id)
                .ok_or_else(|| LibraryError::DeleteFailed(format!("unknown asset {}", id)))?;
            doomed.push((id, files));
        }

        for (id, files) in doomed {
            for path in &files {
                match fs::remove_file(path).await {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        debug!(path = %path.display(), "Media file already gone");
                    }
                    Err(e) => {
                        return Err(LibraryError::DeleteFailed(format!(
                            "{}: {}",
                            path.display(),
                            e
                        )))
                    }
                }
            }

            self.index
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(id);
        }

        Ok(())
    }
}

fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

fn is_image(path: &Path) -> bool {
    extension_of(path).is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

fn is_video(path: &Path) -> bool {
    extension_of(path).is_some_and(|e| VIDEO_EXTENSIONS.contains(&e.as_str()))
}
