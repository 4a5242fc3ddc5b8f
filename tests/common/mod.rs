//! Shared test fixtures: a scripted media source and a recording sink.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use medialib::adapters::ProgressFn;
use medialib::error::Result;
use medialib::{
    Asset, AssetId, AuthorizationStatus, LibraryError, MediaSource, PixelSize, Resource,
    Thumbnail, ThumbnailSink,
};

/// A fetch the source is holding until the test answers it
struct PendingFetch {
    asset: AssetId,
    target: PixelSize,
    reply: oneshot::Sender<Option<Thumbnail>>,
}

/// Media source whose every response is controlled by the test
pub struct ScriptedSource {
    assets: Mutex<Vec<Asset>>,
    alternate: Mutex<Option<Vec<Asset>>>,
    enumerations: AtomicUsize,
    status: Mutex<AuthorizationStatus>,
    grant_on_request: AuthorizationStatus,
    authorization_requests: AtomicUsize,
    pending: Mutex<Vec<PendingFetch>>,
    fetches: AtomicUsize,
    failing_files: Mutex<HashSet<String>>,
    failing_folders: Mutex<HashSet<PathBuf>>,
    folders: Mutex<Vec<PathBuf>>,
    written: Mutex<Vec<PathBuf>>,
    deleted: Mutex<Vec<AssetId>>,
    fail_delete: Mutex<bool>,
}

impl ScriptedSource {
    pub fn new(assets: Vec<Asset>) -> Self {
        Self {
            assets: Mutex::new(assets),
            alternate: Mutex::new(None),
            enumerations: AtomicUsize::new(0),
            status: Mutex::new(AuthorizationStatus::Authorized),
            grant_on_request: AuthorizationStatus::Authorized,
            authorization_requests: AtomicUsize::new(0),
            pending: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
            failing_files: Mutex::new(HashSet::new()),
            failing_folders: Mutex::new(HashSet::new()),
            folders: Mutex::new(Vec::new()),
            written: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            fail_delete: Mutex::new(false),
        }
    }

    /// Start in `status`; a request for access yields `granted`
    pub fn with_authorization(
        mut self,
        status: AuthorizationStatus,
        granted: AuthorizationStatus,
    ) -> Self {
        self.status = Mutex::new(status);
        self.grant_on_request = granted;
        self
    }

    pub fn set_assets(&self, assets: Vec<Asset>) {
        *self.assets.lock().unwrap() = assets;
    }

    /// Every other enumeration returns `assets` instead of the main set
    pub fn alternate_with(&self, assets: Vec<Asset>) {
        *self.alternate.lock().unwrap() = Some(assets);
    }

    /// Writes of resources with this filename fail
    pub fn fail_file(&self, filename: &str) {
        self.failing_files
            .lock()
            .unwrap()
            .insert(filename.to_string());
    }

    /// Creating this folder fails
    pub fn fail_folder(&self, path: impl Into<PathBuf>) {
        self.failing_folders.lock().unwrap().insert(path.into());
    }

    pub fn fail_deletes(&self) {
        *self.fail_delete.lock().unwrap() = true;
    }

    pub fn authorization_requests(&self) -> usize {
        self.authorization_requests.load(Ordering::SeqCst)
    }

    /// Number of fetches that actually reached the source
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    /// Targets of fetches still waiting for an answer
    pub fn pending_fetches(&self) -> Vec<(AssetId, PixelSize)> {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .map(|p| (p.asset.clone(), p.target))
            .collect()
    }

    /// Wait until a fetch for `asset` at `target` is parked at the source
    pub async fn wait_for_fetch(&self, asset: &AssetId, target: PixelSize) {
        eventually(|| {
            self.pending
                .lock()
                .unwrap()
                .iter()
                .any(|p| &p.asset == asset && p.target == target)
        })
        .await;
    }

    /// Answer a parked fetch. Returns false if the fetching task is gone.
    pub fn answer_fetch(
        &self,
        asset: &AssetId,
        target: PixelSize,
        image: Option<Thumbnail>,
    ) -> bool {
        let mut pending = self.pending.lock().unwrap();
        let Some(idx) = pending
            .iter()
            .position(|p| &p.asset == asset && p.target == target)
        else {
            return false;
        };
        pending.remove(idx).reply.send(image).is_ok()
    }

    pub fn folders(&self) -> Vec<PathBuf> {
        self.folders.lock().unwrap().clone()
    }

    pub fn written(&self) -> Vec<PathBuf> {
        let mut written = self.written.lock().unwrap().clone();
        written.sort();
        written
    }

    pub fn deleted(&self) -> Vec<AssetId> {
        self.deleted.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaSource for ScriptedSource {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn authorization_status(&self) -> AuthorizationStatus {
        *self.status.lock().unwrap()
    }

    async fn request_authorization(&self) -> AuthorizationStatus {
        self.authorization_requests.fetch_add(1, Ordering::SeqCst);
        let granted = self.grant_on_request;
        *self.status.lock().unwrap() = granted;
        granted
    }

    async fn enumerate(&self) -> Result<Vec<Asset>> {
        let turn = self.enumerations.fetch_add(1, Ordering::SeqCst);
        if turn % 2 == 1 {
            let alternate = self.alternate.lock().unwrap().clone();
            if let Some(alternate) = alternate {
                tokio::task::yield_now().await;
                return Ok(alternate);
            }
        }
        Ok(self.assets.lock().unwrap().clone())
    }

    async fn fetch_image(&self, asset: &AssetId, target: PixelSize) -> Option<Thumbnail> {
        self.fetches.fetch_add(1, Ordering::SeqCst);

        let (reply, answer) = oneshot::channel();
        self.pending.lock().unwrap().push(PendingFetch {
            asset: asset.clone(),
            target,
            reply,
        });

        answer.await.ok().flatten()
    }

    async fn write_resource(
        &self,
        resource: &Resource,
        destination: &Path,
        progress: &ProgressFn<'_>,
    ) -> Result<()> {
        progress(0.0);
        tokio::task::yield_now().await;

        if self.failing_files.lock().unwrap().contains(&resource.filename) {
            return Err(LibraryError::ResourceWriteFailed {
                path: destination.to_path_buf(),
                reason: "scripted failure".to_string(),
            });
        }

        self.written
            .lock()
            .unwrap()
            .push(destination.to_path_buf());
        progress(1.0);
        Ok(())
    }

    async fn create_directory(&self, path: &Path) -> Result<()> {
        if self.failing_folders.lock().unwrap().contains(path) {
            return Err(LibraryError::DirectoryCreateFailed {
                path: path.to_path_buf(),
                reason: "scripted failure".to_string(),
            });
        }

        self.folders.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }

    async fn delete_assets(&self, ids: &[AssetId]) -> Result<()> {
        if *self.fail_delete.lock().unwrap() {
            return Err(LibraryError::DeleteFailed("scripted failure".to_string()));
        }

        self.deleted.lock().unwrap().extend_from_slice(ids);
        self.assets
            .lock()
            .unwrap()
            .retain(|asset| !ids.contains(&asset.id));
        Ok(())
    }
}

/// Sink that records every delivery
#[derive(Default)]
pub struct RecordingSink {
    deliveries: Mutex<Vec<(AssetId, PixelSize)>>,
}

impl RecordingSink {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn deliveries(&self) -> Vec<(AssetId, PixelSize)> {
        self.deliveries.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }
}

impl ThumbnailSink for RecordingSink {
    fn deliver(&self, asset: &AssetId, image: Thumbnail) {
        self.deliveries
            .lock()
            .unwrap()
            .push((asset.clone(), image.size()));
    }
}

/// Coerce a recording sink to the trait object the coordinators take
pub fn as_sink(sink: &Arc<RecordingSink>) -> Arc<dyn ThumbnailSink> {
    Arc::clone(sink) as Arc<dyn ThumbnailSink>
}

pub fn image(width: u32, height: u32) -> Thumbnail {
    Thumbnail::new(PixelSize::new(width, height), vec![0u8; 4])
}

/// Image asset with one resource of `bytes` bytes
pub fn sized_asset(id: &str, bytes: u64) -> Asset {
    Asset::new(id, medialib::MediaKind::Image)
        .with_resource(Resource::new(format!("{}.jpg", id), id).with_byte_size(bytes))
}

/// Poll `condition` until it holds, letting spawned tasks run in between
pub async fn eventually(condition: impl Fn() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached in time");
}

/// Give spawned tasks a chance to run
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
}
