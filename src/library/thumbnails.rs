//! Resolution-aware thumbnail cache with per-asset request coalescing.
//!
//! Each asset has one cache entry keyed by its stable id. An entry holds the
//! best image seen so far, at most one in-flight fetch, and a weak handle to
//! whichever sink currently wants updates. Starting a fetch always cancels
//! the previous one; every fetch carries a generation number so a result
//! that slips through after cancellation is recognised as stale and dropped.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::task::AbortHandle;
use tracing::{debug, trace};

use crate::adapters::MediaSource;
use crate::domain::{AssetId, PixelSize, Thumbnail, ThumbnailSink};
use crate::error::{LibraryError, Result};

/// Cancellation capability for one in-flight fetch
#[derive(Debug)]
pub struct RequestHandle {
    abort: AbortHandle,
}

impl RequestHandle {
    fn new(abort: AbortHandle) -> Self {
        Self { abort }
    }

    /// Stop the fetch; no result will be delivered for it
    pub fn cancel(&self) {
        self.abort.abort();
    }
}

/// What `request_thumbnail` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A cached image was delivered synchronously
    Cached,

    /// A fetch was started
    Fetching,
}

/// Observable state of a cache entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// No fetch in flight
    Idle { has_image: bool },

    /// A fetch for `size` is in flight
    Fetching { size: PixelSize },
}

#[derive(Debug, Clone)]
struct CachedImage {
    image: Thumbnail,

    /// Target size the image was fetched for
    size: PixelSize,
}

struct InFlight {
    generation: u64,
    size: PixelSize,
    handle: RequestHandle,
}

#[derive(Default)]
struct CacheEntry {
    image: Option<CachedImage>,
    in_flight: Option<InFlight>,
    requested_size: Option<PixelSize>,
    sink: Option<Weak<dyn ThumbnailSink>>,
    generation: u64,
}

impl CacheEntry {
    fn state(&self) -> EntryState {
        match &self.in_flight {
            Some(f) => EntryState::Fetching { size: f.size },
            None => EntryState::Idle {
                has_image: self.image.is_some(),
            },
        }
    }

    fn cancel_in_flight(&mut self) {
        if let Some(flight) = self.in_flight.take() {
            flight.handle.cancel();
        }
    }

    fn current_sink(&self) -> Option<Arc<dyn ThumbnailSink>> {
        self.sink.as_ref().and_then(Weak::upgrade)
    }
}

type EntryMap = HashMap<AssetId, CacheEntry>;

/// Coordinates thumbnail fetches against a media source
#[derive(Clone)]
pub struct ThumbnailRequestCoordinator {
    source: Arc<dyn MediaSource>,
    entries: Arc<Mutex<EntryMap>>,
}

impl ThumbnailRequestCoordinator {
    /// Create a coordinator with no entries
    pub fn new(source: Arc<dyn MediaSource>) -> Self {
        Self {
            source,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, EntryMap> {
        lock_entries(&self.entries)
    }

    /// Align entries with the catalog.
    ///
    /// Entries of assets that are still present keep their cached image;
    /// entries of vanished assets are dropped and their fetch cancelled.
    pub fn sync_entries(&self, ids: &[AssetId]) {
        let mut entries = self.lock();

        entries.retain(|id, entry| {
            let keep = ids.contains(id);
            if !keep {
                entry.cancel_in_flight();
            }
            keep
        });

        for id in ids {
            entries.entry(id.clone()).or_default();
        }

        debug!(entries = entries.len(), "Thumbnail cache synced");
    }

    /// Drop entries for removed assets
    pub fn remove_entries(&self, ids: &[AssetId]) {
        let mut entries = self.lock();
        for id in ids {
            if let Some(mut entry) = entries.remove(id) {
                entry.cancel_in_flight();
            }
        }
    }

    /// Ask for a thumbnail of at least `target` size.
    ///
    /// Returns immediately. A cached image that covers `target` is delivered
    /// to `sink` before this returns; otherwise a fetch is started and the
    /// result goes to whichever sink is registered when it completes.
    /// Must be called from within a tokio runtime.
    pub fn request_thumbnail(
        &self,
        asset: &AssetId,
        target: PixelSize,
        sink: &Arc<dyn ThumbnailSink>,
    ) -> Result<RequestOutcome> {
        let mut entries = self.lock();
        let entry = entries
            .get_mut(asset)
            .ok_or_else(|| LibraryError::AssetNotFound(asset.clone()))?;

        entry.sink = Some(Arc::downgrade(sink));

        if let Some(cached) = entry.image.as_ref().filter(|c| c.size.covers(target)) {
            // A larger fetch already in flight is left to finish
            let image = cached.image.clone();
            drop(entries);

            trace!(%asset, %target, "Serving thumbnail from cache");
            sink.deliver(asset, image);
            return Ok(RequestOutcome::Cached);
        }

        entry.cancel_in_flight();
        entry.generation += 1;
        entry.requested_size = Some(target);

        let generation = entry.generation;
        let source = Arc::clone(&self.source);
        let shared = Arc::clone(&self.entries);
        let id = asset.clone();

        let task = tokio::spawn(async move {
            let image = source.fetch_image(&id, target).await;
            complete_fetch(&shared, &id, generation, target, image);
        });

        entry.in_flight = Some(InFlight {
            generation,
            size: target,
            handle: RequestHandle::new(task.abort_handle()),
        });

        debug!(%asset, %target, generation, "Thumbnail fetch started");
        Ok(RequestOutcome::Fetching)
    }

    /// Cancel any fetch for `asset` and forget its sink
    pub fn cancel(&self, asset: &AssetId) {
        let mut entries = self.lock();
        if let Some(entry) = entries.get_mut(asset) {
            entry.cancel_in_flight();
            entry.sink = None;
        }
    }

    /// Cancel every fetch and forget every sink
    pub fn cancel_all(&self) {
        let mut entries = self.lock();
        let mut cancelled = 0usize;

        for entry in entries.values_mut() {
            if entry.in_flight.is_some() {
                cancelled += 1;
            }
            entry.cancel_in_flight();
            entry.sink = None;
        }

        debug!(cancelled, "Cancelled all thumbnail fetches");
    }

    /// State of an asset's entry, `None` if the asset is unknown
    pub fn entry_state(&self, asset: &AssetId) -> Option<EntryState> {
        self.lock().get(asset).map(CacheEntry::state)
    }

    /// Target size of the most recent fetch started for `asset`
    pub fn requested_size(&self, asset: &AssetId) -> Option<PixelSize> {
        self.lock().get(asset).and_then(|e| e.requested_size)
    }

    /// Whether a live sink is registered for `asset`
    pub fn has_sink(&self, asset: &AssetId) -> bool {
        self.lock()
            .get(asset)
            .is_some_and(|e| e.current_sink().is_some())
    }

    /// Cached image for `asset`, if any
    pub fn cached(&self, asset: &AssetId) -> Option<Thumbnail> {
        self.lock()
            .get(asset)
            .and_then(|e| e.image.as_ref().map(|c| c.image.clone()))
    }

    /// Number of cache entries
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

fn lock_entries(entries: &Mutex<EntryMap>) -> MutexGuard<'_, EntryMap> {
    entries.lock().unwrap_or_else(|e| e.into_inner())
}

/// Apply a finished fetch; runs on the fetching task.
fn complete_fetch(
    entries: &Mutex<EntryMap>,
    asset: &AssetId,
    generation: u64,
    target: PixelSize,
    image: Option<Thumbnail>,
) {
    let (sink, image) = {
        let mut entries = lock_entries(entries);

        let Some(entry) = entries.get_mut(asset) else {
            trace!(%asset, "Discarding thumbnail for asset no longer in catalog");
            return;
        };

        let current = entry
            .in_flight
            .as_ref()
            .is_some_and(|f| f.generation == generation);
        if !current {
            trace!(%asset, generation, "Discarding stale thumbnail");
            return;
        }
        entry.in_flight = None;

        let Some(image) = image else {
            debug!(%asset, %target, "Thumbnail fetch returned no image");
            return;
        };

        // A strictly larger cached image wins and is what the sink gets
        let image = match entry.image.as_ref() {
            Some(cached) if cached.size.covers(target) && cached.size != target => {
                cached.image.clone()
            }
            _ => {
                entry.image = Some(CachedImage {
                    image: image.clone(),
                    size: target,
                });
                image
            }
        };

        (entry.current_sink(), image)
    };

    if let Some(sink) = sink {
        sink.deliver(asset, image);
    }
}
