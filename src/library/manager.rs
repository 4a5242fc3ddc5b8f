//! Root of the media library.
//!
//! Owns the catalog, the thumbnail coordinator and the export coordinator,
//! and is the only thing presentation code talks to. There is no global
//! instance: construct one and hand out `Arc<LibraryManager>`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

use super::catalog::{AssetCatalog, SortKey, SortOrder, SortPolicy};
use super::export::{ExportCoordinator, ExportHandle, ExportReport};
use super::thumbnails::{RequestOutcome, ThumbnailRequestCoordinator};
use crate::adapters::{AuthorizationStatus, MediaSource};
use crate::config::ResolvedConfig;
use crate::domain::{Asset, AssetId, PixelSize, ThumbnailSink};
use crate::error::{LibraryError, Result};

/// Read-only view of the catalog handed to presentation code
#[derive(Debug, Clone, Default)]
pub struct CatalogSnapshot {
    /// Assets in display order
    pub assets: Vec<Arc<Asset>>,

    /// Selection flag per position
    pub selection: Vec<bool>,

    /// Ordering in effect
    pub policy: SortPolicy,
}

impl CatalogSnapshot {
    fn of(catalog: &AssetCatalog) -> Self {
        Self {
            assets: catalog.assets().to_vec(),
            selection: catalog.selection().to_vec(),
            policy: catalog.policy(),
        }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// Ids of selected assets, in display order
    pub fn selected_ids(&self) -> Vec<AssetId> {
        self.assets
            .iter()
            .zip(&self.selection)
            .filter(|(_, selected)| **selected)
            .map(|(asset, _)| asset.id.clone())
            .collect()
    }
}

/// Media library manager
pub struct LibraryManager {
    source: Arc<dyn MediaSource>,
    catalog: Mutex<AssetCatalog>,
    thumbnails: ThumbnailRequestCoordinator,
    exporter: ExportCoordinator,
    snapshots: watch::Sender<Arc<CatalogSnapshot>>,
}

impl LibraryManager {
    /// Create a manager with the default sort policy and export naming
    pub fn new(source: Arc<dyn MediaSource>) -> Self {
        Self::with_parts(
            Arc::clone(&source),
            SortPolicy::default(),
            ExportCoordinator::new(source),
        )
    }

    /// Create a manager using the resolved configuration
    pub fn from_config(source: Arc<dyn MediaSource>, config: &ResolvedConfig) -> Self {
        let exporter =
            ExportCoordinator::with_timestamp_format(Arc::clone(&source), &config.timestamp_format);
        Self::with_parts(source, config.sort, exporter)
    }

    fn with_parts(
        source: Arc<dyn MediaSource>,
        policy: SortPolicy,
        exporter: ExportCoordinator,
    ) -> Self {
        let catalog = AssetCatalog::new(policy);
        let (snapshots, _) = watch::channel(Arc::new(CatalogSnapshot::of(&catalog)));

        Self {
            thumbnails: ThumbnailRequestCoordinator::new(Arc::clone(&source)),
            source,
            catalog: Mutex::new(catalog),
            exporter,
            snapshots,
        }
    }

    fn lock_catalog(&self) -> MutexGuard<'_, AssetCatalog> {
        self.catalog.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Apply a catalog mutation and publish the new snapshot if it succeeded
    fn update<T>(&self, f: impl FnOnce(&mut AssetCatalog) -> Result<T>) -> Result<T> {
        let (value, snapshot) = {
            let mut catalog = self.lock_catalog();
            let value = f(&mut catalog).map_err(|e| {
                debug!(error = %e, "Catalog unchanged");
                e
            })?;
            (value, CatalogSnapshot::of(&catalog))
        };

        self.snapshots.send_replace(Arc::new(snapshot));
        Ok(value)
    }

    /// Make sure the source grants access, asking once if undecided
    async fn ensure_authorized(&self) -> Result<()> {
        let mut status = self.source.authorization_status().await;

        if status == AuthorizationStatus::NotDetermined {
            debug!("Requesting media source authorization");
            status = self.source.request_authorization().await;
        }

        if !status.is_authorized() {
            warn!(%status, "Media source access not granted");
            return Err(LibraryError::ProviderUnavailable(format!(
                "{} access {}",
                self.source.name(),
                status
            )));
        }

        Ok(())
    }

    /// Re-enumerate the source and repopulate the catalog.
    ///
    /// Cached thumbnails survive for assets that are still present.
    /// Returns the number of assets now in the catalog.
    #[instrument(skip(self), fields(source = %self.source.name()))]
    pub async fn refresh(&self) -> Result<usize> {
        self.ensure_authorized().await?;

        let assets = self.source.enumerate().await?;
        // Entries follow the catalog under its lock so a concurrent refresh
        // cannot interleave between the two.
        let ids = self.update(|catalog| {
            catalog.replace(assets);
            let ids = catalog.ids();
            self.thumbnails.sync_entries(&ids);
            Ok(ids)
        })?;

        info!(count = ids.len(), "Catalog refreshed");
        Ok(ids.len())
    }

    /// Delete assets from the source, then from the catalog.
    ///
    /// Ids not in the catalog are ignored. Nothing is removed locally unless
    /// the source confirms the deletion. Returns how many assets were removed.
    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    pub async fn delete(&self, ids: &[AssetId]) -> Result<usize> {
        let known: Vec<AssetId> = {
            let catalog = self.lock_catalog();
            ids.iter()
                .filter(|id| catalog.position(id).is_some())
                .cloned()
                .collect()
        };

        if known.is_empty() {
            debug!("Nothing to delete");
            return Ok(0);
        }

        self.source.delete_assets(&known).await?;

        let removed = self.update(|catalog| {
            let removed = catalog.remove(&known);
            self.thumbnails.remove_entries(&removed);
            Ok(removed)
        })?;

        info!(removed = removed.len(), "Assets deleted");
        Ok(removed.len())
    }

    /// Re-order the catalog; clears the selection
    pub fn sort(&self, key: SortKey, order: SortOrder) {
        let _ = self.update(|catalog| {
            catalog.sort(key, order);
            Ok(())
        });
    }

    pub fn select(&self, id: &AssetId) -> Result<()> {
        self.update(|catalog| catalog.select(id))
    }

    pub fn deselect(&self, id: &AssetId) -> Result<()> {
        self.update(|catalog| catalog.deselect(id))
    }

    /// Flip an asset's selection; returns the new state
    pub fn toggle(&self, id: &AssetId) -> Result<bool> {
        self.update(|catalog| catalog.toggle(id))
    }

    /// Range-select up to `target`; see [`AssetCatalog::select_range`]
    pub fn select_range(&self, anchor: &AssetId, target: &AssetId) -> Result<()> {
        self.update(|catalog| catalog.select_range(anchor, target))
    }

    pub fn select_all(&self, selected: bool) {
        let _ = self.update(|catalog| {
            catalog.select_all(selected);
            Ok(())
        });
    }

    /// Current catalog state
    pub fn snapshot(&self) -> Arc<CatalogSnapshot> {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified after every catalog change
    pub fn subscribe(&self) -> watch::Receiver<Arc<CatalogSnapshot>> {
        self.snapshots.subscribe()
    }

    /// Ids of selected assets, in display order
    pub fn selected_ids(&self) -> Vec<AssetId> {
        self.lock_catalog().selected_ids()
    }

    /// Look up an asset by id
    pub fn asset(&self, id: &AssetId) -> Option<Arc<Asset>> {
        self.lock_catalog().get(id).cloned()
    }

    /// See [`ThumbnailRequestCoordinator::request_thumbnail`]
    pub fn request_thumbnail(
        &self,
        id: &AssetId,
        target: PixelSize,
        sink: &Arc<dyn ThumbnailSink>,
    ) -> Result<RequestOutcome> {
        self.thumbnails.request_thumbnail(id, target, sink)
    }

    /// Stop caring about an asset's thumbnail
    pub fn cancel_thumbnail(&self, id: &AssetId) {
        self.thumbnails.cancel(id);
    }

    /// Cancel every thumbnail fetch
    pub fn cancel_all_thumbnails(&self) {
        self.thumbnails.cancel_all();
    }

    /// Thumbnail coordinator, for inspecting cache state
    pub fn thumbnails(&self) -> &ThumbnailRequestCoordinator {
        &self.thumbnails
    }

    /// Export the given assets; ids not in the catalog are skipped.
    ///
    /// See [`ExportCoordinator::export`] for the progress and completion
    /// contract.
    pub fn export<P, C>(
        &self,
        ids: &[AssetId],
        destination_root: impl Into<PathBuf>,
        progress: P,
        completion: C,
    ) -> ExportHandle
    where
        P: Fn(f64) + Send + 'static,
        C: FnOnce(ExportReport) + Send + 'static,
    {
        let assets: Vec<Arc<Asset>> = {
            let catalog = self.lock_catalog();
            ids.iter()
                .filter_map(|id| {
                    let asset = catalog.get(id).cloned();
                    if asset.is_none() {
                        debug!(%id, "Skipping unknown asset in export");
                    }
                    asset
                })
                .collect()
        };

        self.exporter
            .export(assets, destination_root, progress, completion)
    }

    /// Export whatever is currently selected
    pub fn export_selected<P, C>(
        &self,
        destination_root: impl Into<PathBuf>,
        progress: P,
        completion: C,
    ) -> ExportHandle
    where
        P: Fn(f64) + Send + 'static,
        C: FnOnce(ExportReport) + Send + 'static,
    {
        let ids = self.selected_ids();
        self.export(&ids, destination_root, progress, completion)
    }
}
