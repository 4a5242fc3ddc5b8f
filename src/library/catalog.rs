//! Ordered, sortable catalog of assets with a positional selection vector.
//!
//! Pure in-memory state: no I/O, no locking. The owner serializes access.

use std::cmp::Ordering;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::{Asset, AssetId};
use crate::error::{LibraryError, Result};

/// Attribute the catalog is sorted by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Largest resource byte size
    Size,

    /// Creation timestamp
    Date,
}

/// Direction of a sort
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// Active ordering of the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortPolicy {
    pub key: SortKey,
    pub order: SortOrder,
}

impl SortPolicy {
    pub const fn new(key: SortKey, order: SortOrder) -> Self {
        Self { key, order }
    }

    /// Total order over assets.
    ///
    /// Missing sizes and dates compare as the largest value, so under a
    /// descending policy unknown items come first. Equal keys fall back to
    /// the asset id, which keeps resorting deterministic.
    pub fn compare(&self, a: &Asset, b: &Asset) -> Ordering {
        let by_key = match self.key {
            SortKey::Size => a.cmp_by_size(b),
            SortKey::Date => a.cmp_by_date(b),
        };
        let by_key = match self.order {
            SortOrder::Ascending => by_key,
            SortOrder::Descending => by_key.reverse(),
        };

        by_key.then_with(|| a.id.cmp(&b.id))
    }
}

impl Default for SortPolicy {
    fn default() -> Self {
        Self::new(SortKey::Size, SortOrder::Descending)
    }
}

/// Catalog of known assets in the current sort order
#[derive(Debug, Clone, Default)]
pub struct AssetCatalog {
    /// Assets in display order
    assets: Vec<Arc<Asset>>,

    /// Selection flag per position; always the same length as `assets`
    selection: Vec<bool>,

    /// Ordering applied on every sort and repopulation
    policy: SortPolicy,
}

impl AssetCatalog {
    /// Create an empty catalog
    pub fn new(policy: SortPolicy) -> Self {
        Self {
            assets: Vec::new(),
            selection: Vec::new(),
            policy,
        }
    }

    /// Swap in a new asset set, sorted by the active policy, nothing selected
    pub fn replace(&mut self, assets: Vec<Asset>) {
        self.assets = assets.into_iter().map(Arc::new).collect();
        self.resort();
    }

    /// Re-order by `key`/`order` and clear the selection
    pub fn sort(&mut self, key: SortKey, order: SortOrder) {
        self.policy = SortPolicy::new(key, order);
        self.resort();
    }

    fn resort(&mut self) {
        let policy = self.policy;
        self.assets.sort_by(|a, b| policy.compare(a, b));
        self.selection = vec![false; self.assets.len()];
    }

    /// Drop the given assets, keeping the selection of the remaining ones.
    ///
    /// Returns the ids that were actually present.
    pub fn remove(&mut self, ids: &[AssetId]) -> Vec<AssetId> {
        let mut removed = Vec::new();
        let mut kept_assets = Vec::with_capacity(self.assets.len());
        let mut kept_selection = Vec::with_capacity(self.selection.len());

        for (asset, selected) in self.assets.drain(..).zip(self.selection.drain(..)) {
            if ids.contains(&asset.id) {
                removed.push(asset.id.clone());
            } else {
                kept_assets.push(asset);
                kept_selection.push(selected);
            }
        }

        self.assets = kept_assets;
        self.selection = kept_selection;
        removed
    }

    /// Current position of an asset
    pub fn position(&self, id: &AssetId) -> Option<usize> {
        self.assets.iter().position(|a| &a.id == id)
    }

    fn position_or_err(&self, id: &AssetId) -> Result<usize> {
        self.position(id)
            .ok_or_else(|| LibraryError::AssetNotFound(id.clone()))
    }

    /// Look up an asset by id
    pub fn get(&self, id: &AssetId) -> Option<&Arc<Asset>> {
        self.assets.iter().find(|a| &a.id == id)
    }

    /// Mark an asset selected
    pub fn select(&mut self, id: &AssetId) -> Result<()> {
        let idx = self.position_or_err(id)?;
        self.selection[idx] = true;
        Ok(())
    }

    /// Clear an asset's selection
    pub fn deselect(&mut self, id: &AssetId) -> Result<()> {
        let idx = self.position_or_err(id)?;
        self.selection[idx] = false;
        Ok(())
    }

    /// Flip an asset's selection; returns the new state
    pub fn toggle(&mut self, id: &AssetId) -> Result<bool> {
        let idx = self.position_or_err(id)?;
        self.selection[idx] = !self.selection[idx];
        Ok(self.selection[idx])
    }

    /// Select every asset between the range anchor and `target`, inclusive.
    ///
    /// The anchor is the first selected position scanning from the start,
    /// not `anchor`; the id is only checked to exist. With nothing selected
    /// the call is a no-op.
    pub fn select_range(&mut self, anchor: &AssetId, target: &AssetId) -> Result<()> {
        self.position_or_err(anchor)?;
        let target_idx = self.position_or_err(target)?;

        let Some(anchor_idx) = self.selection.iter().position(|s| *s) else {
            return Ok(());
        };

        let (start, end) = if anchor_idx <= target_idx {
            (anchor_idx, target_idx)
        } else {
            (target_idx, anchor_idx)
        };
        self.selection[start..=end].fill(true);

        Ok(())
    }

    /// Select or clear every asset
    pub fn select_all(&mut self, selected: bool) {
        self.selection.fill(selected);
    }

    /// Assets in current order
    pub fn assets(&self) -> &[Arc<Asset>] {
        &self.assets
    }

    /// Selection flags by position
    pub fn selection(&self) -> &[bool] {
        &self.selection
    }

    /// Ids of selected assets, in catalog order
    pub fn selected_ids(&self) -> Vec<AssetId> {
        self.assets
            .iter()
            .zip(&self.selection)
            .filter(|(_, selected)| **selected)
            .map(|(asset, _)| asset.id.clone())
            .collect()
    }

    /// Ids of all assets, in catalog order
    pub fn ids(&self) -> Vec<AssetId> {
        self.assets.iter().map(|a| a.id.clone()).collect()
    }

    /// Active sort policy
    pub fn policy(&self) -> SortPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}
