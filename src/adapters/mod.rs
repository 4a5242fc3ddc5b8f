//! Media source interfaces.
//!
//! The library never talks to a photo store directly. Everything it needs
//! (enumeration, image fetches, resource writes, deletion) goes through the
//! [`MediaSource`] trait, so the transport stays an injected collaborator.

pub mod local;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Asset, AssetId, PixelSize, Resource, Thumbnail};
use crate::error::Result;

// Re-export the local directory source
pub use local::LocalDirectoryProvider;

/// Per-resource write progress, called with values in `0.0..=1.0`
pub type ProgressFn<'a> = dyn Fn(f64) + Send + Sync + 'a;

/// Access the media source grants to this process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// The user has not been asked yet
    NotDetermined,

    /// Access is blocked by policy
    Restricted,

    /// The user refused access
    Denied,

    /// Full access
    Authorized,
}

impl AuthorizationStatus {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Self::Authorized)
    }
}

impl std::fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotDetermined => write!(f, "not determined"),
            Self::Restricted => write!(f, "restricted"),
            Self::Denied => write!(f, "denied"),
            Self::Authorized => write!(f, "authorized"),
        }
    }
}

/// Trait for media sources.
///
/// Implementations run their work on whatever executor they like; the
/// library drives every call from spawned tokio tasks and cancels a fetch by
/// dropping its future.
#[async_trait]
pub trait MediaSource: Send + Sync {
    /// Human-readable source name
    fn name(&self) -> &str;

    /// Current authorization status
    async fn authorization_status(&self) -> AuthorizationStatus;

    /// Ask for access; returns the resulting status
    async fn request_authorization(&self) -> AuthorizationStatus;

    /// Enumerate the full current set of assets
    async fn enumerate(&self) -> Result<Vec<Asset>>;

    /// Fetch a preview image of at least `target` size.
    ///
    /// `None` means the source could not produce an image.
    async fn fetch_image(&self, asset: &AssetId, target: PixelSize) -> Option<Thumbnail>;

    /// Write one resource's bytes to `destination`
    async fn write_resource(
        &self,
        resource: &Resource,
        destination: &Path,
        progress: &ProgressFn<'_>,
    ) -> Result<()>;

    /// Create a directory (and missing parents)
    async fn create_directory(&self, path: &Path) -> Result<()>;

    /// Delete assets from the source; `Ok` means deletion was confirmed
    async fn delete_assets(&self, ids: &[AssetId]) -> Result<()>;
}
