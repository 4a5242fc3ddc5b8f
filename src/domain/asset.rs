//! Assets and the resources they are made of.
//!
//! An asset is immutable once fetched from the media source. The only
//! change the library ever makes is removing it from the catalog.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Stable asset identifier.
///
/// Opaque to the library. It stays valid across resorts and refreshes
/// within a session, so every per-asset structure is keyed by it rather
/// than by catalog position.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssetId(String);

impl AssetId {
    /// Wrap a provider-issued identifier
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derive an identifier from a provider-local key (SHA256(key)[0:16])
    pub fn from_key(key: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        let result = hasher.finalize();

        Self(hex::encode(&result[..8]))
    }

    /// Get the raw string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AssetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AssetId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Pixel dimensions of an image or a requested thumbnail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

impl PixelSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// True if this size is at least `other` in both dimensions
    pub fn covers(&self, other: PixelSize) -> bool {
        self.width >= other.width && self.height >= other.height
    }
}

impl std::fmt::Display for PixelSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Kind of media an asset represents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Single still image
    Image,

    /// Still image paired with a motion clip
    LivePhoto,

    /// Video
    Video,

    /// Anything else the source reports
    Other,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::LivePhoto => write!(f, "live"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Other => write!(f, "other"),
        }
    }
}

/// One physical file belonging to an asset
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Original filename as reported by the source
    pub filename: String,

    /// Size in bytes, if the source knows it
    pub byte_size: Option<u64>,

    /// Pixel dimensions, if the source knows them
    pub pixel_size: Option<PixelSize>,

    /// Provider-specific reference used to read the resource back
    pub locator: String,
}

impl Resource {
    /// Create a resource with unknown size and dimensions
    pub fn new(filename: impl Into<String>, locator: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            byte_size: None,
            pixel_size: None,
            locator: locator.into(),
        }
    }

    /// Set the byte size
    pub fn with_byte_size(mut self, byte_size: u64) -> Self {
        self.byte_size = Some(byte_size);
        self
    }

    /// Set the pixel dimensions
    pub fn with_pixel_size(mut self, pixel_size: PixelSize) -> Self {
        self.pixel_size = Some(pixel_size);
        self
    }

    /// Filename without its extension
    pub fn base_name(&self) -> &str {
        match self.filename.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.filename,
        }
    }
}

/// A single logical media item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// Stable identifier
    pub id: AssetId,

    /// Kind of media
    pub kind: MediaKind,

    /// When the asset was created, if known
    pub created_at: Option<DateTime<Utc>>,

    /// Resources in source order; the first one is the primary resource
    pub resources: Vec<Resource>,
}

impl Asset {
    /// Create an asset with no resources
    pub fn new(id: impl Into<AssetId>, kind: MediaKind) -> Self {
        Self {
            id: id.into(),
            kind,
            created_at: None,
            resources: Vec::new(),
        }
    }

    /// Set the creation timestamp
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Add a resource
    pub fn with_resource(mut self, resource: Resource) -> Self {
        self.resources.push(resource);
        self
    }

    /// The primary resource (first reported by the source)
    pub fn primary_resource(&self) -> Option<&Resource> {
        self.resources.first()
    }

    /// Largest known resource size, `None` if no resource reports one
    pub fn max_byte_size(&self) -> Option<u64> {
        self.resources.iter().filter_map(|r| r.byte_size).max()
    }

    /// Compare by size; a missing size is larger than any known size
    pub fn cmp_by_size(&self, other: &Asset) -> Ordering {
        missing_is_largest(self.max_byte_size(), other.max_byte_size())
    }

    /// Compare by creation date; a missing date is later than any known date
    pub fn cmp_by_date(&self, other: &Asset) -> Ordering {
        missing_is_largest(self.created_at, other.created_at)
    }
}

fn missing_is_largest<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_asset_id_from_key_is_stable() {
        let a = AssetId::from_key("2021/IMG_0001");
        let b = AssetId::from_key("2021/IMG_0001");
        let c = AssetId::from_key("2021/IMG_0002");

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.as_str().len(), 16);
    }

    #[test]
    fn test_max_byte_size_ignores_unknown() {
        let asset = Asset::new("a", MediaKind::LivePhoto)
            .with_resource(Resource::new("IMG_1.HEIC", "x").with_byte_size(10))
            .with_resource(Resource::new("IMG_1.MOV", "y"));

        assert_eq!(asset.max_byte_size(), Some(10));
        assert_eq!(Asset::new("b", MediaKind::Image).max_byte_size(), None);
    }

    #[test]
    fn test_missing_size_sorts_as_largest() {
        let known = Asset::new("a", MediaKind::Image)
            .with_resource(Resource::new("a.jpg", "a").with_byte_size(u64::MAX));
        let unknown = Asset::new("b", MediaKind::Image).with_resource(Resource::new("b.jpg", "b"));

        assert_eq!(unknown.cmp_by_size(&known), Ordering::Greater);
        assert_eq!(known.cmp_by_size(&unknown), Ordering::Less);
    }

    #[test]
    fn test_base_name() {
        assert_eq!(Resource::new("IMG_1.HEIC", "").base_name(), "IMG_1");
        assert_eq!(Resource::new("archive.tar.gz", "").base_name(), "archive.tar");
        assert_eq!(Resource::new("README", "").base_name(), "README");
        assert_eq!(Resource::new(".hidden", "").base_name(), ".hidden");
    }

    #[test]
    fn test_pixel_size_covers() {
        let size = PixelSize::new(200, 100);
        assert!(size.covers(PixelSize::new(200, 100)));
        assert!(size.covers(PixelSize::new(50, 50)));
        assert!(!size.covers(PixelSize::new(201, 10)));
        assert!(!size.covers(PixelSize::new(10, 101)));
    }
}
