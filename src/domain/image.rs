//! Opaque image handles and the sinks that receive them.

use std::sync::Arc;

use super::asset::{AssetId, PixelSize};

/// Image returned by the media source.
///
/// The library never decodes the payload; it only inspects the size the
/// image was produced at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    size: PixelSize,
    data: Arc<[u8]>,
}

impl Thumbnail {
    /// Wrap an encoded image payload
    pub fn new(size: PixelSize, data: impl Into<Arc<[u8]>>) -> Self {
        Self {
            size,
            data: data.into(),
        }
    }

    /// Size the image was produced at
    pub fn size(&self) -> PixelSize {
        self.size
    }

    /// Raw payload bytes
    pub fn data(&self) -> &[u8] {
        &self.data
    }
}

/// Presentation-side receiver for thumbnail updates.
///
/// Registered per asset. The coordinator only keeps a weak reference, so
/// dropping the sink is enough to stop deliveries.
pub trait ThumbnailSink: Send + Sync {
    /// Called with every image delivered for `asset`
    fn deliver(&self, asset: &AssetId, image: Thumbnail);
}

impl<F> ThumbnailSink for F
where
    F: Fn(&AssetId, Thumbnail) + Send + Sync,
{
    fn deliver(&self, asset: &AssetId, image: Thumbnail) {
        self(asset, image)
    }
}
