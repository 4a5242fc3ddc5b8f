//! Domain types for the media library.
//!
//! This module contains the core data structures:
//! - Asset: Logical media items and their resources
//! - Thumbnail: Opaque image handles and delivery sinks

pub mod asset;
pub mod image;

// Re-export commonly used types
pub use asset::{Asset, AssetId, MediaKind, PixelSize, Resource};
pub use image::{Thumbnail, ThumbnailSink};
