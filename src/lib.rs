//! medialib - Sortable media catalog with cancelable thumbnail fetching
//!
//! Keeps an in-memory catalog of assets pulled from a media source,
//! serves preview images at varying resolutions, and exports full
//! resources in batches.
//!
//! # Architecture
//!
//! Everything hangs off a [`LibraryManager`] that callers construct and
//! share explicitly:
//! - The catalog holds assets in sort order plus a selection vector
//! - Thumbnails are cached per stable asset id; at most one fetch per asset
//!   is in flight and newer requests supersede older ones
//! - Exports write every resource concurrently and report the first error
//!   once all of them have been attempted
//!
//! # Modules
//!
//! - `adapters`: Media source trait and the local directory source
//! - `library`: Catalog, thumbnail and export coordinators, manager
//! - `domain`: Data structures (Asset, Resource, Thumbnail)
//! - `config`: YAML + env configuration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # List assets, largest first
//! medialib list --sort size --order desc
//!
//! # Export two assets
//! medialib export 3f2a9c01d4e5b6a7 77aa01b2c3d4e5f6 --dest ~/Desktop/out
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod library;

// Re-export main types at crate root for convenience
pub use adapters::{AuthorizationStatus, LocalDirectoryProvider, MediaSource};
pub use domain::{Asset, AssetId, MediaKind, PixelSize, Resource, Thumbnail, ThumbnailSink};
pub use error::LibraryError;
pub use library::{
    CatalogSnapshot, EntryState, ExportReport, LibraryManager, RequestOutcome, SortKey, SortOrder,
};
