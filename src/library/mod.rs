//! Media library core.
//!
//! - `catalog`: ordered asset list with positional selection
//! - `thumbnails`: resolution-aware thumbnail cache and fetch coalescing
//! - `export`: concurrent multi-resource export with aggregated progress
//! - `manager`: the root object presentation code holds on to

pub mod catalog;
pub mod export;
pub mod manager;
pub mod thumbnails;

pub use catalog::{AssetCatalog, SortKey, SortOrder, SortPolicy};
pub use export::{AssetExportPlan, ExportCoordinator, ExportHandle, ExportReport};
pub use manager::{CatalogSnapshot, LibraryManager};
pub use thumbnails::{EntryState, RequestHandle, RequestOutcome, ThumbnailRequestCoordinator};
