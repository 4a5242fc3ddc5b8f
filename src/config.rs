//! Configuration for medialib.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (MEDIALIB_SOURCE, MEDIALIB_EXPORT_DIR)
//! 2. Config file (.medialib/config.yaml)
//! 3. Defaults (~/Pictures as source, ~/Downloads as export destination)
//!
//! Config file discovery:
//! - Searches current directory and parents for .medialib/config.yaml
//! - Paths in config file are relative to the project root (the parent of .medialib/)
//!
//! There is no process-wide cached config; callers load a [`ResolvedConfig`]
//! once and pass it to whatever needs it.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::format::{Item, StrftimeItems};
use serde::{Deserialize, Serialize};

use crate::domain::PixelSize;
use crate::library::export::DEFAULT_TIMESTAMP_FORMAT;
use crate::library::{SortKey, SortOrder, SortPolicy};

/// Env var overriding the source root
pub const ENV_SOURCE: &str = "MEDIALIB_SOURCE";

/// Env var overriding the export destination
pub const ENV_EXPORT_DIR: &str = "MEDIALIB_EXPORT_DIR";

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub thumbnails: ThumbnailConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceConfig {
    /// Directory scanned by the local provider
    pub root: Option<String>,
    /// File extensions to include (defaults to common image/video types)
    pub extensions: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CatalogConfig {
    pub sort: Option<SortKey>,
    pub order: Option<SortOrder>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThumbnailConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExportConfig {
    /// Default export destination
    pub destination: Option<String>,
    /// strftime pattern used in export folder and file names
    pub timestamp_format: Option<String>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedConfig {
    /// Directory the local provider scans
    pub source_root: PathBuf,
    /// Extensions override for the local provider
    pub extensions: Option<Vec<String>>,
    /// Initial catalog ordering
    pub sort: SortPolicy,
    /// Default thumbnail size
    pub thumbnail_size: PixelSize,
    /// Default export destination
    pub export_dir: PathBuf,
    /// strftime pattern for export names
    pub timestamp_format: String,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

const DEFAULT_THUMBNAIL_EDGE: u32 = 256;

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".medialib").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

/// Reject strftime patterns chrono cannot render
fn validate_timestamp_format(format: &str) -> Result<()> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        bail!("Invalid export timestamp format: {:?}", format);
    }
    if format.contains('/') {
        bail!("Export timestamp format must not contain '/': {:?}", format);
    }
    Ok(())
}

fn default_source_root() -> Result<PathBuf> {
    if let Some(dir) = dirs::picture_dir() {
        return Ok(dir);
    }
    Ok(dirs::home_dir()
        .context("Failed to determine home directory")?
        .join("Pictures"))
}

fn default_export_dir() -> Result<PathBuf> {
    if let Some(dir) = dirs::download_dir() {
        return Ok(dir);
    }
    Ok(dirs::home_dir()
        .context("Failed to determine home directory")?
        .join("Downloads"))
}

/// Merge a parsed config file, env lookups and defaults
fn resolve(
    file: ConfigFile,
    config_path: Option<PathBuf>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<ResolvedConfig> {
    // Base directory is the parent of .medialib/ (i.e., grandparent of config.yaml)
    let base_dir = config_path
        .as_deref()
        .and_then(|p| p.parent())
        .and_then(|p| p.parent())
        .unwrap_or(Path::new("."))
        .to_path_buf();

    let source_root = match (env(ENV_SOURCE), &file.source.root) {
        (Some(env_root), _) => PathBuf::from(env_root),
        (None, Some(root)) => resolve_path(&base_dir, root),
        (None, None) => default_source_root()?,
    };

    let export_dir = match (env(ENV_EXPORT_DIR), &file.export.destination) {
        (Some(env_dir), _) => PathBuf::from(env_dir),
        (None, Some(dir)) => resolve_path(&base_dir, dir),
        (None, None) => default_export_dir()?,
    };

    let timestamp_format = file
        .export
        .timestamp_format
        .unwrap_or_else(|| DEFAULT_TIMESTAMP_FORMAT.to_string());
    validate_timestamp_format(&timestamp_format)?;

    let defaults = SortPolicy::default();
    let sort = SortPolicy::new(
        file.catalog.sort.unwrap_or(defaults.key),
        file.catalog.order.unwrap_or(defaults.order),
    );

    let thumbnail_size = PixelSize::new(
        file.thumbnails.width.unwrap_or(DEFAULT_THUMBNAIL_EDGE),
        file.thumbnails.height.unwrap_or(DEFAULT_THUMBNAIL_EDGE),
    );

    Ok(ResolvedConfig {
        source_root,
        extensions: file.source.extensions,
        sort,
        thumbnail_size,
        export_dir,
        timestamp_format,
        config_file: config_path,
    })
}

/// Load configuration from all sources
pub fn load_config() -> Result<ResolvedConfig> {
    let config_path = find_config_file();
    load_config_from(config_path.as_deref())
}

/// Load configuration from an explicit config file (or none)
pub fn load_config_from(config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let file = match config_path {
        Some(path) => load_config_file(path)?,
        None => ConfigFile::default(),
    };

    resolve(file, config_path.map(Path::to_path_buf), |key| {
        std::env::var(key).ok()
    })
}
