//! Command-line interface for medialib.
//!
//! Drives a [`LibraryManager`] over a local directory: list the catalog,
//! export assets, delete assets, and pull a single preview image.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;
use tracing::debug;

use crate::adapters::LocalDirectoryProvider;
use crate::config::{load_config, ResolvedConfig};
use crate::domain::{Asset, AssetId, PixelSize, Thumbnail, ThumbnailSink};
use crate::library::{LibraryManager, SortKey, SortOrder};

/// How long `thumbnail` waits for the source before giving up
const THUMBNAIL_WAIT: Duration = Duration::from_secs(30);

/// medialib - Sortable media catalog and exporter
#[derive(Parser, Debug)]
#[command(name = "medialib")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Media directory (overrides config and MEDIALIB_SOURCE)
    #[arg(short, long, global = true)]
    pub source: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List assets in the catalog
    List {
        /// Attribute to sort by
        #[arg(long, value_enum)]
        sort: Option<SortArg>,

        /// Sort direction
        #[arg(long, value_enum)]
        order: Option<OrderArg>,

        /// Maximum number of assets to show
        #[arg(short, long)]
        limit: Option<usize>,

        /// Print assets as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export assets to a directory
    Export {
        /// Asset IDs to export
        ids: Vec<String>,

        /// Destination directory (defaults to configured export dir)
        #[arg(short, long)]
        dest: Option<PathBuf>,

        /// Export every asset in the catalog
        #[arg(long, conflicts_with = "ids")]
        all: bool,
    },

    /// Delete assets from the media directory
    Delete {
        /// Asset IDs to delete
        #[arg(required = true)]
        ids: Vec<String>,

        /// Confirm deletion
        #[arg(long)]
        yes: bool,
    },

    /// Fetch a preview image and write it to a file
    Thumbnail {
        /// Asset ID
        id: String,

        /// Output file
        #[arg(short, long)]
        out: PathBuf,

        /// Target width (defaults to configured thumbnail size)
        #[arg(long)]
        width: Option<u32>,

        /// Target height (defaults to configured thumbnail size)
        #[arg(long)]
        height: Option<u32>,
    },

    /// Show resolved configuration
    Config,
}

/// Sort key for CLI (maps to SortKey)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum SortArg {
    /// Largest resource size
    Size,

    /// Creation date
    Date,
}

impl From<SortArg> for SortKey {
    fn from(s: SortArg) -> Self {
        match s {
            SortArg::Size => SortKey::Size,
            SortArg::Date => SortKey::Date,
        }
    }
}

/// Sort direction for CLI (maps to SortOrder)
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OrderArg {
    Asc,
    Desc,
}

impl From<OrderArg> for SortOrder {
    fn from(o: OrderArg) -> Self {
        match o {
            OrderArg::Asc => SortOrder::Ascending,
            OrderArg::Desc => SortOrder::Descending,
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let mut config = load_config()?;
        if let Some(source) = self.source {
            config.source_root = source;
        }

        match self.command {
            Commands::List {
                sort,
                order,
                limit,
                json,
            } => list_assets(&config, sort, order, limit, json).await,
            Commands::Export { ids, dest, all } => export_assets(&config, ids, dest, all).await,
            Commands::Delete { ids, yes } => delete_assets(&config, ids, yes).await,
            Commands::Thumbnail {
                id,
                out,
                width,
                height,
            } => write_thumbnail(&config, &id, out, width, height).await,
            Commands::Config => show_config(&config),
        }
    }
}

/// Build a manager over the configured directory and load the catalog
async fn open_library(config: &ResolvedConfig) -> Result<Arc<LibraryManager>> {
    let provider = match &config.extensions {
        Some(extensions) => {
            LocalDirectoryProvider::with_extensions(&config.source_root, extensions.clone())
        }
        None => LocalDirectoryProvider::new(&config.source_root),
    };

    let manager = Arc::new(LibraryManager::from_config(Arc::new(provider), config));
    manager
        .refresh()
        .await
        .with_context(|| format!("Failed to load media from {}", config.source_root.display()))?;

    Ok(manager)
}

async fn list_assets(
    config: &ResolvedConfig,
    sort: Option<SortArg>,
    order: Option<OrderArg>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let manager = open_library(config).await?;

    if sort.is_some() || order.is_some() {
        let key = sort.map(SortKey::from).unwrap_or(config.sort.key);
        let order = order.map(SortOrder::from).unwrap_or(config.sort.order);
        manager.sort(key, order);
    }

    let snapshot = manager.snapshot();
    let shown = limit.unwrap_or(snapshot.len());

    if json {
        let assets: Vec<&Asset> = snapshot.assets.iter().take(shown).map(|a| a.as_ref()).collect();
        let output = serde_json::to_string_pretty(&assets).context("Failed to serialize assets")?;
        println!("{}", output);
        return Ok(());
    }

    if snapshot.is_empty() {
        println!("No media found in {}", config.source_root.display());
        return Ok(());
    }

    println!(
        "{:<18} {:<6} {:>10} {:<20} {}",
        "ID", "KIND", "SIZE", "CREATED", "FILES"
    );
    println!("{}", "-".repeat(90));

    for asset in snapshot.assets.iter().take(shown) {
        let size = asset
            .max_byte_size()
            .map(format_bytes)
            .unwrap_or_else(|| "?".to_string());
        let created = asset
            .created_at
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| "-".to_string());
        let files: Vec<&str> = asset.resources.iter().map(|r| r.filename.as_str()).collect();

        println!(
            "{:<18} {:<6} {:>10} {:<20} {}",
            asset.id,
            asset.kind.to_string(),
            size,
            created,
            files.join(", ")
        );
    }

    println!("\nTotal: {} assets", snapshot.len());
    Ok(())
}

async fn export_assets(
    config: &ResolvedConfig,
    ids: Vec<String>,
    dest: Option<PathBuf>,
    all: bool,
) -> Result<()> {
    if ids.is_empty() && !all {
        bail!("Nothing to export: pass asset IDs or --all");
    }

    let manager = open_library(config).await?;
    let destination = dest.unwrap_or_else(|| config.export_dir.clone());

    let ids: Vec<AssetId> = if all {
        manager.snapshot().assets.iter().map(|a| a.id.clone()).collect()
    } else {
        ids.into_iter().map(AssetId::from).collect()
    };

    for id in &ids {
        if manager.asset(id).is_none() {
            eprintln!("Skipping unknown asset: {}", id);
        }
    }

    eprintln!("Exporting {} asset(s) to {}", ids.len(), destination.display());

    let handle = manager.export(
        &ids,
        destination,
        |fraction| {
            eprint!("\r  {:>3}%", (fraction * 100.0).round() as u32);
            let _ = std::io::stderr().flush();
        },
        |report| debug!(job_id = %report.job_id, "Export completion delivered"),
    );
    let report = handle.wait().await?;
    eprintln!();

    eprintln!(
        "Exported {}/{} resources ({} failed)",
        report.succeeded, report.total, report.failed
    );

    if let Some(error) = report.first_error {
        bail!("Export finished with errors, first: {}", error);
    }

    Ok(())
}

async fn delete_assets(config: &ResolvedConfig, ids: Vec<String>, yes: bool) -> Result<()> {
    if !yes {
        bail!("Refusing to delete without --yes");
    }

    let manager = open_library(config).await?;
    let ids: Vec<AssetId> = ids.into_iter().map(AssetId::from).collect();

    let removed = manager.delete(&ids).await?;
    println!("Deleted {} asset(s)", removed);

    if removed < ids.len() {
        eprintln!("{} ID(s) were not in the catalog", ids.len() - removed);
    }

    Ok(())
}

async fn write_thumbnail(
    config: &ResolvedConfig,
    id: &str,
    out: PathBuf,
    width: Option<u32>,
    height: Option<u32>,
) -> Result<()> {
    let manager = open_library(config).await?;
    let id = AssetId::from(id);
    let target = PixelSize::new(
        width.unwrap_or(config.thumbnail_size.width),
        height.unwrap_or(config.thumbnail_size.height),
    );

    let (tx, mut rx) = mpsc::unbounded_channel::<Thumbnail>();
    let sink: Arc<dyn ThumbnailSink> = Arc::new(move |_: &AssetId, image: Thumbnail| {
        let _ = tx.send(image);
    });

    manager
        .request_thumbnail(&id, target, &sink)
        .with_context(|| format!("Unknown asset: {}", id))?;

    let image = match tokio::time::timeout(THUMBNAIL_WAIT, rx.recv()).await {
        Ok(Some(image)) => image,
        Ok(None) => bail!("No image delivered for {}", id),
        Err(_) => {
            manager.cancel_thumbnail(&id);
            bail!("Timed out waiting for a preview of {}", id);
        }
    };

    // A failed fetch never delivers; the wait above times out instead
    tokio::fs::write(&out, image.data())
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;

    println!("Wrote {} ({}) to {}", id, image.size(), out.display());
    Ok(())
}

fn show_config(config: &ResolvedConfig) -> Result<()> {
    let yaml = serde_yaml::to_string(config).context("Failed to render configuration")?;

    println!("Configuration");
    println!(
        "  Config file: {}",
        config
            .config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none)".to_string())
    );
    println!();
    print!("{}", yaml);
    Ok(())
}

/// Format a byte count for display (e.g. "3.2 MB")
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}
