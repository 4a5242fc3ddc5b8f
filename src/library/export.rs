//! Batched export of asset resources to a destination directory.
//!
//! Every resource of every asset is written concurrently. A single job task
//! owns the bookkeeping: worker tasks report back through a `JoinSet` and
//! only the job task touches the counters, so progress is monotonic even
//! though resources finish in any order.

use std::collections::HashSet;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, instrument, trace, warn};
use uuid::Uuid;

use crate::adapters::MediaSource;
use crate::domain::{Asset, AssetId, Resource};
use crate::error::{LibraryError, Result};

/// Default strftime pattern for timestamp-based export names
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Name stamp used for assets without a creation date
const UNDATED: &str = "undated";

/// Where one asset's resources will be written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetExportPlan {
    /// Asset being exported
    pub asset: AssetId,

    /// Folder to create first (multi-resource assets only)
    pub folder: Option<PathBuf>,

    /// Resource and its destination path
    pub items: Vec<(Resource, PathBuf)>,
}

/// Outcome of an export job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub job_id: Uuid,

    /// Resources attempted
    pub total: usize,

    pub succeeded: usize,

    pub failed: usize,

    /// First error encountered, if any
    pub first_error: Option<LibraryError>,
}

impl ExportReport {
    pub fn is_success(&self) -> bool {
        self.first_error.is_none()
    }
}

/// Running counters for one job
struct ExportJob {
    id: Uuid,
    total: usize,
    remaining: usize,
    succeeded: usize,
    failed: usize,
    first_error: Option<LibraryError>,
}

impl ExportJob {
    fn new(id: Uuid, total: usize) -> Self {
        Self {
            id,
            total,
            remaining: total,
            succeeded: 0,
            failed: 0,
            first_error: None,
        }
    }

    /// Count one finished resource; returns overall progress
    fn record(&mut self, result: Result<()>) -> f64 {
        self.remaining = self.remaining.saturating_sub(1);

        match result {
            Ok(()) => self.succeeded += 1,
            Err(e) => {
                self.failed += 1;
                self.first_error.get_or_insert(e);
            }
        }

        self.progress()
    }

    fn progress(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        (self.total - self.remaining) as f64 / self.total as f64
    }

    fn into_report(self) -> ExportReport {
        ExportReport {
            job_id: self.id,
            total: self.total,
            succeeded: self.succeeded,
            failed: self.failed,
            first_error: self.first_error,
        }
    }
}

/// Message from a worker task back to the job task
enum Step {
    FolderReady(usize),
    FolderFailed(usize, LibraryError),
    Written { path: PathBuf, result: Result<()> },
}

/// Handle to a running export job
pub struct ExportHandle {
    job_id: Uuid,
    task: JoinHandle<ExportReport>,
}

impl ExportHandle {
    /// Identifier of the job
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    /// Wait for the job to finish
    pub async fn wait(self) -> anyhow::Result<ExportReport> {
        Ok(self.task.await?)
    }
}

/// Drives export jobs against a media source
#[derive(Clone)]
pub struct ExportCoordinator {
    source: Arc<dyn MediaSource>,
    timestamp_format: String,
}

impl ExportCoordinator {
    /// Create a coordinator using the default timestamp format
    pub fn new(source: Arc<dyn MediaSource>) -> Self {
        Self::with_timestamp_format(source, DEFAULT_TIMESTAMP_FORMAT)
    }

    /// Create a coordinator with a custom strftime pattern for names
    pub fn with_timestamp_format(source: Arc<dyn MediaSource>, format: impl Into<String>) -> Self {
        Self {
            source,
            timestamp_format: format.into(),
        }
    }

    /// Work out destination paths without touching the source.
    ///
    /// A single-resource asset is written straight into `root` under its
    /// original filename. A multi-resource asset gets its own folder named
    /// `<stamp>_<primary base name>`, and each resource inside is named
    /// `<stamp>_<filename>`.
    pub fn plan(&self, assets: &[Arc<Asset>], root: &Path) -> Vec<AssetExportPlan> {
        let mut seen = HashSet::new();
        let mut claimed = HashSet::new();
        let mut plans = Vec::with_capacity(assets.len());

        for asset in assets {
            if asset.resources.is_empty() || !seen.insert(asset.id.clone()) {
                continue;
            }

            if let [resource] = asset.resources.as_slice() {
                let path = claim_unique(&mut claimed, root.join(&resource.filename), true);
                plans.push(AssetExportPlan {
                    asset: asset.id.clone(),
                    folder: None,
                    items: vec![(resource.clone(), path)],
                });
                continue;
            }

            let stamp = self.stamp(asset.created_at);
            let base = asset
                .primary_resource()
                .map(|r| r.base_name().to_string())
                .unwrap_or_else(|| asset.id.to_string());
            let folder = root.join(format!("{}_{}", stamp, base));
            let folder = claim_unique(&mut claimed, folder, false);
            let items = asset
                .resources
                .iter()
                .map(|r| {
                    let path = folder.join(format!("{}_{}", stamp, r.filename));
                    (r.clone(), claim_unique(&mut claimed, path, true))
                })
                .collect();

            plans.push(AssetExportPlan {
                asset: asset.id.clone(),
                folder: Some(folder),
                items,
            });
        }

        plans
    }

    fn stamp(&self, created_at: Option<DateTime<Utc>>) -> String {
        let Some(created_at) = created_at else {
            return UNDATED.to_string();
        };

        let mut stamp = String::new();
        if write!(stamp, "{}", created_at.format(&self.timestamp_format)).is_err() {
            warn!(format = %self.timestamp_format, "Invalid export timestamp format, using default");
            stamp.clear();
            let _ = write!(stamp, "{}", created_at.format(DEFAULT_TIMESTAMP_FORMAT));
        }
        stamp
    }

    /// Export `assets` under `destination_root`.
    ///
    /// `progress` receives the fraction of resources finished (each resource
    /// counts the same regardless of size), non-decreasing and ending at 1.0.
    /// `completion` runs exactly once after every resource has succeeded or
    /// failed. Failures never stop sibling resources; a folder that cannot be
    /// created only fails that asset's resources.
    pub fn export<P, C>(
        &self,
        assets: Vec<Arc<Asset>>,
        destination_root: impl Into<PathBuf>,
        progress: P,
        completion: C,
    ) -> ExportHandle
    where
        P: Fn(f64) + Send + 'static,
        C: FnOnce(ExportReport) + Send + 'static,
    {
        let job_id = Uuid::new_v4();
        let root = destination_root.into();
        let plans = self.plan(&assets, &root);
        let source = Arc::clone(&self.source);

        let task = tokio::spawn(async move {
            let report = run_job(source, job_id, root, plans, progress).await;
            completion(report.clone());
            report
        });

        ExportHandle { job_id, task }
    }
}

#[instrument(skip_all, fields(job_id = %job_id, root = %root.display()))]
async fn run_job<P>(
    source: Arc<dyn MediaSource>,
    job_id: Uuid,
    root: PathBuf,
    plans: Vec<AssetExportPlan>,
    progress: P,
) -> ExportReport
where
    P: Fn(f64) + Send,
{
    let total = plans.iter().map(|p| p.items.len()).sum();
    let mut job = ExportJob::new(job_id, total);
    info!(assets = plans.len(), resources = total, "Export started");

    if total == 0 {
        progress(1.0);
        return job.into_report();
    }

    let mut tasks = JoinSet::new();

    for (idx, plan) in plans.iter().enumerate() {
        match &plan.folder {
            Some(folder) => {
                let source = Arc::clone(&source);
                let folder = folder.clone();
                tasks.spawn(async move {
                    match source.create_directory(&folder).await {
                        Ok(()) => Step::FolderReady(idx),
                        Err(e) => Step::FolderFailed(idx, e),
                    }
                });
            }
            None => spawn_writes(&mut tasks, &source, &plan.items),
        }
    }

    while let Some(joined) = tasks.join_next().await {
        let step = match joined {
            Ok(step) => step,
            Err(e) => {
                error!(error = %e, "Export worker failed");
                continue;
            }
        };

        match step {
            Step::FolderReady(idx) => {
                debug!(asset = %plans[idx].asset, "Export folder ready");
                spawn_writes(&mut tasks, &source, &plans[idx].items);
            }
            Step::FolderFailed(idx, e) => {
                warn!(asset = %plans[idx].asset, error = %e, "Skipping asset, folder not created");
                for _ in &plans[idx].items {
                    progress(job.record(Err(e.clone())));
                }
            }
            Step::Written { path, result } => {
                if let Err(e) = &result {
                    warn!(path = %path.display(), error = %e, "Resource export failed");
                }
                progress(job.record(result));
            }
        }
    }

    // Workers that died without reporting still count as finished
    if job.remaining > 0 {
        let lost = LibraryError::write_failed(&root, "export worker aborted");
        for _ in 0..job.remaining {
            progress(job.record(Err(lost.clone())));
        }
    }

    let report = job.into_report();
    info!(
        succeeded = report.succeeded,
        failed = report.failed,
        "Export finished"
    );
    report
}

fn spawn_writes(
    tasks: &mut JoinSet<Step>,
    source: &Arc<dyn MediaSource>,
    items: &[(Resource, PathBuf)],
) {
    for (resource, path) in items {
        let source = Arc::clone(source);
        let resource = resource.clone();
        let path = path.clone();

        tasks.spawn(async move {
            let result = source
                .write_resource(&resource, &path, &|fraction: f64| {
                    trace!(path = %path.display(), fraction, "Resource progress")
                })
                .await;
            Step::Written { path, result }
        });
    }
}

/// Reserve `path`, appending `_<n>` to the name (before the extension for
/// files) until it no longer collides with an earlier destination.
fn claim_unique(claimed: &mut HashSet<PathBuf>, path: PathBuf, keep_extension: bool) -> PathBuf {
    if claimed.insert(path.clone()) {
        return path;
    }

    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
    let (stem, extension) = match (keep_extension, path.file_stem(), path.extension()) {
        (true, Some(stem), Some(ext)) => (
            stem.to_string_lossy().into_owned(),
            format!(".{}", ext.to_string_lossy()),
        ),
        _ => (
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            String::new(),
        ),
    };

    let mut n = 1;
    loop {
        let candidate = parent.join(format!("{}_{}{}", stem, n, extension));
        if claimed.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}
