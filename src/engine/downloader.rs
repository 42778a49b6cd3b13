// Bounded worker pool: downloads a prepared task list, stops a batch on the first missing asset.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::manifest::ManifestWriter;
use super::stats::ProgressCounter;
use crate::error::{HarvestError, HarvestResult};
use crate::source::fetcher::ResilientFetcher;

/// One file to fetch. Consumed exactly once by [`Downloader::run`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub url: String,
    pub dest: PathBuf,
    /// Written to the manifest after a successful download.
    pub transcript: Option<String>,
    /// Human-readable description for logs.
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    Completed { downloaded: usize },
    /// A task found its asset missing; tasks not yet started were dropped.
    Stopped { downloaded: usize, missing_url: String },
}

impl BatchOutcome {
    pub fn downloaded(&self) -> usize {
        match self {
            BatchOutcome::Completed { downloaded } | BatchOutcome::Stopped { downloaded, .. } => {
                *downloaded
            }
        }
    }
}

enum TaskResult {
    Done,
    Skipped,
    Failed(HarvestError),
}

pub struct Downloader {
    fetcher: Arc<ResilientFetcher>,
    manifest: Option<Arc<ManifestWriter>>,
    progress: Arc<ProgressCounter>,
    request_delay: Duration,
    shutdown_token: CancellationToken,
}

impl Downloader {
    pub fn new(
        fetcher: Arc<ResilientFetcher>,
        manifest: Option<Arc<ManifestWriter>>,
        progress: Arc<ProgressCounter>,
        request_delay: Duration,
    ) -> Self {
        Self {
            fetcher,
            manifest,
            progress,
            request_delay,
            shutdown_token: CancellationToken::new(),
        }
    }

    /// Abort in-flight fetches and reject further work when `token` fires.
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown_token = token;
        self
    }

    pub fn progress(&self) -> &Arc<ProgressCounter> {
        &self.progress
    }

    /// Run `tasks` on at most `worker_count` concurrent workers.
    ///
    /// On the first missing asset, tasks still waiting for a worker are
    /// dropped, tasks already running are allowed to finish, and the batch
    /// returns `Stopped`. A disk failure or an exhausted fetch is returned as
    /// `Err` after the same drain.
    pub async fn run(&self, tasks: Vec<DownloadTask>, worker_count: usize) -> HarvestResult<BatchOutcome> {
        let total = tasks.len();
        if total == 0 {
            return Ok(BatchOutcome::Completed { downloaded: 0 });
        }
        if self.shutdown_token.is_cancelled() {
            return Err(HarvestError::Interrupted);
        }

        let semaphore = Arc::new(Semaphore::new(worker_count.max(1)));
        let batch_token = self.shutdown_token.child_token();
        // Position within this batch; the shared counter spans the whole run.
        let finished = Arc::new(AtomicUsize::new(0));
        let mut workers = JoinSet::new();

        for task in tasks {
            let semaphore = Arc::clone(&semaphore);
            let fetcher = Arc::clone(&self.fetcher);
            let manifest = self.manifest.clone();
            let progress = Arc::clone(&self.progress);
            let finished = Arc::clone(&finished);
            let batch_token = batch_token.clone();
            let shutdown_token = self.shutdown_token.clone();
            let request_delay = self.request_delay;

            workers.spawn(async move {
                let _permit = tokio::select! {
                    permit = semaphore.acquire_owned() => match permit {
                        Ok(permit) => permit,
                        Err(_) => return TaskResult::Skipped,
                    },
                    _ = batch_token.cancelled() => return TaskResult::Skipped,
                };
                if batch_token.is_cancelled() {
                    return TaskResult::Skipped;
                }

                progress.increment_workers();
                let result = Self::download_one(
                    &task,
                    &fetcher,
                    manifest.as_deref(),
                    &shutdown_token,
                )
                .await;
                progress.decrement_workers();

                match result {
                    Ok(Some(bytes)) => {
                        progress.record_completed(bytes);
                        let n = finished.fetch_add(1, Ordering::SeqCst) + 1;
                        info!("[{}/{}] {} -> {}", n, total, task.label, task.dest.display());
                        tokio::time::sleep(request_delay).await;
                        TaskResult::Done
                    }
                    Ok(None) => TaskResult::Skipped,
                    Err(e) => {
                        // Cancel while still holding the permit so no queued task slips in.
                        batch_token.cancel();
                        TaskResult::Failed(e)
                    }
                }
            });
        }

        let mut downloaded = 0usize;
        let mut missing: Option<String> = None;
        let mut fatal: Option<HarvestError> = None;

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(TaskResult::Done) => downloaded += 1,
                Ok(TaskResult::Skipped) => {}
                Ok(TaskResult::Failed(HarvestError::AssetAbsent { url })) => {
                    if missing.is_none() && fatal.is_none() {
                        warn!("resource absent, stopping batch: {}", url);
                        batch_token.cancel();
                        missing = Some(url);
                    }
                }
                Ok(TaskResult::Failed(e)) => {
                    if fatal.is_none() {
                        error!("download failed: {}", e);
                        batch_token.cancel();
                        fatal = Some(e);
                    }
                }
                Err(e) => {
                    if fatal.is_none() {
                        error!("download worker crashed: {}", e);
                        batch_token.cancel();
                        fatal = Some(HarvestError::Worker(e.to_string()));
                    }
                }
            }
        }

        if let Some(e) = fatal {
            return Err(e);
        }
        if self.shutdown_token.is_cancelled() {
            return Err(HarvestError::Interrupted);
        }
        debug!("batch finished downloaded={} of {}", downloaded, total);
        Ok(match missing {
            Some(missing_url) => BatchOutcome::Stopped {
                downloaded,
                missing_url,
            },
            None => BatchOutcome::Completed { downloaded },
        })
    }

    /// Fetch, check, write, record. `Ok(None)` means shutdown interrupted the fetch.
    async fn download_one(
        task: &DownloadTask,
        fetcher: &ResilientFetcher,
        manifest: Option<&ManifestWriter>,
        shutdown_token: &CancellationToken,
    ) -> HarvestResult<Option<u64>> {
        let resp = tokio::select! {
            resp = fetcher.get(&task.url) => resp?,
            _ = shutdown_token.cancelled() => {
                debug!("fetch cancelled by shutdown: {}", task.url);
                return Ok(None);
            }
        };

        if resp.is_absent() {
            warn!(
                "status {} with {} bytes, the resource may not exist: {}",
                resp.status,
                resp.body.len(),
                task.url
            );
            return Err(HarvestError::AssetAbsent {
                url: task.url.clone(),
            });
        }

        tokio::fs::write(&task.dest, &resp.body)
            .await
            .map_err(|source| HarvestError::Io {
                path: task.dest.clone(),
                source,
            })?;

        if let (Some(manifest), Some(text)) = (manifest, task.transcript.as_deref()) {
            manifest.append(&task.dest, text)?;
        }

        Ok(Some(resp.body.len() as u64))
    }
}
