// Harvest session: owns the fetcher and indexes, runs one invocation at a time.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cache::DatasetCache;
use super::downloader::{BatchOutcome, DownloadTask, Downloader};
use super::manifest::ManifestWriter;
use super::stats::{ProgressCounter, ProgressSnapshot};
use crate::config::{HarvestConfig, Invocation, CACHE_TTL};
use crate::error::{HarvestError, HarvestResult};
use crate::reference::index::ReferenceIndex;
use crate::reference::store::load_reference_data;
use crate::select::scenario::ScenarioAsset;
use crate::select::{self, VoiceNumbering, VoiceSource};
use crate::source::fetcher::ResilientFetcher;
use crate::source::http_source::ReqwestTransport;
use crate::source::traits::HttpTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SoloSongs,
    ProfileVoices,
    CardVoices,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::SoloSongs => "solo songs",
            Operation::ProfileVoices => "profile voices",
            Operation::CardVoices => "card voices",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationOutcome {
    Completed { downloaded: usize },
    /// Ended early because an asset or scenario document was missing.
    Stopped { downloaded: usize, missing_url: String },
    /// Reference data for the character was incomplete; nothing was fetched.
    Skipped { reason: String },
}

impl OperationOutcome {
    pub fn downloaded(&self) -> usize {
        match self {
            OperationOutcome::Completed { downloaded }
            | OperationOutcome::Stopped { downloaded, .. } => *downloaded,
            OperationOutcome::Skipped { .. } => 0,
        }
    }
}

impl From<BatchOutcome> for OperationOutcome {
    fn from(outcome: BatchOutcome) -> Self {
        match outcome {
            BatchOutcome::Completed { downloaded } => OperationOutcome::Completed { downloaded },
            BatchOutcome::Stopped {
                downloaded,
                missing_url,
            } => OperationOutcome::Stopped {
                downloaded,
                missing_url,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct HarvestReport {
    pub character_id: i64,
    pub output_dir: PathBuf,
    pub operations: Vec<(Operation, OperationOutcome)>,
    pub progress: ProgressSnapshot,
}

impl HarvestReport {
    pub fn total_downloaded(&self) -> usize {
        self.operations.iter().map(|(_, o)| o.downloaded()).sum()
    }

    pub fn outcome(&self, operation: Operation) -> Option<&OperationOutcome> {
        self.operations
            .iter()
            .find(|(op, _)| *op == operation)
            .map(|(_, outcome)| outcome)
    }
}

/// Per-invocation resources. Dropped (and the manifest closed) when the run ends.
struct RunContext {
    character_id: i64,
    out_dir: PathBuf,
    save_transcripts: bool,
    card_voice_cap: usize,
    downloader: Downloader,
}

pub struct Harvester {
    config: HarvestConfig,
    fetcher: Arc<ResilientFetcher>,
    index: Arc<ReferenceIndex>,
    shutdown_token: CancellationToken,
}

impl Harvester {
    /// Build the HTTP client and load reference data.
    pub async fn connect(config: HarvestConfig) -> Result<Self> {
        let transport = ReqwestTransport::new(config.request_timeout(), &config.user_agent)
            .context("failed to build http client")?;
        Ok(Self::with_transport(config, Arc::new(transport)).await)
    }

    /// Load reference data through `transport`. Dataset failures degrade to
    /// stale or empty data instead of failing.
    pub async fn with_transport(mut config: HarvestConfig, transport: Arc<dyn HttpTransport>) -> Self {
        if let Err(e) = config.resolve_output_root() {
            warn!(
                "could not resolve output root {}: {}",
                config.output_root.display(),
                e
            );
        }
        let fetcher = Arc::new(ResilientFetcher::new(
            transport,
            config.max_attempts,
            config.retry_wait(),
        ));
        let cache = Arc::new(DatasetCache::new(config.cache_dir(), CACHE_TTL));

        info!("loading reference data (cache at {})", cache.dir().display());
        let index = load_reference_data(Arc::clone(&fetcher), cache, &config.endpoints).await;
        info!(
            "reference data loaded: {} characters, {} vocals",
            index.characters().len(),
            index.music_vocals().len()
        );
        info!(
            "files will be saved under {}",
            config.output_root.join("dataset_[ID]").display()
        );

        Self {
            config,
            fetcher,
            index: Arc::new(index),
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn index(&self) -> &ReferenceIndex {
        &self.index
    }

    /// `(id, display name)` of every character, in dataset order.
    pub fn characters(&self) -> Vec<(i64, String)> {
        self.index
            .characters()
            .iter()
            .map(|c| (c.id, c.display_name()))
            .collect()
    }

    /// Token that, once cancelled, interrupts the current and any later run.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
    }

    /// Execute one invocation. Missing assets end only the affected
    /// operation; transport exhaustion, disk errors and interrupts end the run.
    pub async fn run(&self, invocation: &Invocation) -> HarvestResult<HarvestReport> {
        let character_id = invocation.character_id;
        let out_dir = self.config.character_dir(character_id);
        tokio::fs::create_dir_all(&out_dir)
            .await
            .map_err(|source| HarvestError::Io {
                path: out_dir.clone(),
                source,
            })?;

        match self.index.character(character_id) {
            Some(c) => info!("harvesting character {} ({})", character_id, c.display_name()),
            None => warn!("character {} not found in reference data", character_id),
        }

        let manifest = invocation
            .save_transcripts
            .then(|| Arc::new(ManifestWriter::new(out_dir.join(&self.config.manifest_name))));
        let progress = Arc::new(ProgressCounter::new());
        let downloader = Downloader::new(
            Arc::clone(&self.fetcher),
            manifest.clone(),
            Arc::clone(&progress),
            self.config.request_delay(),
        )
        .with_shutdown_token(self.shutdown_token.clone());

        let ctx = RunContext {
            character_id,
            out_dir: out_dir.clone(),
            save_transcripts: invocation.save_transcripts,
            card_voice_cap: invocation.card_voice_cap,
            downloader,
        };

        let result = self.run_operations(invocation, &ctx).await;

        if let Some(manifest) = &manifest {
            if let Err(e) = manifest.close() {
                warn!("failed to close manifest: {}", e);
            }
        }

        let operations = result?;
        info!("task finished for character {}", character_id);
        Ok(HarvestReport {
            character_id,
            output_dir: out_dir,
            operations,
            progress: progress.snapshot(),
        })
    }

    async fn run_operations(
        &self,
        invocation: &Invocation,
        ctx: &RunContext,
    ) -> HarvestResult<Vec<(Operation, OperationOutcome)>> {
        let mut operations = Vec::new();
        if invocation.mode.includes_solo_songs() {
            let outcome = self.download_solo_songs(ctx).await?;
            operations.push((Operation::SoloSongs, outcome));
        }
        if invocation.mode.includes_profile() {
            let outcome = self.download_profile_voices(ctx).await?;
            operations.push((Operation::ProfileVoices, outcome));
        }
        if invocation.mode.includes_cards() {
            let outcome = self.download_card_voices(ctx).await?;
            operations.push((Operation::CardVoices, outcome));
        }
        Ok(operations)
    }

    async fn download_solo_songs(&self, ctx: &RunContext) -> HarvestResult<OperationOutcome> {
        let endpoints = &self.config.endpoints;
        let ext = self.config.audio_ext.as_str();
        let tasks = select::solo_song_tasks(
            &self.index,
            ctx.character_id,
            |bundle| endpoints.solo_song(bundle, ext),
            &ctx.out_dir,
            ext,
        );
        info!("character {} solo songs: {}", ctx.character_id, tasks.len());
        self.dispatch(ctx, Operation::SoloSongs, tasks).await
    }

    async fn download_profile_voices(&self, ctx: &RunContext) -> HarvestResult<OperationOutcome> {
        let plan = match select::profile_plan(&self.index, ctx.character_id) {
            Ok(plan) => plan,
            Err(gap) => {
                warn!("skipping profile voices: {}", gap);
                return Ok(OperationOutcome::Skipped {
                    reason: gap.to_string(),
                });
            }
        };
        info!(
            "character {} profile scenario {}, 2d ids {:?}",
            ctx.character_id, plan.scenario_id, plan.identities
        );

        let url = self.config.endpoints.profile_scenario(&plan.scenario_id);
        let asset = match self.fetch_scenario(&url).await? {
            Some(asset) => asset,
            None => {
                return Ok(OperationOutcome::Stopped {
                    downloaded: 0,
                    missing_url: url,
                })
            }
        };
        info!("profile voice asset: {}", asset.name);

        let voice_dir = self.config.endpoints.profile_voice_dir();
        let source = VoiceSource {
            voice_dir: &voice_dir,
            scenario_id: &plan.scenario_id,
            out_dir: &ctx.out_dir,
            ext: &self.config.audio_ext,
            with_transcripts: ctx.save_transcripts,
        };
        let mut numbering = VoiceNumbering::profile();
        let tasks = select::talk_voice_tasks(&asset, &plan.identities, source, &mut numbering);
        self.dispatch(ctx, Operation::ProfileVoices, tasks).await
    }

    async fn download_card_voices(&self, ctx: &RunContext) -> HarvestResult<OperationOutcome> {
        let identities = match select::identity_set(&self.index, ctx.character_id) {
            Ok(ids) => ids,
            Err(gap) => {
                warn!("skipping card voices: {}", gap);
                return Ok(OperationOutcome::Skipped {
                    reason: gap.to_string(),
                });
            }
        };

        let scenarios = select::card_scenarios(&self.index, ctx.character_id);
        info!(
            "character {} cards: {}, card scenarios: {}",
            ctx.character_id,
            self.index.cards(ctx.character_id).len(),
            scenarios.len()
        );

        let voice_dir = self.config.endpoints.card_voice_dir();
        let mut numbering = VoiceNumbering::cards(ctx.card_voice_cap);
        let mut tasks = Vec::new();
        let mut missing_doc: Option<String> = None;

        for scenario in &scenarios {
            if numbering.is_full() {
                info!("reached card voice cap {}", ctx.card_voice_cap);
                break;
            }
            if self.shutdown_token.is_cancelled() {
                return Err(HarvestError::Interrupted);
            }

            debug!(
                "card {} ({}) scenario {}",
                scenario.card_prefix, scenario.bundle, scenario.scenario_id
            );
            let url = self
                .config
                .endpoints
                .card_scenario(&scenario.bundle, &scenario.scenario_id);
            let asset = match self.fetch_scenario(&url).await? {
                Some(asset) => asset,
                None => {
                    missing_doc = Some(url);
                    break;
                }
            };

            let source = VoiceSource {
                voice_dir: &voice_dir,
                scenario_id: &scenario.scenario_id,
                out_dir: &ctx.out_dir,
                ext: &self.config.audio_ext,
                with_transcripts: ctx.save_transcripts,
            };
            tasks.extend(select::talk_voice_tasks(
                &asset,
                &identities,
                source,
                &mut numbering,
            ));
            tokio::select! {
                _ = tokio::time::sleep(self.config.request_delay()) => {}
                _ = self.shutdown_token.cancelled() => return Err(HarvestError::Interrupted),
            }
        }

        let outcome = self.dispatch(ctx, Operation::CardVoices, tasks).await?;
        Ok(match (outcome, missing_doc) {
            (OperationOutcome::Completed { downloaded }, Some(missing_url)) => {
                OperationOutcome::Stopped {
                    downloaded,
                    missing_url,
                }
            }
            (outcome, _) => outcome,
        })
    }

    /// Fetch a scenario document. `None` when it is missing or unreadable.
    async fn fetch_scenario(&self, url: &str) -> HarvestResult<Option<ScenarioAsset>> {
        let fetched = tokio::select! {
            fetched = self.fetcher.get_json::<ScenarioAsset>(url) => fetched,
            _ = self.shutdown_token.cancelled() => {
                debug!("scenario fetch cancelled by shutdown: {}", url);
                return Err(HarvestError::Interrupted);
            }
        };
        match fetched {
            Ok(asset) => Ok(Some(asset)),
            Err(e @ (HarvestError::AssetAbsent { .. } | HarvestError::Decode { .. })) => {
                warn!("scenario document unavailable: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn dispatch(
        &self,
        ctx: &RunContext,
        operation: Operation,
        tasks: Vec<DownloadTask>,
    ) -> HarvestResult<OperationOutcome> {
        let outcome = ctx
            .downloader
            .run(tasks, self.config.worker_count)
            .await?;
        match &outcome {
            BatchOutcome::Completed { downloaded } => {
                info!("{} done: {} files", operation, downloaded)
            }
            BatchOutcome::Stopped {
                downloaded,
                missing_url,
            } => warn!(
                "{} stopped after {} files, resource absent: {}",
                operation, downloaded, missing_url
            ),
        }
        Ok(outcome.into())
    }
}
