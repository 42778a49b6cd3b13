use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Reference-data cache entries older than this are refetched (30 days).
pub const CACHE_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);

/// Default number of concurrent download workers.
pub const DEFAULT_WORKER_COUNT: usize = 5;

/// Maximum reference datasets fetched simultaneously at startup.
pub const DATASET_CONCURRENCY: usize = 8;

/// Default global cap on card voices per invocation.
pub const DEFAULT_CARD_VOICE_CAP: usize = 800;

/// Default attempt budget of the resilient fetcher.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Default pause between retries and after each completed download.
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 300;

pub const DEFAULT_MANIFEST_NAME: &str = "manifest.list";

/// Name of the cache subdirectory under the output root.
pub const CACHE_DIR_NAME: &str = ".cache";

/// Remote service locations.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Base URL of the master database JSON dumps.
    pub master_db: String,
    /// Base URL of the asset storage mirror.
    pub assets: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            master_db: "https://sekai-world.github.io/sekai-master-db-diff".to_string(),
            assets: "https://storage.sekai.best/sekai-jp-assets".to_string(),
        }
    }
}

impl Endpoints {
    pub fn dataset(&self, file_name: &str) -> String {
        format!("{}/{}", self.master_db.trim_end_matches('/'), file_name)
    }

    pub fn solo_song(&self, bundle: &str, ext: &str) -> String {
        format!("{}/music/long/{bundle}/{bundle}.{ext}", self.base())
    }

    pub fn profile_scenario(&self, scenario_id: &str) -> String {
        format!("{}/scenario/profile/{scenario_id}.asset", self.base())
    }

    pub fn profile_voice_dir(&self) -> String {
        format!("{}/sound/scenario/voice", self.base())
    }

    pub fn card_scenario(&self, bundle: &str, scenario_id: &str) -> String {
        format!("{}/character/member/{bundle}/{scenario_id}.asset", self.base())
    }

    pub fn card_voice_dir(&self) -> String {
        format!("{}/sound/card_scenario/voice", self.base())
    }

    fn base(&self) -> &str {
        self.assets.trim_end_matches('/')
    }
}

/// Top-level configuration for the harvester.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HarvestConfig {
    /// Root under which `dataset_<id>/` folders and `.cache/` live.
    pub output_root: PathBuf,
    /// Extension of downloaded audio files, without the dot.
    pub audio_ext: String,
    /// Number of concurrent download workers.
    pub worker_count: usize,
    /// Attempts per GET before giving up.
    pub max_attempts: u32,
    /// Pause between failed attempts, in milliseconds.
    pub retry_wait_ms: u64,
    /// Pause a worker takes after each completed download, in milliseconds.
    pub request_delay_ms: u64,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub manifest_name: String,
    pub endpoints: Endpoints,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self {
            output_root: PathBuf::from("./output"),
            audio_ext: "wav".to_string(),
            worker_count: DEFAULT_WORKER_COUNT,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_wait_ms: DEFAULT_REQUEST_DELAY_MS,
            request_delay_ms: DEFAULT_REQUEST_DELAY_MS,
            request_timeout_secs: 60,
            user_agent: concat!("sekai-voice-harvest/", env!("CARGO_PKG_VERSION")).to_string(),
            manifest_name: DEFAULT_MANIFEST_NAME.to_string(),
            endpoints: Endpoints::default(),
        }
    }
}

impl HarvestConfig {
    /// Read a TOML config file. Missing keys fall back to defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: HarvestConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    /// Anchor a relative `output_root` at the working directory, so manifest
    /// lines carry absolute paths.
    pub fn resolve_output_root(&mut self) -> std::io::Result<()> {
        if !self.output_root.is_absolute() {
            self.output_root = std::path::absolute(&self.output_root)?;
        }
        Ok(())
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.output_root.join(CACHE_DIR_NAME)
    }

    /// Per-character output directory.
    pub fn character_dir(&self, character_id: i64) -> PathBuf {
        self.output_root.join(format!("dataset_{}", character_id))
    }

    pub fn retry_wait(&self) -> Duration {
        Duration::from_millis(self.retry_wait_ms)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Which groups of assets an invocation downloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Mode {
    /// Solo songs, profile voices and card voices.
    AllWithSongs,
    /// Profile voices and card voices.
    AllPure,
    SoloOnly,
    ProfileOnly,
    CardsOnly,
}

impl Mode {
    pub fn includes_solo_songs(self) -> bool {
        matches!(self, Mode::AllWithSongs | Mode::SoloOnly)
    }

    pub fn includes_profile(self) -> bool {
        matches!(self, Mode::AllWithSongs | Mode::AllPure | Mode::ProfileOnly)
    }

    pub fn includes_cards(self) -> bool {
        matches!(self, Mode::AllWithSongs | Mode::AllPure | Mode::CardsOnly)
    }
}

/// One user-requested harvest, as produced by the CLI or any other front end.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub character_id: i64,
    pub mode: Mode,
    pub card_voice_cap: usize,
    pub save_transcripts: bool,
}

impl Invocation {
    pub fn new(character_id: i64, mode: Mode) -> Self {
        Self {
            character_id,
            mode,
            card_voice_cap: DEFAULT_CARD_VOICE_CAP,
            save_transcripts: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relative_output_root_is_anchored() {
        let mut config = HarvestConfig::default();
        config.resolve_output_root().unwrap();
        assert!(config.output_root.is_absolute());
        assert_eq!(
            config.output_root,
            std::env::current_dir().unwrap().join("output")
        );
        assert!(config.character_dir(21).is_absolute());

        let mut config = HarvestConfig {
            output_root: PathBuf::from("/data/voices"),
            ..HarvestConfig::default()
        };
        config.resolve_output_root().unwrap();
        assert_eq!(config.output_root, PathBuf::from("/data/voices"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: HarvestConfig = toml::from_str(
            r#"
            audio_ext = "mp3"
            worker_count = 2

            [endpoints]
            assets = "http://127.0.0.1:9000/"
            "#,
        )
        .unwrap();

        assert_eq!(config.audio_ext, "mp3");
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.manifest_name, DEFAULT_MANIFEST_NAME);
        assert_eq!(
            config.endpoints.master_db,
            Endpoints::default().master_db
        );
        assert_eq!(
            config.endpoints.solo_song("se_0001_01", "mp3"),
            "http://127.0.0.1:9000/music/long/se_0001_01/se_0001_01.mp3"
        );
    }

    #[test]
    fn test_mode_groups() {
        assert!(Mode::AllWithSongs.includes_solo_songs());
        assert!(!Mode::AllPure.includes_solo_songs());
        assert!(Mode::AllPure.includes_cards());
        assert!(!Mode::ProfileOnly.includes_cards());
        assert!(Mode::CardsOnly.includes_cards());
        assert!(!Mode::SoloOnly.includes_profile());
    }

    #[test]
    fn test_character_dir_layout() {
        let config = HarvestConfig {
            output_root: PathBuf::from("/out"),
            ..HarvestConfig::default()
        };
        assert_eq!(config.character_dir(21), PathBuf::from("/out/dataset_21"));
        assert_eq!(config.cache_dir(), PathBuf::from("/out/.cache"));
    }
}
