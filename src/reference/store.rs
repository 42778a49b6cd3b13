// Startup loader: fetches the seven reference datasets concurrently through the cache.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::index::{ReferenceIndex, ReferenceSets};
use crate::config::{Endpoints, DATASET_CONCURRENCY};
use crate::engine::cache::DatasetCache;
use crate::source::fetcher::ResilientFetcher;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Characters,
    Musics,
    MusicVocals,
    CharacterProfiles,
    Character2ds,
    Cards,
    CardEpisodes,
}

impl Dataset {
    pub const ALL: [Dataset; 7] = [
        Dataset::Characters,
        Dataset::Musics,
        Dataset::MusicVocals,
        Dataset::CharacterProfiles,
        Dataset::Character2ds,
        Dataset::Cards,
        Dataset::CardEpisodes,
    ];

    /// Logical name, used as the cache key and remote file stem.
    pub fn name(self) -> &'static str {
        match self {
            Dataset::Characters => "gameCharacters",
            Dataset::Musics => "musics",
            Dataset::MusicVocals => "musicVocals",
            Dataset::CharacterProfiles => "characterProfiles",
            Dataset::Character2ds => "character2ds",
            Dataset::Cards => "cards",
            Dataset::CardEpisodes => "cardEpisodes",
        }
    }

    pub fn url(self, endpoints: &Endpoints) -> String {
        endpoints.dataset(&format!("{}.json", self.name()))
    }
}

/// Where a dataset payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSource {
    Cache,
    Network,
    StaleCache,
    Empty,
}

/// Load all datasets (cache first, network on miss) and build the index.
pub async fn load_reference_data(
    fetcher: Arc<ResilientFetcher>,
    cache: Arc<DatasetCache>,
    endpoints: &Endpoints,
) -> ReferenceIndex {
    let semaphore = Arc::new(Semaphore::new(DATASET_CONCURRENCY));
    let mut loads = JoinSet::new();

    for dataset in Dataset::ALL {
        let fetcher = Arc::clone(&fetcher);
        let cache = Arc::clone(&cache);
        let semaphore = Arc::clone(&semaphore);
        let url = dataset.url(endpoints);
        loads.spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok();
            let (payload, source) = load_dataset(dataset, &url, &fetcher, &cache).await;
            (dataset, payload, source)
        });
    }

    let mut payloads: HashMap<Dataset, Value> = HashMap::new();
    while let Some(joined) = loads.join_next().await {
        match joined {
            Ok((dataset, payload, source)) => {
                info!("dataset {} ready (source={:?})", dataset.name(), source);
                payloads.insert(dataset, payload);
            }
            Err(e) => warn!("dataset load task failed: {}", e),
        }
    }

    let mut take = |dataset: Dataset| payloads.remove(&dataset).unwrap_or(Value::Null);
    let sets = ReferenceSets {
        characters: decode_records(Dataset::Characters, take(Dataset::Characters)),
        musics: decode_records(Dataset::Musics, take(Dataset::Musics)),
        music_vocals: decode_records(Dataset::MusicVocals, take(Dataset::MusicVocals)),
        profiles: decode_records(Dataset::CharacterProfiles, take(Dataset::CharacterProfiles)),
        character_2ds: decode_records(Dataset::Character2ds, take(Dataset::Character2ds)),
        cards: decode_records(Dataset::Cards, take(Dataset::Cards)),
        card_episodes: decode_records(Dataset::CardEpisodes, take(Dataset::CardEpisodes)),
    };

    ReferenceIndex::build(sets)
}

/// Resolve one dataset payload: fresh cache, then network, then stale cache, then empty.
pub async fn load_dataset(
    dataset: Dataset,
    url: &str,
    fetcher: &ResilientFetcher,
    cache: &Arc<DatasetCache>,
) -> (Value, PayloadSource) {
    let name = dataset.name();
    if let Some(payload) = cache.load(name) {
        debug!("dataset {} served from cache", name);
        return (payload, PayloadSource::Cache);
    }

    info!("downloading dataset {} from {}", name, url);
    let fetched = match fetcher.get(url).await {
        Ok(resp) if resp.is_absent() => {
            warn!("dataset {} missing upstream (status={}) url={}", name, resp.status, url);
            None
        }
        Ok(resp) => match serde_json::from_slice::<Value>(&resp.body) {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!("dataset {} is not valid JSON url={}: {}", name, url, e);
                None
            }
        },
        Err(e) => {
            warn!("dataset {} fetch failed: {}", name, e);
            None
        }
    };

    if let Some(payload) = fetched {
        let writer = Arc::clone(cache);
        let snapshot = payload.clone();
        match tokio::task::spawn_blocking(move || writer.save(name, &snapshot)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("dataset {} could not be cached: {:#}", name, e),
            Err(e) => warn!("dataset {} cache write task failed: {}", name, e),
        }
        return (payload, PayloadSource::Network);
    }

    if let Some(payload) = cache.load_stale(name) {
        warn!("dataset {} falling back to stale cache", name);
        return (payload, PayloadSource::StaleCache);
    }

    warn!("dataset {} unavailable, using empty set", name);
    (Value::Array(Vec::new()), PayloadSource::Empty)
}

/// Decode a JSON array element by element, dropping malformed entries.
fn decode_records<T: DeserializeOwned>(dataset: Dataset, payload: Value) -> Vec<T> {
    let items = match payload {
        Value::Array(items) => items,
        Value::Null => return Vec::new(),
        other => {
            warn!(
                "dataset {} is not an array (found {}), ignoring",
                dataset.name(),
                json_kind(&other)
            );
            return Vec::new();
        }
    };

    let total = items.len();
    let records: Vec<T> = items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect();
    if records.len() != total {
        warn!(
            "dataset {}: skipped {} of {} malformed records",
            dataset.name(),
            total - records.len(),
            total
        );
    }
    records
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::records::Card;

    #[test]
    fn test_decode_skips_malformed() {
        let payload = serde_json::json!([
            {"id": 1, "characterId": 21, "prefix": "x", "assetbundleName": "res021_no001"},
            {"id": "bad"},
            {"id": 2, "characterId": 21, "assetbundleName": "res021_no002", "extra": true}
        ]);
        let cards: Vec<Card> = decode_records(Dataset::Cards, payload);
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[1].assetbundle_name, "res021_no002");
        assert_eq!(cards[1].prefix, "");
    }

    #[test]
    fn test_decode_non_array_is_empty() {
        let cards: Vec<Card> = decode_records(Dataset::Cards, serde_json::json!({"a": 1}));
        assert!(cards.is_empty());
    }

    #[test]
    fn test_dataset_urls() {
        let endpoints = Endpoints {
            master_db: "http://host/db/".into(),
            assets: "http://host/assets".into(),
        };
        assert_eq!(
            Dataset::Character2ds.url(&endpoints),
            "http://host/db/character2ds.json"
        );
        assert_eq!(Dataset::ALL.len(), 7);
    }
}
