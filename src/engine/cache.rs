// On-disk memo of reference datasets: one JSON file per dataset, expired by mtime.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

pub struct DatasetCache {
    dir: PathBuf,
    ttl: Duration,
    write_lock: Mutex<()>,
}

impl DatasetCache {
    pub fn new(dir: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            dir: dir.into(),
            ttl,
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the cache file for `name`.
    pub fn entry_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{}.json", name))
    }

    /// Return the cached payload if it exists and is younger than the TTL.
    pub fn load(&self, name: &str) -> Option<Value> {
        let path = self.entry_path(name);
        let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or(Duration::ZERO);
        if age >= self.ttl {
            debug!("cache entry {} expired (age {}s)", name, age.as_secs());
            return None;
        }
        self.read(&path, name)
    }

    /// Return the cached payload regardless of age. Used when the network is down.
    pub fn load_stale(&self, name: &str) -> Option<Value> {
        let path = self.entry_path(name);
        if !path.exists() {
            return None;
        }
        self.read(&path, name)
    }

    /// Persist `payload` under `name`, replacing any previous entry atomically.
    pub fn save(&self, name: &str, payload: &Value) -> Result<()> {
        let _guard = self.write_lock.lock();

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create cache dir {}", self.dir.display()))?;

        let path = self.entry_path(name);
        let tmp = self.dir.join(format!("{}.json.tmp", name));
        let bytes = serde_json::to_vec(payload)?;
        {
            let mut file = fs::File::create(&tmp)
                .with_context(|| format!("failed to create {}", tmp.display()))?;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &path)
            .with_context(|| format!("failed to move cache entry into {}", path.display()))?;
        debug!("cache entry {} saved ({} bytes)", name, bytes.len());
        Ok(())
    }

    fn read(&self, path: &Path, name: &str) -> Option<Value> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("cache read failed for {}: {}", name, e);
                return None;
            }
        };
        match serde_json::from_slice(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("cache entry {} is corrupt, ignoring: {}", name, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corrupt_entry_is_absent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DatasetCache::new(dir.path(), Duration::from_secs(60));
        fs::write(cache.entry_path("cards"), b"{not json").unwrap();
        assert!(cache.load("cards").is_none());
        assert!(cache.load_stale("cards").is_none());
    }

    #[test]
    fn test_save_leaves_no_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let cache = DatasetCache::new(dir.path().join("nested"), Duration::from_secs(60));
        cache.save("musics", &serde_json::json!([1, 2])).unwrap();
        let names: Vec<_> = fs::read_dir(cache.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["musics.json".to_string()]);
    }
}
