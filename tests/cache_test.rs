use std::time::Duration;

use serde_json::json;

use sekai_voice_harvest::engine::cache::DatasetCache;

#[test]
fn test_dataset_cache_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DatasetCache::new(dir.path(), Duration::from_secs(3600));

    assert!(cache.load("gameCharacters").is_none());

    let payload = json!([
        {"id": 1, "firstName": "星乃", "givenName": "一歌"},
        {"id": 2, "givenName": "咲希", "nested": {"a": [1, 2, 3]}}
    ]);
    cache.save("gameCharacters", &payload).unwrap();

    let loaded = cache.load("gameCharacters").unwrap();
    assert_eq!(loaded, payload);

    // Other names are unaffected.
    assert!(cache.load("musics").is_none());
}

#[test]
fn test_dataset_cache_expired_entry_is_absent() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DatasetCache::new(dir.path(), Duration::ZERO);

    let payload = json!([{"id": 7}]);
    cache.save("cards", &payload).unwrap();

    // Past the TTL the entry is not served...
    assert!(cache.load("cards").is_none());
    // ...but is still available as a stale fallback.
    assert_eq!(cache.load_stale("cards").unwrap(), payload);
}

#[test]
fn test_dataset_cache_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DatasetCache::new(dir.path(), Duration::from_secs(3600));

    cache.save("musics", &json!([1])).unwrap();
    cache.save("musics", &json!([1, 2])).unwrap();
    assert_eq!(cache.load("musics").unwrap(), json!([1, 2]));
}
