//! Snapshot caching: an in-process slot plus a disk read-through cache.
//!
//! Freshness is `now − fetched_at < ttl`. Stale records are still served as
//! last-known-good fallbacks; staleness only decides whether a caller should
//! attempt a refresh first.

use std::{marker::PhantomData, path::{Path, PathBuf}, sync::Mutex, time::Duration};

use chrono::Utc;
use log::warn;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tokio::fs;

/// A cached value plus the moment it was fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord<T> {
    /// Unix epoch milliseconds; non-positive values are treated as stale.
    pub fetched_at_ms: i64,
    pub value: T,
}

impl<T> CacheRecord<T> {
    /// Wraps a value fetched right now.
    pub fn now(value: T) -> Self {
        Self {
            fetched_at_ms: Utc::now().timestamp_millis(),
            value,
        }
    }

    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.is_fresh_at(Utc::now().timestamp_millis(), ttl)
    }

    fn is_fresh_at(&self, now_ms: i64, ttl: Duration) -> bool {
        if self.fetched_at_ms <= 0 {
            return false;
        }

        let age_ms = now_ms.saturating_sub(self.fetched_at_ms);
        u128::try_from(age_ms).is_ok_and(|age| age < ttl.as_millis())
    }
}

/// In-process last-known-good holder.
#[derive(Debug, Default)]
pub struct MemorySlot<T> {
    inner: Mutex<Option<CacheRecord<T>>>,
}

impl<T: Clone> MemorySlot<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(None),
        }
    }

    fn with_inner<R>(&self, f: impl FnOnce(&mut Option<CacheRecord<T>>) -> R) -> R {
        match self.inner.lock() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }

    /// The held value when it is still within its TTL.
    pub fn get_fresh(&self, ttl: Duration) -> Option<T> {
        self.with_inner(|slot| {
            slot.as_ref()
                .filter(|record| record.is_fresh(ttl))
                .map(|record| record.value.clone())
        })
    }

    /// The held value regardless of age.
    pub fn get_any(&self) -> Option<T> {
        self.with_inner(|slot| slot.as_ref().map(|record| record.value.clone()))
    }

    pub fn set(&self, record: CacheRecord<T>) {
        self.with_inner(|slot| *slot = Some(record));
    }
}

/// JSON file cache under a well-known path, one file per logical key.
#[derive(Debug, Clone)]
pub struct DiskCache<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> DiskCache<T>
where
    T: Serialize + DeserializeOwned,
{
    pub fn new(dir: &Path, key: &str) -> Self {
        Self {
            path: dir.join(format!("{key}.json")),
            _marker: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads whatever record is on disk, fresh or not.
    ///
    /// Tolerates leading garbage by retrying the parse on the last non-empty
    /// line, which covers files a shell pipeline appended diagnostics to.
    pub async fn load_any(&self) -> Option<CacheRecord<T>> {
        let raw = fs::read_to_string(&self.path).await.ok()?;
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }

        if let Ok(record) = serde_json::from_str(trimmed) {
            return Some(record);
        }

        let last_line = trimmed.lines().rev().map(str::trim).find(|line| !line.is_empty())?;
        serde_json::from_str(last_line).ok()
    }

    /// Loads the record only when it is within `ttl`.
    pub async fn load_fresh(&self, ttl: Duration) -> Option<CacheRecord<T>> {
        self.load_any().await.filter(|record| record.is_fresh(ttl))
    }

    /// Persists the record, best-effort. Failures are logged, never raised:
    /// losing a cache write must not fail the refresh that produced it.
    pub async fn store(&self, record: &CacheRecord<T>) {
        let payload = match serde_json::to_string(record) {
            Ok(payload) => payload,
            Err(err) => {
                warn!("failed to encode cache record for {:?}: {err}", self.path);
                return;
            }
        };

        if let Some(parent) = self.path.parent() {
            if let Err(err) = fs::create_dir_all(parent).await {
                warn!("failed to create cache dir {parent:?}: {err}");
                return;
            }
        }

        if let Err(err) = fs::write(&self.path, payload).await {
            warn!("failed to write cache file {:?}: {err}", self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::runtime::Runtime;

    const TTL: Duration = Duration::from_secs(60);

    #[test]
    fn freshness_window() {
        let record = CacheRecord {
            fetched_at_ms: 1_000_000,
            value: 7u32,
        };

        assert!(record.is_fresh_at(1_000_000 + 59_999, TTL));
        assert!(!record.is_fresh_at(1_000_000 + 60_000, TTL));
    }

    #[test]
    fn garbage_timestamp_is_stale() {
        let record = CacheRecord {
            fetched_at_ms: 0,
            value: 7u32,
        };
        assert!(!record.is_fresh_at(1, TTL));

        let record = CacheRecord {
            fetched_at_ms: -5,
            value: 7u32,
        };
        assert!(!record.is_fresh_at(1, TTL));
    }

    #[test]
    fn memory_slot_serves_stale_values_on_request() {
        let slot = MemorySlot::new();
        slot.set(CacheRecord {
            fetched_at_ms: 1,
            value: "old".to_string(),
        });

        assert_eq!(slot.get_fresh(TTL), None);
        assert_eq!(slot.get_any(), Some("old".to_string()));
    }

    #[test]
    fn disk_round_trip() {
        let runtime = Runtime::new().expect("runtime");
        let dir = tempfile::tempdir().expect("tempdir");
        let cache: DiskCache<Vec<u32>> = DiskCache::new(dir.path(), "numbers");

        runtime.block_on(async {
            let record = CacheRecord::now(vec![1, 2, 3]);
            cache.store(&record).await;

            let loaded = cache.load_any().await.expect("record should load");
            assert_eq!(loaded.value, vec![1, 2, 3]);
            assert!(cache.load_fresh(TTL).await.is_some());
        });
    }

    #[test]
    fn malformed_file_loads_nothing() {
        let runtime = Runtime::new().expect("runtime");
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{ not json").expect("write");

        let cache: DiskCache<u32> = DiskCache::new(dir.path(), "broken");
        runtime.block_on(async {
            assert!(cache.load_any().await.is_none());
        });
    }

    #[test]
    fn trailing_record_line_is_recovered() {
        let runtime = Runtime::new().expect("runtime");
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("noisy.json");
        std::fs::write(
            &path,
            "warning: something\n{\"fetched_at_ms\":12,\"value\":42}\n",
        )
        .expect("write");

        let cache: DiskCache<u32> = DiskCache::new(dir.path(), "noisy");
        runtime.block_on(async {
            let record = cache.load_any().await.expect("last line should parse");
            assert_eq!(record.value, 42);
        });
    }
}
