//! TTL memoization for automation engine responses.
//!
//! Entries are keyed by a structured [`CacheKey`] and stamped with the time
//! they were captured. Age is checked against the caller's TTL on every read,
//! so entries are never evicted by age; the map is bounded only by its
//! configured capacity. Concurrent misses for the same key are not coalesced.

use chrono::{DateTime, Utc};
use moka::future::Cache;
use serde::Serialize;
use serde_json::Value;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Default freshness window for personalization responses.
pub const DEFAULT_TTL: Duration = Duration::from_secs(300);

/// Placeholder used when a request carries no variant.
pub const DEFAULT_VARIANT: &str = "default";

/// Placeholder used for absent sequence id / step index.
pub const ABSENT_COMPONENT: &str = "none";

/// Composite cache key. Components are kept as separate fields so distinct
/// requests can never collide through string concatenation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    subject_id: String,
    template_id: String,
    strategy: String,
    variant: String,
    sequence_id: String,
    step_index: String,
}

impl CacheKey {
    pub fn new(
        subject_id: &str,
        template_id: &str,
        strategy: &str,
        variant: Option<&str>,
        sequence_id: Option<&str>,
        step_index: Option<i32>,
    ) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            template_id: template_id.to_string(),
            strategy: strategy.to_string(),
            variant: variant.unwrap_or(DEFAULT_VARIANT).to_string(),
            sequence_id: sequence_id.unwrap_or(ABSENT_COMPONENT).to_string(),
            step_index: step_index
                .map(|i| i.to_string())
                .unwrap_or_else(|| ABSENT_COMPONENT.to_string()),
        }
    }
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(next) = chrono::Duration::from_std(by)
            .ok()
            .and_then(|delta| now.checked_add_signed(delta))
        {
            *now = next;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: Value,
    captured_at: DateTime<Utc>,
}

/// A value plus whether it was served from the cache.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cached<T> {
    pub value: T,
    pub cached: bool,
}

/// Process-local response cache. Cheap to clone; clones share entries.
#[derive(Clone)]
pub struct ResponseCache {
    entries: Cache<CacheKey, CacheEntry>,
    clock: Arc<dyn Clock>,
}

impl ResponseCache {
    /// Creates a cache holding at most `max_capacity` entries.
    pub fn new(max_capacity: u64) -> Self {
        Self::with_clock(max_capacity, Arc::new(SystemClock))
    }

    pub fn with_clock(max_capacity: u64, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Cache::builder().max_capacity(max_capacity).build(),
            clock,
        }
    }

    /// Returns the stored value for `key` when it is younger than `ttl`,
    /// otherwise runs `compute` and stores its result.
    ///
    /// A failed `compute` stores nothing and its error is returned unchanged.
    /// An expired entry is never served as a fallback.
    pub async fn get_or_compute<F, Fut, E>(
        &self,
        key: CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<Cached<Value>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, E>>,
    {
        if let Some(entry) = self.entries.get(&key).await {
            if is_fresh(entry.captured_at, self.clock.now(), ttl) {
                tracing::debug!("Response cache hit for {:?}", key);
                return Ok(Cached {
                    value: entry.value,
                    cached: true,
                });
            }
            tracing::debug!("Response cache entry expired for {:?}", key);
        }

        let value = compute().await?;

        self.entries
            .insert(
                key,
                CacheEntry {
                    value: value.clone(),
                    captured_at: self.clock.now(),
                },
            )
            .await;

        Ok(Cached {
            value,
            cached: false,
        })
    }

    /// Drops every entry.
    pub async fn invalidate_all(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks().await;
    }

    /// Number of stored entries, fresh or not.
    pub async fn entry_count(&self) -> u64 {
        self.entries.run_pending_tasks().await;
        self.entries.entry_count()
    }
}

fn is_fresh(captured_at: DateTime<Utc>, now: DateTime<Utc>, ttl: Duration) -> bool {
    match chrono::Duration::from_std(ttl) {
        Ok(ttl) => now.signed_duration_since(captured_at) < ttl,
        // TTL beyond chrono's range never expires
        Err(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn key(step_index: Option<i32>) -> CacheKey {
        CacheKey::new("lead-1", "tpl-1", "icebreaker", None, Some("seq-1"), step_index)
    }

    fn manual_cache() -> (ResponseCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(Utc::now()));
        (ResponseCache::with_clock(100, clock.clone()), clock)
    }

    #[test]
    fn test_absent_components_use_placeholders() {
        let explicit = CacheKey::new("s", "t", "x", Some("default"), Some("none"), None);
        let implicit = CacheKey::new("s", "t", "x", None, None, None);
        assert_eq!(explicit, implicit);
    }

    #[test]
    fn test_components_do_not_collide_across_boundaries() {
        let a = CacheKey::new("a_b", "c", "x", None, None, None);
        let b = CacheKey::new("a", "b_c", "x", None, None, None);
        let c = CacheKey::new("a,b", "c", "x", None, None, None);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_hit_within_ttl_computes_once() {
        let (cache, clock) = manual_cache();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let result = cache
                .get_or_compute(key(Some(0)), DEFAULT_TTL, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(json!({"subject": "Hello"}))
                })
                .await
                .unwrap();
            assert_eq!(result.value, json!({"subject": "Hello"}));
            clock.advance(Duration::from_secs(60));
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_second_call_reports_cached() {
        let (cache, _clock) = manual_cache();

        let first = cache
            .get_or_compute(key(None), DEFAULT_TTL, || async { Ok::<_, String>(json!(1)) })
            .await
            .unwrap();
        let second = cache
            .get_or_compute(key(None), DEFAULT_TTL, || async { Ok::<_, String>(json!(2)) })
            .await
            .unwrap();

        assert!(!first.cached);
        assert!(second.cached);
        assert_eq!(second.value, json!(1));
    }

    #[tokio::test]
    async fn test_expired_entry_is_recomputed() {
        let (cache, clock) = manual_cache();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let result = cache
                .get_or_compute(key(Some(0)), DEFAULT_TTL, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, String>(json!("body"))
                })
                .await
                .unwrap();
            assert!(!result.cached);
            clock.advance(DEFAULT_TTL);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_step_index_separates_entries() {
        let (cache, _clock) = manual_cache();

        let first = cache
            .get_or_compute(key(Some(0)), DEFAULT_TTL, || async {
                Ok::<_, String>(json!("step zero"))
            })
            .await
            .unwrap();
        let second = cache
            .get_or_compute(key(Some(1)), DEFAULT_TTL, || async {
                Ok::<_, String>(json!("step one"))
            })
            .await
            .unwrap();

        assert!(!second.cached);
        assert_eq!(first.value, json!("step zero"));
        assert_eq!(second.value, json!("step one"));
        assert_eq!(cache.entry_count().await, 2);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached_and_stale_entry_is_not_served() {
        let (cache, clock) = manual_cache();

        cache
            .get_or_compute(key(None), DEFAULT_TTL, || async { Ok::<_, String>(json!("old")) })
            .await
            .unwrap();
        clock.advance(DEFAULT_TTL + Duration::from_secs(1));

        let failed = cache
            .get_or_compute(key(None), DEFAULT_TTL, || async {
                Err::<Value, _>("upstream returned 502".to_string())
            })
            .await;
        assert_eq!(failed.unwrap_err(), "upstream returned 502");

        let retried = cache
            .get_or_compute(key(None), DEFAULT_TTL, || async { Ok::<_, String>(json!("new")) })
            .await
            .unwrap();
        assert!(!retried.cached);
        assert_eq!(retried.value, json!("new"));
    }

    #[tokio::test]
    async fn test_invalidate_all_forces_recompute() {
        let (cache, _clock) = manual_cache();

        cache
            .get_or_compute(key(None), DEFAULT_TTL, || async { Ok::<_, String>(json!(1)) })
            .await
            .unwrap();
        cache.invalidate_all().await;

        let after = cache
            .get_or_compute(key(None), DEFAULT_TTL, || async { Ok::<_, String>(json!(2)) })
            .await
            .unwrap();
        assert!(!after.cached);
        assert_eq!(after.value, json!(2));
    }
}
