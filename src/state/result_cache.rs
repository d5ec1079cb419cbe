use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::config::MAX_RESULT_TTL_HOURS;
use crate::scorer::{ReleaseScoreResult, RevenueForecast};

// ---------------------------------------------------------------------------
// TtlMap: artist_id → value stamped with its computation time
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct Stamped<V> {
    value: V,
    stored_at: DateTime<Utc>,
}

/// Concurrent map whose entries expire `ttl` after being stored.
/// Expired entries are invisible to readers and dropped by `evict_expired`.
pub struct TtlMap<V> {
    entries: DashMap<String, Stamped<V>>,
    ttl: Duration,
}

impl<V: Clone> TtlMap<V> {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// The stored value if it is younger than the TTL at `now`.
    pub fn get_fresh(&self, key: &str, now: DateTime<Utc>) -> Option<V> {
        let entry = self.entries.get(key)?;
        if now - entry.stored_at < self.ttl {
            Some(entry.value.clone())
        } else {
            None
        }
    }

    pub fn insert(&self, key: &str, value: V, now: DateTime<Utc>) {
        self.entries.insert(
            key.to_string(),
            Stamped {
                value,
                stored_at: now,
            },
        );
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, e| now - e.stored_at < self.ttl);
        before - self.entries.len()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ResultCache
// ---------------------------------------------------------------------------

/// Reusable expensive results, keyed by artist.
pub struct ResultCache {
    forecasts: TtlMap<RevenueForecast>,
    release_scores: TtlMap<Vec<ReleaseScoreResult>>,
}

impl ResultCache {
    /// `ttl_hours` is clamped to `0..=MAX_RESULT_TTL_HOURS`.
    pub fn new(ttl_hours: i64) -> Arc<Self> {
        let ttl = Duration::hours(ttl_hours.clamp(0, MAX_RESULT_TTL_HOURS));
        Arc::new(Self {
            forecasts: TtlMap::new(ttl),
            release_scores: TtlMap::new(ttl),
        })
    }

    pub fn forecast(&self, artist_id: &str, now: DateTime<Utc>) -> Option<RevenueForecast> {
        self.forecasts.get_fresh(artist_id, now)
    }

    pub fn store_forecast(&self, forecast: &RevenueForecast, now: DateTime<Utc>) {
        self.forecasts.insert(&forecast.artist_id, forecast.clone(), now);
    }

    pub fn release_scores(&self, artist_id: &str, now: DateTime<Utc>) -> Option<Vec<ReleaseScoreResult>> {
        self.release_scores.get_fresh(artist_id, now)
    }

    pub fn store_release_scores(&self, artist_id: &str, scores: &[ReleaseScoreResult], now: DateTime<Utc>) {
        self.release_scores.insert(artist_id, scores.to_vec(), now);
    }

    /// Returns `(forecasts, release_scores)` removed.
    pub fn evict_expired(&self, now: DateTime<Utc>) -> (usize, usize) {
        (
            self.forecasts.evict_expired(now),
            self.release_scores.evict_expired(now),
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn fresh_until_ttl_elapses() {
        let map: TtlMap<u32> = TtlMap::new(Duration::hours(24));
        map.insert("artist-1", 7, t0());

        assert_eq!(map.get_fresh("artist-1", t0() + Duration::hours(23)), Some(7));
        assert_eq!(map.get_fresh("artist-1", t0() + Duration::hours(24)), None);
        assert_eq!(map.get_fresh("artist-2", t0()), None);
    }

    #[test]
    fn evict_drops_only_expired() {
        let map: TtlMap<&str> = TtlMap::new(Duration::hours(1));
        map.insert("old", "a", t0());
        map.insert("new", "b", t0() + Duration::minutes(50));

        let removed = map.evict_expired(t0() + Duration::minutes(70));
        assert_eq!(removed, 1);
        assert_eq!(map.len(), 1);
        assert!(map.get_fresh("new", t0() + Duration::minutes(70)).is_some());
    }

    #[test]
    fn reinsert_refreshes_stamp() {
        let map: TtlMap<u32> = TtlMap::new(Duration::hours(1));
        map.insert("k", 1, t0());
        map.insert("k", 2, t0() + Duration::minutes(59));
        assert_eq!(map.get_fresh("k", t0() + Duration::minutes(90)), Some(2));
        map.invalidate("k");
        assert!(map.is_empty());
    }

    #[test]
    fn oversized_ttl_is_clamped_not_fatal() {
        let cache = ResultCache::new(i64::MAX);
        assert_eq!(cache.evict_expired(t0()), (0, 0));
        assert!(cache.forecast("artist-1", t0()).is_none());
    }
}
