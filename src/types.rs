use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::config::MAX_WINDOW_DAYS;
use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Platform
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Spotify,
    AppleMusic,
    Youtube,
    Instagram,
    Tiktok,
    Twitter,
    Other,
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Platform::Spotify => "spotify",
            Platform::AppleMusic => "apple_music",
            Platform::Youtube => "youtube",
            Platform::Instagram => "instagram",
            Platform::Tiktok => "tiktok",
            Platform::Twitter => "twitter",
            Platform::Other => "other",
        };
        write!(f, "{s}")
    }
}

impl FromStr for Platform {
    type Err = std::convert::Infallible;

    /// Unrecognised platforms fold into `Other`; their metrics still count.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "spotify" => Platform::Spotify,
            "apple_music" | "applemusic" => Platform::AppleMusic,
            "youtube" => Platform::Youtube,
            "instagram" => Platform::Instagram,
            "tiktok" => Platform::Tiktok,
            "twitter" | "x" => Platform::Twitter,
            _ => Platform::Other,
        })
    }
}

// ---------------------------------------------------------------------------
// Raw metrics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounts {
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub saves: u64,
    pub views: u64,
}

/// Optional audience breakdown attached to a snapshot by the sync collaborator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AudienceBreakdown {
    /// ISO country code → listeners.
    pub countries: BTreeMap<String, u64>,
    /// Age bracket label ("18-24", ...) → listeners.
    pub age_brackets: BTreeMap<String, u64>,
}

/// Immutable point-in-time reading for one artist on one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub artist_id: String,
    pub platform: Platform,
    pub captured_at: DateTime<Utc>,
    pub followers: u64,
    pub monthly_listeners: u64,
    /// Platform popularity index, 0–100.
    pub popularity: Option<f64>,
    /// Popularity of the artist's best-performing track, 0–100.
    pub top_track_popularity: Option<f64>,
    pub engagement: EngagementCounts,
    pub audience: Option<AudienceBreakdown>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPost {
    pub post_id: String,
    pub platform: Platform,
    pub posted_at: DateTime<Utc>,
    pub likes: u64,
    pub comments: u64,
    pub shares: u64,
    pub saves: u64,
    pub views: u64,
}

impl SocialPost {
    /// likes + comments + shares.
    pub fn engagement(&self) -> u64 {
        self.likes.saturating_add(self.comments).saturating_add(self.shares)
    }
}

// ---------------------------------------------------------------------------
// Aggregated series
// ---------------------------------------------------------------------------

/// One aggregated point per calendar day that had at least one snapshot.
/// Count fields sum the per-platform truncated means of that day.s readings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedDayPoint {
    pub date: NaiveDate,
    pub followers: u64,
    pub monthly_listeners: u64,
    pub engagement: EngagementCounts,
    pub popularity: Option<f64>,
    pub snapshot_count: u32,
}

impl AggregatedDayPoint {
    /// followers + monthly listeners, the audience base growth is measured against.
    pub fn audience(&self) -> f64 {
        self.followers as f64 + self.monthly_listeners as f64
    }
}

// ---------------------------------------------------------------------------
// Window specification
// ---------------------------------------------------------------------------

/// Scoring window `(end - days, end]`. Validated at construction so scorers
/// never see a non-positive or absurd window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSpec {
    end: DateTime<Utc>,
    days: u32,
}

impl WindowSpec {
    pub fn new(days: i64, end: DateTime<Utc>) -> Result<Self, EngineError> {
        if days <= 0 {
            return Err(EngineError::InvalidWindow(format!(
                "window must cover at least one day, got {days}"
            )));
        }
        if days > MAX_WINDOW_DAYS as i64 {
            return Err(EngineError::InvalidWindow(format!(
                "window of {days} days exceeds the {MAX_WINDOW_DAYS}-day limit"
            )));
        }
        Ok(Self { end, days: days as u32 })
    }

    pub fn days(&self) -> u32 {
        self.days
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.end - Duration::days(self.days as i64)
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        at > self.start() && at <= self.end
    }
}

// ---------------------------------------------------------------------------
// Release-planning inputs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetingRelease {
    pub artist_name: String,
    pub genre: Option<String>,
    pub release_date: NaiveDate,
    pub followers: u64,
}

// ---------------------------------------------------------------------------
// Fan activity
// ---------------------------------------------------------------------------

/// Per-fan activity rollup supplied by the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FanActivity {
    pub fan_id: String,
    pub lifetime_streams: u64,
    pub saves: u64,
    pub shares: u64,
    pub purchases: u64,
    pub streams_last_30d: u64,
    pub streams_prior_30d: u64,
    pub last_active_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn window_rejects_non_positive_and_absurd_days() {
        let end = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        assert!(matches!(WindowSpec::new(0, end), Err(EngineError::InvalidWindow(_))));
        assert!(matches!(WindowSpec::new(-3, end), Err(EngineError::InvalidWindow(_))));
        assert!(matches!(WindowSpec::new(10_000, end), Err(EngineError::InvalidWindow(_))));
        assert_eq!(WindowSpec::new(30, end).unwrap().days(), 30);
    }

    #[test]
    fn window_is_half_open_at_start() {
        let end = Utc.with_ymd_and_hms(2024, 6, 10, 0, 0, 0).unwrap();
        let w = WindowSpec::new(7, end).unwrap();
        assert!(!w.contains(w.start()));
        assert!(w.contains(end));
        assert!(!w.contains(end + Duration::seconds(1)));
    }

    #[test]
    fn platform_parse_falls_back_to_other() {
        assert_eq!("Spotify".parse::<Platform>().unwrap(), Platform::Spotify);
        assert_eq!("x".parse::<Platform>().unwrap(), Platform::Twitter);
        assert_eq!("myspace".parse::<Platform>().unwrap(), Platform::Other);
    }
}
