//! Row types matching `migrations/0001_init.sql`, with conversions into the
//! core types. Timestamps are epoch milliseconds; counts are stored as
//! signed integers and clamped at zero on the way out.

use chrono::{DateTime, Duration, NaiveDate, Utc};

use crate::alerts::AlertRule;
use crate::error::{AppError, Result};
use crate::types::{
    AudienceBreakdown, CompetingRelease, EngagementCounts, FanActivity, MetricSnapshot, Platform,
    SocialPost,
};

pub fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub fn from_millis(ms: i64, table: &'static str) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| AppError::CorruptRow {
        table,
        reason: format!("timestamp out of range: {ms}"),
    })
}

fn count(v: i64) -> u64 {
    v.max(0) as u64
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ArtistRow {
    pub id: String,
    pub name: String,
    pub genre: Option<String>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct SnapshotRow {
    pub artist_id: String,
    pub platform: String,
    pub captured_at: i64,
    pub followers: i64,
    pub monthly_listeners: i64,
    pub popularity: Option<f64>,
    pub top_track_popularity: Option<f64>,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub saves: i64,
    pub views: i64,
    pub audience_json: Option<String>,
}

impl TryFrom<SnapshotRow> for MetricSnapshot {
    type Error = AppError;

    fn try_from(row: SnapshotRow) -> Result<Self> {
        let audience = row
            .audience_json
            .as_deref()
            .map(|json| serde_json::from_str::<AudienceBreakdown>(json))
            .transpose()?;
        Ok(MetricSnapshot {
            captured_at: from_millis(row.captured_at, "metric_snapshots")?,
            platform: row.platform.parse().unwrap_or(Platform::Other),
            artist_id: row.artist_id,
            followers: count(row.followers),
            monthly_listeners: count(row.monthly_listeners),
            popularity: row.popularity,
            top_track_popularity: row.top_track_popularity,
            engagement: EngagementCounts {
                likes: count(row.likes),
                comments: count(row.comments),
                shares: count(row.shares),
                saves: count(row.saves),
                views: count(row.views),
            },
            audience,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct PostRow {
    pub post_id: String,
    pub platform: String,
    pub posted_at: i64,
    pub likes: i64,
    pub comments: i64,
    pub shares: i64,
    pub saves: i64,
    pub views: i64,
}

impl TryFrom<PostRow> for SocialPost {
    type Error = AppError;

    fn try_from(row: PostRow) -> Result<Self> {
        Ok(SocialPost {
            posted_at: from_millis(row.posted_at, "social_posts")?,
            platform: row.platform.parse().unwrap_or(Platform::Other),
            post_id: row.post_id,
            likes: count(row.likes),
            comments: count(row.comments),
            shares: count(row.shares),
            saves: count(row.saves),
            views: count(row.views),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct FanRow {
    pub fan_id: String,
    pub lifetime_streams: i64,
    pub saves: i64,
    pub shares: i64,
    pub purchases: i64,
    pub streams_last_30d: i64,
    pub streams_prior_30d: i64,
    pub last_active_at: i64,
}

impl TryFrom<FanRow> for FanActivity {
    type Error = AppError;

    fn try_from(row: FanRow) -> Result<Self> {
        Ok(FanActivity {
            last_active_at: from_millis(row.last_active_at, "fan_activity")?,
            fan_id: row.fan_id,
            lifetime_streams: count(row.lifetime_streams),
            saves: count(row.saves),
            shares: count(row.shares),
            purchases: count(row.purchases),
            streams_last_30d: count(row.streams_last_30d),
            streams_prior_30d: count(row.streams_prior_30d),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct CompetingRow {
    pub artist_name: String,
    pub genre: Option<String>,
    pub release_date: String,
    pub followers: i64,
}

impl TryFrom<CompetingRow> for CompetingRelease {
    type Error = AppError;

    fn try_from(row: CompetingRow) -> Result<Self> {
        let release_date = NaiveDate::parse_from_str(&row.release_date, "%Y-%m-%d").map_err(|e| {
            AppError::CorruptRow {
                table: "competing_releases",
                reason: format!("bad release_date {:?}: {e}", row.release_date),
            }
        })?;
        Ok(CompetingRelease {
            artist_name: row.artist_name,
            genre: row.genre,
            release_date,
            followers: count(row.followers),
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub struct AlertRuleRow {
    pub id: String,
    pub owner_id: String,
    pub artist_id: String,
    pub rule_type: String,
    pub threshold_value: f64,
    pub operator: String,
    pub cooldown_hours: i64,
    pub last_triggered_at: Option<i64>,
    pub is_active: bool,
    pub notify_in_app: bool,
    pub notify_email: bool,
}

impl TryFrom<AlertRuleRow> for AlertRule {
    type Error = AppError;

    /// Unknown rule types and operators surface as `AppError::Engine`.
    fn try_from(row: AlertRuleRow) -> Result<Self> {
        let last_triggered_at = row
            .last_triggered_at
            .map(|ms| from_millis(ms, "alert_rules"))
            .transpose()?;
        let cooldown_hours = row.cooldown_hours.max(0);
        if Duration::try_hours(cooldown_hours).is_none() {
            return Err(AppError::CorruptRow {
                table: "alert_rules",
                reason: format!("cooldown_hours out of range: {cooldown_hours}"),
            });
        }
        Ok(AlertRule {
            rule_type: row.rule_type.parse()?,
            operator: row.operator.parse()?,
            id: row.id,
            owner_id: row.owner_id,
            artist_id: row.artist_id,
            threshold_value: row.threshold_value,
            cooldown_hours,
            last_triggered_at,
            is_active: row.is_active,
            notify_in_app: row.notify_in_app,
            notify_email: row.notify_email,
        })
    }
}
