use chrono::{DateTime, NaiveDate, Utc};
use tracing::warn;

use crate::alerts::AlertRule;
use crate::db::models::{
    to_millis, AlertRuleRow, ArtistRow, CompetingRow, FanRow, PostRow, SnapshotRow,
};
use crate::error::{AppError, Result};
use crate::types::{CompetingRelease, FanActivity, MetricSnapshot, SocialPost};

/// Read side of the store: snapshots, posts, fans, competing releases and
/// alert rules for the scoring cycle.
#[derive(Clone)]
pub struct SnapshotReader {
    pool: sqlx::SqlitePool,
}

/// Convert rows, logging and dropping the ones that fail.
fn convert_rows<R, T>(rows: Vec<R>, table: &'static str) -> Vec<T>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter()
        .filter_map(|row| match T::try_from(row) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(table, "skipping row: {e}");
                None
            }
        })
        .collect()
}

impl SnapshotReader {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn active_artists(&self) -> Result<Vec<ArtistRow>> {
        let rows = sqlx::query_as::<_, ArtistRow>(
            "SELECT id, name, genre FROM artists WHERE is_active = 1 ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Snapshots captured in `[start, end]`, oldest first.
    pub async fn snapshots(
        &self,
        artist_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<MetricSnapshot>> {
        let rows = sqlx::query_as::<_, SnapshotRow>(
            r#"
            SELECT artist_id, platform, captured_at, followers, monthly_listeners,
                   popularity, top_track_popularity,
                   likes, comments, shares, saves, views, audience_json
            FROM metric_snapshots
            WHERE artist_id = ? AND captured_at >= ? AND captured_at <= ?
            ORDER BY captured_at
            "#,
        )
        .bind(artist_id)
        .bind(to_millis(start))
        .bind(to_millis(end))
        .fetch_all(&self.pool)
        .await?;
        Ok(convert_rows(rows, "metric_snapshots"))
    }

    pub async fn posts(
        &self,
        artist_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SocialPost>> {
        let rows = sqlx::query_as::<_, PostRow>(
            r#"
            SELECT post_id, platform, posted_at, likes, comments, shares, saves, views
            FROM social_posts
            WHERE artist_id = ? AND posted_at >= ? AND posted_at <= ?
            ORDER BY posted_at
            "#,
        )
        .bind(artist_id)
        .bind(to_millis(start))
        .bind(to_millis(end))
        .fetch_all(&self.pool)
        .await?;
        Ok(convert_rows(rows, "social_posts"))
    }

    pub async fn fans(&self, artist_id: &str) -> Result<Vec<FanActivity>> {
        let rows = sqlx::query_as::<_, FanRow>(
            r#"
            SELECT fan_id, lifetime_streams, saves, shares, purchases,
                   streams_last_30d, streams_prior_30d, last_active_at
            FROM fan_activity
            WHERE artist_id = ?
            "#,
        )
        .bind(artist_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(convert_rows(rows, "fan_activity"))
    }

    /// Releases from other artists dated within `[from, to]`.
    pub async fn competing_releases(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<CompetingRelease>> {
        let rows = sqlx::query_as::<_, CompetingRow>(
            r#"
            SELECT artist_name, genre, release_date, followers
            FROM competing_releases
            WHERE release_date >= ? AND release_date <= ?
            ORDER BY release_date
            "#,
        )
        .bind(from.format("%Y-%m-%d").to_string())
        .bind(to.format("%Y-%m-%d").to_string())
        .fetch_all(&self.pool)
        .await?;
        Ok(convert_rows(rows, "competing_releases"))
    }

    /// Active rules for an artist. Rules with an unknown type or operator, or
    /// an unrepresentable cooldown, are logged and skipped.
    pub async fn active_rules(&self, artist_id: &str) -> Result<Vec<AlertRule>> {
        let rows = sqlx::query_as::<_, AlertRuleRow>(
            r#"
            SELECT id, owner_id, artist_id, rule_type, threshold_value, operator,
                   cooldown_hours, last_triggered_at, is_active, notify_in_app, notify_email
            FROM alert_rules
            WHERE artist_id = ? AND is_active = 1
            ORDER BY id
            "#,
        )
        .bind(artist_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(convert_rows(rows, "alert_rules"))
    }

    /// Re-read one rule. Used under the rule's lock so the cooldown check sees
    /// the latest `last_triggered_at`.
    pub async fn rule(&self, rule_id: &str) -> Result<Option<AlertRule>> {
        let row = sqlx::query_as::<_, AlertRuleRow>(
            r#"
            SELECT id, owner_id, artist_id, rule_type, threshold_value, operator,
                   cooldown_hours, last_triggered_at, is_active, notify_in_app, notify_email
            FROM alert_rules
            WHERE id = ?
            "#,
        )
        .bind(rule_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(AlertRule::try_from).transpose()
    }
}
