use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use tracing::{debug, error, info, warn};

use crate::actions::{self, ActionInput, RecommendedAction};
use crate::aggregator::{aggregate, latest_per_platform};
use crate::alerts::{self, AlertContext, Evaluation, NotificationDispatcher};
use crate::config::{Config, HISTORY_LOOKBACK_DAYS, RECENT_SNAPSHOT_COUNT};
use crate::db::models::ArtistRow;
use crate::db::{ResultWriter, SnapshotReader};
use crate::error::{AppError, Result};
use crate::scorer::{
    fan_value, momentum, release_date, revenue, superfan, ForecastInput, FvsInput, MomentumInput,
    MomentumResult, ReleaseContext,
};
use crate::state::{ResultCache, RuleLocks};
use crate::types::{AggregatedDayPoint, MetricSnapshot, WindowSpec};

/// Outcome of scoring one artist in one cycle.
#[derive(Debug, Clone)]
pub struct ArtistReport {
    pub artist_id: String,
    pub momentum: f64,
    pub fvs: f64,
    pub alerts_fired: usize,
    pub actions: Vec<RecommendedAction>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleSummary {
    pub artists: usize,
    pub scored: usize,
    pub failed: usize,
    pub alerts_fired: usize,
}

/// Background task that scores every active artist each cycle, persists the
/// results and evaluates alert rules.
pub struct AnalyticsRunner<D> {
    cfg: Config,
    reader: SnapshotReader,
    writer: ResultWriter,
    dispatcher: D,
    cache: Arc<ResultCache>,
    locks: Arc<RuleLocks>,
}

impl<D: NotificationDispatcher> AnalyticsRunner<D> {
    pub fn new(cfg: Config, pool: sqlx::SqlitePool, dispatcher: D) -> Self {
        let cache = ResultCache::new(cfg.result_ttl_hours);
        Self {
            reader: SnapshotReader::new(pool.clone()),
            writer: ResultWriter::new(pool),
            dispatcher,
            cache,
            locks: RuleLocks::new(),
            cfg,
        }
    }

    pub async fn run(self) {
        let mut interval = tokio::time::interval(Duration::from_secs(self.cfg.cycle_interval_secs));
        interval.tick().await; // consume immediate first tick

        loop {
            interval.tick().await;
            if let Err(e) = self.run_cycle(Utc::now()).await {
                error!("Cycle error: {e}");
            }
        }
    }

    /// Score all active artists with bounded parallelism. One artist's failure
    /// is logged and does not affect the others.
    pub async fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleSummary> {
        let artists = self.reader.active_artists().await?;
        let mut summary = CycleSummary {
            artists: artists.len(),
            ..Default::default()
        };

        let outcomes: Vec<(String, Result<ArtistReport>)> = stream::iter(artists)
            .map(|artist| async move {
                let outcome = self.score_artist(&artist, now).await;
                (artist.id, outcome)
            })
            .buffer_unordered(self.cfg.max_concurrent_artists)
            .collect()
            .await;

        for (artist_id, outcome) in outcomes {
            match outcome {
                Ok(report) => {
                    summary.scored += 1;
                    summary.alerts_fired += report.alerts_fired;
                }
                Err(e) => {
                    summary.failed += 1;
                    warn!(%artist_id, "artist scoring failed: {e}");
                }
            }
        }

        let (forecasts, releases) = self.cache.evict_expired(now);
        debug!(forecasts, releases, "evicted expired cache entries");

        info!(
            artists = summary.artists,
            scored = summary.scored,
            failed = summary.failed,
            alerts = summary.alerts_fired,
            "scoring cycle complete"
        );
        Ok(summary)
    }

    pub async fn score_artist(&self, artist: &ArtistRow, now: DateTime<Utc>) -> Result<ArtistReport> {
        let artist_id = artist.id.as_str();
        let window = WindowSpec::new(i64::from(self.cfg.scoring_window_days), now)?;
        let lookback = WindowSpec::new(i64::from(HISTORY_LOOKBACK_DAYS), now)?;

        let history_snaps = self.reader.snapshots(artist_id, lookback.start(), now).await?;
        let window_snaps: Vec<MetricSnapshot> = history_snaps
            .iter()
            .filter(|s| window.contains(s.captured_at))
            .cloned()
            .collect();
        let posts = self.reader.posts(artist_id, window.start(), now).await?;
        let fans = self.reader.fans(artist_id).await?;

        // An empty window is not an error: every scorer falls back to neutral.
        let series = aggregate(&window_snaps, &window).unwrap_or_default();
        let history = aggregate(&history_snaps, &lookback).unwrap_or_default();

        let momentum = momentum::score(
            artist_id,
            MomentumInput::TimeSeries {
                series: &series,
                posts: &posts,
                window_days: window.days(),
            },
        );
        let snapshot_momentum = snapshot_momentum(artist_id, &history_snaps);
        let fvs = fan_value::score(
            artist_id,
            &FvsInput {
                series: &series,
                snapshots: &window_snaps,
                posts: &posts,
                window_days: window.days(),
            },
        );
        let segments = superfan::segment(artist_id, &fans, now);

        self.writer.write_momentum(&momentum).await?;
        if let Some(snap) = &snapshot_momentum {
            self.writer.write_momentum(snap).await?;
        }
        self.writer.write_fvs(&fvs).await?;
        self.writer.write_segments(&segments).await?;

        tolerate_engine_error(
            artist_id,
            "revenue forecast",
            self.refresh_forecast(artist_id, &history, &momentum, now).await,
        )?;
        tolerate_engine_error(
            artist_id,
            "release scores",
            self.refresh_release_scores(artist, &history, &history_snaps, &momentum, now)
                .await,
        )?;

        let ctx = AlertContext {
            artist_id,
            series: &series,
            snapshots: &window_snaps,
            posts: &posts,
            fans: &fans,
            window_days: window.days(),
            now,
        };
        let alerts_fired = self.evaluate_rules(artist_id, &ctx).await?;

        let actions = actions::recommend(&ActionInput {
            snapshots: &history_snaps,
            series: &series,
            momentum: Some(&momentum),
            snapshot_momentum: snapshot_momentum.as_ref(),
            now,
        });
        for action in &actions {
            info!(
                artist_id,
                action = %action.action_type,
                urgency = %action.urgency,
                "{}",
                action.title
            );
        }

        debug!(
            artist_id,
            momentum = momentum.overall,
            status = %momentum.status,
            fvs = fvs.overall,
            churn_pct = segments.churn_rate_pct,
            "artist scored"
        );

        Ok(ArtistReport {
            artist_id: artist_id.to_string(),
            momentum: momentum.overall,
            fvs: fvs.overall,
            alerts_fired,
            actions,
        })
    }

    async fn refresh_forecast(
        &self,
        artist_id: &str,
        history: &[AggregatedDayPoint],
        momentum: &MomentumResult,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.cache.forecast(artist_id, now).is_some() {
            debug!(artist_id, "forecast cached");
            return Ok(());
        }
        let forecast = revenue::forecast(
            artist_id,
            &ForecastInput {
                history,
                momentum: Some(momentum.overall),
                as_of: now.date_naive(),
            },
            self.cfg.forecast_months,
        )?;
        self.writer.write_forecast(&forecast).await?;
        self.cache.store_forecast(&forecast, now);
        Ok(())
    }

    async fn refresh_release_scores(
        &self,
        artist: &ArtistRow,
        history: &[AggregatedDayPoint],
        history_snaps: &[MetricSnapshot],
        momentum: &MomentumResult,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if self.cache.release_scores(&artist.id, now).is_some() {
            debug!(artist_id = %artist.id, "release scores cached");
            return Ok(());
        }
        let today = now.date_naive();
        let horizon = today + chrono::Duration::weeks(i64::from(self.cfg.release_weeks_ahead) + 1);
        let competing = self.reader.competing_releases(today, horizon).await?;
        let monthly_listeners: u64 = latest_per_platform(history_snaps, RECENT_SNAPSHOT_COUNT)
            .iter()
            .map(|s| s.monthly_listeners)
            .sum();

        let ctx = ReleaseContext {
            artist_id: &artist.id,
            genre: artist.genre.as_deref(),
            momentum,
            history,
            competing: &competing,
            monthly_listeners,
        };
        let scores = release_date::score_dates(&ctx, today, self.cfg.release_weeks_ahead)?;
        self.writer.write_release_scores(&scores).await?;
        self.cache.store_release_scores(&artist.id, &scores, now);
        Ok(())
    }

    /// Each rule is re-read and evaluated under its own lock so that two
    /// workers cannot both pass the cooldown check.
    async fn evaluate_rules(&self, artist_id: &str, ctx: &AlertContext<'_>) -> Result<usize> {
        let rules = self.reader.active_rules(artist_id).await?;
        let mut fired = 0;

        for listed in &rules {
            let _guard = self.locks.acquire(&listed.id).await;
            let mut rule = match self.reader.rule(&listed.id).await {
                Ok(Some(rule)) => rule,
                Ok(None) => continue,
                Err(e) => {
                    warn!(rule_id = %listed.id, "skipping rule: {e}");
                    continue;
                }
            };

            let outcome = alerts::evaluate(&mut rule, ctx);
            alerts::log_evaluation(&rule, &outcome);
            if let Evaluation::Triggered(triggered) = outcome {
                self.writer.record_trigger(&triggered).await?;
                alerts::dispatch(&self.dispatcher, &triggered).await;
                fired += 1;
            }
        }

        self.locks.retain_active(rules.iter().map(|r| r.id.as_str()));
        Ok(fired)
    }
}

/// A computation error skips one result and leaves the rest of the artist's
/// cycle, alert rules included, running. Storage errors still fail the artist.
fn tolerate_engine_error(artist_id: &str, what: &str, res: Result<()>) -> Result<()> {
    match res {
        Err(AppError::Engine(e)) => {
            warn!(artist_id, what, "skipped: {e}");
            Ok(())
        }
        other => other,
    }
}

/// Instantaneous momentum from the newest snapshot and the previous reading
/// on the same platform.
fn snapshot_momentum(artist_id: &str, snapshots: &[MetricSnapshot]) -> Option<MomentumResult> {
    let current = snapshots.iter().max_by_key(|s| s.captured_at)?;
    let previous = snapshots
        .iter()
        .filter(|s| s.platform == current.platform && s.captured_at < current.captured_at)
        .max_by_key(|s| s.captured_at);
    Some(momentum::score(artist_id, MomentumInput::Snapshot { current, previous }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::to_millis;
    use crate::db::{test_pool, SqliteNotifier};
    use chrono::TimeZone;

    fn cfg() -> Config {
        Config {
            log_level: "debug".to_string(),
            db_path: ":memory:".to_string(),
            scoring_window_days: 30,
            forecast_months: 6,
            release_weeks_ahead: 4,
            cycle_interval_secs: 3_600,
            max_concurrent_artists: 2,
            result_ttl_hours: 24,
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap()
    }

    async fn seed(pool: &sqlx::SqlitePool) {
        sqlx::query("INSERT INTO artists (id, name, genre, created_at) VALUES ('a1', 'Rising', 'pop', 0)")
            .execute(pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO artists (id, name, genre, created_at) VALUES ('a2', 'Empty', NULL, 0)")
            .execute(pool)
            .await
            .unwrap();
        for day in 0..40i64 {
            sqlx::query(
                "INSERT INTO metric_snapshots (artist_id, platform, captured_at, followers, monthly_listeners, popularity) VALUES ('a1', 'spotify', ?, ?, ?, 60)",
            )
            .bind(to_millis(now() - chrono::Duration::days(day) - chrono::Duration::hours(1)))
            .bind(120_000 - day * 100)
            .bind(50_000 - day * 50)
            .execute(pool)
            .await
            .unwrap();
        }
        sqlx::query(
            "INSERT INTO alert_rules (id, owner_id, artist_id, rule_type, threshold_value, operator, notify_email) VALUES ('r1', 'u1', 'a1', 'FOLLOWER_MILESTONE', 100000, 'gte', 1)",
        )
        .execute(pool)
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn cycle_scores_every_artist_and_fires_once() {
        let pool = test_pool().await;
        seed(&pool).await;
        let runner = AnalyticsRunner::new(cfg(), pool.clone(), SqliteNotifier::new(pool.clone()));

        let first = runner.run_cycle(now()).await.unwrap();
        assert_eq!(
            first,
            CycleSummary {
                artists: 2,
                scored: 2,
                failed: 0,
                alerts_fired: 1
            }
        );

        let second = runner.run_cycle(now() + chrono::Duration::hours(1)).await.unwrap();
        assert_eq!(second.alerts_fired, 0);

        let (notes,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM notifications")
            .fetch_one(&pool)
            .await
            .unwrap();
        let (emails,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM email_queue")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!((notes, emails), (1, 1));
    }

    #[tokio::test]
    async fn cached_results_are_not_rewritten_within_ttl() {
        let pool = test_pool().await;
        seed(&pool).await;
        let runner = AnalyticsRunner::new(cfg(), pool.clone(), SqliteNotifier::new(pool.clone()));

        runner.run_cycle(now()).await.unwrap();
        runner.run_cycle(now() + chrono::Duration::hours(2)).await.unwrap();

        let (forecast_batches,): (i64,) =
            sqlx::query_as("SELECT COUNT(DISTINCT artist_id || ':' || computed_at) FROM revenue_forecasts")
                .fetch_one(&pool)
                .await
                .unwrap();
        let (release_rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM release_scores")
            .fetch_one(&pool)
            .await
            .unwrap();
        // two artists, one batch each; four Fridays per artist
        assert_eq!(forecast_batches, 2);
        assert_eq!(release_rows, 8);

        let (momentum_rows,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM momentum_results WHERE artist_id = 'a1'")
                .fetch_one(&pool)
                .await
                .unwrap();
        // time-series and snapshot variants, both cycles
        assert_eq!(momentum_rows, 4);
    }

    #[tokio::test]
    async fn bad_rule_row_does_not_stop_the_cycle() {
        let pool = test_pool().await;
        seed(&pool).await;
        sqlx::query(
            "INSERT INTO alert_rules (id, owner_id, artist_id, rule_type, threshold_value, operator, cooldown_hours, last_triggered_at) VALUES ('r0', 'u1', 'a1', 'MOMENTUM_DROP', 10, 'lt', 10000000000000, ?)",
        )
        .bind(to_millis(now() - chrono::Duration::days(30)))
        .execute(&pool)
        .await
        .unwrap();
        let runner = AnalyticsRunner::new(cfg(), pool.clone(), SqliteNotifier::new(pool.clone()));

        let summary = runner.run_cycle(now()).await.unwrap();
        assert_eq!((summary.scored, summary.failed, summary.alerts_fired), (2, 0, 1));
    }

    #[test]
    fn engine_errors_are_tolerated_storage_errors_are_not() {
        use crate::error::EngineError;
        let engine = Err(AppError::Engine(EngineError::InvalidWindow("weeks".to_string())));
        assert!(tolerate_engine_error("a1", "release scores", engine).is_ok());

        let storage = Err(AppError::Config("disk".to_string()));
        assert!(tolerate_engine_error("a1", "release scores", storage).is_err());
    }

    #[test]
    fn snapshot_momentum_pairs_same_platform() {
        use crate::types::{EngagementCounts, Platform};
        let snap = |hours: i64, platform, followers| MetricSnapshot {
            artist_id: "a".to_string(),
            platform,
            captured_at: now() - chrono::Duration::hours(hours),
            followers,
            monthly_listeners: 0,
            popularity: Some(50.0),
            top_track_popularity: None,
            engagement: EngagementCounts::default(),
            audience: None,
        };
        let snaps = vec![
            snap(48, Platform::Spotify, 1_000),
            snap(30, Platform::Instagram, 9_000),
            snap(1, Platform::Spotify, 1_100),
        ];
        let result = snapshot_momentum("a", &snaps).unwrap();
        assert_eq!(result.window_days, 1);
        assert!(snapshot_momentum("a", &[]).is_none());
    }
}
