use tracing::debug;

use crate::alerts::TriggeredAlert;
use crate::db::models::to_millis;
use crate::error::Result;
use crate::scorer::superfan::SegmentReport;
use crate::scorer::{FvsResult, MomentumFactors, MomentumResult, ReleaseScoreResult, RevenueForecast};

/// Persists scorer results and fired alerts.
#[derive(Clone)]
pub struct ResultWriter {
    pool: sqlx::SqlitePool,
}

impl ResultWriter {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn write_momentum(&self, m: &MomentumResult) -> Result<()> {
        let strategy = match m.factors {
            MomentumFactors::TimeSeries { .. } => "time_series",
            MomentumFactors::Snapshot { .. } => "snapshot",
        };
        let factors_json = serde_json::to_string(&m.factors)?;

        sqlx::query(
            r#"
            INSERT INTO momentum_results (
                artist_id, strategy, overall, status, factors_json, window_days, computed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&m.artist_id)
        .bind(strategy)
        .bind(m.overall)
        .bind(m.status.to_string())
        .bind(factors_json)
        .bind(i64::from(m.window_days))
        .bind(to_millis(m.computed_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn write_fvs(&self, f: &FvsResult) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO fvs_results (
                artist_id, overall, engagement, growth, reach, conversion, window_days, computed_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&f.artist_id)
        .bind(f.overall)
        .bind(f.engagement)
        .bind(f.growth)
        .bind(f.reach)
        .bind(f.conversion)
        .bind(i64::from(f.window_days))
        .bind(to_millis(f.computed_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// One row per (month, scenario), written atomically.
    pub async fn write_forecast(&self, forecast: &RevenueForecast) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let computed_at = to_millis(forecast.computed_at);
        for m in &forecast.months {
            sqlx::query(
                r#"
                INSERT INTO revenue_forecasts (
                    artist_id, month_index, year, month, scenario,
                    streaming_revenue, concert_revenue, merch_revenue, sync_revenue, total_revenue,
                    confidence, margin_of_error, used_fallback, computed_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&forecast.artist_id)
            .bind(i64::from(m.month_index))
            .bind(i64::from(m.year))
            .bind(i64::from(m.month))
            .bind(m.scenario.to_string())
            .bind(m.streaming_revenue)
            .bind(m.concert_revenue)
            .bind(m.merch_revenue)
            .bind(m.sync_revenue)
            .bind(m.total_revenue)
            .bind(m.confidence)
            .bind(m.margin_of_error)
            .bind(forecast.used_fallback)
            .bind(computed_at)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(artist_id = %forecast.artist_id, rows = forecast.months.len(), "forecast persisted");
        Ok(())
    }

    pub async fn write_release_scores(&self, scores: &[ReleaseScoreResult]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for s in scores {
            let factors_json = serde_json::to_string(&s.factors)?;
            let details_json = serde_json::to_string(&serde_json::json!({
                "major_competitors": s.major_competitors,
                "advantages": s.advantages,
                "risks": s.risks,
                "recommendation_text": s.recommendation_text,
            }))?;
            sqlx::query(
                r#"
                INSERT INTO release_scores (
                    artist_id, release_date, overall, factors_json, competing_release_count,
                    predicted_first_week_streams, ci_low, ci_high, recommendation,
                    details_json, computed_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&s.artist_id)
            .bind(s.date.format("%Y-%m-%d").to_string())
            .bind(s.overall)
            .bind(factors_json)
            .bind(s.competing_release_count as i64)
            .bind(s.predicted_first_week_streams as i64)
            .bind(s.confidence_interval.0 as i64)
            .bind(s.confidence_interval.1 as i64)
            .bind(s.recommendation.to_string())
            .bind(details_json)
            .bind(to_millis(s.computed_at))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn write_segments(&self, report: &SegmentReport) -> Result<()> {
        let report_json = serde_json::to_string(report)?;
        sqlx::query(
            r#"
            INSERT INTO superfan_reports (artist_id, total_fans, churn_rate_pct, report_json, computed_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&report.artist_id)
        .bind(report.total_fans as i64)
        .bind(report.churn_rate_pct)
        .bind(report_json)
        .bind(to_millis(report.computed_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Insert the alert and stamp the rule's `last_triggered_at` in one
    /// transaction.
    pub async fn record_trigger(&self, triggered: &TriggeredAlert) -> Result<()> {
        let a = &triggered.alert;
        let triggered_at = to_millis(a.triggered_at);
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO alerts (
                id, rule_id, owner_id, artist_id, rule_type, severity, title, message,
                metric_value, threshold_value, triggered_at, resolved_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL)
            "#,
        )
        .bind(&a.id)
        .bind(&a.rule_id)
        .bind(&a.owner_id)
        .bind(&a.artist_id)
        .bind(a.rule_type.as_str())
        .bind(a.severity.to_string())
        .bind(&a.title)
        .bind(&a.message)
        .bind(a.metric_value)
        .bind(a.threshold_value)
        .bind(triggered_at)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE alert_rules SET last_triggered_at = ? WHERE id = ?")
            .bind(triggered_at)
            .bind(&a.rule_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::{evaluate, AlertContext, Evaluation};
    use crate::db::{test_pool, SnapshotReader};
    use crate::scorer::{fan_value, momentum, revenue, superfan, FvsInput, ForecastInput};
    use chrono::{NaiveDate, TimeZone, Utc};

    #[tokio::test]
    async fn trigger_persists_alert_and_cooldown_stamp() {
        let pool = test_pool().await;
        sqlx::query("INSERT INTO artists (id, name, created_at) VALUES ('a1', 'A', 0)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "INSERT INTO alert_rules (id, owner_id, artist_id, rule_type, threshold_value, operator) VALUES ('r1', 'u1', 'a1', 'growth_stall', 3, 'lt')",
        )
        .execute(&pool)
        .await
        .unwrap();

        let reader = SnapshotReader::new(pool.clone());
        let writer = ResultWriter::new(pool.clone());
        let mut rule = reader.rule("r1").await.unwrap().unwrap();
        // neutral momentum on an empty series is 5, so flip to gt to fire
        rule.operator = crate::alerts::ComparisonOperator::Gt;

        let now = Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap();
        let ctx = AlertContext {
            artist_id: "a1",
            series: &[],
            snapshots: &[],
            posts: &[],
            fans: &[],
            window_days: 30,
            now,
        };
        let Evaluation::Triggered(t) = evaluate(&mut rule, &ctx) else {
            panic!("expected trigger");
        };
        writer.record_trigger(&t).await.unwrap();

        let stored = reader.rule("r1").await.unwrap().unwrap();
        assert_eq!(stored.last_triggered_at, Some(now));
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM alerts WHERE rule_id = 'r1'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn results_round_trip_into_tables() {
        let pool = test_pool().await;
        let writer = ResultWriter::new(pool.clone());

        let m = momentum::score_series("a1", &[], &[], 30);
        writer.write_momentum(&m).await.unwrap();

        let fvs = fan_value::score(
            "a1",
            &FvsInput {
                series: &[],
                snapshots: &[],
                posts: &[],
                window_days: 30,
            },
        );
        writer.write_fvs(&fvs).await.unwrap();

        let forecast = revenue::forecast(
            "a1",
            &ForecastInput {
                history: &[],
                momentum: None,
                as_of: NaiveDate::from_ymd_opt(2024, 8, 1).unwrap(),
            },
            3,
        )
        .unwrap();
        writer.write_forecast(&forecast).await.unwrap();

        let report = superfan::segment("a1", &[], Utc::now());
        writer.write_segments(&report).await.unwrap();

        let (forecast_rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM revenue_forecasts")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(forecast_rows, 9);

        let (strategy, status): (String, String) =
            sqlx::query_as("SELECT strategy, status FROM momentum_results")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(strategy, "time_series");
        assert_eq!(status, m.status.to_string());
    }
}
