use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::alerts::handlers::{handler_for, AlertContext};
use crate::alerts::rules::{Alert, AlertRule, Notification, NotificationChannel};

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Records produced by one rule firing. The caller persists and dispatches them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriggeredAlert {
    pub alert: Alert,
    /// Present when the rule has `notify_in_app`.
    pub in_app: Option<Notification>,
    /// Present when the rule has `notify_email`; queued, not sent.
    pub email: Option<Notification>,
}

impl TriggeredAlert {
    pub fn notifications(&self) -> impl Iterator<Item = &Notification> {
        self.in_app.iter().chain(self.email.iter())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    Inactive,
    CoolingDown { until: DateTime<Utc> },
    ConditionUnmet { value: f64 },
    /// No handler is registered for the rule's type.
    Unhandled,
    Triggered(Box<TriggeredAlert>),
}

// ---------------------------------------------------------------------------
// Evaluation
// ---------------------------------------------------------------------------

/// Evaluate one rule. On trigger `rule.last_triggered_at` is set to `ctx.now`.
///
/// The caller must hold the rule's lock from before this call until the new
/// `last_triggered_at` is persisted.
pub fn evaluate(rule: &mut AlertRule, ctx: &AlertContext<'_>) -> Evaluation {
    if !rule.is_active {
        return Evaluation::Inactive;
    }
    if rule.is_cooling_down(ctx.now) {
        let until = rule.cooldown_ends_at().unwrap_or(DateTime::<Utc>::MAX_UTC);
        return Evaluation::CoolingDown { until };
    }

    let Some(handler) = handler_for(rule.rule_type) else {
        return Evaluation::Unhandled;
    };
    let measurement = handler(ctx);
    if !rule.operator.compare(measurement.value, rule.threshold_value) {
        return Evaluation::ConditionUnmet {
            value: measurement.value,
        };
    }

    rule.last_triggered_at = Some(ctx.now);

    let alert_id = format!("{}-{}", rule.id, ctx.now.timestamp_millis());
    let title = format!("{}: {}", rule.rule_type.title(), rule.artist_id);
    let message = format!(
        "{} ({} {} {})",
        measurement.detail,
        measurement.value,
        rule.operator.symbol(),
        rule.threshold_value
    );

    let alert = Alert {
        id: alert_id.clone(),
        rule_id: rule.id.clone(),
        owner_id: rule.owner_id.clone(),
        artist_id: rule.artist_id.clone(),
        rule_type: rule.rule_type,
        severity: rule.rule_type.severity(),
        title: title.clone(),
        message: message.clone(),
        metric_value: measurement.value,
        threshold_value: rule.threshold_value,
        triggered_at: ctx.now,
        resolved_at: None,
    };

    let notification = |channel| Notification {
        user_id: rule.owner_id.clone(),
        alert_id: alert_id.clone(),
        channel,
        title: title.clone(),
        message: message.clone(),
        created_at: ctx.now,
        read_at: None,
    };
    let in_app = rule.notify_in_app.then(|| notification(NotificationChannel::InApp));
    let email = rule.notify_email.then(|| notification(NotificationChannel::Email));

    Evaluation::Triggered(Box::new(TriggeredAlert { alert, in_app, email }))
}

/// Log a non-trigger outcome, or the trigger itself, for one rule.
pub fn log_evaluation(rule: &AlertRule, outcome: &Evaluation) {
    match outcome {
        Evaluation::Triggered(t) => {
            info!(
                rule_id = %rule.id,
                artist_id = %rule.artist_id,
                rule_type = %rule.rule_type,
                severity = %t.alert.severity,
                value = t.alert.metric_value,
                "alert triggered"
            );
        }
        Evaluation::CoolingDown { until } => {
            debug!(rule_id = %rule.id, %until, "rule cooling down");
        }
        Evaluation::ConditionUnmet { value } => {
            debug!(rule_id = %rule.id, value, "rule condition unmet");
        }
        Evaluation::Unhandled => {
            warn!(rule_id = %rule.id, rule_type = %rule.rule_type, "no handler for rule type");
        }
        Evaluation::Inactive => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::rules::{AlertSeverity, ComparisonOperator, RuleType};
    use crate::types::{EngagementCounts, MetricSnapshot, Platform};
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap()
    }

    fn milestone_rule() -> AlertRule {
        AlertRule {
            id: "rule-1".to_string(),
            owner_id: "user-1".to_string(),
            artist_id: "artist-1".to_string(),
            rule_type: RuleType::FollowerMilestone,
            threshold_value: 100_000.0,
            operator: ComparisonOperator::Gte,
            cooldown_hours: 24,
            last_triggered_at: None,
            is_active: true,
            notify_in_app: true,
            notify_email: false,
        }
    }

    fn snapshots(followers: u64) -> Vec<MetricSnapshot> {
        vec![MetricSnapshot {
            artist_id: "artist-1".to_string(),
            platform: Platform::Spotify,
            captured_at: now() - Duration::hours(1),
            followers,
            monthly_listeners: 0,
            popularity: None,
            top_track_popularity: None,
            engagement: EngagementCounts::default(),
            audience: None,
        }]
    }

    fn ctx_at<'a>(snaps: &'a [MetricSnapshot], at: DateTime<Utc>) -> AlertContext<'a> {
        AlertContext {
            artist_id: "artist-1",
            series: &[],
            snapshots: snaps,
            posts: &[],
            fans: &[],
            window_days: 30,
            now: at,
        }
    }

    #[test]
    fn milestone_fires_exactly_once_within_cooldown() {
        let snaps = snapshots(100_001);
        let mut rule = milestone_rule();

        let first = evaluate(&mut rule, &ctx_at(&snaps, now()));
        let Evaluation::Triggered(t) = first else {
            panic!("expected trigger");
        };
        assert_eq!(t.alert.metric_value, 100_001.0);
        assert_eq!(t.alert.severity, AlertSeverity::Info);
        assert!(t.in_app.is_some());
        assert!(t.email.is_none());
        assert_eq!(rule.last_triggered_at, Some(now()));

        let second = evaluate(&mut rule, &ctx_at(&snaps, now() + Duration::minutes(5)));
        assert!(matches!(second, Evaluation::CoolingDown { .. }));
        assert_eq!(rule.last_triggered_at, Some(now()));
    }

    #[test]
    fn cooldown_one_hour_ago_blocks() {
        let snaps = snapshots(150_000);
        let mut rule = milestone_rule();
        rule.last_triggered_at = Some(now() - Duration::hours(1));
        let outcome = evaluate(&mut rule, &ctx_at(&snaps, now()));
        assert_eq!(
            outcome,
            Evaluation::CoolingDown {
                until: now() + Duration::hours(23)
            }
        );
        assert_eq!(rule.last_triggered_at, Some(now() - Duration::hours(1)));
    }

    #[test]
    fn cooldown_elapsed_fires_and_updates() {
        let snaps = snapshots(150_000);
        let mut rule = milestone_rule();
        rule.last_triggered_at = Some(now() - Duration::hours(25));

        let fired = evaluate(&mut rule, &ctx_at(&snaps, now()));
        assert!(matches!(fired, Evaluation::Triggered(_)));
        assert_eq!(rule.last_triggered_at, Some(now()));

        let again = evaluate(&mut rule, &ctx_at(&snaps, now() + Duration::hours(1)));
        assert!(matches!(again, Evaluation::CoolingDown { .. }));
    }

    #[test]
    fn oversized_cooldown_blocks_without_panicking() {
        let snaps = snapshots(150_000);
        let mut rule = milestone_rule();
        rule.cooldown_hours = 10_000_000_000_000;
        rule.last_triggered_at = Some(now() - Duration::days(400));

        let outcome = evaluate(&mut rule, &ctx_at(&snaps, now()));
        assert_eq!(outcome, Evaluation::CoolingDown { until: DateTime::<Utc>::MAX_UTC });
        assert_eq!(rule.last_triggered_at, Some(now() - Duration::days(400)));
    }

    #[test]
    fn unmet_and_inactive_leave_rule_untouched() {
        let snaps = snapshots(99_999);
        let mut rule = milestone_rule();
        assert_eq!(
            evaluate(&mut rule, &ctx_at(&snaps, now())),
            Evaluation::ConditionUnmet { value: 99_999.0 }
        );
        assert!(rule.last_triggered_at.is_none());

        let rich = snapshots(500_000);
        rule.is_active = false;
        assert_eq!(evaluate(&mut rule, &ctx_at(&rich, now())), Evaluation::Inactive);
        assert!(rule.last_triggered_at.is_none());
    }

    #[test]
    fn email_channel_is_queued_alongside_in_app() {
        let snaps = snapshots(200_000);
        let mut rule = milestone_rule();
        rule.notify_email = true;
        let Evaluation::Triggered(t) = evaluate(&mut rule, &ctx_at(&snaps, now())) else {
            panic!("expected trigger");
        };
        let channels: Vec<NotificationChannel> = t.notifications().map(|n| n.channel).collect();
        assert_eq!(channels, vec![NotificationChannel::InApp, NotificationChannel::Email]);
        assert!(t.notifications().all(|n| n.user_id == "user-1" && n.alert_id == t.alert.id));
    }

    #[test]
    fn growth_stall_on_decelerating_series() {
        use crate::types::AggregatedDayPoint;
        use chrono::NaiveDate;

        let series: Vec<AggregatedDayPoint> = (0..14)
            .map(|i| AggregatedDayPoint {
                date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap() + Duration::days(i),
                // losses widen every day
                followers: (10_000 - 10 * i * i) as u64,
                monthly_listeners: 20_000,
                engagement: EngagementCounts::default(),
                popularity: None,
                snapshot_count: 1,
            })
            .collect();
        let mut rule = milestone_rule();
        rule.rule_type = RuleType::GrowthStall;
        rule.operator = ComparisonOperator::Lt;
        rule.threshold_value = 3.0;

        let ctx = AlertContext {
            series: &series,
            ..ctx_at(&[], now())
        };
        let outcome = evaluate(&mut rule, &ctx);
        assert!(matches!(outcome, Evaluation::Triggered(_)), "{outcome:?}");
    }
}
