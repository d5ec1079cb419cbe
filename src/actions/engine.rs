use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::config::actions::{BACKUP_POPULARITY, MIN_DATA_POINTS, STALE_SNAPSHOT_DAYS};
use crate::scorer::{MomentumResult, MomentumStatus};
use crate::types::{AggregatedDayPoint, MetricSnapshot};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Urgency::Low => "low",
            Urgency::Medium => "medium",
            Urgency::High => "high",
            Urgency::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    StartTracking,
    ImproveDataQuality,
    Investigate,
    Capitalize,
    CaptureFreshData,
    BackupData,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionType::StartTracking => "start_tracking",
            ActionType::ImproveDataQuality => "improve_data_quality",
            ActionType::Investigate => "investigate",
            ActionType::Capitalize => "capitalize",
            ActionType::CaptureFreshData => "capture_fresh_data",
            ActionType::BackupData => "backup_data",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendedAction {
    pub action_type: ActionType,
    pub urgency: Urgency,
    pub title: String,
    pub description: String,
}

impl RecommendedAction {
    fn new(action_type: ActionType, urgency: Urgency, title: &str, description: String) -> Self {
        Self {
            action_type,
            urgency,
            title: title.to_string(),
            description,
        }
    }
}

/// Current state of one artist as seen by the action rules.
pub struct ActionInput<'a> {
    pub snapshots: &'a [MetricSnapshot],
    pub series: &'a [AggregatedDayPoint],
    pub momentum: Option<&'a MomentumResult>,
    pub snapshot_momentum: Option<&'a MomentumResult>,
    pub now: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

/// Next-best actions, most urgent first, at most one per action type.
pub fn recommend(input: &ActionInput<'_>) -> Vec<RecommendedAction> {
    let mut actions = Vec::new();

    if input.snapshots.is_empty() {
        actions.push(RecommendedAction::new(
            ActionType::StartTracking,
            Urgency::Critical,
            "Start tracking",
            "No metric history exists yet. Connect platforms to begin collecting snapshots."
                .to_string(),
        ));
    } else if input.series.len() < MIN_DATA_POINTS {
        actions.push(RecommendedAction::new(
            ActionType::ImproveDataQuality,
            Urgency::Medium,
            "Improve data quality",
            format!(
                "Only {} days of data in the window; scores need at least {MIN_DATA_POINTS}.",
                input.series.len()
            ),
        ));
    }

    if let Some(m) = input.momentum {
        if m.status == MomentumStatus::Declining {
            actions.push(RecommendedAction::new(
                ActionType::Investigate,
                Urgency::High,
                "Investigate declining momentum",
                format!("Momentum is {:.1}/10 and declining. Review recent releases and posting cadence.", m.overall),
            ));
        }
    }

    if let Some(m) = input.snapshot_momentum {
        if m.is_on_fire() {
            actions.push(RecommendedAction::new(
                ActionType::Capitalize,
                Urgency::Critical,
                "Capitalize on momentum",
                format!("Momentum is {:.1}/10. Push new content and promotion while attention is high.", m.overall),
            ));
        }
    }

    let latest = input.snapshots.iter().max_by_key(|s| s.captured_at);
    if let Some(latest) = latest {
        if input.now - latest.captured_at > Duration::days(STALE_SNAPSHOT_DAYS) {
            actions.push(RecommendedAction::new(
                ActionType::CaptureFreshData,
                Urgency::Medium,
                "Capture fresh data",
                format!(
                    "Last snapshot is {} days old.",
                    (input.now - latest.captured_at).num_days()
                ),
            ));
        }
        if latest.popularity.is_some_and(|p| p >= BACKUP_POPULARITY) {
            actions.push(RecommendedAction::new(
                ActionType::BackupData,
                Urgency::Low,
                "Back up data",
                "Popularity is at a peak. Export a snapshot of current metrics.".to_string(),
            ));
        }
    }

    let mut seen = std::collections::HashSet::new();
    actions.retain(|a| seen.insert(a.action_type));
    actions.sort_by(|a, b| b.urgency.cmp(&a.urgency));
    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scorer::momentum;
    use crate::types::{EngagementCounts, Platform};
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 8, 1, 12, 0, 0).unwrap()
    }

    fn snap(hours_ago: i64, popularity: Option<f64>) -> MetricSnapshot {
        MetricSnapshot {
            artist_id: "a".to_string(),
            platform: Platform::Spotify,
            captured_at: now() - Duration::hours(hours_ago),
            followers: 1_000,
            monthly_listeners: 5_000,
            popularity,
            top_track_popularity: popularity,
            engagement: EngagementCounts::default(),
            audience: None,
        }
    }

    fn days(n: i64) -> Vec<AggregatedDayPoint> {
        (0..n)
            .map(|i| AggregatedDayPoint {
                date: NaiveDate::from_ymd_opt(2024, 7, 1).unwrap() + Duration::days(i),
                followers: 1_000,
                monthly_listeners: 5_000,
                engagement: EngagementCounts::default(),
                popularity: None,
                snapshot_count: 1,
            })
            .collect()
    }

    fn types(actions: &[RecommendedAction]) -> Vec<ActionType> {
        actions.iter().map(|a| a.action_type).collect()
    }

    #[test]
    fn no_history_means_start_tracking_only() {
        let actions = recommend(&ActionInput {
            snapshots: &[],
            series: &[],
            momentum: None,
            snapshot_momentum: None,
            now: now(),
        });
        assert_eq!(types(&actions), vec![ActionType::StartTracking]);
        assert_eq!(actions[0].urgency, Urgency::Critical);
    }

    #[test]
    fn sorted_by_urgency_and_deduplicated() {
        let stale_hot = vec![snap(24 * 5, Some(95.0)), snap(24 * 6, Some(90.0))];
        let series = days(3);
        let hot = momentum::score_snapshot("a", &stale_hot[0], Some(&stale_hot[1]));
        assert!(hot.is_on_fire());

        let actions = recommend(&ActionInput {
            snapshots: &stale_hot,
            series: &series,
            momentum: None,
            snapshot_momentum: Some(&hot),
            now: now(),
        });
        assert_eq!(
            types(&actions),
            vec![
                ActionType::Capitalize,
                ActionType::ImproveDataQuality,
                ActionType::CaptureFreshData,
                ActionType::BackupData,
            ]
        );
        let urgencies: Vec<Urgency> = actions.iter().map(|a| a.urgency).collect();
        assert!(urgencies.windows(2).all(|w| w[0] >= w[1]));
    }

    #[test]
    fn declining_momentum_is_investigated() {
        let fresh = vec![snap(2, Some(40.0))];
        let series = days(10);
        let mut declining = momentum::score_series("a", &series, &[], 30);
        declining.status = MomentumStatus::Declining;

        let actions = recommend(&ActionInput {
            snapshots: &fresh,
            series: &series,
            momentum: Some(&declining),
            snapshot_momentum: None,
            now: now(),
        });
        assert_eq!(types(&actions), vec![ActionType::Investigate]);
        assert_eq!(actions[0].urgency, Urgency::High);
    }

    #[test]
    fn healthy_fresh_artist_needs_nothing() {
        let fresh = vec![snap(1, Some(50.0))];
        let series = days(14);
        let actions = recommend(&ActionInput {
            snapshots: &fresh,
            series: &series,
            momentum: None,
            snapshot_momentum: None,
            now: now(),
        });
        assert!(actions.is_empty());
    }
}
