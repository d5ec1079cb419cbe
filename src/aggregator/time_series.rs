use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::debug;

use crate::error::EngineError;
use crate::types::{AggregatedDayPoint, EngagementCounts, MetricSnapshot, Platform, WindowSpec};

/// Collapses raw per-platform snapshots into one point per calendar day (UTC).
///
/// Days without snapshots are omitted, never interpolated. Repeated readings of
/// one platform on one day are reduced to their truncated mean, then the
/// platforms present that day are summed. Popularity is the mean of the
/// per-platform popularity of the platforms that carry it.
pub fn aggregate(
    snapshots: &[MetricSnapshot],
    window: &WindowSpec,
) -> Result<Vec<AggregatedDayPoint>, EngineError> {
    let mut by_day: BTreeMap<NaiveDate, BTreeMap<Platform, Vec<&MetricSnapshot>>> = BTreeMap::new();
    for s in snapshots.iter().filter(|s| window.contains(s.captured_at)) {
        by_day
            .entry(s.captured_at.date_naive())
            .or_default()
            .entry(s.platform)
            .or_default()
            .push(s);
    }

    if by_day.is_empty() {
        return Err(EngineError::InsufficientData {
            what: "time series aggregation",
            needed: 1,
            got: 0,
        });
    }

    let points: Vec<AggregatedDayPoint> = by_day
        .into_iter()
        .map(|(date, platforms)| collapse_day(date, &platforms))
        .collect();

    debug!(
        snapshots = snapshots.len(),
        days = points.len(),
        window_days = window.days(),
        "aggregated snapshot series"
    );
    Ok(points)
}

/// Truncated mean of one platform's readings for a day.
fn platform_mean(readings: &[&MetricSnapshot]) -> (u64, u64, EngagementCounts, Option<f64>) {
    let n = readings.len().max(1) as u64;
    let mean = |f: fn(&MetricSnapshot) -> u64| {
        readings.iter().fold(0u64, |acc, s| acc.saturating_add(f(s))) / n
    };

    let popularity: Vec<f64> = readings.iter().filter_map(|s| s.popularity).collect();
    let popularity = if popularity.is_empty() {
        None
    } else {
        Some(popularity.iter().sum::<f64>() / popularity.len() as f64)
    };

    let engagement = EngagementCounts {
        likes: mean(|s| s.engagement.likes),
        comments: mean(|s| s.engagement.comments),
        shares: mean(|s| s.engagement.shares),
        saves: mean(|s| s.engagement.saves),
        views: mean(|s| s.engagement.views),
    };
    (mean(|s| s.followers), mean(|s| s.monthly_listeners), engagement, popularity)
}

fn collapse_day(
    date: NaiveDate,
    platforms: &BTreeMap<Platform, Vec<&MetricSnapshot>>,
) -> AggregatedDayPoint {
    let mut point = AggregatedDayPoint {
        date,
        followers: 0,
        monthly_listeners: 0,
        engagement: EngagementCounts::default(),
        popularity: None,
        snapshot_count: 0,
    };
    let mut popularity = Vec::new();

    for readings in platforms.values() {
        let (followers, listeners, e, pop) = platform_mean(readings);
        point.followers = point.followers.saturating_add(followers);
        point.monthly_listeners = point.monthly_listeners.saturating_add(listeners);
        point.engagement.likes = point.engagement.likes.saturating_add(e.likes);
        point.engagement.comments = point.engagement.comments.saturating_add(e.comments);
        point.engagement.shares = point.engagement.shares.saturating_add(e.shares);
        point.engagement.saves = point.engagement.saves.saturating_add(e.saves);
        point.engagement.views = point.engagement.views.saturating_add(e.views);
        popularity.extend(pop);
        point.snapshot_count += readings.len() as u32;
    }

    if !popularity.is_empty() {
        point.popularity = Some(popularity.iter().sum::<f64>() / popularity.len() as f64);
    }
    point
}

/// The most recent snapshot per platform among the `limit` most recent
/// snapshots, newest first. Summing these gives the artist's current audience
/// without counting one platform several times.
pub fn latest_per_platform(snapshots: &[MetricSnapshot], limit: usize) -> Vec<&MetricSnapshot> {
    let mut recent: Vec<&MetricSnapshot> = snapshots.iter().collect();
    recent.sort_by(|a, b| b.captured_at.cmp(&a.captured_at));
    recent.truncate(limit);

    let mut seen = std::collections::HashSet::new();
    recent.into_iter().filter(|s| seen.insert(s.platform)).collect()
}
