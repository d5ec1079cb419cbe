use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::aggregator::stats::EPSILON;
use crate::error::EngineError;

// ---------------------------------------------------------------------------
// Rule type
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleType {
    MomentumSpike,
    MomentumDrop,
    FvsThreshold,
    FollowerMilestone,
    ViralPost,
    EngagementDrop,
    SuperfanChurn,
    GrowthStall,
}

impl RuleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RuleType::MomentumSpike => "momentum_spike",
            RuleType::MomentumDrop => "momentum_drop",
            RuleType::FvsThreshold => "fvs_threshold",
            RuleType::FollowerMilestone => "follower_milestone",
            RuleType::ViralPost => "viral_post",
            RuleType::EngagementDrop => "engagement_drop",
            RuleType::SuperfanChurn => "superfan_churn",
            RuleType::GrowthStall => "growth_stall",
        }
    }

    pub fn severity(&self) -> AlertSeverity {
        match self {
            RuleType::MomentumDrop | RuleType::SuperfanChurn => AlertSeverity::Critical,
            RuleType::EngagementDrop | RuleType::GrowthStall => AlertSeverity::Warning,
            RuleType::MomentumSpike
            | RuleType::FvsThreshold
            | RuleType::FollowerMilestone
            | RuleType::ViralPost => AlertSeverity::Info,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            RuleType::MomentumSpike => "Momentum spike",
            RuleType::MomentumDrop => "Momentum drop",
            RuleType::FvsThreshold => "Fan Value Score threshold",
            RuleType::FollowerMilestone => "Follower milestone reached",
            RuleType::ViralPost => "Viral post detected",
            RuleType::EngagementDrop => "Engagement drop",
            RuleType::SuperfanChurn => "Superfan churn risk",
            RuleType::GrowthStall => "Growth stall",
        }
    }
}

impl std::fmt::Display for RuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RuleType {
    type Err = EngineError;

    /// Accepts `momentum_spike` and `MOMENTUM_SPIKE` spellings.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "momentum_spike" => RuleType::MomentumSpike,
            "momentum_drop" => RuleType::MomentumDrop,
            "fvs_threshold" => RuleType::FvsThreshold,
            "follower_milestone" => RuleType::FollowerMilestone,
            "viral_post" => RuleType::ViralPost,
            "engagement_drop" => RuleType::EngagementDrop,
            "superfan_churn" => RuleType::SuperfanChurn,
            "growth_stall" => RuleType::GrowthStall,
            _ => return Err(EngineError::UnknownRuleType(s.to_string())),
        })
    }
}

// ---------------------------------------------------------------------------
// Comparator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComparisonOperator {
    Gt,
    Gte,
    Lt,
    Lte,
    Eq,
}

impl ComparisonOperator {
    pub fn compare(&self, value: f64, threshold: f64) -> bool {
        match self {
            ComparisonOperator::Gt => value > threshold,
            ComparisonOperator::Gte => value >= threshold,
            ComparisonOperator::Lt => value < threshold,
            ComparisonOperator::Lte => value <= threshold,
            ComparisonOperator::Eq => (value - threshold).abs() < EPSILON,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            ComparisonOperator::Gt => ">",
            ComparisonOperator::Gte => ">=",
            ComparisonOperator::Lt => "<",
            ComparisonOperator::Lte => "<=",
            ComparisonOperator::Eq => "=",
        }
    }
}

impl std::fmt::Display for ComparisonOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ComparisonOperator::Gt => "gt",
            ComparisonOperator::Gte => "gte",
            ComparisonOperator::Lt => "lt",
            ComparisonOperator::Lte => "lte",
            ComparisonOperator::Eq => "eq",
        };
        write!(f, "{s}")
    }
}

impl FromStr for ComparisonOperator {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "gt" | ">" => ComparisonOperator::Gt,
            "gte" | ">=" => ComparisonOperator::Gte,
            "lt" | "<" => ComparisonOperator::Lt,
            "lte" | "<=" => ComparisonOperator::Lte,
            "eq" | "=" | "==" => ComparisonOperator::Eq,
            _ => return Err(EngineError::UnknownOperator(s.to_string())),
        })
    }
}

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRule {
    pub id: String,
    pub owner_id: String,
    pub artist_id: String,
    pub rule_type: RuleType,
    pub threshold_value: f64,
    pub operator: ComparisonOperator,
    pub cooldown_hours: i64,
    /// Written only by the evaluator.
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub notify_in_app: bool,
    pub notify_email: bool,
}

impl AlertRule {
    /// True while `now` is within `cooldown_hours` of the last trigger. A
    /// cooldown too long to represent never expires.
    pub fn is_cooling_down(&self, now: DateTime<Utc>) -> bool {
        match (self.last_triggered_at, Duration::try_hours(self.cooldown_hours)) {
            (None, _) => false,
            (Some(last), Some(cooldown)) => now - last <= cooldown,
            (Some(_), None) => true,
        }
    }

    /// `None` when the rule never fired or the end is past the representable range.
    pub fn cooldown_ends_at(&self) -> Option<DateTime<Utc>> {
        let last = self.last_triggered_at?;
        last.checked_add_signed(Duration::try_hours(self.cooldown_hours)?)
    }
}

// ---------------------------------------------------------------------------
// Alert output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for AlertSeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: String,
    pub rule_id: String,
    pub owner_id: String,
    pub artist_id: String,
    pub rule_type: RuleType,
    pub severity: AlertSeverity,
    pub title: String,
    pub message: String,
    pub metric_value: f64,
    pub threshold_value: f64,
    pub triggered_at: DateTime<Utc>,
    /// Set by the user collaborator.
    pub resolved_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    InApp,
    Email,
}

impl std::fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotificationChannel::InApp => write!(f, "in_app"),
            NotificationChannel::Email => write!(f, "email"),
        }
    }
}

/// One message for one channel, produced alongside an [`Alert`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub user_id: String,
    pub alert_id: String,
    pub channel: NotificationChannel,
    pub title: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    /// Set by the user collaborator.
    pub read_at: Option<DateTime<Utc>>,
}
