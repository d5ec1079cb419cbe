pub mod dispatch;
pub mod evaluator;
pub mod handlers;
pub mod rules;

pub use dispatch::{dispatch, NotificationDispatcher};
pub use evaluator::{evaluate, log_evaluation, Evaluation, TriggeredAlert};
pub use handlers::AlertContext;
pub use rules::{Alert, AlertRule, AlertSeverity, ComparisonOperator, Notification, NotificationChannel, RuleType};
