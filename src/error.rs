use thiserror::Error;

/// Failures raised by the scoring core.
///
/// Only boundary validation and rule parsing surface these to callers.
/// Sparse or missing data is always absorbed into a neutral default inside
/// the scorers; `InsufficientData` and `DivisionGuard` are returned by the
/// low-level helpers so each scorer can pick its own fallback.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("insufficient data for {what}: need {needed}, got {got}")]
    InsufficientData {
        what: &'static str,
        needed: usize,
        got: usize,
    },

    #[error("invalid window: {0}")]
    InvalidWindow(String),

    #[error("zero denominator in {0}")]
    DivisionGuard(&'static str),

    #[error("unknown rule type: {0}")]
    UnknownRuleType(String),

    #[error("unknown comparison operator: {0}")]
    UnknownOperator(String),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Database migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;
