pub mod engine;

pub use engine::{recommend, ActionInput, ActionType, RecommendedAction, Urgency};
