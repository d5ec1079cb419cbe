pub mod stats;
pub mod time_series;

pub use time_series::{aggregate, latest_per_platform};
