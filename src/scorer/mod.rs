pub mod calendar;
pub mod fan_value;
pub mod momentum;
pub mod release_date;
pub mod revenue;
pub mod superfan;

pub use fan_value::{FvsInput, FvsResult};
pub use momentum::{MomentumFactors, MomentumInput, MomentumResult, MomentumStatus};
pub use release_date::{ReleaseContext, ReleaseScoreResult, Recommendation};
pub use revenue::{ForecastInput, MonthlyRevenue, RevenueForecast, Scenario};
pub use superfan::{FanTier, SegmentReport};
