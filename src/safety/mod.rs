pub mod anomaly;
pub mod breaker;
pub mod fund;

pub use anomaly::{Anomaly, AnomalyBreaker, AnomalyConfig, SeriesDetector};
pub use breaker::{BreakerConfig, CircuitBreaker, ResetReport, TripReport};
pub use fund::{DistributionReport, FundConfig, FundState, GuaranteeFund};
