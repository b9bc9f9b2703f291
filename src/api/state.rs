use std::sync::Arc;

use crate::engine::Ledger;
use crate::health::HealthMonitor;

use super::rate_limit::RateLimiter;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub monitor: Arc<HealthMonitor>,
    pub rate_limiter: Arc<RateLimiter>,
    pub realm_id: String,
}

impl AppState {
    pub fn new(ledger: Arc<Ledger>, monitor: Arc<HealthMonitor>, realm_id: String) -> Self {
        AppState {
            ledger,
            monitor,
            rate_limiter: Arc::new(RateLimiter::default()),
            realm_id,
        }
    }
}
