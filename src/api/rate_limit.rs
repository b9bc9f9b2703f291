use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Fixed-window rate limiter keyed by actor. Intent submissions only;
/// reads and subscriptions are never limited.
pub struct RateLimiter {
    max_requests: usize,
    window: Duration,
    requests: Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        RateLimiter {
            max_requests,
            window,
            requests: Mutex::new(HashMap::new()),
        }
    }

    /// Ok when allowed; Err carries seconds until the next free slot.
    pub async fn check(&self, actor_key: &str) -> Result<(), u64> {
        let mut map = self.requests.lock().await;
        let now = Instant::now();
        let entry = map.entry(actor_key.to_string()).or_default();

        while entry
            .front()
            .is_some_and(|t| now.duration_since(*t) > self.window)
        {
            entry.pop_front();
        }

        if entry.len() >= self.max_requests {
            let oldest = entry.front().expect("non-empty at capacity");
            let retry_after =
                self.window.as_secs() - now.duration_since(*oldest).as_secs();
            return Err(retry_after.max(1));
        }

        entry.push_back(now);
        Ok(())
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        RateLimiter::new(60, Duration::from_secs(60))
    }
}
