use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Sliding-window limiter keyed by client address. Clients with no hits left
/// in the window are forgotten.
#[derive(Debug, Clone)]
pub struct SearchRateLimiter {
    hits: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
    window: Duration,
    max_requests: usize,
}

impl SearchRateLimiter {
    pub fn new(window: Duration, max_requests: usize) -> Self {
        Self {
            hits: Arc::new(Mutex::new(HashMap::new())),
            window,
            max_requests: max_requests.max(1),
        }
    }

    /// `Ok(())` records the hit; `Err(wait)` says how long until a slot frees up.
    pub fn check(&self, key: &str) -> Result<(), Duration> {
        self.check_at(key, Instant::now())
    }

    fn check_at(&self, key: &str, now: Instant) -> Result<(), Duration> {
        let window = self.window;
        let mut guard = self.hits.lock();
        guard.retain(|_, queue| {
            while queue
                .front()
                .is_some_and(|front| now.duration_since(*front) >= window)
            {
                queue.pop_front();
            }
            !queue.is_empty()
        });

        let queue = guard.entry(key.to_string()).or_default();

        if queue.len() >= self.max_requests {
            let oldest = queue.front().copied().unwrap_or(now);
            return Err(self.window.saturating_sub(now.duration_since(oldest)));
        }

        queue.push_back(now);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_after_max_within_window() {
        let limiter = SearchRateLimiter::new(Duration::from_secs(60), 2);
        let now = Instant::now();

        assert!(limiter.check_at("1.2.3.4", now).is_ok());
        assert!(limiter.check_at("1.2.3.4", now).is_ok());
        let wait = limiter
            .check_at("1.2.3.4", now + Duration::from_secs(15))
            .unwrap_err();
        assert_eq!(wait, Duration::from_secs(45));

        assert!(limiter.check_at("5.6.7.8", now).is_ok());
    }

    #[test]
    fn window_expiry_frees_slots() {
        let limiter = SearchRateLimiter::new(Duration::from_secs(10), 1);
        let now = Instant::now();

        assert!(limiter.check_at("k", now).is_ok());
        assert!(limiter.check_at("k", now + Duration::from_secs(5)).is_err());
        assert!(limiter.check_at("k", now + Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn drained_clients_are_forgotten() {
        let limiter = SearchRateLimiter::new(Duration::from_secs(10), 5);
        let now = Instant::now();

        for client in 0..50 {
            assert!(limiter.check_at(&format!("10.0.0.{client}"), now).is_ok());
        }
        assert_eq!(limiter.hits.lock().len(), 50);

        assert!(limiter.check_at("k", now + Duration::from_secs(10)).is_ok());
        assert_eq!(limiter.hits.lock().len(), 1);
    }
}
