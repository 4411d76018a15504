//! A sliding-window rate limiter for outbound carrier calls.
//!
//! Process-local by design: the request-timestamp window is guarded by a
//! plain mutex, not a distributed lock. Under multi-process deployment the
//! limit degrades to slightly more permissive, which is an accepted
//! tradeoff.

use std::{collections::VecDeque, sync::Mutex, time::Duration};

use tokio::time::Instant;

/// Allows at most `max_requests` acquisitions per sliding `window`.
pub struct RateLimiter {
  max_requests: usize,
  window:       Duration,
  timestamps:   Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
  pub fn new(max_requests: usize, window: Duration) -> Self {
    Self {
      max_requests: max_requests.max(1),
      window,
      timestamps: Mutex::new(VecDeque::new()),
    }
  }

  /// Default: 30 requests per minute.
  pub fn per_minute(max_requests: usize) -> Self {
    Self::new(max_requests, Duration::from_secs(60))
  }

  /// Wait until a request slot is free, then claim it.
  pub async fn acquire(&self) {
    loop {
      let wait = {
        let mut window = self
          .timestamps
          .lock()
          .unwrap_or_else(|poisoned| poisoned.into_inner());
        let now = Instant::now();
        while window
          .front()
          .is_some_and(|&t| now.duration_since(t) >= self.window)
        {
          window.pop_front();
        }
        if window.len() < self.max_requests {
          window.push_back(now);
          return;
        }
        // Oldest entry decides when the next slot opens.
        self.window - now.duration_since(window[0])
      };
      tracing::trace!(?wait, "rate limit reached, waiting for a slot");
      tokio::time::sleep(wait).await;
    }
  }
}
