use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, Semaphore, SemaphorePermit};

#[derive(Clone, Debug, Default)]
pub struct Limits {
    pub requests_per_min: Option<u64>,
    pub concurrency: Option<u32>,
}

/// Caps in-flight requests and, optionally, requests per minute. Clones share state.
#[derive(Clone, Debug)]
pub struct RateLimiter {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    limits: Limits,
    // token bucket modeled by the current tokens and the time of last refill
    rpm_tokens: Mutex<(f64, Instant)>,
    sem: Option<Semaphore>,
}

/// Held for the duration of one request; dropping it releases the concurrency slot.
pub struct RatePermit<'a> {
    _permit: Option<SemaphorePermit<'a>>,
}

impl RateLimiter {
    pub fn new(limits: Limits) -> Self {
        let now = Instant::now();
        let rpm_capacity = limits.requests_per_min.unwrap_or(0) as f64;
        let sem = limits.concurrency.map(|c| Semaphore::new(c.max(1) as usize));
        Self {
            inner: Arc::new(Inner {
                limits,
                rpm_tokens: Mutex::new((rpm_capacity, now)),
                sem,
            }),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(Limits::default())
    }

    /// Wait for a concurrency slot and a request token.
    pub async fn acquire(&self) -> RatePermit<'_> {
        // Concurrency first; a closed semaphore degrades to no limit
        let permit = match &self.inner.sem {
            Some(sem) => sem.acquire().await.ok(),
            None => None,
        };

        if let Some(rpm) = self.inner.limits.requests_per_min {
            if rpm > 0 {
                self.consume_token(rpm as f64, 60.0).await;
            }
        }

        RatePermit { _permit: permit }
    }

    /// Slots currently free, or `None` when concurrency is unbounded.
    pub fn available_slots(&self) -> Option<usize> {
        self.inner.sem.as_ref().map(|s| s.available_permits())
    }

    async fn consume_token(&self, capacity: f64, period_secs: f64) {
        // Basic token bucket: refill continuously, wait until a token accumulates
        loop {
            let mut guard = self.inner.rpm_tokens.lock().await;
            let (ref mut tokens, ref mut last) = *guard;
            let now = Instant::now();
            let elapsed = now.duration_since(*last).as_secs_f64();
            let refill_rate = capacity / period_secs;
            *tokens = (*tokens + elapsed * refill_rate).min(capacity);
            *last = now;
            if *tokens >= 1.0 {
                *tokens -= 1.0;
                break;
            }
            let secs = (1.0 - *tokens) / refill_rate;
            drop(guard);
            tokio::time::sleep(Duration::from_secs_f64(secs.max(0.001))).await;
        }
    }
}
