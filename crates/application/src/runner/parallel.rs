//! Bounded-concurrency dispatch with an optional token-bucket rate gate.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinSet;
use tokio::time::Instant;

/// Token bucket gating dispatch so the average rate stays at or below
/// `calls_per_sec`. Capacity equals one second of tokens, refill is
/// continuous, and the bucket starts with a single token: the first
/// dispatch is free, and `n` dispatches take at least `(n - 1) / rate`
/// seconds. Bursts up to capacity only accrue over idle time.
#[derive(Debug)]
pub struct TokenBucket {
    rate: f64,
    capacity: f64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: f64,
    refilled_at: Instant,
}

impl TokenBucket {
    /// Creates a bucket allowing `calls_per_sec` dispatches per second on
    /// average.
    pub fn new(calls_per_sec: f64) -> Self {
        Self {
            rate: calls_per_sec,
            capacity: calls_per_sec,
            state: Mutex::new(BucketState {
                tokens: 1.0_f64.min(calls_per_sec),
                refilled_at: Instant::now(),
            }),
        }
    }

    /// Takes one token, sleeping until the bucket refills enough.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut state = self.state.lock().await;
                let now = Instant::now();
                let elapsed = now.duration_since(state.refilled_at).as_secs_f64();
                state.tokens = (state.tokens + elapsed * self.rate).min(self.capacity);
                state.refilled_at = now;
                if state.tokens >= 1.0 {
                    state.tokens -= 1.0;
                    return;
                }
                (1.0 - state.tokens) / self.rate
            };
            tokio::time::sleep(Duration::from_secs_f64(wait)).await;
        }
    }
}

/// Result of one parallel invocation, tagged with its original index.
#[derive(Debug)]
pub struct ParallelOutcome<T> {
    /// Index of the invocation in dispatch order.
    pub index: usize,
    /// `None` when cancellation prevented the invocation from starting.
    pub result: Option<T>,
}

/// Runs `count` invocations with at most `max_concurrency` in flight,
/// optionally gated by `calls_per_sec`.
///
/// Results are returned in *completion* order; callers merging saved
/// variables apply them in that order (last completion wins). When the
/// `cancelled` signal turns true, pending invocations are not dispatched
/// and come back with `result: None`.
pub async fn run_parallel<T, F, Fut>(
    count: usize,
    max_concurrency: usize,
    calls_per_sec: Option<f64>,
    cancelled: Arc<dyn Fn() -> bool + Send + Sync>,
    make_job: F,
) -> Vec<ParallelOutcome<T>>
where
    T: Send + 'static,
    F: Fn(usize) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(max_concurrency.max(1)));
    let bucket = calls_per_sec.map(|rate| Arc::new(TokenBucket::new(rate)));

    let mut join_set: JoinSet<ParallelOutcome<T>> = JoinSet::new();
    for index in 0..count {
        let semaphore = Arc::clone(&semaphore);
        let bucket = bucket.clone();
        let cancelled = Arc::clone(&cancelled);
        let job = make_job(index);
        join_set.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .expect("semaphore never closed");
            if cancelled() {
                return ParallelOutcome {
                    index,
                    result: None,
                };
            }
            if let Some(bucket) = &bucket {
                bucket.acquire().await;
            }
            if cancelled() {
                return ParallelOutcome {
                    index,
                    result: None,
                };
            }
            ParallelOutcome {
                index,
                result: Some(job.await),
            }
        });
    }

    let mut outcomes = Vec::with_capacity(count);
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok(outcome) => outcomes.push(outcome),
            Err(e) => tracing::warn!("parallel invocation panicked: {e}"),
        }
    }
    outcomes
}
