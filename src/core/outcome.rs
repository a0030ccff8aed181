//! Settle-all fan-out over a bounded number of in-flight calls.
//!
//! [`ConcurrencyLimiter::settle_all`] awaits every future to completion, never
//! failing fast, and hands back an [`Outcome`] of per-item results. Callers
//! partition the outcome by content; positions carry no meaning.

use std::future::Future;
use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::Semaphore;

/// Per-item results of a settle-all join.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome<T, E> {
    results: Vec<Result<T, E>>,
}

impl<T, E> Outcome<T, E> {
    /// Wrap already-settled results.
    #[must_use]
    pub const fn new(results: Vec<Result<T, E>>) -> Self {
        Self { results }
    }

    /// Number of settled items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether nothing was settled.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Number of successes.
    #[must_use]
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_ok()).count()
    }

    /// Number of failures.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.results.len() - self.success_count()
    }

    /// Split into successes and failures.
    #[must_use]
    pub fn partition(self) -> (Vec<T>, Vec<E>) {
        let mut ok = Vec::with_capacity(self.results.len());
        let mut err = Vec::new();
        for result in self.results {
            match result {
                Ok(v) => ok.push(v),
                Err(e) => err.push(e),
            }
        }
        (ok, err)
    }

    /// Apply `f` to every success.
    #[must_use]
    pub fn map_ok<U>(self, mut f: impl FnMut(T) -> U) -> Outcome<U, E> {
        Outcome {
            results: self.results.into_iter().map(|r| r.map(&mut f)).collect(),
        }
    }

    /// Apply `f` to every failure.
    #[must_use]
    pub fn map_err<F>(self, mut f: impl FnMut(E) -> F) -> Outcome<T, F> {
        Outcome {
            results: self.results.into_iter().map(|r| r.map_err(&mut f)).collect(),
        }
    }

    /// Underlying results.
    #[must_use]
    pub fn into_results(self) -> Vec<Result<T, E>> {
        self.results
    }
}

impl<T, E> FromIterator<Result<T, E>> for Outcome<T, E> {
    fn from_iter<I: IntoIterator<Item = Result<T, E>>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Bounds the number of concurrently running remote calls.
#[derive(Debug, Clone)]
pub struct ConcurrencyLimiter {
    permits: usize,
    semaphore: Arc<Semaphore>,
}

impl ConcurrencyLimiter {
    /// Limiter allowing `permits` calls in flight (minimum 1).
    #[must_use]
    pub fn new(permits: usize) -> Self {
        let permits = permits.max(1);
        Self {
            permits,
            semaphore: Arc::new(Semaphore::new(permits)),
        }
    }

    /// Configured bound.
    #[must_use]
    pub const fn permits(&self) -> usize {
        self.permits
    }

    /// Run `fut` once a permit is available.
    pub async fn run<F: Future>(&self, fut: F) -> F::Output {
        // The semaphore is never closed, so acquisition only waits.
        let _permit = self.semaphore.acquire().await.ok();
        fut.await
    }

    /// Await every future under this limiter and collect all results.
    pub async fn settle_all<I, F, T, E>(&self, futures: I) -> Outcome<T, E>
    where
        I: IntoIterator<Item = F>,
        F: Future<Output = Result<T, E>>,
    {
        let results = join_all(futures.into_iter().map(|fut| self.run(fut))).await;
        Outcome::new(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_partition_splits_results() {
        let outcome: Outcome<u32, String> =
            vec![Ok(1), Err("boom".to_string()), Ok(3)].into_iter().collect();
        assert_eq!(outcome.len(), 3);
        assert_eq!(outcome.success_count(), 2);
        assert_eq!(outcome.failure_count(), 1);

        let (ok, err) = outcome.map_ok(|v| v * 10).partition();
        assert_eq!(ok, vec![10, 30]);
        assert_eq!(err, vec!["boom".to_string()]);
    }

    #[tokio::test]
    async fn test_settle_all_never_fails_fast() {
        let limiter = ConcurrencyLimiter::new(2);
        let futures = (0..5u32).map(|i| async move {
            tokio::time::sleep(Duration::from_millis(u64::from(5 - i))).await;
            if i % 2 == 0 {
                Err(i)
            } else {
                Ok(i)
            }
        });
        let (ok, mut err) = limiter.settle_all(futures).await.partition();
        err.sort_unstable();
        assert_eq!(ok.len(), 2);
        assert_eq!(err, vec![0, 2, 4]);
    }

    #[tokio::test]
    async fn test_limiter_bounds_in_flight_calls() {
        let limiter = ConcurrencyLimiter::new(3);
        let in_flight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let futures = (0..12).map(|_| {
            let in_flight = Arc::clone(&in_flight);
            let peak = Arc::clone(&peak);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok::<_, ()>(())
            }
        });
        let outcome = limiter.settle_all(futures).await;

        assert_eq!(outcome.success_count(), 12);
        assert!(peak.load(Ordering::SeqCst) <= 3);
        assert_eq!(limiter.permits(), 3);
    }

    #[test]
    fn test_zero_permits_clamped() {
        assert_eq!(ConcurrencyLimiter::new(0).permits(), 1);
    }
}
