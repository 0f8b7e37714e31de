//! Bounded-concurrency batch executor with a global deadline (C5).
//!
//! Each task is wrapped in its own `tokio::time::timeout` against a shared
//! deadline instant, then run under a counting semaphore that caps how many
//! tasks are in flight at once. Results are returned in submission order
//! (input order), never execution order — a timed-out or panicking task
//! contributes `None` at its slot rather than failing the batch.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::Instant;

/// Runs `tasks` with at most `max_concurrency` in flight, giving the whole
/// batch `deadline` to finish. If `max_concurrency` is `0` it is treated as 1
/// (the orchestrator is responsible for substituting a sane default before
/// calling in).
pub async fn execute_batch<T, F, Fut>(
    tasks: Vec<F>,
    max_concurrency: usize,
    deadline: Duration,
) -> Vec<Option<T>>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    let max_concurrency = max_concurrency.max(1);
    let semaphore = Arc::new(Semaphore::new(max_concurrency));
    let deadline_instant = Instant::now() + deadline;

    let mut handles = Vec::with_capacity(tasks.len());
    for task in tasks {
        let semaphore = semaphore.clone();
        handles.push(tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await.ok()?;
            let remaining = deadline_instant.saturating_duration_since(Instant::now());
            match tokio::time::timeout(remaining, task()).await {
                Ok(value) => Some(value),
                Err(_) => None,
            }
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.unwrap_or(None));
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration as StdDuration;

    #[tokio::test]
    async fn preserves_input_order() {
        let tasks: Vec<_> = (0..10)
            .map(|i| move || async move { i })
            .collect();

        let results = execute_batch(tasks, 4, StdDuration::from_secs(5)).await;
        let expected: Vec<Option<i32>> = (0..10).map(Some).collect();
        assert_eq!(results, expected);
    }

    #[tokio::test]
    async fn slow_tasks_contribute_none_past_deadline() {
        let tasks: Vec<Box<dyn FnOnce() -> futures_util::future::BoxFuture<'static, u32> + Send>> = vec![
            Box::new(|| Box::pin(async { 1 })),
            Box::new(|| {
                Box::pin(async {
                    tokio::time::sleep(StdDuration::from_millis(200)).await;
                    2
                })
            }),
        ];

        let results = execute_batch(tasks, 2, StdDuration::from_millis(30)).await;
        assert_eq!(results[0], Some(1));
        assert_eq!(results[1], None);
    }

    #[tokio::test]
    async fn never_exceeds_concurrency_bound() {
        let in_flight = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let in_flight = in_flight.clone();
                let max_seen = max_seen.clone();
                move || async move {
                    let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                    max_seen.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(StdDuration::from_millis(15)).await;
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                }
            })
            .collect();

        execute_batch(tasks, 4, StdDuration::from_secs(5)).await;
        assert!(max_seen.load(Ordering::SeqCst) <= 4);
    }
}
