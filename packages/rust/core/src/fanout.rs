//! Bounded per-candidate fan-out with deterministic, in-order merge.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinError;

/// Run `work` for every item on its own task, at most `concurrency` at a
/// time. Results come back in input order. A task that panicked or was
/// cancelled yields `Err` with a description instead of aborting the batch.
pub async fn fan_out<T, R, F, Fut>(items: Vec<T>, concurrency: usize, work: F) -> Vec<Result<R, String>>
where
    T: Send + 'static,
    R: Send + 'static,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut handles = Vec::with_capacity(items.len());

    for item in items {
        let sem = semaphore.clone();
        let task = work(item);
        handles.push(tokio::spawn(async move {
            // The semaphore is never closed, so the permit is always granted.
            let _permit = sem.acquire_owned().await;
            task.await
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        results.push(handle.await.map_err(describe_join_error));
    }
    results
}

fn describe_join_error(e: JoinError) -> String {
    if e.is_panic() {
        let payload = e.into_panic();
        let detail = payload
            .downcast_ref::<&str>()
            .map(|s| (*s).to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".into());
        format!("worker panicked: {detail}")
    } else {
        "worker was cancelled".into()
    }
}
