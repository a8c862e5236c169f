//! Task tracking for fulfillment workers.
//!
//! Every long-running piece of work (one restaurant worker, one delivery
//! run) is spawned through the [`JobRegistry`] under a typed key. The
//! key doubles as an idempotency guard: while a job is live, spawning
//! the same key again is refused, so a replayed scheduling call or a
//! racing coordinator cannot double-start work. The registry also owns
//! the shutdown broadcast every job listens on.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tokio::sync::{Mutex, broadcast};

use common::{OrderId, RestaurantId};

use crate::Result;
use crate::config::RetryPolicy;

/// Identity of a fulfillment job.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum JobKey {
    /// Drives one restaurant's part of an order to cooked.
    Restaurant {
        order_id: OrderId,
        restaurant_id: RestaurantId,
    },
    /// Drives an order's delivery to delivered.
    Delivery { order_id: OrderId },
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobKey::Restaurant {
                order_id,
                restaurant_id,
            } => write!(f, "restaurant:{order_id}:{restaurant_id}"),
            JobKey::Delivery { order_id } => write!(f, "delivery:{order_id}"),
        }
    }
}

/// Spawns and tracks fulfillment jobs.
#[derive(Clone)]
pub struct JobRegistry {
    active: Arc<Mutex<HashSet<JobKey>>>,
    shutdown_tx: broadcast::Sender<()>,
}

impl JobRegistry {
    pub fn new() -> Self {
        let (shutdown_tx, _) = broadcast::channel(1);
        Self {
            active: Arc::new(Mutex::new(HashSet::new())),
            shutdown_tx,
        }
    }

    /// A receiver that fires when [`shutdown`](Self::shutdown) is called.
    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    /// Signals every live job to wind down.
    pub fn shutdown(&self) {
        // No receivers just means no jobs are listening yet.
        let _ = self.shutdown_tx.send(());
    }

    /// Spawns `job` under `key` unless a job with that key is live.
    /// Returns whether the job was actually started.
    pub async fn spawn<F>(&self, key: JobKey, job: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        if !self.active.lock().await.insert(key.clone()) {
            tracing::debug!(job = %key, "job already live, skipping spawn");
            return false;
        }
        let active = Arc::clone(&self.active);
        tokio::spawn(async move {
            job.await;
            active.lock().await.remove(&key);
        });
        true
    }

    pub async fn active_count(&self) -> usize {
        self.active.lock().await.len()
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs `op`, retrying failures that [`is_retryable`] reports as
/// transient, with the policy's backoff between attempts. Fatal errors
/// and exhausted attempts surface the last error unchanged.
///
/// [`is_retryable`]: crate::FulfillmentError::is_retryable
pub async fn retry_external<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                let delay = policy.delay_for(attempt);
                metrics::counter!("fulfillment_external_retries_total").increment(1);
                tracing::warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "external call failed, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    use crate::FulfillmentError;

    fn key() -> JobKey {
        JobKey::Delivery {
            order_id: OrderId::new(),
        }
    }

    #[tokio::test]
    async fn duplicate_key_is_refused_while_live() {
        let registry = JobRegistry::new();
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();
        let key = key();

        assert!(
            registry
                .spawn(key.clone(), async move {
                    let _ = release_rx.await;
                })
                .await
        );
        assert!(!registry.spawn(key.clone(), async {}).await);
        assert_eq!(registry.active_count().await, 1);

        release_tx.send(()).unwrap();
        // Give the finished task a moment to deregister itself.
        tokio::task::yield_now().await;
        while registry.active_count().await != 0 {
            tokio::task::yield_now().await;
        }
        assert!(registry.spawn(key, async {}).await);
    }

    #[tokio::test]
    async fn shutdown_reaches_every_subscriber() {
        let registry = JobRegistry::new();
        let mut first = registry.subscribe_shutdown();
        let mut second = registry.subscribe_shutdown();

        registry.shutdown();

        first.recv().await.unwrap();
        second.recv().await.unwrap();
    }

    #[test]
    fn job_keys_render_their_identity() {
        let order_id = OrderId::new();
        let restaurant_id = RestaurantId::new();
        assert_eq!(
            JobKey::Restaurant {
                order_id,
                restaurant_id
            }
            .to_string(),
            format!("restaurant:{order_id}:{restaurant_id}")
        );
        assert_eq!(
            JobKey::Delivery { order_id }.to_string(),
            format!("delivery:{order_id}")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn retry_backs_off_until_success() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let result = retry_external(&policy, || {
            let attempt = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if attempt < 3 {
                    Err(FulfillmentError::ExternalCall {
                        provider: "silpo".to_string(),
                        reason: "timeout".to_string(),
                    })
                } else {
                    Ok(attempt)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gives_up_after_max_attempts() {
        let policy = RetryPolicy::new(3, Duration::from_millis(10), Duration::from_secs(1));
        let calls = AtomicU32::new(0);

        let err = retry_external::<u32, _, _>(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(FulfillmentError::ExternalCall {
                    provider: "uklon".to_string(),
                    reason: "unreachable".to_string(),
                })
            }
        })
        .await
        .unwrap_err();

        assert!(err.is_retryable());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn fatal_errors_are_not_retried() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);

        let err = retry_external::<u32, _, _>(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(FulfillmentError::UnsupportedProvider("glovo".to_string()))
            }
        })
        .await
        .unwrap_err();

        assert!(matches!(err, FulfillmentError::UnsupportedProvider(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
