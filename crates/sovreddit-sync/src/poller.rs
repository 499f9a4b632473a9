//! Bounded polling for the visible effect of an accepted command.
//!
//! Acceptance by the sequencer and visibility on the read path are separate
//! events. The poller waits on a [`ConfirmationPolicy`] schedule and asks a
//! lookup whether the effect has landed yet.

use backoff::backoff::Backoff;
use std::future::Future;
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::error::{SyncError, SyncResult};
use crate::policy::ConfirmationPolicy;

/// Poll `lookup` until it yields a value or the policy is exhausted.
///
/// Lookup errors count as misses.
pub async fn await_effect<T, F, Fut>(policy: &ConfirmationPolicy, lookup: F) -> SyncResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SyncResult<Option<T>>>,
{
    let (_keep_open, never) = watch::channel(false);
    await_effect_until(policy, lookup, never).await
}

/// Like [`await_effect`], but stops with [`SyncError::Abandoned`] once `cancel`
/// flips to `true`.
pub async fn await_effect_until<T, F, Fut>(
    policy: &ConfirmationPolicy,
    mut lookup: F,
    mut cancel: watch::Receiver<bool>,
) -> SyncResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SyncResult<Option<T>>>,
{
    let mut schedule = policy.backoff();

    while let Some(wait) = schedule.next_backoff() {
        let attempt = schedule.issued();

        tokio::select! {
            _ = sleep(wait) => {}
            _ = cancelled(&mut cancel) => return Err(SyncError::Abandoned),
        }

        let found = tokio::select! {
            found = lookup() => found,
            _ = cancelled(&mut cancel) => return Err(SyncError::Abandoned),
        };

        match found {
            Ok(Some(value)) => {
                debug!("Effect visible on attempt {}/{}", attempt, policy.attempts);
                return Ok(value);
            }
            Ok(None) => debug!("Effect not visible on attempt {}/{}", attempt, policy.attempts),
            Err(e) => warn!("Lookup failed on attempt {}/{}: {}", attempt, policy.attempts, e),
        }
    }

    Err(SyncError::NotConfirmed {
        attempts: schedule.issued(),
    })
}

/// Resolves once cancellation is requested; never resolves if the sender is gone.
async fn cancelled(cancel: &mut watch::Receiver<bool>) {
    let closed = cancel.wait_for(|stop| *stop).await.is_err();
    if closed {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::time::Instant;

    fn default_policy() -> ConfirmationPolicy {
        ConfirmationPolicy::new(3, Duration::from_millis(5000), Duration::from_millis(5000))
    }

    #[tokio::test(start_paused = true)]
    async fn test_budget_exhausted_after_three_misses() {
        let start = Instant::now();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let result: SyncResult<String> = await_effect(&default_policy(), || {
            let seen = seen.clone();
            async move {
                seen.lock().unwrap().push(start.elapsed());
                Ok(None)
            }
        })
        .await;

        assert!(matches!(result, Err(SyncError::NotConfirmed { attempts: 3 })));
        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                Duration::from_secs(5),
                Duration::from_secs(15),
                Duration::from_secs(30)
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_attempt_hit_skips_third() {
        let calls = Arc::new(AtomicU32::new(0));

        let result = await_effect(&default_policy(), || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Ok(if n == 2 { Some("alice") } else { None })
            }
        })
        .await;

        assert_eq!(result.unwrap(), "alice");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_lookup_errors_count_as_misses() {
        let calls = Arc::new(AtomicU32::new(0));

        let result = await_effect(&default_policy(), || {
            let calls = calls.clone();
            async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n == 1 {
                    Err(SyncError::Network("read path down".to_string()))
                } else {
                    Ok(Some(n))
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_wait_abandons() {
        let calls = Arc::new(AtomicU32::new(0));
        let (cancel_tx, cancel_rx) = watch::channel(false);

        let lookup_calls = calls.clone();
        let poll = tokio::spawn(async move {
            await_effect_until(
                &default_policy(),
                move || {
                    let calls = lookup_calls.clone();
                    async move {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok::<Option<u32>, SyncError>(None)
                    }
                },
                cancel_rx,
            )
            .await
        });

        sleep(Duration::from_secs(7)).await;
        cancel_tx.send(true).unwrap();

        let result = poll.await.unwrap();
        assert!(matches!(result, Err(SyncError::Abandoned)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_already_cancelled_never_looks_up() {
        let (_cancel_tx, cancel_rx) = watch::channel(true);
        let calls = AtomicU32::new(0);

        let result: SyncResult<u32> = await_effect_until(
            &default_policy(),
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(Some(1)) }
            },
            cancel_rx,
        )
        .await;

        assert!(matches!(result, Err(SyncError::Abandoned)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
