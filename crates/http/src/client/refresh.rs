//! Single-flight access token reissue
//!
//! Calls that fail with 401 around the same time all land here. The first
//! one to take the lock performs the reissue; anyone who was sent before
//! that reissue finished reuses its outcome instead of issuing another one.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

/// Outcome of one reissue, shared with every caller that joins it
pub(crate) type Outcome<E> = Result<String, Arc<E>>;

/// Result of asking the coordinator for a fresh token
pub(crate) enum Reissue<E> {
    /// This caller ran the reissue itself
    Performed(Outcome<E>),
    /// Another caller finished a reissue after this call was sent
    Joined(Outcome<E>),
}

#[derive(Debug)]
pub(crate) struct RefreshCoordinator<E> {
    epoch: AtomicU64,
    last: Mutex<Option<Outcome<E>>>,
}

impl<E> Default for RefreshCoordinator<E> {
    fn default() -> Self {
        Self {
            epoch: AtomicU64::new(0),
            last: Mutex::new(None),
        }
    }
}

impl<E> RefreshCoordinator<E> {
    /// Number of completed reissues; record it before sending a request
    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    /// Reissue once per epoch.
    ///
    /// `observed` is the epoch recorded when the failed call went out.
    pub(crate) async fn reissue<F, Fut>(&self, observed: u64, run: F) -> Reissue<E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<String, E>>,
    {
        let mut last = self.last.lock().await;
        if self.epoch() != observed {
            if let Some(outcome) = last.as_ref() {
                return Reissue::Joined(outcome.clone());
            }
        }

        let outcome = run().await.map_err(Arc::new);
        *last = Some(outcome.clone());
        self.epoch.fetch_add(1, Ordering::AcqRel);
        Reissue::Performed(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[tokio::test]
    async fn concurrent_callers_share_one_reissue() {
        let coordinator = Arc::new(RefreshCoordinator::<()>::default());
        let calls = Arc::new(AtomicUsize::new(0));
        let observed = coordinator.epoch();

        let tasks: Vec<_> = (0..4)
            .map(|_| {
                let coordinator = coordinator.clone();
                let calls = calls.clone();
                tokio::spawn(async move {
                    coordinator
                        .reissue(observed, move || async move {
                            calls.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
                            Ok("fresh".to_string())
                        })
                        .await
                })
            })
            .collect();

        let mut performed = 0;
        for task in tasks {
            match task.await.unwrap() {
                Reissue::Performed(result) => {
                    performed += 1;
                    assert_eq!(result.unwrap(), "fresh");
                }
                Reissue::Joined(token) => assert_eq!(token.unwrap(), "fresh"),
            }
        }

        assert_eq!(performed, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(coordinator.epoch(), 1);
    }

    #[tokio::test]
    async fn joined_failure_shares_the_original_error() {
        let coordinator = RefreshCoordinator::<&str>::default();
        let observed = coordinator.epoch();

        let first = coordinator
            .reissue(observed, || async { Err("expired") })
            .await;
        let Reissue::Performed(Err(first)) = first else {
            panic!("expected the first caller to run the reissue");
        };

        let second = coordinator
            .reissue(observed, || async { Ok("unused".to_string()) })
            .await;
        match second {
            Reissue::Joined(Err(err)) => {
                assert_eq!(*err, "expired");
                assert!(Arc::ptr_eq(&err, &first));
            }
            _ => panic!("expected to join the failed reissue"),
        }
    }

    #[tokio::test]
    async fn later_calls_reissue_again() {
        let coordinator = RefreshCoordinator::<()>::default();

        let first = coordinator
            .reissue(coordinator.epoch(), || async { Ok("a".to_string()) })
            .await;
        assert!(matches!(first, Reissue::Performed(Ok(_))));

        let second = coordinator
            .reissue(coordinator.epoch(), || async { Ok("b".to_string()) })
            .await;
        match second {
            Reissue::Performed(Ok(token)) => assert_eq!(token, "b"),
            _ => panic!("expected a second reissue"),
        }
    }
}
