use std::sync::{Mutex, PoisonError};

use futures::{FutureExt, future::BoxFuture};

use crate::prelude::*;

type Unsubscribe = Box<dyn FnOnce() -> BoxFuture<'static, Result> + Send>;

/// Handle to an active listener registration, call [Subscription::unsubscribe] to remove it.
///
/// Unsubscribing is only done once, later calls are no-ops. Dropping the handle without
/// unsubscribing leaves the listener registered.
pub struct Subscription {
    unsubscribe: Mutex<Option<Unsubscribe>>,
}

impl Subscription {
    pub(crate) fn new<F, Fut>(unsubscribe: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result> + Send + 'static,
    {
        let unsubscribe: Unsubscribe = Box::new(move || unsubscribe().boxed());
        Self {
            unsubscribe: Mutex::new(Some(unsubscribe)),
        }
    }

    fn take(&self) -> Option<Unsubscribe> {
        self.unsubscribe
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    pub fn is_active(&self) -> bool {
        self.unsubscribe
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Remove the listener, stopping the native stream if this was the last one
    pub async fn unsubscribe(&self) -> Result {
        match self.take() {
            Some(unsubscribe) => unsubscribe().await,
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

/// The native stream didn't start, but the listener is registered and counted anyway.
///
/// Unsubscribe [StartError::subscription] to release it, otherwise the stream is never stopped.
#[derive(Debug)]
pub struct StartError {
    pub subscription: Subscription,
    pub error: anyhow::Error,
}

impl StartError {
    pub fn into_parts(self) -> (Subscription, anyhow::Error) {
        (self.subscription, self.error)
    }
}

impl std::fmt::Display for StartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.error, f)
    }
}

impl std::error::Error for StartError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    };

    use super::*;
    use tokio::test;

    #[test]
    async fn unsubscribe_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let sub = Subscription::new({
            let calls = calls.clone();
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        });

        assert!(sub.is_active());
        sub.unsubscribe().await.unwrap();
        sub.unsubscribe().await.unwrap();
        assert!(!sub.is_active());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    async fn failure_is_returned_once() {
        let sub = Subscription::new(|| async { Err(anyhow::anyhow!("stop failed")) });

        assert!(sub.unsubscribe().await.is_err());
        assert!(sub.unsubscribe().await.is_ok());
    }
}
