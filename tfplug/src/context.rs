//! Request-scoped cancellation and deadlines
//!
//! Every provider, resource and data source call receives a `Context`. The
//! server cancels the shared root context on StopProvider, and long-running
//! operations (provisioning waits) can select on [`Context::cancelled`].

use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::time;

/// Context carries cancellation signals and deadlines across async boundaries
/// Pass this as first parameter to ALL async trait methods
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    deadline: Option<Instant>,
    done_tx: watch::Sender<bool>,
}

impl Context {
    pub fn new() -> Self {
        let (done_tx, _) = watch::channel(false);

        Self {
            inner: Arc::new(ContextInner {
                deadline: None,
                done_tx,
            }),
        }
    }

    /// Derive a context that is cancelled after `timeout`, or when `self` is
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now() + timeout;
        let deadline = match self.inner.deadline {
            Some(parent) if parent < deadline => parent,
            _ => deadline,
        };

        let (done_tx, _) = watch::channel(*self.inner.done_tx.borrow());
        let child_tx = done_tx.clone();
        let mut parent_rx = self.inner.done_tx.subscribe();

        tokio::spawn(async move {
            let parent_done = async {
                // a dropped parent can no longer cancel us
                if parent_rx.wait_for(|done| *done).await.is_err() {
                    std::future::pending::<()>().await;
                }
            };
            tokio::select! {
                _ = time::sleep_until(deadline.into()) => {}
                _ = parent_done => {}
            }
            child_tx.send_replace(true);
        });

        Self {
            inner: Arc::new(ContextInner {
                deadline: Some(deadline),
                done_tx,
            }),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.inner.done_tx.borrow()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Completes once the context has been cancelled or its deadline passed
    pub async fn cancelled(&self) {
        let mut rx = self.inner.done_tx.subscribe();
        let _ = rx.wait_for(|done| *done).await;
    }

    pub fn cancel(&self) {
        self.inner.done_tx.send_replace(true);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn context_timeout_cancels() {
        let ctx = Context::new().with_timeout(Duration::from_millis(100));

        assert!(!ctx.is_cancelled());

        sleep(Duration::from_millis(150)).await;

        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn context_manual_cancel() {
        let ctx = Context::new();

        assert!(!ctx.is_cancelled());

        ctx.cancel();

        assert!(ctx.is_cancelled());
    }

    #[tokio::test]
    async fn parent_cancel_reaches_child() {
        let parent = Context::new();
        let child = parent.with_timeout(Duration::from_secs(60));

        parent.cancel();
        time::timeout(Duration::from_secs(1), child.cancelled())
            .await
            .expect("child should be cancelled");
        assert!(child.is_cancelled());
    }

    #[tokio::test]
    async fn context_deadline() {
        let ctx = Context::new();
        assert!(ctx.deadline().is_none());

        let ctx_with_timeout = ctx.with_timeout(Duration::from_secs(1));
        assert!(ctx_with_timeout.deadline().is_some());
    }
}
