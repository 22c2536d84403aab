use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;

use crate::condvar::Condvar;

/// A caller-supplied cancellation signal, threaded through `Session::open`
/// and `Client::call` (the `ctx` of the distilled spec). Honoring
/// cancellation means racing `wait()` against whatever suspension point is
/// blocking the call.
#[async_trait]
pub trait CancellationToken: Send + Sync {
    async fn wait(&self);
}

/// A token that never fires; the default when no deadline/cancellation is
/// needed.
pub struct Never;

#[async_trait]
impl CancellationToken for Never {
    async fn wait(&self) {
        futures::future::pending::<()>().await;
    }
}

/// A manually-triggerable token plus the handle used to trigger it.
///
/// Built on the shared `Condvar` primitive rather than a one-shot channel:
/// a fresh `wait()` future is created on every read-loop iteration
/// (`Session`'s single reader races it against the next frame decode on
/// each pass), so the token must stay awaitable after it has already
/// unblocked one caller, not just the first.
pub struct TriggerableToken {
    fired: Arc<Condvar<bool>>,
}

#[async_trait]
impl CancellationToken for TriggerableToken {
    async fn wait(&self) {
        loop {
            let guard = self.fired.lock().await;
            if *guard {
                return;
            }
            guard.wait(()).await;
        }
    }
}

pub struct CancellationTrigger {
    fired: Arc<Condvar<bool>>,
}

impl CancellationTrigger {
    pub async fn fire(self) {
        let mut guard = self.fired.lock().await;
        *guard = true;
        guard.notify_all();
    }
}

pub fn trigger() -> (CancellationTrigger, Arc<dyn CancellationToken>) {
    let fired = Arc::new(Condvar::new(false));
    (
        CancellationTrigger {
            fired: fired.clone(),
        },
        Arc::new(TriggerableToken { fired }),
    )
}

/// A token that fires after `duration` elapses.
pub struct Deadline {
    duration: Duration,
}

impl Deadline {
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

#[async_trait]
impl CancellationToken for Deadline {
    async fn wait(&self) {
        async_std::task::sleep(self.duration).await;
    }
}

/// Races `fut` against `token.wait()`, returning `None` if the token fired
/// first.
pub async fn race<F: std::future::Future>(
    token: &dyn CancellationToken,
    fut: F,
) -> Option<F::Output> {
    futures::select_biased! {
        v = fut.fuse() => Some(v),
        _ = token.wait().fuse() => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[async_std::test]
    async fn triggerable_token_stays_fired_across_repeated_waits() {
        let (trigger, token) = trigger();
        trigger.fire().await;

        // A token that has already fired must unblock every subsequent
        // `wait()`, not just the first caller to observe it — the read
        // loop constructs a fresh `wait()` future on every iteration.
        token.wait().await;
        token.wait().await;
    }

    #[async_std::test]
    async fn triggerable_token_wakes_a_wait_started_before_fire() {
        let (trigger, token) = trigger();

        let waiter = async_std::task::spawn({
            let token = token.clone();
            async move { token.wait().await }
        });

        async_std::task::sleep(Duration::from_millis(10)).await;
        trigger.fire().await;

        async_std::future::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait() should unblock once fired");
    }
}
