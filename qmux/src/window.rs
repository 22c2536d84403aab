//! The flow-control credit counter (§4.2): blocking `reserve`, `add`, and a
//! cancellable `close` that wakes every waiter with end-of-stream.

use common::condvar::Condvar;
use common::errors::*;

struct State {
    available: u32,
    closed: bool,
}

pub struct Window {
    state: Condvar<State>,
}

impl Window {
    pub fn new(initial: u32) -> Self {
        Window {
            state: Condvar::new(State {
                available: initial,
                closed: false,
            }),
        }
    }

    /// Blocks until at least one credit is available, then atomically
    /// reserves and returns `min(available, max)`. Writers must loop until
    /// all bytes have been sent, since the reserved amount may be smaller
    /// than requested.
    pub async fn reserve(&self, max: u32) -> Result<u32> {
        loop {
            let mut guard = self.state.lock().await;
            if guard.available > 0 {
                let n = std::cmp::min(guard.available, max);
                guard.available -= n;
                return Ok(n);
            }
            if guard.closed {
                return Err(crate::errors::Error::EndOfStream.into());
            }
            guard.wait(()).await;
        }
    }

    /// Grants `n` additional credits and wakes one waiter.
    pub async fn add(&self, n: u32) -> Result<()> {
        let mut guard = self.state.lock().await;
        guard.available = guard
            .available
            .checked_add(n)
            .ok_or(crate::errors::Error::InvalidWindowUpdate(n))?;
        guard.notify_one();
        Ok(())
    }

    /// Permanently wakes every waiter; subsequent `reserve` calls fail with
    /// end-of-stream once there are no credits left to hand out.
    pub async fn close(&self) {
        let mut guard = self.state.lock().await;
        guard.closed = true;
        guard.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[async_std::test]
    async fn reserve_caps_at_available() {
        let w = Window::new(10);
        assert_eq!(w.reserve(100).await.unwrap(), 10);
    }

    #[async_std::test]
    async fn reserve_caps_at_requested_max() {
        let w = Window::new(100);
        assert_eq!(w.reserve(10).await.unwrap(), 10);
        assert_eq!(w.reserve(100).await.unwrap(), 90);
    }

    #[async_std::test]
    async fn close_fails_pending_reserve() {
        let w = Window::new(0);
        w.close().await;
        assert!(w.reserve(10).await.is_err());
    }

    #[async_std::test]
    async fn add_wakes_a_blocked_reserve() {
        use std::sync::Arc;

        let w = Arc::new(Window::new(0));
        let w2 = w.clone();
        let waiter = async_std::task::spawn(async move { w2.reserve(10).await });

        async_std::task::sleep(std::time::Duration::from_millis(10)).await;
        w.add(5).await.unwrap();

        assert_eq!(waiter.await.unwrap(), 5);
    }
}
