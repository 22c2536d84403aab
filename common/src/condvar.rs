use std::borrow::{Borrow, BorrowMut};
use std::ops::{Deref, DerefMut};

use async_std::sync::{Mutex, MutexGuard};
use futures::channel::oneshot;

/// A futures based implementation of a condition variable that owns the
/// condition value.
///
/// Unlike a textbook condvar, `wait` does not relock the mutex once it
/// resumes: the caller re-locks and re-checks the predicate itself. Waiters
/// may attach a small value read by a notifier to filter exactly which
/// waiters are woken.
pub struct Condvar<V, T = ()> {
    inner: Mutex<CondvarInner<V, T>>,
}

struct CondvarInner<V, T> {
    value: V,
    waiters: Vec<(oneshot::Sender<()>, T)>,
}

impl<V, T> CondvarInner<V, T> {
    /// Drops waiters whose futures have already been cancelled.
    fn collect(&mut self) {
        let mut i = 0;
        while i < self.waiters.len() {
            if self.waiters[i].0.is_canceled() {
                self.waiters.swap_remove(i);
            } else {
                i += 1;
            }
        }
    }
}

impl<V, T> Condvar<V, T> {
    pub fn new(initial_value: V) -> Self {
        Condvar {
            inner: Mutex::new(CondvarInner {
                value: initial_value,
                waiters: vec![],
            }),
        }
    }

    pub async fn lock<'a>(&'a self) -> CondvarGuard<'a, V, T> {
        CondvarGuard {
            guard: self.inner.lock().await,
        }
    }
}

pub struct CondvarGuard<'a, V, T> {
    guard: MutexGuard<'a, CondvarInner<V, T>>,
}

impl<'a, V, T> Borrow<V> for CondvarGuard<'a, V, T> {
    fn borrow(&self) -> &V {
        &self.guard.value
    }
}

impl<'a, V, T> BorrowMut<V> for CondvarGuard<'a, V, T> {
    fn borrow_mut(&mut self) -> &mut V {
        &mut self.guard.value
    }
}

impl<'a, V, T> Deref for CondvarGuard<'a, V, T> {
    type Target = V;
    fn deref(&self) -> &V {
        &self.guard.value
    }
}

impl<'a, V, T> DerefMut for CondvarGuard<'a, V, T> {
    fn deref_mut(&mut self) -> &mut V {
        &mut self.guard.value
    }
}

impl<'a, V, T> CondvarGuard<'a, V, T> {
    /// Releases the lock and blocks until `notify_filter`/`notify_all` wakes
    /// this waiter. The caller must re-lock and re-check its predicate after
    /// this returns (spurious-wakeup-free, but the condition may have moved
    /// on if multiple waiters raced).
    pub async fn wait(self, data: T) {
        let (tx, rx) = oneshot::channel();
        let mut guard = self.guard;

        guard.collect();
        guard.waiters.push((tx, data));
        drop(guard);

        rx.await.ok();
    }

    pub fn notify_filter<F: Fn(&T) -> bool>(&mut self, f: F) {
        let guard = &mut self.guard;

        let mut i = guard.waiters.len();
        while i > 0 {
            if f(&guard.waiters[i - 1].1) {
                let (tx, _) = guard.waiters.swap_remove(i - 1);
                let _ = tx.send(());
            }
            i -= 1;
        }
    }

    pub fn notify_all(&mut self) {
        self.notify_filter(|_| true);
    }

    /// Wakes at most one waiter.
    pub fn notify_one(&mut self) {
        if let Some((tx, _)) = self.guard.waiters.pop() {
            let _ = tx.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[async_std::test]
    async fn wakes_a_waiter() {
        let cv: Arc<Condvar<usize>> = Arc::new(Condvar::new(0));

        let cv2 = cv.clone();
        let waiter = async_std::task::spawn(async move {
            loop {
                let guard = cv2.lock().await;
                if *guard > 0 {
                    return *guard;
                }
                guard.wait(()).await;
            }
        });

        async_std::task::sleep(std::time::Duration::from_millis(10)).await;

        {
            let mut guard = cv.lock().await;
            *guard = 5;
            guard.notify_all();
        }

        assert_eq!(waiter.await, 5);
    }
}
