//! The per-channel receive buffer (§4.1): an unbounded byte FIFO fed by the
//! session's read loop and drained by whoever holds the channel handle.

use std::collections::VecDeque;

use common::condvar::Condvar;

struct State {
    buf: VecDeque<u8>,
    eof: bool,
}

pub struct Pending {
    state: Condvar<State>,
}

impl Pending {
    pub fn new() -> Self {
        Pending {
            state: Condvar::new(State {
                buf: VecDeque::new(),
                eof: false,
            }),
        }
    }

    /// Appends received payload bytes. Called only by the session's read
    /// loop.
    pub async fn write(&self, data: &[u8]) {
        let mut guard = self.state.lock().await;
        guard.buf.extend(data.iter().copied());
        guard.notify_all();
    }

    /// Seals the buffer: once drained, further reads return `Ok(0)`.
    pub async fn eof(&self) {
        let mut guard = self.state.lock().await;
        guard.eof = true;
        guard.notify_all();
    }

    /// Blocks until at least one byte is available or the buffer has been
    /// sealed, then returns as many bytes as fit in `dst` (a partial read,
    /// never waiting to fill it). Returns `Ok(0)` once the buffer is sealed
    /// and drained, the `Readable` convention for end-of-stream.
    pub async fn read(&self, dst: &mut [u8]) -> usize {
        loop {
            let mut guard = self.state.lock().await;
            if !guard.buf.is_empty() {
                let n = std::cmp::min(dst.len(), guard.buf.len());
                for slot in dst.iter_mut().take(n) {
                    *slot = guard.buf.pop_front().unwrap();
                }
                return n;
            }
            if guard.eof {
                return 0;
            }
            guard.wait(()).await;
        }
    }
}
