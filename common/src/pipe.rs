//! An in-memory thread-safe duplex byte pipe.
//!
//! `pipe()` returns a writer/reader pair; anything written to the writer
//! becomes readable from the reader. `duplex()` builds two such pipes
//! crossed over each other, giving a pair of `(Readable, Writeable)` ends
//! useful for wiring up two `qmux::Session`s in tests without a real
//! transport.

use std::sync::Arc;

use async_std::channel;
use async_std::sync::Mutex;

use crate::errors::*;
use crate::io::{Readable, Writeable};

const MAX_BUFFER_SIZE: usize = 1 << 20;

pub struct PipeWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
    notifier: channel::Sender<Option<Result<()>>>,
    waiter: channel::Receiver<()>,
}

#[async_trait]
impl Writeable for PipeWriter {
    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        loop {
            {
                let mut buffer = self.buffer.lock().await;
                if buffer.len() < MAX_BUFFER_SIZE {
                    let n = std::cmp::min(MAX_BUFFER_SIZE - buffer.len(), buf.len());
                    buffer.extend_from_slice(&buf[0..n]);
                    let _ = self.notifier.try_send(None);
                    return Ok(n);
                }
            }

            if self.waiter.recv().await.is_err() {
                return Err(err_msg("Pipe reader dropped"));
            }
        }
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl PipeWriter {
    /// Closes the writer side. `result` is delivered to the reader once the
    /// buffered bytes have been drained.
    pub async fn close(&mut self, result: Result<()>) {
        let _ = self.notifier.send(Some(result)).await;
    }
}

pub struct PipeReader {
    buffer: Arc<Mutex<Vec<u8>>>,
    notifier: channel::Sender<()>,
    waiter: channel::Receiver<Option<Result<()>>>,
}

#[async_trait]
impl Readable for PipeReader {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            {
                let mut buffer = self.buffer.lock().await;
                if !buffer.is_empty() {
                    let n = std::cmp::min(buf.len(), buffer.len());
                    buf[0..n].copy_from_slice(&buffer[0..n]);

                    let remaining = buffer.len() - n;
                    buffer.copy_within(n.., 0);
                    buffer.truncate(remaining);

                    let _ = self.notifier.try_send(());
                    return Ok(n);
                }
            }

            match self.waiter.recv().await {
                Ok(None) => continue,
                Ok(Some(res)) => return res.map(|_| 0),
                Err(_) => return Ok(0),
            }
        }
    }
}

pub fn pipe() -> (PipeWriter, PipeReader) {
    let (writer_notifier, writer_waiter) = channel::bounded(1);
    let (reader_notifier, reader_waiter) = channel::bounded(1);

    let buffer = Arc::new(Mutex::new(vec![]));

    let writer = PipeWriter {
        buffer: buffer.clone(),
        notifier: reader_notifier,
        waiter: writer_waiter,
    };

    let reader = PipeReader {
        buffer,
        notifier: writer_notifier,
        waiter: reader_waiter,
    };

    (writer, reader)
}

/// Builds two crossed-over pipes: bytes written on side A's writer are read
/// from side B's reader and vice versa.
pub fn duplex() -> (
    (Box<dyn Readable>, Box<dyn Writeable>),
    (Box<dyn Readable>, Box<dyn Writeable>),
) {
    let (a_writer, b_reader) = pipe();
    let (b_writer, a_reader) = pipe();

    (
        (Box::new(a_reader), Box::new(a_writer)),
        (Box::new(b_reader), Box::new(b_writer)),
    )
}
