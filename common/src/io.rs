//! The duplex byte-stream contract that concrete transports (TCP, Unix
//! sockets, stdio, WebSocket, QUIC, ...) are expected to satisfy. Those
//! bindings are out of scope here; only the contract is defined.

use crate::errors::*;

const BUF_SIZE: usize = 4096;

/// An asynchronously readable byte source.
#[async_trait]
pub trait Readable: Send + Unpin {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;

    async fn read_to_end(&mut self, buf: &mut Vec<u8>) -> Result<()> {
        let mut i = buf.len();
        loop {
            buf.resize(i + BUF_SIZE, 0);

            match self.read(&mut buf[i..]).await {
                Ok(0) => {
                    buf.resize(i, 0);
                    return Ok(());
                }
                Ok(n) => {
                    i += n;
                }
                Err(e) => {
                    buf.resize(i, 0);
                    return Err(e);
                }
            }
        }
    }

    async fn read_exact(&mut self, mut buf: &mut [u8]) -> Result<()> {
        while !buf.is_empty() {
            match self.read(buf).await {
                Ok(0) => {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "Unexpected end of stream",
                    )
                    .into());
                }
                Ok(n) => {
                    buf = &mut buf[n..];
                }
                Err(error) => {
                    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
                        if io_error.kind() == std::io::ErrorKind::Interrupted {
                            continue;
                        }
                    }
                    return Err(error);
                }
            }
        }

        Ok(())
    }
}

/// An asynchronously writable byte sink.
#[async_trait]
pub trait Writeable: Send + Unpin {
    async fn write(&mut self, buf: &[u8]) -> Result<usize>;

    async fn flush(&mut self) -> Result<()>;

    async fn write_all(&mut self, mut buf: &[u8]) -> Result<()> {
        while !buf.is_empty() {
            match self.write(buf).await {
                Ok(0) => {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::WriteZero,
                        "No progress made while writing",
                    )
                    .into());
                }
                Ok(n) => {
                    buf = &buf[n..];
                }
                Err(error) => {
                    if let Some(io_error) = error.downcast_ref::<std::io::Error>() {
                        if io_error.kind() == std::io::ErrorKind::Interrupted {
                            continue;
                        }
                    }
                    return Err(error);
                }
            }
        }

        Ok(())
    }
}

#[async_trait]
impl<R: Readable + ?Sized> Readable for Box<R> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf).await
    }
}

#[async_trait]
impl<W: Writeable + ?Sized> Writeable for Box<W> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        (**self).write(buf).await
    }

    async fn flush(&mut self) -> Result<()> {
        (**self).flush().await
    }
}

#[async_trait]
impl Readable for async_std::net::TcpStream {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        let n = async_std::io::prelude::ReadExt::read(self, buf).await?;
        Ok(n)
    }
}

#[async_trait]
impl Writeable for async_std::net::TcpStream {
    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let n = async_std::io::prelude::WriteExt::write(self, buf).await?;
        Ok(n)
    }

    async fn flush(&mut self) -> Result<()> {
        async_std::io::prelude::WriteExt::flush(self).await?;
        Ok(())
    }
}

/// A stream-producing capability used for arguments/replies that are
/// delivered incrementally rather than as a single value (see `rpc`'s
/// `Args::Stream`).
#[async_trait]
pub trait Streamable: Send {
    type Item: Send;

    async fn next(&mut self) -> Option<Self::Item>;
}

/// A `Streamable` that yields exactly one value then ends.
pub struct SingleItemStreamable<T> {
    item: Option<T>,
}

impl<T: Send> SingleItemStreamable<T> {
    pub fn new(value: T) -> Self {
        Self { item: Some(value) }
    }
}

#[async_trait]
impl<T: Send> Streamable for SingleItemStreamable<T> {
    type Item = T;

    async fn next(&mut self) -> Option<Self::Item> {
        self.item.take()
    }
}

/// A `Streamable` backed by an already-materialized `Vec`, handy in tests.
pub struct VecStreamable<T> {
    items: std::collections::VecDeque<T>,
}

impl<T: Send> VecStreamable<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items: items.into(),
        }
    }
}

#[async_trait]
impl<T: Send> Streamable for VecStreamable<T> {
    type Item = T;

    async fn next(&mut self) -> Option<Self::Item> {
        self.items.pop_front()
    }
}
