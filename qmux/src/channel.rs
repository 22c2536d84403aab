//! A single logical, flow-controlled, ordered byte stream within a session
//! (§4.3). `ChannelInner` holds the mutable state; `Channel` is the cheap,
//! cloneable handle a caller actually uses.

use std::sync::Arc;

use async_std::channel;
use async_std::sync::Mutex as AsyncMutex;

use common::errors::*;
use common::io::{Readable, Writeable};

use crate::channel_id::ChannelId;
use crate::errors::Error as QmuxError;
use crate::frame::Frame;
use crate::pending::Pending;
use crate::window::Window;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Inbound,
    Outbound,
}

/// What the session's read loop should do after dispatching a frame to a
/// channel's `handle`.
pub(crate) enum HandleOutcome {
    /// The channel is still live.
    Continue,
    /// The channel has torn down; the session should drop it from its map.
    Closed,
}

pub(crate) struct ChannelInner {
    pub(crate) local_id: ChannelId,
    remote_id: AsyncMutex<Option<ChannelId>>,
    direction: Direction,

    my_window: AsyncMutex<u32>,
    remote_window: Window,

    max_incoming_payload: u32,
    max_remote_payload: AsyncMutex<u32>,

    pending: Pending,

    sent_eof: AsyncMutex<bool>,
    /// Guards frame emission for this channel and doubles as the
    /// `sent_close` flag. Deliberately a separate lock from `my_window`:
    /// `write` reserves from `remote_window` (unrelated to this lock) and
    /// must still be able to emit `Data` frames without contending with a
    /// concurrent `read`'s window-adjust emission.
    send_lock: AsyncMutex<bool>,

    encoder: Arc<AsyncMutex<Box<dyn Writeable>>>,
    msg_tx: channel::Sender<Frame>,
}

impl ChannelInner {
    pub(crate) fn new(
        local_id: ChannelId,
        direction: Direction,
        remote_id: Option<ChannelId>,
        initial_remote_window: u32,
        max_remote_payload: u32,
        max_incoming_payload: u32,
        my_window: u32,
        encoder: Arc<AsyncMutex<Box<dyn Writeable>>>,
        msg_tx: channel::Sender<Frame>,
    ) -> Self {
        ChannelInner {
            local_id,
            remote_id: AsyncMutex::new(remote_id),
            direction,
            my_window: AsyncMutex::new(my_window),
            remote_window: Window::new(initial_remote_window),
            max_incoming_payload,
            max_remote_payload: AsyncMutex::new(max_remote_payload),
            pending: Pending::new(),
            sent_eof: AsyncMutex::new(false),
            send_lock: AsyncMutex::new(false),
            encoder,
            msg_tx,
        }
    }

    async fn remote_id(&self) -> Option<ChannelId> {
        *self.remote_id.lock().await
    }

    async fn remote_id_or_err(&self) -> Result<ChannelId> {
        self.remote_id()
            .await
            .ok_or_else(|| err_msg("qmux: channel has no remote id yet"))
    }

    /// Emits a frame to the peer, serialized against this channel's other
    /// emissions. A no-op once `Close` has already been sent (idempotent
    /// close/close-write, per the spec's testable properties).
    async fn emit(&self, frame: Frame) -> Result<()> {
        let mut sent_close = self.send_lock.lock().await;
        if *sent_close {
            return Ok(());
        }
        if matches!(frame, Frame::Close { .. }) {
            *sent_close = true;
        }
        let mut enc = self.encoder.lock().await;
        crate::frame::encode(&mut **enc, &frame).await
    }

    pub(crate) async fn forward_msg(&self, frame: Frame) {
        let _ = self.msg_tx.send(frame).await;
    }

    pub async fn write(&self, data: &[u8]) -> Result<usize> {
        if *self.sent_eof.lock().await {
            return Err(QmuxError::EndOfStream.into());
        }
        if *self.send_lock.lock().await {
            return Err(QmuxError::EndOfStream.into());
        }

        let mut sent = 0usize;
        let mut remaining = data;
        while !remaining.is_empty() {
            let max_remote_payload = *self.max_remote_payload.lock().await;
            let want = std::cmp::min(max_remote_payload, remaining.len() as u32);
            let n = self.remote_window.reserve(want).await? as usize;

            let channel_id = self.remote_id_or_err().await?;
            self.emit(Frame::Data {
                channel_id,
                data: remaining[..n].to_vec(),
            })
            .await?;

            sent += n;
            remaining = &remaining[n..];
        }

        Ok(sent)
    }

    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let n = self.pending.read(buf).await;
        if n > 0 {
            {
                let mut w = self.my_window.lock().await;
                *w += n as u32;
            }
            if let Ok(channel_id) = self.remote_id_or_err().await {
                // A window-adjust failure here means the peer already
                // closed; we still delivered `n` bytes to the caller, so
                // the error is suppressed (deferred until the next read
                // naturally observes end-of-stream).
                let _ = self
                    .emit(Frame::WindowAdjust {
                        channel_id,
                        additional_bytes: n as u32,
                    })
                    .await;
            }
        }
        Ok(n)
    }

    pub async fn close_write(&self) -> Result<()> {
        let mut sent_eof = self.sent_eof.lock().await;
        if *sent_eof {
            return Ok(());
        }
        *sent_eof = true;
        drop(sent_eof);

        let channel_id = self.remote_id_or_err().await?;
        self.emit(Frame::EOF { channel_id }).await
    }

    pub async fn close(&self) -> Result<()> {
        let channel_id = self.remote_id_or_err().await?;
        self.emit(Frame::Close { channel_id }).await
    }

    /// Tears down local state: seals `pending`, closes `remote_window`, and
    /// drops the control-frame sender so any in-flight `open()` observes
    /// the channel going away. Called either when a `Close` frame arrives
    /// for this channel, or when the whole session shuts down.
    pub(crate) async fn seal(&self) {
        self.pending.eof().await;
        self.remote_window.close().await;
        self.msg_tx.close();
    }

    pub(crate) async fn handle(&self, frame: Frame) -> Result<HandleOutcome> {
        match frame {
            Frame::Data { data, .. } => {
                self.handle_data(data).await?;
                Ok(HandleOutcome::Continue)
            }
            Frame::EOF { .. } => {
                self.pending.eof().await;
                Ok(HandleOutcome::Continue)
            }
            Frame::Close { .. } => {
                // Idempotent ack: if we'd already sent our own Close,
                // `emit` is a no-op.
                if let Ok(channel_id) = self.remote_id_or_err().await {
                    let _ = self.emit(Frame::Close { channel_id }).await;
                }
                self.seal().await;
                Ok(HandleOutcome::Closed)
            }
            Frame::WindowAdjust { additional_bytes, .. } => {
                self.remote_window.add(additional_bytes).await?;
                Ok(HandleOutcome::Continue)
            }
            Frame::OpenConfirm {
                sender_id,
                window_size,
                max_packet_size,
                ..
            } => {
                self.expect_response_message()?;
                if max_packet_size < crate::constants::MIN_PACKET
                    || max_packet_size > crate::constants::MAX_PACKET
                {
                    return Err(QmuxError::InvalidMaxPacketSize(max_packet_size).into());
                }
                *self.remote_id.lock().await = Some(sender_id);
                *self.max_remote_payload.lock().await = max_packet_size;
                self.remote_window.add(window_size).await?;
                self.forward_msg(Frame::OpenConfirm {
                    channel_id: ChannelId(self.local_id.0),
                    sender_id,
                    window_size,
                    max_packet_size,
                })
                .await;
                Ok(HandleOutcome::Continue)
            }
            Frame::OpenFailure { channel_id } => {
                self.expect_response_message()?;
                self.forward_msg(Frame::OpenFailure { channel_id }).await;
                Ok(HandleOutcome::Closed)
            }
            Frame::Open { .. } => {
                unreachable!("Open frames are dispatched by the session, not a channel")
            }
        }
    }

    fn expect_response_message(&self) -> Result<()> {
        if self.direction != Direction::Outbound {
            return Err(QmuxError::UnexpectedResponseMessage.into());
        }
        Ok(())
    }

    async fn handle_data(&self, data: Vec<u8>) -> Result<()> {
        let length = data.len() as u32;
        if length > self.max_incoming_payload {
            return Err(QmuxError::PayloadTooLarge.into());
        }

        {
            let mut my_window = self.my_window.lock().await;
            if *my_window < length {
                return Err(QmuxError::WindowExceeded.into());
            }
            *my_window -= length;
        }

        self.pending.write(&data).await;
        Ok(())
    }
}

/// A cheap, cloneable handle onto one logical stream within a `Session`.
#[derive(Clone)]
pub struct Channel {
    pub(crate) inner: Arc<ChannelInner>,
}

impl Channel {
    pub(crate) fn new(inner: Arc<ChannelInner>) -> Self {
        Channel { inner }
    }

    pub fn id(&self) -> ChannelId {
        self.inner.local_id
    }

    pub async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.inner.read(buf).await
    }

    pub async fn write(&self, data: &[u8]) -> Result<usize> {
        self.inner.write(data).await
    }

    pub async fn close_write(&self) -> Result<()> {
        self.inner.close_write().await
    }

    pub async fn close(&self) -> Result<()> {
        self.inner.close().await
    }
}

#[async_trait]
impl Readable for Channel {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        Channel::read(self, buf).await
    }
}

#[async_trait]
impl Writeable for Channel {
    async fn write(&mut self, buf: &[u8]) -> Result<usize> {
        Channel::write(self, buf).await
    }

    async fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}
