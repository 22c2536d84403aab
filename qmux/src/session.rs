//! The session (§4.4): owns the transport, runs the single read loop, and
//! dispatches frames to channels. Exactly one task ever reads from the
//! transport; all writes are serialized through one encoder mutex.

use std::collections::HashMap;
use std::sync::Arc;

use async_std::channel;
use async_std::sync::Mutex as AsyncMutex;

use common::cancellation::{self, CancellationToken};
use common::condvar::Condvar;
use common::errors::*;
use common::io::{Readable, Writeable};
use common::task::ChildTask;

use crate::channel::{Channel, ChannelInner, Direction, HandleOutcome};
use crate::channel_id::ChannelId;
use crate::constants::*;
use crate::errors::{Error as QmuxError, SessionClosed};
use crate::frame::Frame;

struct ChannelTable {
    next_id: u32,
    channels: HashMap<u32, Arc<ChannelInner>>,
}

impl ChannelTable {
    fn new() -> Self {
        ChannelTable {
            next_id: 0,
            channels: HashMap::new(),
        }
    }
}

struct SessionShared {
    encoder: Arc<AsyncMutex<Box<dyn Writeable>>>,
    channels: AsyncMutex<ChannelTable>,
    inbox_tx: channel::Sender<Channel>,
    inbox_rx: channel::Receiver<Channel>,
    err: Condvar<Option<Arc<Error>>>,
    close_trigger: AsyncMutex<Option<cancellation::CancellationTrigger>>,
    close_token: Arc<dyn CancellationToken>,
}

impl SessionShared {
    async fn new_channel(
        self: &Arc<Self>,
        direction: Direction,
        remote_id: Option<ChannelId>,
        initial_remote_window: u32,
        max_remote_payload: u32,
    ) -> (Arc<ChannelInner>, channel::Receiver<Frame>) {
        let (msg_tx, msg_rx) = channel::bounded(MSG_CAPACITY);

        let mut table = self.channels.lock().await;
        let id = table.next_id;
        table.next_id += 1;

        let inner = Arc::new(ChannelInner::new(
            ChannelId(id),
            direction,
            remote_id,
            initial_remote_window,
            max_remote_payload,
            DEFAULT_MAX_PACKET,
            DEFAULT_WINDOW,
            self.encoder.clone(),
            msg_tx,
        ));
        table.channels.insert(id, inner.clone());

        (inner, msg_rx)
    }

    async fn remove_channel(&self, id: u32) {
        self.channels.lock().await.channels.remove(&id);
    }

    async fn publish_error(&self, err: Error) {
        let mut guard = self.err.lock().await;
        if guard.is_none() {
            *guard = Some(Arc::new(err));
        }
        guard.notify_all();
    }

    async fn terminal_error(&self, fallback: QmuxError) -> Error {
        let guard = self.err.lock().await;
        match &*guard {
            Some(e) => SessionClosed(e.clone()).into(),
            None => fallback.into(),
        }
    }
}

/// A multiplexed connection over one duplex byte transport.
///
/// Constructed with [`Session::new`], which spawns the read loop and hands
/// back a shared handle; clients and servers are expected to hold an
/// `Arc<Session>` (the session outlives any single `open`/`accept` caller).
pub struct Session {
    shared: Arc<SessionShared>,
    _read_loop: ChildTask,
}

impl Session {
    pub fn new(reader: Box<dyn Readable>, writer: Box<dyn Writeable>) -> Arc<Session> {
        let (inbox_tx, inbox_rx) = channel::bounded(INBOX_CAPACITY);
        let (close_trigger, close_token) = cancellation::trigger();

        let shared = Arc::new(SessionShared {
            encoder: Arc::new(AsyncMutex::new(writer)),
            channels: AsyncMutex::new(ChannelTable::new()),
            inbox_tx,
            inbox_rx,
            err: Condvar::new(None),
            close_trigger: AsyncMutex::new(Some(close_trigger)),
            close_token,
        });

        let loop_shared = shared.clone();
        let read_loop = ChildTask::spawn(async move {
            run_read_loop(loop_shared, reader).await;
        });

        Arc::new(Session {
            shared,
            _read_loop: read_loop,
        })
    }

    /// Opens a new outbound channel, honoring `token` for cancellation.
    pub async fn open(&self, token: &dyn CancellationToken) -> Result<Channel> {
        let (inner, msg_rx) = self
            .shared
            .new_channel(Direction::Outbound, None, 0, DEFAULT_MAX_PACKET)
            .await;

        let open_frame = Frame::Open {
            sender_id: inner.local_id,
            window_size: DEFAULT_WINDOW,
            max_packet_size: DEFAULT_MAX_PACKET,
        };

        {
            let mut enc = self.shared.encoder.lock().await;
            if let Err(e) = crate::frame::encode(&mut **enc, &open_frame).await {
                self.shared.remove_channel(inner.local_id.0).await;
                return Err(e);
            }
        }

        // On cancellation or a transport error, the channel id is left
        // registered rather than removed: a response the peer already sent
        // (or is about to send) for this id must still land somewhere. It
        // arrives at `inner`'s now-abandoned `msg_rx` and is silently
        // dropped there instead of hitting `dispatch`'s unknown-channel
        // error path, which would otherwise kill the whole session over an
        // attempt we'd already given up on (§5).
        match cancellation::race(token, msg_rx.recv()).await {
            None => Err(QmuxError::OpenCancelled.into()),
            Some(Err(_)) => Err(self.shared.terminal_error(QmuxError::OpenFailed).await),
            Some(Ok(Frame::OpenConfirm { .. })) => Ok(Channel::new(inner)),
            Some(Ok(Frame::OpenFailure { .. })) => {
                self.shared.remove_channel(inner.local_id.0).await;
                Err(QmuxError::OpenFailed.into())
            }
            Some(Ok(_)) => Err(err_msg(
                "qmux: unexpected frame in response to channel open",
            )),
        }
    }

    /// Blocks until the next inbound channel is queued, or the session
    /// terminates.
    pub async fn accept(&self) -> Result<Channel> {
        match self.shared.inbox_rx.recv().await {
            Ok(ch) => Ok(ch),
            Err(_) => Err(self.shared.terminal_error(QmuxError::EndOfStream).await),
        }
    }

    /// Closes the transport. The read loop observes this and tears down.
    pub async fn close(&self) {
        let trigger = self.shared.close_trigger.lock().await.take();
        if let Some(trigger) = trigger {
            trigger.fire().await;
        }
    }

    /// Blocks until the read loop terminates, returning the terminating
    /// error.
    pub async fn wait(&self) -> Arc<Error> {
        loop {
            let guard = self.shared.err.lock().await;
            if let Some(e) = guard.clone() {
                return e;
            }
            guard.wait(()).await;
        }
    }
}

async fn run_read_loop(shared: Arc<SessionShared>, mut reader: Box<dyn Readable>) {
    loop {
        let outcome = cancellation::race(&*shared.close_token, crate::frame::decode(&mut *reader))
            .await;

        let frame = match outcome {
            None => {
                shared
                    .publish_error(err_msg("qmux: session closed"))
                    .await;
                break;
            }
            Some(Err(e)) => {
                shared.publish_error(e).await;
                break;
            }
            Some(Ok(frame)) => frame,
        };

        if let Err(e) = dispatch(&shared, frame).await {
            shared.publish_error(e).await;
            break;
        }
    }

    teardown(&shared).await;
}

async fn dispatch(shared: &Arc<SessionShared>, frame: Frame) -> Result<()> {
    let channel_id = match frame.channel_id() {
        None => return handle_open(shared, frame).await,
        Some(id) => id,
    };

    let inner = {
        let table = shared.channels.lock().await;
        table.channels.get(&channel_id.0).cloned()
    };

    let inner = match inner {
        Some(inner) => inner,
        None => return Err(QmuxError::InvalidChannel(channel_id.0).into()),
    };

    match inner.handle(frame).await? {
        HandleOutcome::Continue => Ok(()),
        HandleOutcome::Closed => {
            shared.remove_channel(channel_id.0).await;
            Ok(())
        }
    }
}

async fn handle_open(shared: &Arc<SessionShared>, frame: Frame) -> Result<()> {
    let (sender_id, window_size, max_packet_size) = match frame {
        Frame::Open {
            sender_id,
            window_size,
            max_packet_size,
        } => (sender_id, window_size, max_packet_size),
        _ => unreachable!("only Open frames carry no channel id"),
    };

    if max_packet_size < MIN_PACKET || max_packet_size > MAX_PACKET {
        let mut enc = shared.encoder.lock().await;
        return crate::frame::encode(
            &mut **enc,
            &Frame::OpenFailure {
                channel_id: sender_id,
            },
        )
        .await;
    }

    let (inner, _msg_rx) = shared
        .new_channel(
            Direction::Inbound,
            Some(sender_id),
            window_size,
            max_packet_size,
        )
        .await;
    let local_id = inner.local_id;

    shared
        .inbox_tx
        .send(Channel::new(inner))
        .await
        .map_err(|_| err_msg("qmux: accept queue closed"))?;

    let mut enc = shared.encoder.lock().await;
    crate::frame::encode(
        &mut **enc,
        &Frame::OpenConfirm {
            channel_id: sender_id,
            sender_id: local_id,
            window_size: DEFAULT_WINDOW,
            max_packet_size: DEFAULT_MAX_PACKET,
        },
    )
    .await
}

async fn teardown(shared: &Arc<SessionShared>) {
    let mut table = shared.channels.lock().await;
    for (_, inner) in table.channels.drain() {
        inner.seal().await;
    }
    drop(table);

    shared.inbox_tx.close();
}
