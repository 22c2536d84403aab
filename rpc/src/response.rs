//! The object a successful (or remote-errored) call hands back to the
//! caller (§4.8 step 9): the decoded header and reply, plus continued
//! access to the underlying channel for streaming or raw byte transport.

use std::fmt;
use std::sync::Arc;

use async_std::sync::Mutex as AsyncMutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use common::errors::*;
use failure::Fail;

use qmux::Channel;

use crate::codec::Codec;
use crate::framer::ValueFramer;
use crate::header::ResponseHeader;

pub struct Response<C: Codec, R> {
    pub header: ResponseHeader,
    pub reply: R,
    channel: Channel,
    framer: Arc<AsyncMutex<ValueFramer<C>>>,
}

impl<C: Codec, R> Response<C, R> {
    pub(crate) fn new(
        header: ResponseHeader,
        reply: R,
        channel: Channel,
        framer: Arc<AsyncMutex<ValueFramer<C>>>,
    ) -> Self {
        Response {
            header,
            reply,
            channel,
            framer,
        }
    }

    /// The raw channel, for bidirectional byte-stream use after `continue`.
    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }

    /// Pulls the next framed value (server-streaming replies).
    pub async fn receive<T: DeserializeOwned>(&self) -> Result<T> {
        self.framer.lock().await.read().await
    }

    /// Sends a further framed value (client-streaming after `continue`).
    pub async fn send<T: Serialize>(&self, value: &T) -> Result<()> {
        self.framer.lock().await.write(value).await
    }
}

/// An error originating from and surfaced by the remote handler (§7).
///
/// Carries the response header and channel but, unlike a successful
/// `Response`, no typed reply: a handler error always encodes its reply as
/// a null placeholder (§7), so the call returns as soon as `header.error`
/// is observed rather than attempting to decode that placeholder as `R` —
/// `downcast` `common::errors::Error` back into this type to get at it.
pub struct RemoteError {
    pub message: String,
    pub header: ResponseHeader,
    channel: Channel,
}

impl RemoteError {
    pub(crate) fn new(message: String, header: ResponseHeader, channel: Channel) -> Self {
        RemoteError {
            message,
            header,
            channel,
        }
    }

    /// The raw channel the error arrived on.
    pub fn channel(&self) -> Channel {
        self.channel.clone()
    }
}

impl fmt::Debug for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteError")
            .field("message", &self.message)
            .finish()
    }
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "remote: {}", self.message)
    }
}

impl Fail for RemoteError {}
