//! The responder contract a handler uses to emit its reply (§4.10):
//! `return` (single reply, closes the channel), `continue` (keeps it open
//! for streaming), `send` (a further framed value after `continue`).

use std::sync::Arc;

use async_std::sync::Mutex as AsyncMutex;
use serde::Serialize;

use common::errors::*;

use qmux::Channel;

use crate::codec::{Codec, Value};
use crate::framer::ValueFramer;
use crate::header::ResponseHeader;

struct State {
    responded: bool,
    continued: bool,
}

#[derive(Clone)]
pub struct Responder<C: Codec> {
    framer: Arc<AsyncMutex<ValueFramer<C>>>,
    channel: Channel,
    state: Arc<AsyncMutex<State>>,
}

impl<C: Codec> Responder<C> {
    pub(crate) fn new(framer: Arc<AsyncMutex<ValueFramer<C>>>, channel: Channel) -> Self {
        Responder {
            framer,
            channel,
            state: Arc::new(AsyncMutex::new(State {
                responded: false,
                continued: false,
            })),
        }
    }

    /// Sends a single reply and closes the channel. `Err(message)` sets the
    /// response header's error field (and the value itself encodes as
    /// null) rather than the success value.
    pub async fn r#return<T: Serialize>(&self, value: std::result::Result<T, String>) -> Result<()> {
        {
            let mut state = self.state.lock().await;
            assert!(!state.responded, "rpc: responder already responded");
            state.responded = true;
        }

        let mut header = ResponseHeader::default();
        header.r#continue = false;

        let mut framer = self.framer.lock().await;
        match value {
            Ok(v) => {
                framer.write(&header).await?;
                framer.write(&v).await?;
            }
            Err(message) => {
                header.error = Some(message);
                framer.write(&header).await?;
                framer.write(&Value::Null).await?;
            }
        }
        drop(framer);

        self.channel.close().await
    }

    /// Sends a reply but keeps the channel open for further framed values
    /// or raw bytes; returns the channel to the handler.
    pub async fn r#continue<T: Serialize>(&self, value: &T) -> Result<Channel> {
        {
            let mut state = self.state.lock().await;
            assert!(!state.responded, "rpc: responder already responded");
            state.responded = true;
            state.continued = true;
        }

        let header = ResponseHeader {
            error: None,
            r#continue: true,
        };

        let mut framer = self.framer.lock().await;
        framer.write(&header).await?;
        framer.write(value).await?;
        drop(framer);

        Ok(self.channel.clone())
    }

    /// Sends a further framed value. Only valid after `continue`.
    pub async fn send<T: Serialize>(&self, value: &T) -> Result<()> {
        {
            let state = self.state.lock().await;
            assert!(state.continued, "rpc: send is only valid after continue");
        }
        self.framer.lock().await.write(value).await
    }

    pub(crate) async fn has_responded(&self) -> bool {
        self.state.lock().await.responded
    }
}
