//! The call a handler is invoked with (§4.9 step 4): the normalized
//! selector, a decoder for pulling arguments, a `Caller` bound to the same
//! session (enabling mid-handler callbacks to the peer — bidirectional RPC,
//! §9), and a cancellation token.

use std::sync::Arc;

use async_std::sync::Mutex as AsyncMutex;
use serde::de::DeserializeOwned;

use common::cancellation::CancellationToken;
use common::errors::*;

use crate::client::Client;
use crate::codec::Codec;
use crate::framer::ValueFramer;

pub struct Call<C: Codec> {
    pub selector: String,
    framer: Arc<AsyncMutex<ValueFramer<C>>>,
    caller: Client<C>,
    cancellation: Arc<dyn CancellationToken>,
}

impl<C: Codec> Call<C> {
    pub(crate) fn new(
        selector: String,
        framer: Arc<AsyncMutex<ValueFramer<C>>>,
        caller: Client<C>,
        cancellation: Arc<dyn CancellationToken>,
    ) -> Self {
        Call {
            selector,
            framer,
            caller,
            cancellation,
        }
    }

    /// Pulls the next framed argument value. Handlers call this once for a
    /// single argument, or repeatedly for a client-streaming call.
    pub async fn receive<T: DeserializeOwned>(&self) -> Result<T> {
        self.framer.lock().await.read().await
    }

    /// A client bound to the same session as this call, letting handlers
    /// RPC the peer back mid-handler.
    pub fn caller(&self) -> &Client<C> {
        &self.caller
    }

    pub fn cancellation(&self) -> &dyn CancellationToken {
        self.cancellation.as_ref()
    }
}
