//! The caller side of a call (§4.8): opens a channel, writes the call
//! header and arguments, decodes the response header and reply, and hands
//! back a `Response` for any further streaming or raw byte use.

use std::sync::Arc;

use async_std::sync::Mutex as AsyncMutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use common::cancellation::{self, CancellationToken};
use common::errors::*;
use common::io::Streamable;

use qmux::{Channel, Session};

use crate::args::Args;
use crate::codec::Codec;
use crate::errors::Error as RpcError;
use crate::framer::ValueFramer;
use crate::header::{CallHeader, ResponseHeader};
use crate::response::{RemoteError, Response};

/// What a call's response header settled on, before any reply decode that
/// only applies to the success case.
enum CallOutcome<R> {
    Error {
        header: ResponseHeader,
        message: String,
    },
    Success {
        header: ResponseHeader,
        reply: R,
    },
}

#[derive(Clone)]
pub struct Client<C: Codec> {
    session: Arc<Session>,
    codec: C,
}

impl<C: Codec> Client<C> {
    pub fn new(session: Arc<Session>, codec: C) -> Self {
        Client { session, codec }
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    /// Performs one RPC (§4.8). `args` is either a single value or a
    /// stream of values; the response always carries exactly one decoded
    /// reply of type `R` (pass `()` when the call's reply is nil, per
    /// step 8's "throwaway" decode).
    pub async fn call<A, R>(
        &self,
        token: &dyn CancellationToken,
        selector: &str,
        args: Args<A>,
    ) -> Result<Response<C, R>>
    where
        A: Serialize + Send,
        R: DeserializeOwned + Send,
    {
        let ch = self.session.open(token).await?;
        let ch_for_close = ch.clone();

        match self.call_on_channel::<A, R>(token, ch, selector, args).await {
            Ok(response) => Ok(response),
            Err(e) => {
                let _ = ch_for_close.close().await;
                Err(e)
            }
        }
    }

    async fn call_on_channel<A, R>(
        &self,
        token: &dyn CancellationToken,
        ch: Channel,
        selector: &str,
        args: Args<A>,
    ) -> Result<Response<C, R>>
    where
        A: Serialize + Send,
        R: DeserializeOwned + Send,
    {
        let mut framer = ValueFramer::new(ch.clone(), self.codec.clone());

        let body = async {
            framer
                .write(&CallHeader {
                    selector: selector.to_string(),
                })
                .await?;

            match args {
                Args::Single(v) => framer.write(&v).await?,
                Args::Stream(mut stream) => {
                    while let Some(v) = stream.next().await {
                        framer.write(&v).await?;
                    }
                }
            }

            let header: ResponseHeader = framer.read().await?;

            // §4.8 checks the error (step 7) before decoding the reply
            // (step 8): a handler error always encodes its reply as a null
            // placeholder, so decoding it as `R` here first would fail for
            // most reply types instead of surfacing the intended error.
            if let Some(message) = header.error.clone() {
                return Ok::<CallOutcome<R>, Error>(CallOutcome::Error { header, message });
            }

            let reply: R = framer.read().await?;
            Ok(CallOutcome::Success { header, reply })
        };

        let outcome = match cancellation::race(token, body).await {
            None => return Err(RpcError::CallCancelled.into()),
            Some(result) => result?,
        };

        match outcome {
            CallOutcome::Error { header, message } => {
                if !header.r#continue {
                    let _ = ch.close().await;
                }
                Err(RemoteError::new(message, header, ch).into())
            }
            CallOutcome::Success { header, reply } => {
                if !header.r#continue {
                    let _ = ch.close().await;
                }
                let framer = Arc::new(AsyncMutex::new(framer));
                Ok(Response::new(header, reply, ch, framer))
            }
        }
    }
}
