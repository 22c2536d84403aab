//! Accepts channels from a session and dispatches each to a bound handler
//! (§4.9): one spawned task per accepted channel, decoding the call header,
//! invoking the handler, and applying the handler's default (`return(nil)`)
//! if it never responded.

use std::any::Any;
use std::sync::Arc;

use async_std::sync::Mutex as AsyncMutex;
use futures::FutureExt;

use common::cancellation::Never;
use common::task::ChildTask;

use qmux::{Channel, Session};

use crate::call::Call;
use crate::client::Client;
use crate::codec::Codec;
use crate::framer::ValueFramer;
use crate::header::CallHeader;
use crate::mux::{normalize, Handler, SelectorMux};
use crate::responder::Responder;

/// Accepts channels from `session` and dispatches each to `handler`.
pub struct Server<C: Codec> {
    handler: Arc<dyn Handler<C>>,
    codec: C,
    /// Tasks for in-flight `respond_one` calls, kept alive so dropping the
    /// `Server` (by way of `ChildTask`'s cancel-on-drop) tears them down
    /// together with the session.
    tasks: AsyncMutex<Vec<ChildTask>>,
}

impl<C: Codec> Server<C> {
    pub fn new(handler: Arc<dyn Handler<C>>, codec: C) -> Self {
        Server {
            handler,
            codec,
            tasks: AsyncMutex::new(Vec::new()),
        }
    }

    /// A server with no handler bound dispatches to an empty selector mux,
    /// so every call fails with "not found".
    pub fn without_handler(codec: C) -> Self {
        Server::new(Arc::new(SelectorMux::new()), codec)
    }

    pub async fn serve(&self, session: Arc<Session>, client: Client<C>) {
        loop {
            let ch = match session.accept().await {
                Ok(ch) => ch,
                Err(_) => return,
            };

            let handler = self.handler.clone();
            let codec = self.codec.clone();
            let client = client.clone();
            let task = ChildTask::spawn(async move {
                respond_one(ch, handler, codec, client).await;
            });

            self.tasks.lock().await.push(task);
        }
    }
}

async fn respond_one<C: Codec>(
    ch: Channel,
    handler: Arc<dyn Handler<C>>,
    codec: C,
    client: Client<C>,
) {
    let mut framer = ValueFramer::new(ch.clone(), codec);
    let call_header: CallHeader = match framer.read().await {
        Ok(h) => h,
        Err(e) => {
            eprintln!("rpc: failed to decode call header: {}", e);
            let _ = ch.close().await;
            return;
        }
    };

    let selector = normalize(&call_header.selector);
    let framer = Arc::new(AsyncMutex::new(framer));

    let call = Call::new(selector, framer.clone(), client, Arc::new(Never));
    let responder = Responder::new(framer, ch);

    let outcome = std::panic::AssertUnwindSafe(handler.respond(call, responder.clone()))
        .catch_unwind()
        .await;

    if let Err(panic) = outcome {
        let message = panic_message(panic.as_ref());
        if !responder.has_responded().await {
            let _ = responder
                .r#return::<()>(Err(format!("panic: {}", message)))
                .await;
        } else {
            eprintln!("rpc: handler panicked after responding: {}", message);
        }
        return;
    }

    if !responder.has_responded().await {
        let _ = responder.r#return::<()>(Ok(())).await;
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
