//! Combines one session with a bound `Client` and `SelectorMux` so either
//! end of a connection can both call and respond (§4.12) — a direct
//! consequence of the session's symmetry (§9 "Bidirectional RPC").

use std::sync::Arc;

use async_std::sync::Mutex as AsyncMutex;
use serde::de::DeserializeOwned;
use serde::Serialize;

use common::cancellation::CancellationToken;
use common::errors::*;
use common::io::{Readable, Writeable};
use common::task::ChildTask;

use qmux::Session;

use crate::args::Args;
use crate::client::Client;
use crate::codec::Codec;
use crate::mux::SelectorMux;
use crate::response::Response;
use crate::server::Server;

pub struct Peer<C: Codec> {
    session: Arc<Session>,
    client: Client<C>,
    mux: Arc<SelectorMux<C>>,
    codec: C,
    server_task: AsyncMutex<Option<ChildTask>>,
}

impl<C: Codec> Peer<C> {
    pub fn new(reader: Box<dyn Readable>, writer: Box<dyn Writeable>, codec: C) -> Arc<Self> {
        let session = Session::new(reader, writer);
        let client = Client::new(session.clone(), codec.clone());
        let mux = Arc::new(SelectorMux::new());

        Arc::new(Peer {
            session,
            client,
            mux,
            codec,
            server_task: AsyncMutex::new(None),
        })
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn client(&self) -> &Client<C> {
        &self.client
    }

    /// Registers handlers here before (or after) `serve`.
    pub fn mux(&self) -> &Arc<SelectorMux<C>> {
        &self.mux
    }

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
        self.client.call(token, selector, args).await
    }

    /// Spawns the accept loop that dispatches inbound calls to this peer's
    /// selector mux. A second call replaces the previous serving task.
    pub async fn serve(self: &Arc<Self>) {
        let server = Server::new(self.mux.clone(), self.codec.clone());
        let session = self.session.clone();
        let client = self.client.clone();

        let task = ChildTask::spawn(async move {
            server.serve(session, client).await;
        });

        *self.server_task.lock().await = Some(task);
    }

    pub async fn wait(&self) -> Arc<Error> {
        self.session.wait().await
    }

    pub async fn close(&self) {
        self.session.close().await;
    }
}
