//! A thin call/response RPC protocol carried on top of `qmux` channels: each
//! call opens one channel, writes a call header + arguments, receives a
//! response header, and optionally keeps the channel open for streaming or
//! raw byte transport. See `Client`, `Server`, and `Peer` for the entry
//! points.

#[macro_use]
extern crate async_trait;
#[macro_use]
extern crate failure;

mod args;
mod call;
mod client;
pub mod codec;
pub mod errors;
mod framer;
mod header;
mod mux;
mod peer;
mod responder;
mod response;
mod server;

pub use args::Args;
pub use call::Call;
pub use client::Client;
pub use codec::{CborCodec, Codec, JsonCodec, Value};
pub use errors::Error;
pub use framer::ValueFramer;
pub use header::{CallHeader, ResponseHeader};
pub use mux::{normalize, Handler, HandlerFn, SelectorMux};
pub use peer::Peer;
pub use responder::Responder;
pub use response::{RemoteError, Response};
pub use server::Server;
