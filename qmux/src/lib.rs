//! A stream-multiplexing protocol: many independent, flow-controlled,
//! ordered byte streams ("channels") carried over one reliable duplex byte
//! transport. See `Session` for the entry point.

#[macro_use]
extern crate async_trait;
#[macro_use]
extern crate failure;

mod channel;
mod channel_id;
pub mod constants;
pub mod errors;
mod frame;
mod pending;
mod session;
mod window;

pub use channel::{Channel, Direction};
pub use channel_id::ChannelId;
pub use constants::*;
pub use errors::Error;
pub use frame::Frame;
pub use session::Session;
