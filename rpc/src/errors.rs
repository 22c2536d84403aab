//! RPC-layer error kinds that aren't already covered by `qmux::Error`
//! (open/transport/protocol failures propagate straight through via `?`).

#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "rpc: call cancelled")]
    CallCancelled,
}
