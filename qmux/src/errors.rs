use std::fmt;
use std::sync::Arc;

use common::errors::Error as CommonError;
use failure::Fail;

/// Protocol-level failures specific to the mux: session-fatal violations and
/// per-open-attempt rejections. Kept as a distinct type (rather than folded
/// into ad hoc `err_msg!` strings) so callers can `downcast_ref::<qmux::Error>`
/// to tell a protocol violation apart from a transport I/O error, mirroring
/// how `connection_reader.rs` downcasts `common::errors::Error` to
/// `std::io::Error`.
#[derive(Debug, Fail)]
pub enum Error {
    #[fail(display = "qmux: invalid channel {}", _0)]
    InvalidChannel(u32),

    #[fail(display = "qmux: wrong packet length")]
    WrongPacketLength,

    #[fail(display = "qmux: incoming packet exceeds maximum payload size")]
    PayloadTooLarge,

    #[fail(display = "qmux: remote side wrote too much")]
    WindowExceeded,

    #[fail(display = "qmux: invalid window update for {} bytes", _0)]
    InvalidWindowUpdate(u32),

    #[fail(display = "qmux: channel response message received on inbound channel")]
    UnexpectedResponseMessage,

    #[fail(display = "qmux: invalid max_packet_size {} from peer", _0)]
    InvalidMaxPacketSize(u32),

    #[fail(display = "qmux: unknown frame type {}", _0)]
    UnknownFrameType(u8),

    #[fail(display = "qmux: channel open failed on remote side")]
    OpenFailed,

    #[fail(display = "qmux: channel open cancelled")]
    OpenCancelled,

    #[fail(display = "qmux: end of stream")]
    EndOfStream,
}

/// Published once by the session's read loop when it terminates, and handed
/// back to every `wait()`/blocked `open()`/`accept()` caller afterwards.
#[derive(Debug, Clone)]
pub struct SessionClosed(pub Arc<CommonError>);

impl fmt::Display for SessionClosed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "qmux: session closed: {}", self.0)
    }
}

impl Fail for SessionClosed {}
