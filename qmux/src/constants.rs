//! Tunable limits. Values follow the reference implementation's choices
//! (themselves borrowed from OpenSSH's channel flow control defaults).

/// Smallest legal `max_packet_size`: the wire size of the smallest `Data`
/// frame header (tag + channel_id + length).
pub const MIN_PACKET: u32 = 9;

/// Largest legal `max_packet_size`.
pub const MAX_PACKET: u32 = 1 << 31;

/// Per-channel payload size we advertise to the peer.
pub const DEFAULT_MAX_PACKET: u32 = 1 << 15;

/// Initial receive window we grant a new channel.
pub const DEFAULT_WINDOW: u32 = 64 * DEFAULT_MAX_PACKET;

/// Capacity of the session's accept queue. Set to 0 in tests to surface
/// deadlocks between backpressure and handler dispatch more quickly.
pub const INBOX_CAPACITY: usize = 16;

/// Capacity of a channel's control-frame queue (`OpenConfirm`/`OpenFailure`).
pub const MSG_CAPACITY: usize = 16;
