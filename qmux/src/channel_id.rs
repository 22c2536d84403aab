use std::fmt;

/// The identifier of a channel, always interpreted from the *receiver's*
/// point of view: a `ChannelId` carried on the wire names the id the
/// frame's recipient assigned to that channel, never the sender's own id.
///
/// A transparent newtype so the two id spaces (ours vs. the peer's) can't
/// be mixed up at the type level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(pub u32);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for ChannelId {
    fn from(id: u32) -> Self {
        ChannelId(id)
    }
}
