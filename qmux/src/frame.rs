//! Wire encoding of the seven mux frame kinds (§6 of the spec this crate
//! implements). All integers are big-endian u32. The first byte of every
//! frame is its type tag; `Data` is the only frame that is further
//! self-delimited (by its length field).

use common::errors::*;
use common::io::{Readable, Writeable};

use crate::channel_id::ChannelId;

const TAG_OPEN: u8 = 100;
const TAG_OPEN_CONFIRM: u8 = 101;
const TAG_OPEN_FAILURE: u8 = 102;
const TAG_WINDOW_ADJUST: u8 = 103;
const TAG_DATA: u8 = 104;
const TAG_EOF: u8 = 105;
const TAG_CLOSE: u8 = 106;

#[derive(Debug, Clone)]
pub enum Frame {
    Open {
        sender_id: ChannelId,
        window_size: u32,
        max_packet_size: u32,
    },
    OpenConfirm {
        channel_id: ChannelId,
        sender_id: ChannelId,
        window_size: u32,
        max_packet_size: u32,
    },
    OpenFailure {
        channel_id: ChannelId,
    },
    WindowAdjust {
        channel_id: ChannelId,
        additional_bytes: u32,
    },
    Data {
        channel_id: ChannelId,
        data: Vec<u8>,
    },
    EOF {
        channel_id: ChannelId,
    },
    Close {
        channel_id: ChannelId,
    },
}

impl Frame {
    /// The channel the frame targets, from the receiver's point of view.
    /// `Open` has none: it is addressed to the session itself.
    pub fn channel_id(&self) -> Option<ChannelId> {
        match self {
            Frame::Open { .. } => None,
            Frame::OpenConfirm { channel_id, .. } => Some(*channel_id),
            Frame::OpenFailure { channel_id } => Some(*channel_id),
            Frame::WindowAdjust { channel_id, .. } => Some(*channel_id),
            Frame::Data { channel_id, .. } => Some(*channel_id),
            Frame::EOF { channel_id } => Some(*channel_id),
            Frame::Close { channel_id } => Some(*channel_id),
        }
    }
}

fn put_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_be_bytes());
}

pub async fn encode(w: &mut dyn Writeable, frame: &Frame) -> Result<()> {
    let mut buf = Vec::new();
    match frame {
        Frame::Open {
            sender_id,
            window_size,
            max_packet_size,
        } => {
            buf.push(TAG_OPEN);
            put_u32(&mut buf, sender_id.0);
            put_u32(&mut buf, *window_size);
            put_u32(&mut buf, *max_packet_size);
        }
        Frame::OpenConfirm {
            channel_id,
            sender_id,
            window_size,
            max_packet_size,
        } => {
            buf.push(TAG_OPEN_CONFIRM);
            put_u32(&mut buf, channel_id.0);
            put_u32(&mut buf, sender_id.0);
            put_u32(&mut buf, *window_size);
            put_u32(&mut buf, *max_packet_size);
        }
        Frame::OpenFailure { channel_id } => {
            buf.push(TAG_OPEN_FAILURE);
            put_u32(&mut buf, channel_id.0);
        }
        Frame::WindowAdjust {
            channel_id,
            additional_bytes,
        } => {
            buf.push(TAG_WINDOW_ADJUST);
            put_u32(&mut buf, channel_id.0);
            put_u32(&mut buf, *additional_bytes);
        }
        Frame::Data { channel_id, data } => {
            buf.push(TAG_DATA);
            put_u32(&mut buf, channel_id.0);
            put_u32(&mut buf, data.len() as u32);
            buf.extend_from_slice(data);
        }
        Frame::EOF { channel_id } => {
            buf.push(TAG_EOF);
            put_u32(&mut buf, channel_id.0);
        }
        Frame::Close { channel_id } => {
            buf.push(TAG_CLOSE);
            put_u32(&mut buf, channel_id.0);
        }
    }

    w.write_all(&buf).await
}

async fn read_u32(r: &mut dyn Readable) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf).await?;
    Ok(u32::from_be_bytes(buf))
}

pub async fn decode(r: &mut dyn Readable) -> Result<Frame> {
    let mut tag = [0u8; 1];
    r.read_exact(&mut tag).await?;

    let frame = match tag[0] {
        TAG_OPEN => Frame::Open {
            sender_id: ChannelId(read_u32(r).await?),
            window_size: read_u32(r).await?,
            max_packet_size: read_u32(r).await?,
        },
        TAG_OPEN_CONFIRM => Frame::OpenConfirm {
            channel_id: ChannelId(read_u32(r).await?),
            sender_id: ChannelId(read_u32(r).await?),
            window_size: read_u32(r).await?,
            max_packet_size: read_u32(r).await?,
        },
        TAG_OPEN_FAILURE => Frame::OpenFailure {
            channel_id: ChannelId(read_u32(r).await?),
        },
        TAG_WINDOW_ADJUST => Frame::WindowAdjust {
            channel_id: ChannelId(read_u32(r).await?),
            additional_bytes: read_u32(r).await?,
        },
        TAG_DATA => {
            let channel_id = ChannelId(read_u32(r).await?);
            let length = read_u32(r).await?;
            let mut data = vec![0u8; length as usize];
            r.read_exact(&mut data).await?;
            Frame::Data { channel_id, data }
        }
        TAG_EOF => Frame::EOF {
            channel_id: ChannelId(read_u32(r).await?),
        },
        TAG_CLOSE => Frame::Close {
            channel_id: ChannelId(read_u32(r).await?),
        },
        other => return Err(crate::errors::Error::UnknownFrameType(other).into()),
    };

    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::pipe;

    #[async_std::test]
    async fn round_trips_every_frame_kind() {
        let frames = vec![
            Frame::Open {
                sender_id: ChannelId(1),
                window_size: 1 << 20,
                max_packet_size: 1 << 15,
            },
            Frame::OpenConfirm {
                channel_id: ChannelId(1),
                sender_id: ChannelId(2),
                window_size: 1 << 20,
                max_packet_size: 1 << 15,
            },
            Frame::OpenFailure {
                channel_id: ChannelId(1),
            },
            Frame::WindowAdjust {
                channel_id: ChannelId(1),
                additional_bytes: 42,
            },
            Frame::Data {
                channel_id: ChannelId(1),
                data: b"hello world".to_vec(),
            },
            Frame::Data {
                channel_id: ChannelId(1),
                data: vec![],
            },
            Frame::EOF {
                channel_id: ChannelId(1),
            },
            Frame::Close {
                channel_id: ChannelId(1),
            },
        ];

        let (mut w, mut r) = pipe::pipe();
        for frame in &frames {
            encode(&mut w, frame).await.unwrap();
        }

        for frame in &frames {
            let decoded = decode(&mut r).await.unwrap();
            assert_eq!(format!("{:?}", decoded), format!("{:?}", frame));
        }
    }

    #[async_std::test]
    async fn unknown_tag_is_an_error() {
        use common::io::Writeable;
        let (mut w, mut r) = pipe::pipe();
        w.write_all(&[200]).await.unwrap();
        assert!(decode(&mut r).await.is_err());
    }
}
