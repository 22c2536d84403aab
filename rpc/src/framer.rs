//! Adapts a `Codec` to a mux channel that may carry many values in sequence
//! (§4.7): each encoded value is prefixed with a 4-byte big-endian length,
//! so a codec that buffer-reads can never steal bytes belonging to the next
//! value.

use serde::de::DeserializeOwned;
use serde::Serialize;

use common::errors::*;

use qmux::Channel;

use crate::codec::Codec;

pub struct ValueFramer<C> {
    channel: Channel,
    codec: C,
}

impl<C: Codec> ValueFramer<C> {
    pub fn new(channel: Channel, codec: C) -> Self {
        ValueFramer { channel, codec }
    }

    pub fn channel(&self) -> &Channel {
        &self.channel
    }

    pub async fn write<T: Serialize>(&mut self, value: &T) -> Result<()> {
        let opaque = serde_json::to_value(value)?;
        let bytes = self.codec.encode_value(&opaque)?;

        let mut framed = Vec::with_capacity(4 + bytes.len());
        framed.extend_from_slice(&(bytes.len() as u32).to_be_bytes());
        framed.extend_from_slice(&bytes);

        write_all(&self.channel, &framed).await
    }

    pub async fn read<T: DeserializeOwned>(&mut self) -> Result<T> {
        let mut len_buf = [0u8; 4];
        read_exact(&self.channel, &mut len_buf).await?;
        let len = u32::from_be_bytes(len_buf) as usize;

        let mut bytes = vec![0u8; len];
        read_exact(&self.channel, &mut bytes).await?;

        let opaque = self.codec.decode_value(&bytes)?;
        Ok(serde_json::from_value(opaque)?)
    }
}

async fn write_all(channel: &Channel, mut buf: &[u8]) -> Result<()> {
    while !buf.is_empty() {
        let n = channel.write(buf).await?;
        if n == 0 {
            return Err(err_msg("rpc: channel closed mid-write"));
        }
        buf = &buf[n..];
    }
    Ok(())
}

async fn read_exact(channel: &Channel, mut buf: &mut [u8]) -> Result<()> {
    while !buf.is_empty() {
        let n = channel.read(buf).await?;
        if n == 0 {
            return Err(qmux::Error::EndOfStream.into());
        }
        buf = &mut buf[n..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::JsonCodec;

    #[async_std::test]
    async fn round_trips_several_values_over_one_channel() {
        let (a, b) = common::pipe::duplex();
        let session_a = qmux::Session::new(a.0, a.1);
        let session_b = qmux::Session::new(b.0, b.1);

        let opener = async_std::task::spawn({
            let session_a = session_a.clone();
            async move { session_a.open(&common::cancellation::Never).await.unwrap() }
        });
        let ch_b = session_b.accept().await.unwrap();
        let ch_a = opener.await;

        let mut writer = ValueFramer::new(ch_a, JsonCodec);
        let mut reader = ValueFramer::new(ch_b, JsonCodec);

        writer.write(&"hello").await.unwrap();
        writer.write(&42u32).await.unwrap();
        writer.write(&vec![1, 2, 3]).await.unwrap();

        assert_eq!(reader.read::<String>().await.unwrap(), "hello");
        assert_eq!(reader.read::<u32>().await.unwrap(), 42);
        assert_eq!(reader.read::<Vec<i32>>().await.unwrap(), vec![1, 2, 3]);
    }
}
