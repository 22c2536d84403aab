//! The pluggable value-encoding capability (§4.11, §9 "dynamic value
//! passing"). A `Codec` only needs to round-trip a universal "opaque value"
//! type; typed `encode`/`decode` at call sites (see `framer::ValueFramer`)
//! go through that opaque type via `serde`, so adding a codec never requires
//! touching the RPC or mux layers.

use common::errors::*;

/// The universal opaque value every codec must be able to carry, standing
/// in for the reflection-based "any" value the source's protobuf adapter
/// provides. `serde_json::Value` already round-trips any `Serialize`/
/// `DeserializeOwned` type through `serde_json::{to_value, from_value}`, so
/// it doubles as both the JSON codec's native form and the bridge type for
/// every other codec.
pub use serde_json::Value;

/// Encodes/decodes a single opaque value to/from bytes. `framer::ValueFramer`
/// layers the 4-byte length prefix on top; a `Codec` only ever sees one
/// complete value's bytes at a time.
pub trait Codec: Send + Sync + Clone + 'static {
    fn encode_value(&self, value: &Value) -> Result<Vec<u8>>;
    fn decode_value(&self, bytes: &[u8]) -> Result<Value>;
}

/// The reference system's default codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode_value(&self, value: &Value) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode_value(&self, bytes: &[u8]) -> Result<Value> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// A more compact binary alternative to `JsonCodec`, carrying the same
/// opaque value type.
#[derive(Debug, Clone, Copy, Default)]
pub struct CborCodec;

impl Codec for CborCodec {
    fn encode_value(&self, value: &Value) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        serde_cbor::to_writer(&mut buf, value)?;
        Ok(buf)
    }

    fn decode_value(&self, bytes: &[u8]) -> Result<Value> {
        Ok(serde_cbor::from_slice(bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_codec_round_trips_opaque_values() {
        let codec = JsonCodec;
        let value = json!({"a": 1, "b": [1, 2, 3], "c": null});
        let bytes = codec.encode_value(&value).unwrap();
        assert_eq!(codec.decode_value(&bytes).unwrap(), value);
    }

    #[test]
    fn cbor_codec_round_trips_opaque_values() {
        let codec = CborCodec;
        let value = json!({"a": 1, "b": "hello", "c": true});
        let bytes = codec.encode_value(&value).unwrap();
        assert_eq!(codec.decode_value(&bytes).unwrap(), value);
    }
}
