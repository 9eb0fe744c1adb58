// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Payload Codecs
//!
//! A codec turns a typed value into an [`Envelope`] (content type plus bytes)
//! and back. The content type travels as the AMQP `content_type` property and
//! names the codec that produced the payload, so consumers never guess the
//! encoding from the bytes themselves.

use crate::errors::CodecError;
use bincode::Options;
use serde::{de::DeserializeOwned, Serialize};

/// Content type of payloads produced by [`JsonCodec`]
pub const JSON_CONTENT_TYPE: &str = "application/json";
/// Content type of payloads produced by [`BincodeCodec`]
pub const BINCODE_CONTENT_TYPE: &str = "application/x-bincode";

/// Upper bound on the size of a bincode payload accepted by the decoder.
pub const MAX_BINCODE_PAYLOAD_BYTES: u64 = 16 * 1024 * 1024;

/// Wire-level unit exchanged with the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub content_type: String,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn new(content_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Envelope {
            content_type: content_type.into(),
            payload,
        }
    }
}

/// Encoding strategy shared by publishers and subscribers.
pub trait Codec: Send + Sync + 'static {
    /// The tag written on every envelope this codec produces.
    fn content_type(&self) -> &'static str;

    /// Serializes `value` into an envelope tagged with [`Codec::content_type`].
    fn encode<T>(&self, value: &T) -> Result<Envelope, CodecError>
    where
        T: Serialize + ?Sized;

    /// Reconstructs a value from an envelope.
    ///
    /// Envelopes tagged with another codec's content type are rejected. An
    /// untagged envelope is decoded as-is.
    fn decode<T>(&self, envelope: &Envelope) -> Result<T, CodecError>
    where
        T: DeserializeOwned;
}

fn check_content_type(expected: &'static str, envelope: &Envelope) -> Result<(), CodecError> {
    if envelope.content_type.is_empty() || envelope.content_type == expected {
        return Ok(());
    }

    Err(CodecError::ContentTypeMismatch {
        expected,
        found: envelope.content_type.clone(),
    })
}

/// Self-describing, field-named text encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn content_type(&self) -> &'static str {
        JSON_CONTENT_TYPE
    }

    fn encode<T>(&self, value: &T) -> Result<Envelope, CodecError>
    where
        T: Serialize + ?Sized,
    {
        let payload = serde_json::to_vec(value).map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(Envelope::new(JSON_CONTENT_TYPE, payload))
    }

    fn decode<T>(&self, envelope: &Envelope) -> Result<T, CodecError>
    where
        T: DeserializeOwned,
    {
        check_content_type(JSON_CONTENT_TYPE, envelope)?;
        serde_json::from_slice(&envelope.payload).map_err(|e| CodecError::Decode(e.to_string()))
    }
}

/// Dense binary encoding. Producer and consumer must share the exact type
/// definition; field names are not on the wire.
#[derive(Debug, Clone, Copy, Default)]
pub struct BincodeCodec;

impl BincodeCodec {
    // varint integers, little endian, trailing bytes rejected
    fn options() -> impl Options {
        bincode::DefaultOptions::new().with_limit(MAX_BINCODE_PAYLOAD_BYTES)
    }
}

impl Codec for BincodeCodec {
    fn content_type(&self) -> &'static str {
        BINCODE_CONTENT_TYPE
    }

    fn encode<T>(&self, value: &T) -> Result<Envelope, CodecError>
    where
        T: Serialize + ?Sized,
    {
        let payload = Self::options()
            .serialize(value)
            .map_err(|e| CodecError::Encode(e.to_string()))?;
        Ok(Envelope::new(BINCODE_CONTENT_TYPE, payload))
    }

    fn decode<T>(&self, envelope: &Envelope) -> Result<T, CodecError>
    where
        T: DeserializeOwned,
    {
        check_content_type(BINCODE_CONTENT_TYPE, envelope)?;
        Self::options()
            .deserialize(&envelope.payload)
            .map_err(|e| CodecError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{GameLog, PlayingState};
    use serde::Deserialize;
    use std::time::{Duration, UNIX_EPOCH};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct ArmyMove {
        player: String,
        units: Vec<u32>,
        to_location: String,
    }

    fn army_move() -> ArmyMove {
        ArmyMove {
            player: "alice".to_owned(),
            units: vec![1, 2, 3],
            to_location: "europe".to_owned(),
        }
    }

    fn game_log() -> GameLog {
        GameLog {
            current_time: UNIX_EPOCH + Duration::from_millis(1_700_000_000_123),
            message: "alice won a war against bob".to_owned(),
            username: "alice".to_owned(),
        }
    }

    #[test]
    fn json_round_trips_values() {
        let codec = JsonCodec;

        let envelope = codec.encode(&army_move()).unwrap();
        assert_eq!(envelope.content_type, JSON_CONTENT_TYPE);
        assert_eq!(codec.decode::<ArmyMove>(&envelope).unwrap(), army_move());

        let envelope = codec.encode(&game_log()).unwrap();
        assert_eq!(codec.decode::<GameLog>(&envelope).unwrap(), game_log());
    }

    #[test]
    fn json_payload_is_field_named() {
        let envelope = JsonCodec.encode(&PlayingState { is_paused: true }).unwrap();
        assert_eq!(envelope.payload, br#"{"is_paused":true}"#);
    }

    #[test]
    fn bincode_round_trips_values() {
        let codec = BincodeCodec;

        let envelope = codec.encode(&army_move()).unwrap();
        assert_eq!(envelope.content_type, BINCODE_CONTENT_TYPE);
        assert_eq!(codec.decode::<ArmyMove>(&envelope).unwrap(), army_move());

        let envelope = codec.encode(&game_log()).unwrap();
        assert_eq!(codec.decode::<GameLog>(&envelope).unwrap(), game_log());
    }

    #[test]
    fn bincode_is_smaller_than_json() {
        let json = JsonCodec.encode(&army_move()).unwrap();
        let bin = BincodeCodec.encode(&army_move()).unwrap();
        assert!(bin.payload.len() < json.payload.len());
    }

    #[test]
    fn json_reports_unencodable_value() {
        let mut scores = std::collections::HashMap::new();
        scores.insert((1u8, 2u8), 3u8);

        assert!(matches!(
            JsonCodec.encode(&scores),
            Err(CodecError::Encode(_))
        ));
    }

    #[test]
    fn json_rejects_malformed_payload() {
        let envelope = Envelope::new(JSON_CONTENT_TYPE, b"{\"player\": ".to_vec());
        assert!(matches!(
            JsonCodec.decode::<ArmyMove>(&envelope),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn json_rejects_schema_mismatch() {
        let envelope = JsonCodec.encode(&PlayingState { is_paused: false }).unwrap();
        assert!(matches!(
            JsonCodec.decode::<ArmyMove>(&envelope),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn bincode_rejects_truncated_payload() {
        let mut envelope = BincodeCodec.encode(&army_move()).unwrap();
        envelope.payload.truncate(envelope.payload.len() - 2);
        assert!(matches!(
            BincodeCodec.decode::<ArmyMove>(&envelope),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn bincode_rejects_trailing_bytes() {
        let mut envelope = BincodeCodec.encode(&PlayingState { is_paused: true }).unwrap();
        envelope.payload.push(0);
        assert!(matches!(
            BincodeCodec.decode::<PlayingState>(&envelope),
            Err(CodecError::Decode(_))
        ));
    }

    #[test]
    fn decode_rejects_foreign_content_type() {
        let envelope = JsonCodec.encode(&army_move()).unwrap();
        assert_eq!(
            BincodeCodec.decode::<ArmyMove>(&envelope),
            Err(CodecError::ContentTypeMismatch {
                expected: BINCODE_CONTENT_TYPE,
                found: JSON_CONTENT_TYPE.to_owned(),
            })
        );
    }

    #[test]
    fn decode_accepts_untagged_envelope() {
        let mut envelope = JsonCodec.encode(&army_move()).unwrap();
        envelope.content_type.clear();
        assert_eq!(JsonCodec.decode::<ArmyMove>(&envelope).unwrap(), army_move());
    }
}
