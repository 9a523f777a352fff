//! Canonical Encoding
//!
//! Every hashable or signable record has exactly one byte encoding: a JSON
//! map whose key order is fixed by struct field declaration order, with
//! decimal integers, base64 byte strings, and base64 DER keys. Signatures
//! and block hashes are computed over these bytes, so two implementations
//! must agree byte-for-byte.

use serde::Serialize;

/// Serialize `record` to its canonical byte encoding.
///
/// serde_json emits struct fields in declaration order, so the encoding
/// structs in `models` double as the canonical key-order definition.
pub fn to_canonical_vec<T: Serialize>(record: &T) -> Vec<u8> {
    serde_json::to_vec(record).expect("canonical records serialize infallibly")
}

/// Base64 (de)serialization for raw byte fields, via `#[serde(with = "b64")]`.
pub mod b64 {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&BASE64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        BASE64.decode(encoded).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Sample {
        uid: i64,
        #[serde(with = "b64")]
        payload: Vec<u8>,
    }

    #[test]
    fn test_field_order_is_declaration_order() {
        let sample = Sample {
            uid: 7,
            payload: vec![1, 2, 3],
        };
        let bytes = to_canonical_vec(&sample);
        let text = String::from_utf8(bytes).unwrap();
        assert_eq!(text, r#"{"uid":7,"payload":"AQID"}"#);
    }

    #[test]
    fn test_roundtrip() {
        let sample = Sample {
            uid: -1,
            payload: vec![0xff; 4],
        };
        let bytes = to_canonical_vec(&sample);
        let decoded: Sample = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, sample);
    }
}
