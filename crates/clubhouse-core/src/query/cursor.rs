//! Opaque continuation cursors
//!
//! A cursor is the base64 encoding of the UTF-8 JSON serialization of the
//! backend's raw continuation key. Callers treat it as opaque; it must
//! round-trip exactly.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{DataError, DataResult};

/// Largest raw key a continuation can hold: a 2048-byte partition key and a
/// 1024-byte sort key, plus room for attribute names and JSON escaping
const MAX_KEY_JSON_BYTES: usize = 2 * (2048 + 1024) + 256;

/// Base64 length of the largest continuation key
const MAX_CURSOR_LEN: usize = MAX_KEY_JSON_BYTES.div_ceil(3) * 4;

/// Encode a continuation key as a cursor
pub fn encode_cursor<K: Serialize + ?Sized>(key: &K) -> DataResult<String> {
    let bytes = serde_json::to_vec(key)?;
    Ok(STANDARD.encode(bytes))
}

/// Decode a cursor back into a continuation key
pub fn decode_cursor<K: DeserializeOwned>(cursor: &str) -> DataResult<K> {
    if cursor.len() > MAX_CURSOR_LEN {
        return Err(DataError::invalid_query("cursor exceeds max length"));
    }
    let bytes = STANDARD
        .decode(cursor.trim())
        .map_err(|e| DataError::invalid_query(format!("cursor is not valid base64: {}", e)))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| DataError::invalid_query(format!("cursor payload is not valid JSON: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    #[test]
    fn test_round_trip_key() {
        let key = json!({"PK": "USER#ann@club.org", "SK": "META"});
        let cursor = encode_cursor(&key).unwrap();
        let decoded: Value = decode_cursor(&cursor).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn test_empty_object() {
        let cursor = encode_cursor(&json!({})).unwrap();
        assert_eq!(cursor, "e30=");
        assert_eq!(decode_cursor::<Value>(&cursor).unwrap(), json!({}));
    }

    #[test]
    fn test_round_trip_largest_key() {
        let key = json!({"PK": "a".repeat(2048), "SK": "b".repeat(1024)});
        let cursor = encode_cursor(&key).unwrap();
        assert!(cursor.len() > 4096);
        let decoded: Value = decode_cursor(&cursor).unwrap();
        assert_eq!(decoded, key);
    }

    #[test]
    fn test_rejects_oversized_cursor() {
        let cursor = "A".repeat(MAX_CURSOR_LEN + 4);
        assert!(matches!(
            decode_cursor::<Value>(&cursor),
            Err(DataError::InvalidQuery(_))
        ));
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            decode_cursor::<Value>("not base64!!"),
            Err(DataError::InvalidQuery(_))
        ));
        let not_json = STANDARD.encode("{oops");
        assert!(matches!(
            decode_cursor::<Value>(&not_json),
            Err(DataError::InvalidQuery(_))
        ));
    }
}
