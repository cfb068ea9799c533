//! Hashing - SHA-256 fingerprints
//!
//! Badge artifacts are fingerprinted by their encoded bytes; queued
//! submissions by the canonical JSON of their payload.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

/// Compute SHA-256 hash of bytes, return hex string
pub fn sha256_hex(data: &[u8]) -> String {
    Sha256::digest(data)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Convert to canonical JSON (sorted keys, no whitespace)
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let v = serde_json::to_value(value)?;
    serde_json::to_string(&sort_value(v))
}

fn sort_value(v: Value) -> Value {
    match v {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            Value::Object(entries.into_iter().map(|(k, v)| (k, sort_value(v))).collect())
        }
        Value::Array(arr) => Value::Array(arr.into_iter().map(sort_value).collect()),
        other => other,
    }
}

/// Fingerprint of a serializable payload, independent of field order.
pub fn payload_fingerprint<T: Serialize>(payload: &T) -> Result<String, serde_json::Error> {
    Ok(sha256_hex(canonical_json(payload)?.as_bytes()))
}
