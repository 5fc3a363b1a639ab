//! # Canonical Serialization
//!
//! `CanonicalBytes` is the sole construction path for bytes that feed a
//! notification digest.
//!
//! ## Security Invariant
//!
//! The inner `Vec<u8>` is private. The only constructor, [`CanonicalBytes::new`],
//! rejects floats and serializes with RFC 8785 (sorted keys, compact
//! separators). An indexer written in any language that applies JCS to the
//! same notification JSON recomputes the same digest.
//!
//! Ledger amounts serialize as decimal strings and identifiers as integers,
//! so a float can only appear if a caller hashes a foreign value.

use serde::Serialize;
use serde_json::Value;

use crate::error::CanonicalizationError;

/// Bytes produced exclusively by JCS canonicalization with float rejection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CanonicalBytes(Vec<u8>);

impl CanonicalBytes {
    /// Construct canonical bytes from any serializable value.
    ///
    /// # Errors
    ///
    /// `FloatRejected` if the value contains a non-integer number;
    /// `SerializationFailed` if JSON serialization fails.
    pub fn new(obj: &impl Serialize) -> Result<Self, CanonicalizationError> {
        let value = serde_json::to_value(obj)?;
        reject_floats(&value)?;
        let s = serde_jcs::to_string(&value)?;
        Ok(Self(s.into_bytes()))
    }

    /// Access the canonical bytes for digest computation.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length of the canonical byte sequence.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the canonical byte sequence is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AsRef<[u8]> for CanonicalBytes {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

fn reject_floats(value: &Value) -> Result<(), CanonicalizationError> {
    match value {
        Value::Null | Value::Bool(_) | Value::String(_) => Ok(()),
        Value::Number(n) => {
            if n.is_f64() {
                if let Some(f) = n.as_f64() {
                    return Err(CanonicalizationError::FloatRejected(f));
                }
            }
            Ok(())
        }
        Value::Array(items) => items.iter().try_for_each(reject_floats),
        Value::Object(map) => map.values().try_for_each(reject_floats),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Canonicalization is deterministic for float-free maps.
        #[test]
        fn canonical_bytes_deterministic(
            entries in prop::collection::btree_map("[a-z]{1,8}", any::<i64>(), 0..12)
        ) {
            let a = CanonicalBytes::new(&entries).unwrap();
            let b = CanonicalBytes::new(&entries).unwrap();
            prop_assert_eq!(a.as_bytes(), b.as_bytes());
        }

        /// Canonical bytes always parse back as JSON.
        #[test]
        fn canonical_bytes_valid_json(
            entries in prop::collection::btree_map("[a-z]{1,8}", "[a-zA-Z0-9 ]{0,16}", 0..12)
        ) {
            let cb = CanonicalBytes::new(&entries).unwrap();
            prop_assert!(serde_json::from_slice::<Value>(cb.as_bytes()).is_ok());
        }
    }
}
