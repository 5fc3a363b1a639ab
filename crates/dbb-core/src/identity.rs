//! # Domain Identity Newtypes
//!
//! Sequential identifiers for the three ledger entity kinds, plus the
//! validated [`Address`] type used for owners, bidders, disputants and
//! voters.
//!
//! ## Security Invariant
//!
//! Type-level distinction between identifier namespaces prevents a
//! dispute id from being accepted where a project id is expected. Ids are
//! only minted by the store's sequences; the public constructor exists for
//! lookups and deserialization, never for allocation.

use serde::{Deserialize, Serialize};

use crate::error::LedgerError;

/// Unique identifier for a posted project. Allocated sequentially from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(u64);

/// Unique identifier for a submitted bid. Allocated sequentially from 1
/// across all projects; bids are addressed by their per-project index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BidId(u64);

/// Unique identifier for a dispute. Allocated sequentially from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DisputeId(u64);

macro_rules! sequential_id {
    ($ty:ident, $prefix:literal) => {
        impl $ty {
            /// Wrap a raw sequence value.
            pub fn new(raw: u64) -> Self {
                Self(raw)
            }

            /// The raw sequence value.
            pub fn get(&self) -> u64 {
                self.0
            }
        }

        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($prefix, ":{}"), self.0)
            }
        }

        impl From<u64> for $ty {
            fn from(raw: u64) -> Self {
                Self(raw)
            }
        }
    };
}

sequential_id!(ProjectId, "project");
sequential_id!(BidId, "bid");
sequential_id!(DisputeId, "dispute");

/// Maximum accepted length of an address string.
pub const MAX_ADDRESS_LEN: usize = 128;

/// An account address: a project owner, bidder, disputant or voter.
///
/// Addresses are opaque to the ledger and compared byte-for-byte. The
/// constructor rejects empty strings, whitespace and non-printable
/// characters so that an address in a log line or HTTP header is always
/// unambiguous.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// Validate and wrap an address string.
    pub fn new(s: impl Into<String>) -> Result<Self, LedgerError> {
        let s = s.into();
        if s.is_empty() {
            return Err(LedgerError::Validation("address must not be empty".into()));
        }
        if s.len() > MAX_ADDRESS_LEN {
            return Err(LedgerError::Validation(format!(
                "address exceeds {MAX_ADDRESS_LEN} characters"
            )));
        }
        if !s.chars().all(|c| c.is_ascii_graphic()) {
            return Err(LedgerError::Validation(format!(
                "address {s:?} must contain only printable ASCII without whitespace"
            )));
        }
        Ok(Self(s))
    }

    /// Access the address string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Address {
    type Error = LedgerError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<Address> for String {
    fn from(a: Address) -> Self {
        a.0
    }
}

impl std::str::FromStr for Address {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
