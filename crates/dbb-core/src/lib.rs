//! # dbb-core: Foundational Types for the Design-Bid-Build Ledger
//!
//! This crate is the leaf of the workspace DAG. It defines the primitives
//! every other crate shares and depends on nothing internal.
//!
//! ## Key Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** `ProjectId`, `BidId`,
//!    `DisputeId`, `Address`, `Amount`. No bare integers or strings cross
//!    crate boundaries. You cannot pass a `DisputeId` where a `ProjectId`
//!    is expected.
//!
//! 2. **One error taxonomy.** [`LedgerError`] carries the five failure kinds
//!    every ledger operation can produce. Outer layers (HTTP, CLI) map on
//!    [`ErrorKind`], never on message text.
//!
//! 3. **`CanonicalBytes` newtype.** Notification digests flow through
//!    `CanonicalBytes::new()` (RFC 8785 JCS), so an off-chain indexer
//!    recomputing a digest in another language gets identical bytes.
//!
//! 4. **Hash-chained notifications.** [`EventLog`] links every emitted
//!    [`LedgerEvent`] to its predecessor so indexers can detect gaps.
//!
//! ## Crate Policy
//!
//! - No dependencies on other `dbb-*` crates.
//! - No `unsafe` code.
//! - No `panic!()` or `.unwrap()` outside tests.

pub mod amount;
pub mod canonical;
pub mod digest;
pub mod error;
pub mod event;
pub mod identity;
pub mod temporal;

// Re-export primary types for ergonomic imports.
pub use amount::Amount;
pub use canonical::CanonicalBytes;
pub use digest::{sha256_digest, ContentDigest};
pub use error::{CanonicalizationError, ErrorKind, EventChainError, LedgerError};
pub use event::{verify_records, EventLog, EventRecord, LedgerEvent, SealedEvent};
pub use identity::{Address, BidId, DisputeId, ProjectId};
pub use temporal::Timestamp;
