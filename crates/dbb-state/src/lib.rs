//! # dbb-state: Ledger Records and Store
//!
//! Entity records for the three things the ledger tracks, and the
//! in-memory store that owns them.
//!
//! ## Records
//!
//! - **Project** ([`project`]): two orthogonal lifecycle axes,
//!   [`BiddingPhase`] `Open → Closed` and [`DisputeStatus`]
//!   `Undisputed ⇄ Disputed`. No terminal state.
//!
//! - **Bid** ([`bid`]): append-only per project; only the `selected` flag
//!   ever changes.
//!
//! - **Dispute** ([`dispute`]): owns its voter set and resolves exactly
//!   once, at the first strict majority.
//!
//! ## Store
//!
//! [`LedgerStore`] holds each project together with its bids and
//! disputes in one [`ProjectSlot`] behind a re-entrant exclusive section.
//! Operations on one project are serialized; operations on distinct
//! projects proceed in parallel. Reads hand out owned snapshots.

pub mod bid;
pub mod dispute;
pub mod project;
pub mod store;

pub use bid::Bid;
pub use dispute::{Dispute, DisputeOutcome, Tally, VoteOutcome};
pub use project::{BiddingPhase, DisputeStatus, Project};
pub use store::{LedgerStore, ProjectSlot, Sequence};
