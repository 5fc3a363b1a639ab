//! # dbb-ledger: The Design-Bid-Build Ledger
//!
//! A project owner posts work with milestone payment tranches, contractors
//! bid, the owner selects one bid, milestone payments are released from a
//! pooled escrow balance, and disagreements freeze fund movement until an
//! open vote reaches a strict majority.
//!
//! ## Operations
//!
//! | Operation | Module | Caller |
//! |---|---|---|
//! | [`Ledger::post_project`] | [`lifecycle`] | any |
//! | [`Ledger::select_bid`] | [`lifecycle`] | owner |
//! | [`Ledger::submit_bid`] | [`bidding`] | any |
//! | [`Ledger::release_milestone_payment`] | [`escrow`] | owner |
//! | [`Ledger::raise_dispute`] | [`arbitration`] | per [`DisputeRaisePolicy`] |
//! | [`Ledger::vote_on_dispute`] | [`arbitration`] | any |
//! | [`Ledger::deposit`] | [`escrow`] | any |
//!
//! Each operation validates everything before it mutates anything, and
//! emits exactly one notification on success (a vote that leaves the
//! dispute open emits none).

pub mod arbitration;
pub mod bidding;
pub mod config;
pub mod escrow;
pub mod ledger;
pub mod lifecycle;

pub use config::{DisputeRaisePolicy, LedgerConfig};
pub use escrow::{AccountBook, FundTransfer, TransferError};
pub use ledger::Ledger;
