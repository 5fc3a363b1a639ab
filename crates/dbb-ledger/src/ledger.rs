//! # Ledger Facade
//!
//! [`Ledger`] bundles the store, the event log, the pooled escrow balance
//! and the transfer collaborator. The six operations live in their own
//! modules as further `impl Ledger` blocks; this module holds construction
//! and the read-only queries.

use std::sync::Arc;

use parking_lot::Mutex;

use dbb_core::{
    Address, Amount, DisputeId, EventChainError, EventLog, EventRecord, LedgerError, ProjectId,
};
use dbb_state::{Bid, Dispute, LedgerStore, Project};

use crate::config::LedgerConfig;
use crate::escrow::{AccountBook, FundTransfer};

/// The contracting ledger.
pub struct Ledger {
    pub(crate) config: LedgerConfig,
    pub(crate) store: LedgerStore,
    pub(crate) events: EventLog,
    /// Single pooled escrow balance. Never locked across a transfer.
    pub(crate) pool: Mutex<Amount>,
    pub(crate) transfer: Arc<dyn FundTransfer>,
}

impl std::fmt::Debug for Ledger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ledger")
            .field("config", &self.config)
            .field("projects", &self.store.project_count())
            .field("events", &self.events.len())
            .field("escrow_balance", &*self.pool.lock())
            .finish_non_exhaustive()
    }
}

impl Ledger {
    /// An empty ledger paying out through `transfer`.
    pub fn new(config: LedgerConfig, transfer: Arc<dyn FundTransfer>) -> Self {
        tracing::debug!(policy = %config.dispute_raise_policy, "ledger created");
        Self {
            config,
            store: LedgerStore::new(),
            events: EventLog::new(),
            pool: Mutex::new(Amount::ZERO),
            transfer,
        }
    }

    /// An empty ledger paying out into a fresh in-memory [`AccountBook`].
    pub fn with_account_book(config: LedgerConfig) -> (Self, Arc<AccountBook>) {
        let book = Arc::new(AccountBook::new());
        let ledger = Self::new(config, Arc::clone(&book) as Arc<dyn FundTransfer>);
        (ledger, book)
    }

    /// Active configuration.
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // ── Queries ────────────────────────────────────────────────────────

    pub fn project(&self, id: ProjectId) -> Result<Project, LedgerError> {
        self.store.project(id)
    }

    pub fn projects(&self) -> Vec<Project> {
        self.store.projects()
    }

    pub fn bids(&self, project_id: ProjectId) -> Result<Vec<Bid>, LedgerError> {
        self.store.bids(project_id)
    }

    pub fn bid(&self, project_id: ProjectId, index: usize) -> Result<Bid, LedgerError> {
        self.store
            .read_project(project_id, |slot| slot.bid(index).cloned())?
    }

    pub fn dispute(&self, id: DisputeId) -> Result<Dispute, LedgerError> {
        self.store.dispute(id)
    }

    pub fn disputes_for_project(&self, project_id: ProjectId) -> Result<Vec<Dispute>, LedgerError> {
        self.store.disputes_for_project(project_id)
    }

    /// Whether `voter` has voted on dispute `id`.
    pub fn has_voted(&self, id: DisputeId, voter: &Address) -> Result<bool, LedgerError> {
        Ok(self.store.dispute(id)?.has_voted(voter))
    }

    pub fn project_count(&self) -> u64 {
        self.store.project_count()
    }

    pub fn bid_count(&self) -> u64 {
        self.store.bid_count()
    }

    pub fn dispute_count(&self) -> u64 {
        self.store.dispute_count()
    }

    /// Current pooled escrow balance.
    pub fn escrow_balance(&self) -> Amount {
        *self.pool.lock()
    }

    /// Every emitted notification, oldest first.
    pub fn events(&self) -> Vec<EventRecord> {
        self.events.records()
    }

    /// Notifications with a sequence number greater than `sequence`.
    pub fn events_since(&self, sequence: u64) -> Vec<EventRecord> {
        self.events.records_since(sequence)
    }

    /// Recompute the notification hash chain.
    pub fn verify_events(&self) -> Result<(), EventChainError> {
        self.events.verify_chain()
    }
}
