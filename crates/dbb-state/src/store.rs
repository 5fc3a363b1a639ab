//! # Ledger Store
//!
//! Owns every project, bid and dispute, and the three id sequences.
//!
//! ## Layout
//!
//! ```text
//! projects:      RwLock<BTreeMap<ProjectId, Arc<ReentrantMutex<RefCell<ProjectSlot>>>>>
//! dispute_index: RwLock<HashMap<DisputeId, ProjectId>>
//! sequences:     AtomicU64 × 3 (project, bid, dispute)
//! ```
//!
//! A [`ProjectSlot`] keeps a project, its bid list and its disputes
//! together, so every operation touching one project takes exactly one
//! exclusive section. The registry lock is held only long enough to clone
//! the slot handle (or, for `create_project`, to allocate and insert).
//!
//! ## Lock Order
//!
//! `projects → slot → dispute_index`. Dispute lookups read the index,
//! release it, then lock the owning slot.
//!
//! ## Re-entrancy
//!
//! The slot mutex is re-entrant so that an external collaborator invoked
//! while the slot is held (the escrow transfer) can call back into the
//! ledger on the same thread and observe the in-flight state. Such a
//! call must not find the `RefCell` borrowed; [`LedgerStore::with_slot`]
//! hands the caller the `RefCell` itself so it can drop its borrow before
//! calling out. A conflicting borrow surfaces as `InvalidState`, never as
//! a panic.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::{ReentrantMutex, RwLock};

use dbb_core::{BidId, DisputeId, LedgerError, ProjectId};

use crate::bid::Bid;
use crate::dispute::Dispute;
use crate::project::Project;

// ── Sequences ──────────────────────────────────────────────────────────

/// Strictly increasing id generator starting at 1.
#[derive(Debug, Default)]
pub struct Sequence(AtomicU64);

impl Sequence {
    /// A fresh sequence. The first value handed out is 1.
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Allocate the next value.
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// The value `next` would return, without allocating it.
    ///
    /// Only meaningful when the caller serializes allocation externally.
    pub fn peek(&self) -> u64 {
        self.0.load(Ordering::SeqCst) + 1
    }

    /// Number of values handed out so far.
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Project Slot ───────────────────────────────────────────────────────

/// A project with everything hanging off it.
#[derive(Debug, Clone)]
pub struct ProjectSlot {
    pub project: Project,
    pub bids: Vec<Bid>,
    pub disputes: BTreeMap<DisputeId, Dispute>,
}

impl ProjectSlot {
    /// A slot with no bids or disputes.
    pub fn new(project: Project) -> Self {
        Self {
            project,
            bids: Vec::new(),
            disputes: BTreeMap::new(),
        }
    }

    /// The currently open dispute, if any.
    pub fn open_dispute(&self) -> Option<&Dispute> {
        self.disputes.values().find(|d| !d.resolved)
    }

    /// Bid at `index`, or `NotFound`.
    pub fn bid(&self, index: usize) -> Result<&Bid, LedgerError> {
        self.bids
            .get(index)
            .ok_or_else(|| LedgerError::not_found("bid", format!("{}#{index}", self.project.id)))
    }
}

type SlotHandle = Arc<ReentrantMutex<RefCell<ProjectSlot>>>;

// ── Store ──────────────────────────────────────────────────────────────

/// Thread-safe in-memory store for all ledger entities.
#[derive(Debug, Default)]
pub struct LedgerStore {
    projects: RwLock<BTreeMap<ProjectId, SlotHandle>>,
    dispute_index: RwLock<HashMap<DisputeId, ProjectId>>,
    project_seq: Sequence,
    bid_seq: Sequence,
    dispute_seq: Sequence,
}

impl LedgerStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a project id, build the project, and insert it.
    ///
    /// `build` runs under the registry write lock with the id the project
    /// will receive. If it fails nothing is allocated, so project ids are
    /// never skipped. If it succeeds the project is inserted
    /// unconditionally.
    pub fn create_project<R>(
        &self,
        build: impl FnOnce(ProjectId) -> Result<(Project, R), LedgerError>,
    ) -> Result<R, LedgerError> {
        let mut projects = self.projects.write();
        let id = ProjectId::new(self.project_seq.peek());
        let (project, out) = build(id)?;
        let allocated = self.project_seq.next();
        debug_assert_eq!(allocated, id.get());
        let slot = Arc::new(ReentrantMutex::new(RefCell::new(ProjectSlot::new(project))));
        projects.insert(id, slot);
        Ok(out)
    }

    fn handle(&self, id: ProjectId) -> Result<SlotHandle, LedgerError> {
        self.projects
            .read()
            .get(&id)
            .cloned()
            .ok_or_else(|| LedgerError::not_found("project", id))
    }

    /// Run `f` inside the project's exclusive section with the raw cell.
    ///
    /// Use this when `f` must call out of the ledger while holding the
    /// section. Borrow the cell, drop the borrow, then call out.
    pub fn with_slot<R>(
        &self,
        id: ProjectId,
        f: impl FnOnce(&RefCell<ProjectSlot>) -> Result<R, LedgerError>,
    ) -> Result<R, LedgerError> {
        let handle = self.handle(id)?;
        let guard = handle.lock();
        f(&*guard)
    }

    /// Run `f` with exclusive mutable access to the project's slot.
    pub fn with_project<R>(
        &self,
        id: ProjectId,
        f: impl FnOnce(&mut ProjectSlot) -> Result<R, LedgerError>,
    ) -> Result<R, LedgerError> {
        self.with_slot(id, |cell| {
            let mut slot = cell.try_borrow_mut().map_err(|_| busy(id))?;
            f(&mut *slot)
        })
    }

    /// Run `f` with shared access to the project's slot.
    pub fn read_project<R>(
        &self,
        id: ProjectId,
        f: impl FnOnce(&ProjectSlot) -> R,
    ) -> Result<R, LedgerError> {
        self.with_slot(id, |cell| {
            let slot = cell.try_borrow().map_err(|_| busy(id))?;
            Ok(f(&*slot))
        })
    }

    // ── Id allocation ──────────────────────────────────────────────────

    /// Allocate a bid id. Ids consumed by rejected submissions are not reused.
    pub fn next_bid_id(&self) -> BidId {
        BidId::new(self.bid_seq.next())
    }

    /// Allocate a dispute id. Ids consumed by rejected raises are not reused.
    pub fn next_dispute_id(&self) -> DisputeId {
        DisputeId::new(self.dispute_seq.next())
    }

    // ── Dispute index ──────────────────────────────────────────────────

    /// Record which project owns a dispute. Call with the project's slot held.
    pub fn index_dispute(&self, dispute_id: DisputeId, project_id: ProjectId) {
        self.dispute_index.write().insert(dispute_id, project_id);
    }

    /// The project that owns `dispute_id`.
    pub fn dispute_project(&self, dispute_id: DisputeId) -> Result<ProjectId, LedgerError> {
        self.dispute_index
            .read()
            .get(&dispute_id)
            .copied()
            .ok_or_else(|| LedgerError::not_found("dispute", dispute_id))
    }

    // ── Snapshots ──────────────────────────────────────────────────────

    /// Snapshot of one project.
    pub fn project(&self, id: ProjectId) -> Result<Project, LedgerError> {
        self.read_project(id, |slot| slot.project.clone())
    }

    /// Snapshots of every project, ordered by id.
    pub fn projects(&self) -> Vec<Project> {
        self.handles()
            .into_iter()
            .filter_map(|(id, _)| self.project(id).ok())
            .collect()
    }

    /// Snapshot of a project's bid list.
    pub fn bids(&self, id: ProjectId) -> Result<Vec<Bid>, LedgerError> {
        self.read_project(id, |slot| slot.bids.clone())
    }

    /// Snapshot of one dispute.
    pub fn dispute(&self, dispute_id: DisputeId) -> Result<Dispute, LedgerError> {
        let project_id = self.dispute_project(dispute_id)?;
        self.read_project(project_id, |slot| slot.disputes.get(&dispute_id).cloned())?
            .ok_or_else(|| LedgerError::not_found("dispute", dispute_id))
    }

    /// Snapshots of a project's disputes, ordered by id.
    pub fn disputes_for_project(&self, id: ProjectId) -> Result<Vec<Dispute>, LedgerError> {
        self.read_project(id, |slot| slot.disputes.values().cloned().collect())
    }

    /// Number of projects posted.
    pub fn project_count(&self) -> u64 {
        self.projects.read().len() as u64
    }

    /// Number of bids stored across all projects.
    ///
    /// Bid ids are drawn only for bids that are stored, so the sequence
    /// position is the count.
    pub fn bid_count(&self) -> u64 {
        self.bid_seq.current()
    }

    /// Number of disputes raised across all projects.
    pub fn dispute_count(&self) -> u64 {
        self.dispute_index.read().len() as u64
    }

    fn handles(&self) -> Vec<(ProjectId, SlotHandle)> {
        self.projects
            .read()
            .iter()
            .map(|(id, h)| (*id, Arc::clone(h)))
            .collect()
    }
}

fn busy(id: ProjectId) -> LedgerError {
    tracing::debug!(project_id = id.get(), "project slot already borrowed");
    LedgerError::InvalidState {
        operation: "access",
        subject: id.to_string(),
        reason: "project is being modified by an in-flight operation".into(),
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use dbb_core::{Address, Amount};
    use proptest::prelude::*;

    proptest! {
        /// Successful creates get ids 1..=n with no gaps, whatever the
        /// interleaving of failures.
        #[test]
        fn project_ids_dense_under_failures(valid in prop::collection::vec(any::<bool>(), 0..40)) {
            let store = LedgerStore::new();
            let mut next = 1u64;
            for ok in valid {
                let milestones = if ok { vec![Amount::new(1)] } else { Vec::new() };
                let res = store.create_project(|id| {
                    let p = Project::new(
                        id,
                        Address::new("0xowner").unwrap(),
                        String::new(),
                        Amount::ZERO,
                        0,
                        milestones,
                    )?;
                    Ok((p, id))
                });
                if ok {
                    prop_assert_eq!(res.unwrap().get(), next);
                    next += 1;
                } else {
                    prop_assert!(res.is_err());
                }
                prop_assert_eq!(store.project_count(), next - 1);
            }
        }
    }
}
