//! # Project Record
//!
//! A posted unit of work with milestone-based payment tranches.
//!
//! ## Lifecycle
//!
//! ```text
//!              select_bid
//!   Open ───────────────────▶ Closed
//!
//!              raise_dispute
//!   Undisputed ─────────────▶ Disputed
//!        ▲                       │
//!        └───────────────────────┘
//!          vote reaches majority
//! ```
//!
//! The two axes are independent. A dispute may be raised while bidding is
//! still open. A fully paid project keeps its flags; nothing is terminal.
//!
//! ## Security Invariant
//!
//! `milestone_paid.len() == milestones.len()` and `milestones` is never
//! empty. Both vectors are private; the constructor establishes the
//! invariant and no method changes either length.

use serde::{Deserialize, Serialize};

use dbb_core::{Address, Amount, LedgerError, ProjectId, Timestamp};

// ── Lifecycle Axes ─────────────────────────────────────────────────────

/// Whether the project still accepts bids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BiddingPhase {
    /// Accepting bids. Initial.
    Open,
    /// A bid has been selected.
    Closed,
}

impl BiddingPhase {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Closed => "CLOSED",
        }
    }
}

impl std::fmt::Display for BiddingPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a dispute currently freezes selection and payment release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisputeStatus {
    /// No open dispute. Initial.
    Undisputed,
    /// A dispute is open.
    Disputed,
}

impl DisputeStatus {
    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undisputed => "UNDISPUTED",
            Self::Disputed => "DISPUTED",
        }
    }
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Project ────────────────────────────────────────────────────────────

/// A posted project.
///
/// Serialize-only: the milestone invariant is established by
/// [`Project::new`] and cannot be trusted from external input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Project {
    /// Sequential identifier.
    pub id: ProjectId,
    /// The account that posted the project and controls selection and release.
    pub owner: Address,
    /// Free-text description.
    pub description: String,
    /// Declared budget. Informational; not checked against milestones.
    pub budget: Amount,
    /// Declared deadline. Carried as metadata and never enforced.
    pub deadline: u64,
    /// When the project was posted.
    pub created_at: Timestamp,
    active: bool,
    selected_bidder: Option<Address>,
    selected_bid_index: usize,
    milestones: Vec<Amount>,
    milestone_paid: Vec<bool>,
    dispute_raised: bool,
}

impl Project {
    /// Construct an open, undisputed project.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Validation`] if `milestones` is empty.
    pub fn new(
        id: ProjectId,
        owner: Address,
        description: String,
        budget: Amount,
        deadline: u64,
        milestones: Vec<Amount>,
    ) -> Result<Self, LedgerError> {
        if milestones.is_empty() {
            return Err(LedgerError::Validation(
                "a project requires at least one milestone".into(),
            ));
        }
        let milestone_paid = vec![false; milestones.len()];
        Ok(Self {
            id,
            owner,
            description,
            budget,
            deadline,
            created_at: Timestamp::now(),
            active: true,
            selected_bidder: None,
            selected_bid_index: 0,
            milestones,
            milestone_paid,
            dispute_raised: false,
        })
    }

    /// Whether the project is still accepting bids.
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// The bidder whose bid was selected, if any.
    pub fn selected_bidder(&self) -> Option<&Address> {
        self.selected_bidder.as_ref()
    }

    /// Index of the selected bid. Meaningful only once a bidder is selected.
    pub fn selected_bid_index(&self) -> usize {
        self.selected_bid_index
    }

    /// Milestone payment amounts, in order.
    pub fn milestones(&self) -> &[Amount] {
        &self.milestones
    }

    /// Paid flags, parallel to [`milestones`](Self::milestones).
    pub fn milestone_paid(&self) -> &[bool] {
        &self.milestone_paid
    }

    /// Number of milestones.
    pub fn milestone_count(&self) -> usize {
        self.milestones.len()
    }

    /// Whether a dispute is currently open.
    pub fn dispute_raised(&self) -> bool {
        self.dispute_raised
    }

    /// Current position on the bidding axis.
    pub fn bidding_phase(&self) -> BiddingPhase {
        if self.active {
            BiddingPhase::Open
        } else {
            BiddingPhase::Closed
        }
    }

    /// Current position on the dispute axis.
    pub fn dispute_status(&self) -> DisputeStatus {
        if self.dispute_raised {
            DisputeStatus::Disputed
        } else {
            DisputeStatus::Undisputed
        }
    }

    /// Sum of paid milestone amounts. `None` on overflow.
    pub fn paid_total(&self) -> Option<Amount> {
        self.milestones
            .iter()
            .zip(&self.milestone_paid)
            .filter(|(_, paid)| **paid)
            .try_fold(Amount::ZERO, |acc, (amount, _)| acc.checked_add(*amount))
    }

    /// Whether every milestone has been paid.
    pub fn all_milestones_paid(&self) -> bool {
        self.milestone_paid.iter().all(|p| *p)
    }

    // ── Preconditions ──────────────────────────────────────────────────

    /// Fails with `InvalidState` unless bidding is open.
    pub fn require_open(&self, operation: &'static str) -> Result<(), LedgerError> {
        if !self.active {
            return Err(LedgerError::InvalidState {
                operation,
                subject: self.id.to_string(),
                reason: "bidding is closed".into(),
            });
        }
        Ok(())
    }

    /// Fails with `InvalidState` while a dispute is open.
    pub fn require_undisputed(&self, operation: &'static str) -> Result<(), LedgerError> {
        if self.dispute_raised {
            return Err(LedgerError::InvalidState {
                operation,
                subject: self.id.to_string(),
                reason: "a dispute is open".into(),
            });
        }
        Ok(())
    }

    /// The selected bidder, or `Validation` if none has been selected.
    pub fn require_selected_bidder(&self) -> Result<&Address, LedgerError> {
        self.selected_bidder.as_ref().ok_or_else(|| {
            LedgerError::Validation(format!("{} has no selected bidder", self.id))
        })
    }

    /// The amount of an unpaid milestone.
    ///
    /// # Errors
    ///
    /// `Validation` if the index is out of range or the milestone is paid.
    pub fn unpaid_milestone(&self, index: usize) -> Result<Amount, LedgerError> {
        let amount = self.milestones.get(index).copied().ok_or_else(|| {
            LedgerError::Validation(format!(
                "milestone index {index} out of range for {} ({} milestones)",
                self.id,
                self.milestones.len()
            ))
        })?;
        if self.milestone_paid[index] {
            return Err(LedgerError::Validation(format!(
                "milestone {index} of {} is already paid",
                self.id
            )));
        }
        Ok(amount)
    }

    // ── Transitions ────────────────────────────────────────────────────

    /// Record a bid selection and close bidding.
    ///
    /// A repeated selection overwrites the previous one.
    pub fn select(&mut self, bid_index: usize, bidder: Address) {
        self.selected_bidder = Some(bidder);
        self.selected_bid_index = bid_index;
        self.active = false;
    }

    /// Set or clear a milestone's paid flag. Out-of-range indices are ignored.
    pub fn set_milestone_paid(&mut self, index: usize, paid: bool) {
        if let Some(flag) = self.milestone_paid.get_mut(index) {
            *flag = paid;
        }
    }

    /// Enter the `Disputed` state.
    pub fn open_dispute(&mut self) {
        self.dispute_raised = true;
    }

    /// Return to the `Undisputed` state.
    pub fn close_dispute(&mut self) {
        self.dispute_raised = false;
    }
}
