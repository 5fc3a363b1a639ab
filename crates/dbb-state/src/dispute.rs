//! # Dispute Record and Vote Tally
//!
//! A dispute freezes bid selection and payment release on its project
//! until a vote reaches a strict majority.
//!
//! ## Resolution Rule
//!
//! After each vote: `yes > no` resolves as upheld (`true`), `no > yes`
//! resolves as rejected (`false`), a tie leaves the dispute open. There is
//! no quorum and no timeout, so the first vote always resolves a dispute
//! unless a later implementation adds one. A permanently tied dispute
//! stays open forever.
//!
//! ## Security Invariant
//!
//! `voters.len() == yes_votes + no_votes`. Each address votes at most
//! once. A resolved dispute never changes again.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use dbb_core::{Address, DisputeId, LedgerError, ProjectId, Timestamp};

/// How a resolved dispute came out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisputeOutcome {
    /// Yes votes won.
    Upheld,
    /// No votes won.
    Rejected,
}

impl DisputeOutcome {
    /// The boolean result carried by `DisputeResolved`.
    pub fn as_bool(&self) -> bool {
        matches!(self, Self::Upheld)
    }

    /// The canonical string name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Upheld => "UPHELD",
            Self::Rejected => "REJECTED",
        }
    }
}

impl std::fmt::Display for DisputeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Vote counts at a point in time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub yes: u64,
    pub no: u64,
}

impl Tally {
    /// Add one vote.
    pub fn with_vote(self, vote: bool) -> Self {
        if vote {
            Self {
                yes: self.yes.saturating_add(1),
                ..self
            }
        } else {
            Self {
                no: self.no.saturating_add(1),
                ..self
            }
        }
    }

    /// The outcome if one side strictly leads.
    pub fn majority(&self) -> Option<DisputeOutcome> {
        match self.yes.cmp(&self.no) {
            std::cmp::Ordering::Greater => Some(DisputeOutcome::Upheld),
            std::cmp::Ordering::Less => Some(DisputeOutcome::Rejected),
            std::cmp::Ordering::Equal => None,
        }
    }
}

/// Result of casting one vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// Recorded; the dispute remains open.
    Pending(Tally),
    /// Recorded; this vote resolved the dispute.
    Resolved(DisputeOutcome, Tally),
}

impl VoteOutcome {
    /// The tally after the vote.
    pub fn tally(&self) -> Tally {
        match self {
            Self::Pending(t) | Self::Resolved(_, t) => *t,
        }
    }
}

/// A disagreement on a project, settled by open voting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispute {
    pub id: DisputeId,
    pub project_id: ProjectId,
    pub disputant: Address,
    pub reason: String,
    pub voters: BTreeSet<Address>,
    pub yes_votes: u64,
    pub no_votes: u64,
    pub resolved: bool,
    /// Set exactly when `resolved` becomes true.
    pub outcome: Option<DisputeOutcome>,
    pub raised_at: Timestamp,
}

impl Dispute {
    /// An open dispute with no votes.
    pub fn new(id: DisputeId, project_id: ProjectId, disputant: Address, reason: String) -> Self {
        Self {
            id,
            project_id,
            disputant,
            reason,
            voters: BTreeSet::new(),
            yes_votes: 0,
            no_votes: 0,
            resolved: false,
            outcome: None,
            raised_at: Timestamp::now(),
        }
    }

    /// Current vote counts.
    pub fn tally(&self) -> Tally {
        Tally {
            yes: self.yes_votes,
            no: self.no_votes,
        }
    }

    /// Whether `voter` has already voted.
    pub fn has_voted(&self, voter: &Address) -> bool {
        self.voters.contains(voter)
    }

    /// What casting `vote` would do, without recording it.
    ///
    /// # Errors
    ///
    /// `InvalidState` if the dispute is resolved; `Validation` if `voter`
    /// has already voted.
    pub fn preview_vote(&self, voter: &Address, vote: bool) -> Result<VoteOutcome, LedgerError> {
        if self.resolved {
            return Err(LedgerError::InvalidState {
                operation: "vote_on_dispute",
                subject: self.id.to_string(),
                reason: "dispute is already resolved".into(),
            });
        }
        if self.has_voted(voter) {
            return Err(LedgerError::Validation(format!(
                "{voter} has already voted on {}",
                self.id
            )));
        }
        let tally = self.tally().with_vote(vote);
        Ok(match tally.majority() {
            Some(outcome) => VoteOutcome::Resolved(outcome, tally),
            None => VoteOutcome::Pending(tally),
        })
    }

    /// Record a vote and resolve on strict majority.
    ///
    /// The caller is responsible for clearing the project's dispute flag
    /// when this returns [`VoteOutcome::Resolved`].
    pub fn cast_vote(&mut self, voter: Address, vote: bool) -> Result<VoteOutcome, LedgerError> {
        let outcome = self.preview_vote(&voter, vote)?;
        let tally = outcome.tally();
        self.voters.insert(voter);
        self.yes_votes = tally.yes;
        self.no_votes = tally.no;
        if let VoteOutcome::Resolved(result, _) = outcome {
            self.resolved = true;
            self.outcome = Some(result);
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    fn dispute() -> Dispute {
        Dispute::new(
            DisputeId::new(1),
            ProjectId::new(1),
            addr("0xbuilder"),
            "late payment".into(),
        )
    }

    #[test]
    fn test_first_vote_resolves() {
        let mut d = dispute();
        let out = d.cast_vote(addr("0xv1"), true).unwrap();
        assert_eq!(
            out,
            VoteOutcome::Resolved(DisputeOutcome::Upheld, Tally { yes: 1, no: 0 })
        );
        assert!(d.resolved);
        assert_eq!(d.outcome, Some(DisputeOutcome::Upheld));
    }

    #[test]
    fn test_no_majority_rejects() {
        let mut d = dispute();
        let out = d.cast_vote(addr("0xv1"), false).unwrap();
        assert!(matches!(
            out,
            VoteOutcome::Resolved(DisputeOutcome::Rejected, _)
        ));
        assert!(!d.outcome.unwrap().as_bool());
    }

    #[test]
    fn test_duplicate_vote_rejected() {
        let mut d = dispute();
        d.voters.insert(addr("0xv1"));
        d.yes_votes = 1;
        d.no_votes = 1;
        d.voters.insert(addr("0xv2"));
        let err = d.cast_vote(addr("0xv1"), true).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert_eq!(d.tally(), Tally { yes: 1, no: 1 });
    }

    #[test]
    fn test_resolved_dispute_rejects_votes() {
        let mut d = dispute();
        d.cast_vote(addr("0xv1"), true).unwrap();
        let err = d.cast_vote(addr("0xv2"), false).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidState { .. }));
        assert_eq!(d.voters.len(), 1);
    }

    #[test]
    fn test_preview_does_not_mutate() {
        let d = dispute();
        let out = d.preview_vote(&addr("0xv1"), true).unwrap();
        assert!(matches!(out, VoteOutcome::Resolved(..)));
        assert!(!d.resolved);
        assert!(d.voters.is_empty());
    }

    #[test]
    fn test_tie_stays_open() {
        // A tie can only arise from an already-tied state; seed one.
        let mut d = dispute();
        d.voters.insert(addr("0xa"));
        d.yes_votes = 1;
        let out = d.cast_vote(addr("0xb"), false).unwrap();
        assert_eq!(out, VoteOutcome::Pending(Tally { yes: 1, no: 1 }));
        assert!(!d.resolved);
        assert_eq!(d.outcome, None);
    }

    #[test]
    fn test_tally_majority() {
        assert_eq!(Tally { yes: 0, no: 0 }.majority(), None);
        assert_eq!(Tally { yes: 3, no: 3 }.majority(), None);
        assert_eq!(
            Tally { yes: 2, no: 1 }.majority(),
            Some(DisputeOutcome::Upheld)
        );
        assert_eq!(
            Tally { yes: 0, no: 1 }.majority(),
            Some(DisputeOutcome::Rejected)
        );
    }
}
