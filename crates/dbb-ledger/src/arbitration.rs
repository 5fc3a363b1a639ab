//! # Dispute Voting
//!
//! Raising disputes and tallying votes.
//!
//! ## Resolution
//!
//! A dispute resolves at the first vote after which one side strictly
//! leads. From an empty tally that is always the first vote, so the
//! disputant's project is usually unfrozen by a single voter. Later votes
//! on the resolved dispute fail with `InvalidState`.
//!
//! ## Security Invariant
//!
//! At most one open dispute per project. While it is open, bid selection
//! and milestone release on that project fail with `InvalidState`.
//!
//! Voting is open to every address and each address counts once, so
//! anyone able to mint addresses can decide a dispute. Weighting or
//! restricting the electorate is outside this ledger.

use dbb_core::{Address, DisputeId, LedgerError, LedgerEvent, ProjectId, SealedEvent};
use dbb_state::{Dispute, VoteOutcome};

use crate::ledger::Ledger;

impl Ledger {
    /// Open a dispute on `project_id`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the project does not exist.
    /// - `InvalidState` if a dispute is already open.
    /// - `Unauthorized` if the configured [`DisputeRaisePolicy`] does not
    ///   admit `caller`.
    ///
    /// [`DisputeRaisePolicy`]: crate::config::DisputeRaisePolicy
    pub fn raise_dispute(
        &self,
        caller: &Address,
        project_id: ProjectId,
        reason: impl Into<String>,
    ) -> Result<DisputeId, LedgerError> {
        const OP: &str = "raise_dispute";
        let reason = reason.into();
        let policy = self.config.dispute_raise_policy;
        let dispute_id = self.store.with_project(project_id, |slot| {
            if let Some(open) = slot.open_dispute() {
                return Err(LedgerError::InvalidState {
                    operation: OP,
                    subject: project_id.to_string(),
                    reason: format!("{} is still open", open.id),
                });
            }
            slot.project.require_undisputed(OP)?;
            if !policy.permits(&slot.project, caller) {
                return Err(LedgerError::Unauthorized {
                    operation: OP,
                    caller: caller.to_string(),
                    reason: policy.requirement().into(),
                });
            }

            let dispute_id = self.store.next_dispute_id();
            let sealed = SealedEvent::seal(LedgerEvent::DisputeRaised {
                dispute_id,
                project_id,
                disputant: caller.clone(),
                reason: reason.clone(),
            })?;
            slot.disputes.insert(
                dispute_id,
                Dispute::new(dispute_id, project_id, caller.clone(), reason),
            );
            slot.project.open_dispute();
            self.store.index_dispute(dispute_id, project_id);
            self.events.append(sealed);
            Ok(dispute_id)
        })?;
        tracing::info!(
            dispute_id = dispute_id.get(),
            project_id = project_id.get(),
            disputant = %caller,
            "dispute raised"
        );
        Ok(dispute_id)
    }

    /// Cast `caller`'s vote on `dispute_id`.
    ///
    /// Returns the tally after the vote and, if this vote decided the
    /// dispute, its outcome.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the dispute does not exist.
    /// - `InvalidState` if the dispute is already resolved.
    /// - `Validation` if `caller` has already voted on it.
    pub fn vote_on_dispute(
        &self,
        caller: &Address,
        dispute_id: DisputeId,
        vote: bool,
    ) -> Result<VoteOutcome, LedgerError> {
        let project_id = self.store.dispute_project(dispute_id)?;
        let outcome = self.store.with_project(project_id, |slot| {
            let dispute = slot
                .disputes
                .get_mut(&dispute_id)
                .ok_or_else(|| LedgerError::not_found("dispute", dispute_id))?;

            let sealed = match dispute.preview_vote(caller, vote)? {
                VoteOutcome::Resolved(result, tally) => {
                    Some(SealedEvent::seal(LedgerEvent::DisputeResolved {
                        dispute_id,
                        project_id,
                        result: result.as_bool(),
                        yes_votes: tally.yes,
                        no_votes: tally.no,
                    })?)
                }
                VoteOutcome::Pending(_) => None,
            };

            let outcome = dispute.cast_vote(caller.clone(), vote)?;
            if let Some(sealed) = sealed {
                slot.project.close_dispute();
                self.events.append(sealed);
            }
            Ok(outcome)
        })?;

        match outcome {
            VoteOutcome::Resolved(result, tally) => tracing::info!(
                dispute_id = dispute_id.get(),
                project_id = project_id.get(),
                %result,
                yes = tally.yes,
                no = tally.no,
                "dispute resolved"
            ),
            VoteOutcome::Pending(tally) => tracing::info!(
                dispute_id = dispute_id.get(),
                yes = tally.yes,
                no = tally.no,
                "vote recorded"
            ),
        }
        Ok(outcome)
    }
}
