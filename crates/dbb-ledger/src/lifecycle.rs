//! # Project Lifecycle
//!
//! Posting projects and selecting the winning bid.
//!
//! ## Security Invariant
//!
//! Only the owner selects. Selection is frozen while a dispute is open.
//! Re-selection after a prior selection is allowed and overwrites the
//! selected bidder; the previously selected bid keeps its `selected` flag,
//! so a bid list can show more than one bid that was selected at some
//! point. The project's `selected_bid_index` is authoritative.

use dbb_core::{Address, Amount, LedgerError, LedgerEvent, ProjectId, SealedEvent};
use dbb_state::Project;

use crate::ledger::Ledger;

/// Fails with `Unauthorized` unless `caller` owns `project`.
pub(crate) fn require_owner(
    operation: &'static str,
    project: &Project,
    caller: &Address,
) -> Result<(), LedgerError> {
    if project.owner != *caller {
        return Err(LedgerError::Unauthorized {
            operation,
            caller: caller.to_string(),
            reason: format!("only the owner of {} may do this", project.id),
        });
    }
    Ok(())
}

impl Ledger {
    /// Post a new project open for bidding.
    ///
    /// # Errors
    ///
    /// `Validation` if `milestones` is empty. The project count is
    /// unchanged and no id is consumed.
    pub fn post_project(
        &self,
        owner: Address,
        description: impl Into<String>,
        budget: Amount,
        deadline: u64,
        milestones: Vec<Amount>,
    ) -> Result<ProjectId, LedgerError> {
        let description = description.into();
        let id = self.store.create_project(|id| {
            let project = Project::new(id, owner, description, budget, deadline, milestones)?;
            let sealed = SealedEvent::seal(LedgerEvent::ProjectPosted {
                project_id: id,
                owner: project.owner.clone(),
                budget,
                milestone_count: project.milestone_count(),
            })?;
            self.events.append(sealed);
            Ok((project, id))
        })?;
        tracing::info!(project_id = id.get(), "project posted");
        Ok(id)
    }

    /// Select the bid at `bid_index` and close bidding.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the project or the bid does not exist.
    /// - `Unauthorized` if `caller` is not the owner.
    /// - `InvalidState` if a dispute is open.
    pub fn select_bid(
        &self,
        caller: &Address,
        project_id: ProjectId,
        bid_index: usize,
    ) -> Result<(), LedgerError> {
        const OP: &str = "select_bid";
        self.store.with_project(project_id, |slot| {
            let bidder = slot.bid(bid_index)?.bidder.clone();
            require_owner(OP, &slot.project, caller)?;
            slot.project.require_undisputed(OP)?;

            let sealed = SealedEvent::seal(LedgerEvent::BidSelected {
                project_id,
                bid_index,
                bidder: bidder.clone(),
            })?;

            if let Some(previous) = slot.project.selected_bidder() {
                tracing::warn!(
                    project_id = project_id.get(),
                    previous = %previous,
                    replacement = %bidder,
                    "overwriting existing bid selection"
                );
            }
            slot.bids[bid_index].mark_selected();
            slot.project.select(bid_index, bidder);
            self.events.append(sealed);
            Ok(())
        })?;
        tracing::info!(project_id = project_id.get(), bid_index, "bid selected");
        Ok(())
    }
}
