//! # Bid Registry
//!
//! Appends bids to open projects. A bidder may submit any number of bids;
//! a bid's proposed milestones must match the project's milestone count.

use dbb_core::{Address, Amount, LedgerError, LedgerEvent, ProjectId, SealedEvent};
use dbb_state::Bid;

use crate::ledger::Ledger;

impl Ledger {
    /// Submit a bid on behalf of `caller` and return its index.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the project does not exist.
    /// - `InvalidState` if bidding is closed.
    /// - `Validation` if `proposed_milestones.len()` differs from the
    ///   project's milestone count.
    pub fn submit_bid(
        &self,
        caller: &Address,
        project_id: ProjectId,
        bid_amount: Amount,
        completion_time: u64,
        proposed_milestones: Vec<Amount>,
    ) -> Result<usize, LedgerError> {
        let index = self.store.with_project(project_id, |slot| {
            slot.project.require_open("submit_bid")?;
            let expected = slot.project.milestone_count();
            if proposed_milestones.len() != expected {
                return Err(LedgerError::Validation(format!(
                    "bid proposes {} milestones but {project_id} has {expected}",
                    proposed_milestones.len()
                )));
            }

            let index = slot.bids.len();
            let sealed = SealedEvent::seal(LedgerEvent::BidSubmitted {
                project_id,
                bid_index: index,
                bidder: caller.clone(),
                bid_amount,
            })?;
            let bid = Bid::new(
                self.store.next_bid_id(),
                project_id,
                index,
                caller.clone(),
                bid_amount,
                completion_time,
                proposed_milestones,
            );
            slot.bids.push(bid);
            self.events.append(sealed);
            Ok(index)
        })?;
        tracing::info!(project_id = project_id.get(), bid_index = index, bidder = %caller, "bid submitted");
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LedgerConfig;
    use dbb_core::{BidId, ErrorKind};

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    fn amounts(v: &[u64]) -> Vec<Amount> {
        v.iter().map(|a| Amount::from(*a)).collect()
    }

    fn setup() -> (Ledger, ProjectId) {
        let (ledger, _) = Ledger::with_account_book(LedgerConfig::default());
        let id = ledger
            .post_project(addr("0xowner"), "clinic", Amount::new(600), 0, amounts(&[100, 200, 300]))
            .unwrap();
        (ledger, id)
    }

    #[test]
    fn test_submit_bid_appends() {
        let (ledger, id) = setup();
        let i0 = ledger.submit_bid(&addr("0xa"), id, Amount::new(590), 10, amounts(&[90, 200, 300])).unwrap();
        let i1 = ledger.submit_bid(&addr("0xa"), id, Amount::new(580), 12, amounts(&[80, 200, 300])).unwrap();
        assert_eq!((i0, i1), (0, 1));
        let bids = ledger.bids(id).unwrap();
        assert_eq!(bids.len(), 2);
        assert_eq!(bids[0].id, BidId::new(1));
        assert_eq!(bids[1].index, 1);
        assert!(bids.iter().all(|b| !b.selected));
        assert_eq!(ledger.bid_count(), 2);
    }

    #[test]
    fn test_milestone_count_mismatch() {
        let (ledger, id) = setup();
        let err = ledger
            .submit_bid(&addr("0xa"), id, Amount::new(1), 0, amounts(&[1, 2]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(ledger.bids(id).unwrap().is_empty());
        assert_eq!(ledger.bid_count(), 0);
    }

    #[test]
    fn test_submit_on_closed_project() {
        let (ledger, id) = setup();
        ledger.submit_bid(&addr("0xa"), id, Amount::new(1), 0, amounts(&[1, 2, 3])).unwrap();
        ledger.select_bid(&addr("0xowner"), id, 0).unwrap();
        // Closed bidding wins over a milestone mismatch.
        let err = ledger
            .submit_bid(&addr("0xb"), id, Amount::new(1), 0, Vec::new())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        assert_eq!(ledger.bids(id).unwrap().len(), 1);
    }

    #[test]
    fn test_submit_on_missing_project() {
        let (ledger, _) = setup();
        let err = ledger
            .submit_bid(&addr("0xa"), ProjectId::new(42), Amount::new(1), 0, amounts(&[1, 2, 3]))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }
}
