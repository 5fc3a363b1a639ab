//! # Bid Record

use serde::{Deserialize, Serialize};

use dbb_core::{Address, Amount, BidId, ProjectId, Timestamp};

/// A contractor's offer on a project.
///
/// Bids are addressed by `(project_id, index)`. `id` is a ledger-wide
/// sequence number for indexers, allocated only after validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub project_id: ProjectId,
    /// Position in the project's bid list.
    pub index: usize,
    pub bidder: Address,
    pub bid_amount: Amount,
    /// Proposed completion time. Metadata only.
    pub completion_time: u64,
    pub proposed_milestones: Vec<Amount>,
    pub selected: bool,
    pub submitted_at: Timestamp,
}

impl Bid {
    /// An unselected bid.
    pub fn new(
        id: BidId,
        project_id: ProjectId,
        index: usize,
        bidder: Address,
        bid_amount: Amount,
        completion_time: u64,
        proposed_milestones: Vec<Amount>,
    ) -> Self {
        Self {
            id,
            project_id,
            index,
            bidder,
            bid_amount,
            completion_time,
            proposed_milestones,
            selected: false,
            submitted_at: Timestamp::now(),
        }
    }

    /// Mark this bid as the selected one.
    pub fn mark_selected(&mut self) {
        self.selected = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_bid_is_unselected() {
        let mut bid = Bid::new(
            BidId::new(1),
            ProjectId::new(1),
            0,
            Address::new("0xbuilder").unwrap(),
            Amount::new(550),
            1_900_000_000,
            vec![Amount::new(100), Amount::new(450)],
        );
        assert!(!bid.selected);
        bid.mark_selected();
        assert!(bid.selected);
    }

    #[test]
    fn test_bid_json_shape() {
        let bid = Bid::new(
            BidId::new(3),
            ProjectId::new(2),
            1,
            Address::new("0xbuilder").unwrap(),
            Amount::new(10),
            0,
            vec![Amount::new(10)],
        );
        let json = serde_json::to_value(&bid).unwrap();
        assert_eq!(json["id"], 3);
        assert_eq!(json["project_id"], 2);
        assert_eq!(json["bid_amount"], "10");
        assert_eq!(json["proposed_milestones"][0], "10");
    }
}
