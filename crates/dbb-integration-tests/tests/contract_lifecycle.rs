//! End-to-end contract lifecycle across dbb-core, dbb-state and dbb-ledger.
//!
//! Walks a project from posting to final payment, including a dispute
//! that freezes and then unfreezes fund movement, and checks the
//! notification log along the way.

use std::sync::Arc;
use std::thread;

use dbb_core::{Address, Amount, DisputeId, ErrorKind, LedgerEvent, ProjectId};
use dbb_ledger::{AccountBook, DisputeRaisePolicy, Ledger, LedgerConfig};
use dbb_state::{BiddingPhase, DisputeOutcome, DisputeStatus, VoteOutcome};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn addr(s: &str) -> Address {
    Address::new(s).unwrap()
}

fn amounts(v: &[u64]) -> Vec<Amount> {
    v.iter().map(|a| Amount::from(*a)).collect()
}

struct Fixture {
    ledger: Ledger,
    accounts: Arc<AccountBook>,
    owner: Address,
    bidder: Address,
    rival: Address,
    project: ProjectId,
}

/// Funded pool, one project with milestones [100, 200, 300] and two bids,
/// the first of which is selected.
fn selected_project(config: LedgerConfig) -> Fixture {
    let (ledger, accounts) = Ledger::with_account_book(config);
    let owner = addr("0xowner");
    let bidder = addr("0xbuilder");
    let rival = addr("0xrival");
    ledger.deposit(&addr("0xfunder"), Amount::new(1_000)).unwrap();
    let project = ledger
        .post_project(owner.clone(), "community clinic", Amount::new(600), 1_900_000_000, amounts(&[100, 200, 300]))
        .unwrap();
    let index = ledger
        .submit_bid(&bidder, project, Amount::new(600), 90, amounts(&[100, 200, 300]))
        .unwrap();
    let runner_up = ledger
        .submit_bid(&rival, project, Amount::new(550), 120, amounts(&[50, 200, 300]))
        .unwrap();
    assert_eq!((index, runner_up), (0, 1));
    ledger.select_bid(&owner, project, index).unwrap();
    Fixture {
        ledger,
        accounts,
        owner,
        bidder,
        rival,
        project,
    }
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

#[test]
fn test_post_bid_select_release_dispute_vote_release() {
    let f = selected_project(LedgerConfig::default());
    let p = f.ledger.project(f.project).unwrap();
    assert_eq!(p.bidding_phase(), BiddingPhase::Closed);
    assert_eq!(p.selected_bidder(), Some(&f.bidder));
    assert_eq!(p.selected_bid_index(), 0);
    let bids = f.ledger.bids(f.project).unwrap();
    assert!(bids[0].selected);
    assert!(!bids[1].selected);
    assert_eq!(bids[1].bidder, f.rival);

    // Milestone 0 pays 100 to the selected bidder.
    let paid = f.ledger.release_milestone_payment(&f.owner, f.project, 0).unwrap();
    assert_eq!(paid, Amount::new(100));
    assert_eq!(f.accounts.balance_of(&f.bidder), Amount::new(100));
    assert_eq!(f.ledger.escrow_balance(), Amount::new(900));

    // The bidder disputes; fund movement freezes.
    let dispute = f.ledger.raise_dispute(&f.bidder, f.project, "scope change").unwrap();
    assert_eq!(dispute, DisputeId::new(1));
    assert_eq!(
        f.ledger.project(f.project).unwrap().dispute_status(),
        DisputeStatus::Disputed
    );
    let err = f.ledger.release_milestone_payment(&f.owner, f.project, 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    let err = f.ledger.select_bid(&f.owner, f.project, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);

    // The first yes vote is already a strict majority (1 > 0).
    let outcome = f.ledger.vote_on_dispute(&addr("0xv1"), dispute, true).unwrap();
    assert!(matches!(outcome, VoteOutcome::Resolved(DisputeOutcome::Upheld, _)));
    for (voter, vote) in [("0xv2", true), ("0xv3", false)] {
        let err = f.ledger.vote_on_dispute(&addr(voter), dispute, vote).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }
    let d = f.ledger.dispute(dispute).unwrap();
    assert!(d.resolved);
    assert_eq!((d.yes_votes, d.no_votes), (1, 0));
    assert_eq!(d.outcome, Some(DisputeOutcome::Upheld));

    // Unfrozen: milestone 1 pays out.
    assert!(!f.ledger.project(f.project).unwrap().dispute_raised());
    let paid = f.ledger.release_milestone_payment(&f.owner, f.project, 1).unwrap();
    assert_eq!(paid, Amount::new(200));
    assert_eq!(f.accounts.balance_of(&f.bidder), Amount::new(300));
    assert_eq!(f.accounts.balance_of(&f.rival), Amount::ZERO);
    assert_eq!(f.ledger.escrow_balance(), Amount::new(700));
    assert_eq!(
        f.ledger.project(f.project).unwrap().milestone_paid(),
        &[true, true, false]
    );
    assert!(!f.ledger.bids(f.project).unwrap()[1].selected);

    let names: Vec<&str> = f.ledger.events().iter().map(|r| r.event.name()).collect();
    assert_eq!(
        names,
        [
            "funds_received",
            "project_posted",
            "bid_submitted",
            "bid_submitted",
            "bid_selected",
            "milestone_paid",
            "dispute_raised",
            "dispute_resolved",
            "milestone_paid",
        ]
    );
    assert!(f.ledger.verify_events().is_ok());
}

#[test]
fn test_rejected_dispute_also_unfreezes() {
    let f = selected_project(LedgerConfig::default());
    let dispute = f.ledger.raise_dispute(&f.owner, f.project, "quality").unwrap();
    let outcome = f.ledger.vote_on_dispute(&addr("0xv1"), dispute, false).unwrap();
    assert!(matches!(outcome, VoteOutcome::Resolved(DisputeOutcome::Rejected, _)));
    let resolved = f.ledger.events().into_iter().find_map(|r| match r.event {
        LedgerEvent::DisputeResolved { result, .. } => Some(result),
        _ => None,
    });
    assert_eq!(resolved, Some(false));
    assert!(f.ledger.release_milestone_payment(&f.owner, f.project, 2).is_ok());
}

#[test]
fn test_second_dispute_after_resolution() {
    let f = selected_project(LedgerConfig::default());
    let first = f.ledger.raise_dispute(&f.owner, f.project, "one").unwrap();
    let err = f.ledger.raise_dispute(&f.bidder, f.project, "two").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidState);
    f.ledger.vote_on_dispute(&addr("0xv"), first, true).unwrap();
    let second = f.ledger.raise_dispute(&f.bidder, f.project, "two").unwrap();
    assert_eq!(second, DisputeId::new(2));
    assert_eq!(f.ledger.disputes_for_project(f.project).unwrap().len(), 2);
    assert_eq!(f.ledger.dispute_count(), 2);
}

#[test]
fn test_selected_bidder_only_policy_blocks_owner() {
    let f = selected_project(LedgerConfig {
        dispute_raise_policy: DisputeRaisePolicy::SelectedBidderOnly,
    });
    let err = f.ledger.raise_dispute(&f.owner, f.project, "x").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert!(f.ledger.raise_dispute(&f.bidder, f.project, "x").is_ok());
}

// ---------------------------------------------------------------------------
// Escrow safety
// ---------------------------------------------------------------------------

#[test]
fn test_failed_transfer_leaves_no_trace() {
    let f = selected_project(LedgerConfig::default());
    let events_before = f.ledger.events().len();
    f.accounts.refuse(f.bidder.clone());

    let err = f.ledger.release_milestone_payment(&f.owner, f.project, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransferFailed);
    assert_eq!(f.ledger.escrow_balance(), Amount::new(1_000));
    assert_eq!(f.ledger.project(f.project).unwrap().milestone_paid(), &[false, false, false]);
    assert_eq!(f.ledger.events().len(), events_before);

    f.accounts.accept(&f.bidder);
    assert!(f.ledger.release_milestone_payment(&f.owner, f.project, 0).is_ok());
}

#[test]
fn test_underfunded_pool_is_transfer_failure() {
    let (ledger, accounts) = Ledger::with_account_book(LedgerConfig::default());
    let owner = addr("0xowner");
    let project = ledger.post_project(owner.clone(), "", Amount::ZERO, 0, amounts(&[50])).unwrap();
    ledger.submit_bid(&addr("0xb"), project, Amount::new(50), 0, amounts(&[50])).unwrap();
    ledger.select_bid(&owner, project, 0).unwrap();
    ledger.deposit(&addr("0xf"), Amount::new(49)).unwrap();

    let err = ledger.release_milestone_payment(&owner, project, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::TransferFailed);
    assert_eq!(ledger.escrow_balance(), Amount::new(49));
    assert_eq!(accounts.balance_of(&addr("0xb")), Amount::ZERO);
}

#[test]
fn test_concurrent_release_pays_once() {
    let f = selected_project(LedgerConfig::default());
    let ledger = Arc::new(f.ledger);
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let ledger = Arc::clone(&ledger);
            let owner = f.owner.clone();
            let project = f.project;
            thread::spawn(move || ledger.release_milestone_payment(&owner, project, 2).is_ok())
        })
        .collect();
    let successes = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();
    assert_eq!(successes, 1);
    assert_eq!(f.accounts.balance_of(&f.bidder), Amount::new(300));
    assert_eq!(ledger.escrow_balance(), Amount::new(700));
}

#[test]
fn test_concurrent_posts_get_distinct_ids() {
    let (ledger, _) = Ledger::with_account_book(LedgerConfig::default());
    let ledger = Arc::new(ledger);
    let handles: Vec<_> = (0..16)
        .map(|i| {
            let ledger = Arc::clone(&ledger);
            thread::spawn(move || {
                ledger
                    .post_project(addr(&format!("0xowner{i}")), "", Amount::ZERO, 0, amounts(&[1]))
                    .unwrap()
            })
        })
        .collect();
    let mut ids: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap().get()).collect();
    ids.sort_unstable();
    assert_eq!(ids, (1..=16).collect::<Vec<_>>());
    assert_eq!(ledger.project_count(), 16);
    assert!(ledger.verify_events().is_ok());
}
