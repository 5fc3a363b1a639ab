//! # Escrow Release
//!
//! Milestone payments are drawn from a single pooled balance funded by
//! [`Ledger::deposit`] and paid to the selected bidder through a
//! [`FundTransfer`] collaborator.
//!
//! ## Security Invariant
//!
//! Release follows checks-effects-interactions:
//!
//! 1. Lock the project's exclusive section.
//! 2. Validate caller, selection, index, paid flag and dispute status.
//! 3. Mark the milestone paid and debit the pool.
//! 4. Drop the borrow (the section stays held) and call the transfer.
//! 5. On failure restore the flag and the pool, then report
//!    `TransferFailed`. On success emit `MilestonePaid`.
//!
//! A transfer that calls back into the ledger on the same thread sees the
//! milestone already paid and is rejected. Other threads wait for step 5.
//!
//! The pool is not partitioned per project. One project's release can
//! spend value deposited with another project in mind, so the pool can be
//! drained below what outstanding milestones would need.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::Mutex;
use thiserror::Error;

use dbb_core::{Address, Amount, LedgerError, LedgerEvent, ProjectId, SealedEvent};

use crate::ledger::Ledger;
use crate::lifecycle::require_owner;

// ── Transfer Collaborator ──────────────────────────────────────────────

/// Why a transfer did not complete.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransferError(pub String);

/// Moves value out of escrow to a recipient.
///
/// Implementations may call back into the ledger; see the module docs for
/// what such a call observes.
pub trait FundTransfer: Send + Sync {
    /// Pay `amount` to `recipient`.
    fn transfer(&self, recipient: &Address, amount: Amount) -> Result<(), TransferError>;
}

/// In-memory recipient balances.
///
/// Recipients listed with [`AccountBook::refuse`] reject every incoming
/// transfer, which is how a recipient that cannot accept value is modelled.
#[derive(Debug, Default)]
pub struct AccountBook {
    balances: Mutex<BTreeMap<Address, Amount>>,
    refusing: Mutex<BTreeSet<Address>>,
}

impl AccountBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Balance credited to `address` so far.
    pub fn balance_of(&self, address: &Address) -> Amount {
        self.balances
            .lock()
            .get(address)
            .copied()
            .unwrap_or(Amount::ZERO)
    }

    /// Every account that has received a transfer.
    pub fn accounts(&self) -> BTreeMap<Address, Amount> {
        self.balances.lock().clone()
    }

    /// Make `address` reject incoming transfers.
    pub fn refuse(&self, address: Address) {
        self.refusing.lock().insert(address);
    }

    /// Let `address` accept transfers again.
    pub fn accept(&self, address: &Address) {
        self.refusing.lock().remove(address);
    }
}

impl FundTransfer for AccountBook {
    fn transfer(&self, recipient: &Address, amount: Amount) -> Result<(), TransferError> {
        if self.refusing.lock().contains(recipient) {
            return Err(TransferError(format!("{recipient} refuses incoming transfers")));
        }
        let mut balances = self.balances.lock();
        let current = balances.get(recipient).copied().unwrap_or(Amount::ZERO);
        let updated = current
            .checked_add(amount)
            .ok_or_else(|| TransferError(format!("balance of {recipient} would overflow")))?;
        balances.insert(recipient.clone(), updated);
        Ok(())
    }
}

// ── Operations ─────────────────────────────────────────────────────────

impl Ledger {
    /// Credit the pooled escrow balance.
    ///
    /// # Errors
    ///
    /// `Validation` for a zero amount or if the pool would overflow.
    pub fn deposit(&self, from: &Address, amount: Amount) -> Result<Amount, LedgerError> {
        if amount.is_zero() {
            return Err(LedgerError::Validation("deposit amount must be positive".into()));
        }
        let sealed = SealedEvent::seal(LedgerEvent::FundsReceived {
            from: from.clone(),
            amount,
        })?;
        let balance = {
            let mut pool = self.pool.lock();
            let updated = pool
                .checked_add(amount)
                .ok_or_else(|| LedgerError::Validation("escrow balance would overflow".into()))?;
            *pool = updated;
            updated
        };
        self.events.append(sealed);
        tracing::info!(from = %from, %amount, %balance, "escrow funded");
        Ok(balance)
    }

    /// Pay milestone `milestone_index` of `project_id` to the selected bidder.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the project does not exist.
    /// - `Unauthorized` if `caller` is not the owner.
    /// - `Validation` if no bidder is selected, the index is out of range,
    ///   or the milestone is already paid.
    /// - `InvalidState` if a dispute is open.
    /// - `TransferFailed` if the pool cannot cover the amount or the
    ///   transfer collaborator fails. Nothing is changed in that case.
    pub fn release_milestone_payment(
        &self,
        caller: &Address,
        project_id: ProjectId,
        milestone_index: usize,
    ) -> Result<Amount, LedgerError> {
        const OP: &str = "release_milestone_payment";
        let amount = self.store.with_slot(project_id, |cell| {
            let (recipient, amount, sealed) = {
                let mut slot = cell.try_borrow_mut().map_err(|_| LedgerError::InvalidState {
                    operation: OP,
                    subject: project_id.to_string(),
                    reason: "project is being modified by an in-flight operation".into(),
                })?;
                let project = &slot.project;
                require_owner(OP, project, caller)?;
                let recipient = project.require_selected_bidder()?.clone();
                let amount = project.unpaid_milestone(milestone_index)?;
                project.require_undisputed(OP)?;

                let sealed = SealedEvent::seal(LedgerEvent::MilestonePaid {
                    project_id,
                    milestone_index,
                    recipient: recipient.clone(),
                    amount,
                })?;
                self.debit_pool(&recipient, amount)?;
                slot.project.set_milestone_paid(milestone_index, true);
                (recipient, amount, sealed)
            };

            if let Err(e) = self.transfer.transfer(&recipient, amount) {
                match cell.try_borrow_mut() {
                    Ok(mut slot) => slot.project.set_milestone_paid(milestone_index, false),
                    Err(_) => tracing::error!(
                        project_id = project_id.get(),
                        milestone_index,
                        "could not restore paid flag after failed transfer"
                    ),
                }
                self.credit_pool(amount);
                tracing::warn!(
                    project_id = project_id.get(),
                    milestone_index,
                    recipient = %recipient,
                    error = %e,
                    "milestone transfer failed; rolled back"
                );
                return Err(LedgerError::TransferFailed {
                    recipient: recipient.to_string(),
                    amount: amount.to_string(),
                    reason: e.0,
                });
            }

            self.events.append(sealed);
            Ok(amount)
        })?;
        tracing::info!(project_id = project_id.get(), milestone_index, %amount, "milestone paid");
        Ok(amount)
    }

    fn debit_pool(&self, recipient: &Address, amount: Amount) -> Result<(), LedgerError> {
        let mut pool = self.pool.lock();
        let Some(remaining) = pool.checked_sub(amount) else {
            return Err(LedgerError::TransferFailed {
                recipient: recipient.to_string(),
                amount: amount.to_string(),
                reason: format!("escrow balance {} is insufficient", *pool),
            });
        };
        *pool = remaining;
        Ok(())
    }

    fn credit_pool(&self, amount: Amount) {
        let mut pool = self.pool.lock();
        *pool = pool.saturating_add(amount);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, OnceLock, Weak};

    use crate::config::LedgerConfig;
    use dbb_core::ErrorKind;

    fn addr(s: &str) -> Address {
        Address::new(s).unwrap()
    }

    fn amounts(v: &[u64]) -> Vec<Amount> {
        v.iter().map(|a| Amount::from(*a)).collect()
    }

    /// Posts [100, 200, 300], one matching bid from 0xbuilder, selects it.
    fn selected(ledger: &Ledger) -> ProjectId {
        let owner = addr("0xowner");
        let id = ledger
            .post_project(owner.clone(), "warehouse", Amount::new(600), 0, amounts(&[100, 200, 300]))
            .unwrap();
        ledger
            .submit_bid(&addr("0xbuilder"), id, Amount::new(600), 0, amounts(&[100, 200, 300]))
            .unwrap();
        ledger.select_bid(&owner, id, 0).unwrap();
        id
    }

    #[test]
    fn test_release_pays_selected_bidder() {
        let (ledger, book) = Ledger::with_account_book(LedgerConfig::default());
        ledger.deposit(&addr("0xowner"), Amount::new(600)).unwrap();
        let id = selected(&ledger);

        let paid = ledger.release_milestone_payment(&addr("0xowner"), id, 0).unwrap();
        assert_eq!(paid, Amount::new(100));
        assert_eq!(book.balance_of(&addr("0xbuilder")), Amount::new(100));
        assert_eq!(ledger.escrow_balance(), Amount::new(500));
        assert_eq!(ledger.project(id).unwrap().milestone_paid(), &[true, false, false]);
        assert_eq!(ledger.events().last().unwrap().event.name(), "milestone_paid");
    }

    #[test]
    fn test_double_release_transfers_nothing() {
        let (ledger, book) = Ledger::with_account_book(LedgerConfig::default());
        ledger.deposit(&addr("0xowner"), Amount::new(600)).unwrap();
        let id = selected(&ledger);
        ledger.release_milestone_payment(&addr("0xowner"), id, 0).unwrap();
        let events_before = ledger.events().len();

        let err = ledger.release_milestone_payment(&addr("0xowner"), id, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert_eq!(book.balance_of(&addr("0xbuilder")), Amount::new(100));
        assert_eq!(ledger.escrow_balance(), Amount::new(500));
        assert_eq!(ledger.events().len(), events_before);
    }

    #[test]
    fn test_release_preconditions() {
        let (ledger, _) = Ledger::with_account_book(LedgerConfig::default());
        ledger.deposit(&addr("0xowner"), Amount::new(600)).unwrap();
        let owner = addr("0xowner");
        let id = ledger
            .post_project(owner.clone(), "", Amount::ZERO, 0, amounts(&[100]))
            .unwrap();

        assert_eq!(
            ledger.release_milestone_payment(&owner, ProjectId::new(9), 0).unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            ledger.release_milestone_payment(&addr("0xbuilder"), id, 0).unwrap_err().kind(),
            ErrorKind::Unauthorized
        );
        // No bidder selected yet.
        assert_eq!(
            ledger.release_milestone_payment(&owner, id, 0).unwrap_err().kind(),
            ErrorKind::Validation
        );
        ledger.submit_bid(&addr("0xbuilder"), id, Amount::new(100), 0, amounts(&[100])).unwrap();
        ledger.select_bid(&owner, id, 0).unwrap();
        assert_eq!(
            ledger.release_milestone_payment(&owner, id, 1).unwrap_err().kind(),
            ErrorKind::Validation
        );
        assert!(ledger.release_milestone_payment(&owner, id, 0).is_ok());
    }

    #[test]
    fn test_insufficient_pool_is_transfer_failed() {
        let (ledger, book) = Ledger::with_account_book(LedgerConfig::default());
        ledger.deposit(&addr("0xowner"), Amount::new(50)).unwrap();
        let id = selected(&ledger);
        let err = ledger.release_milestone_payment(&addr("0xowner"), id, 0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TransferFailed);
        assert_eq!(ledger.escrow_balance(), Amount::new(50));
        assert_eq!(ledger.project(id).unwrap().milestone_paid(), &[false, false, false]);
        assert!(book.accounts().is_empty());
    }

    #[test]
    fn test_refused_transfer_rolls_back() {
        let (ledger, book) = Ledger::with_account_book(LedgerConfig::default());
        ledger.deposit(&addr("0xowner"), Amount::new(600)).unwrap();
        let id = selected(&ledger);
        let events_before = ledger.events().len();
        book.refuse(addr("0xbuilder"));

        let err = ledger.release_milestone_payment(&addr("0xowner"), id, 0).unwrap_err();
        assert!(matches!(err, LedgerError::TransferFailed { .. }));
        assert_eq!(ledger.escrow_balance(), Amount::new(600));
        assert_eq!(ledger.project(id).unwrap().milestone_paid(), &[false, false, false]);
        assert_eq!(ledger.events().len(), events_before);

        book.accept(&addr("0xbuilder"));
        ledger.release_milestone_payment(&addr("0xowner"), id, 0).unwrap();
        assert_eq!(book.balance_of(&addr("0xbuilder")), Amount::new(100));
    }

    #[test]
    fn test_deposit_rejects_zero() {
        let (ledger, _) = Ledger::with_account_book(LedgerConfig::default());
        let err = ledger.deposit(&addr("0xfunder"), Amount::ZERO).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(ledger.events().is_empty());
        assert_eq!(ledger.deposit(&addr("0xfunder"), Amount::new(7)).unwrap(), Amount::new(7));
        assert_eq!(ledger.deposit(&addr("0xfunder"), Amount::new(3)).unwrap(), Amount::new(10));
    }

    /// A recipient that tries to claim the same milestone again from
    /// inside the transfer.
    struct Reentrant {
        ledger: OnceLock<Weak<Ledger>>,
        inner: AccountBook,
        observed: parking_lot::Mutex<Option<Result<Amount, ErrorKind>>>,
        paid_flags: parking_lot::Mutex<Vec<bool>>,
    }

    impl FundTransfer for Reentrant {
        fn transfer(&self, recipient: &Address, amount: Amount) -> Result<(), TransferError> {
            if let Some(ledger) = self.ledger.get().and_then(Weak::upgrade) {
                let again = ledger.release_milestone_payment(&addr("0xowner"), ProjectId::new(1), 0);
                *self.observed.lock() = Some(again.map_err(|e| e.kind()));
                if let Ok(p) = ledger.project(ProjectId::new(1)) {
                    *self.paid_flags.lock() = p.milestone_paid().to_vec();
                }
            }
            self.inner.transfer(recipient, amount)
        }
    }

    #[test]
    fn test_reentrant_release_is_rejected() {
        let hook = Arc::new(Reentrant {
            ledger: OnceLock::new(),
            inner: AccountBook::new(),
            observed: parking_lot::Mutex::new(None),
            paid_flags: parking_lot::Mutex::new(Vec::new()),
        });
        let ledger = Arc::new(Ledger::new(
            LedgerConfig::default(),
            Arc::clone(&hook) as Arc<dyn FundTransfer>,
        ));
        let _ = hook.ledger.set(Arc::downgrade(&ledger));

        ledger.deposit(&addr("0xowner"), Amount::new(1000)).unwrap();
        let id = selected(&ledger);
        ledger.release_milestone_payment(&addr("0xowner"), id, 0).unwrap();

        assert_eq!(*hook.observed.lock(), Some(Err(ErrorKind::Validation)));
        assert_eq!(*hook.paid_flags.lock(), vec![true, false, false]);
        assert_eq!(hook.inner.balance_of(&addr("0xbuilder")), Amount::new(100));
        assert_eq!(ledger.escrow_balance(), Amount::new(900));
    }

    #[test]
    fn test_concurrent_release_pays_once() {
        let (ledger, book) = Ledger::with_account_book(LedgerConfig::default());
        let ledger = Arc::new(ledger);
        ledger.deposit(&addr("0xowner"), Amount::new(10_000)).unwrap();
        let id = selected(&ledger);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ledger = Arc::clone(&ledger);
                std::thread::spawn(move || ledger.release_milestone_payment(&addr("0xowner"), id, 2).is_ok())
            })
            .collect();
        let successes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
        assert_eq!(book.balance_of(&addr("0xbuilder")), Amount::new(300));
        assert_eq!(ledger.escrow_balance(), Amount::new(9_700));
    }
}
