//! Fund custody — the sole authority over account balances.
//!
//! Four operations move value between an account's `available` and
//! `reserved` balances or extinguish reserved value on a win. Every one
//! appends an audit entry. Nothing else in the engine writes balance
//! fields directly.
//!
//! The operations take `&mut StoreState` so they compose into the caller's
//! transaction: a reserve that happens inside `place_bid` commits or
//! aborts together with the bid write.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error};

use crate::clock::Clock;
use crate::config::LedgerConfig;
use crate::store::StoreState;
use crate::types::{AccountId, AuctionError, EntryKind, LedgerEntry};

#[derive(Debug, Clone)]
pub struct Ledger {
    allow_overdraft: bool,
    clock: Arc<dyn Clock>,
}

impl Ledger {
    pub fn new(cfg: &LedgerConfig, clock: Arc<dyn Clock>) -> Self {
        Ledger {
            allow_overdraft: cfg.allow_overdraft,
            clock,
        }
    }

    /// Add `amount` (may be negative) to the account's available balance.
    ///
    /// Under the default overdraft policy this always succeeds regardless
    /// of sign or resulting balance; with overdrafts disabled, a debit
    /// that would go below zero fails with `InsufficientFunds`.
    pub fn adjust_available(
        &self,
        state: &mut StoreState,
        account_id: &AccountId,
        amount: i64,
        reference: Option<String>,
    ) -> Result<(), AuctionError> {
        let allow_overdraft = self.allow_overdraft;
        let at = self.clock.now();

        let account = state.account_mut(account_id)?;
        if !allow_overdraft && account.available + amount < 0 {
            return Err(AuctionError::InsufficientFunds {
                needed: -amount,
                available: account.available,
            });
        }
        account.available += amount;

        let kind = if amount < 0 {
            EntryKind::Withdrawal
        } else {
            EntryKind::Deposit
        };
        self.record(state, account_id, amount, kind, reference, at);
        Ok(())
    }

    /// Move `amount` from available to reserved, earmarking it against a
    /// bid. Fails with `InsufficientFunds` if not covered.
    pub fn reserve(
        &self,
        state: &mut StoreState,
        account_id: &AccountId,
        amount: i64,
        reference: &str,
    ) -> Result<(), AuctionError> {
        let at = self.clock.now();
        Self::check_positive(amount, "reserve")?;

        let account = state.account_mut(account_id)?;
        if account.available < amount {
            return Err(AuctionError::InsufficientFunds {
                needed: amount,
                available: account.available,
            });
        }
        account.available -= amount;
        account.reserved += amount;

        self.record(
            state,
            account_id,
            -amount,
            EntryKind::Reserve,
            Some(reference.to_string()),
            at,
        );
        Ok(())
    }

    /// Move `amount` from reserved back to available (loss refund).
    ///
    /// A violated precondition here means the ledger invariant was already
    /// broken elsewhere — that is a defect, not a user error, so it is
    /// logged loudly and never silently corrected.
    pub fn release(
        &self,
        state: &mut StoreState,
        account_id: &AccountId,
        amount: i64,
        reference: &str,
    ) -> Result<(), AuctionError> {
        let at = self.clock.now();
        Self::check_positive(amount, "release")?;

        let account = state.account_mut(account_id)?;
        if account.reserved < amount {
            error!(
                account = %account_id,
                reserved = account.reserved,
                amount,
                reference,
                "Release precondition violated — ledger invariant broken elsewhere"
            );
            return Err(AuctionError::InconsistentState(format!(
                "release of {amount} exceeds reserved {} for account {account_id}",
                account.reserved,
            )));
        }
        account.reserved -= amount;
        account.available += amount;

        self.record(
            state,
            account_id,
            amount,
            EntryKind::Release,
            Some(reference.to_string()),
            at,
        );
        Ok(())
    }

    /// Permanently remove `amount` from reserved (win). The value does
    /// not return to available.
    pub fn capture(
        &self,
        state: &mut StoreState,
        account_id: &AccountId,
        amount: i64,
        reference: &str,
    ) -> Result<(), AuctionError> {
        let at = self.clock.now();
        Self::check_positive(amount, "capture")?;

        let account = state.account_mut(account_id)?;
        if account.reserved < amount {
            error!(
                account = %account_id,
                reserved = account.reserved,
                amount,
                reference,
                "Capture precondition violated — ledger invariant broken elsewhere"
            );
            return Err(AuctionError::InsufficientReserved {
                reserved: account.reserved,
                needed: amount,
            });
        }
        account.reserved -= amount;

        self.record(
            state,
            account_id,
            -amount,
            EntryKind::Capture,
            Some(reference.to_string()),
            at,
        );
        Ok(())
    }

    fn check_positive(amount: i64, op: &str) -> Result<(), AuctionError> {
        if amount < 0 {
            return Err(AuctionError::InconsistentState(format!(
                "negative amount {amount} passed to {op}",
            )));
        }
        Ok(())
    }

    fn record(
        &self,
        state: &mut StoreState,
        account_id: &AccountId,
        amount: i64,
        kind: EntryKind,
        reference: Option<String>,
        at: DateTime<Utc>,
    ) {
        let seq = state.next_seq();
        let entry = LedgerEntry {
            seq,
            account_id: account_id.clone(),
            amount,
            kind,
            reference,
            at,
        };
        debug!(entry = %entry, "Ledger entry");
        state.push_ledger(entry);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
