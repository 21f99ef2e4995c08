//! Account services — login, funding, and read views.
//!
//! Accounts are created on first login and never deleted. Funding goes
//! through the ledger's `adjust_available`, so the external payment
//! collaborator gets the same audit trail as everything else.

use std::sync::Arc;
use tracing::info;

use crate::clock::Clock;
use crate::ledger::Ledger;
use crate::store::Store;
use crate::types::{Account, AccountId, AuctionError, Bid, BidStatus, LedgerEntry};

pub struct Accounts {
    store: Arc<Store>,
    ledger: Ledger,
    clock: Arc<dyn Clock>,
}

impl Accounts {
    pub fn new(store: Arc<Store>, ledger: Ledger, clock: Arc<dyn Clock>) -> Self {
        Accounts {
            store,
            ledger,
            clock,
        }
    }

    /// Find or create the account for a caller-supplied identifier.
    pub async fn login(&self, id: &AccountId) -> Result<Account, AuctionError> {
        let now = self.clock.now();
        self.store
            .transaction(|state| {
                if let Ok(existing) = state.account(id) {
                    return Ok(existing.clone());
                }
                let account = Account::new(id.clone(), now);
                state.accounts.insert(id.clone(), account.clone());
                info!(account = %id, "Account created");
                Ok(account)
            })
            .await
    }

    /// Fund (or, with a negative amount, debit) an account's available
    /// balance. Subject to the overdraft policy.
    pub async fn deposit(&self, id: &AccountId, amount: i64) -> Result<Account, AuctionError> {
        self.store
            .transaction(|state| {
                self.ledger.adjust_available(state, id, amount, None)?;
                Ok(state.account(id)?.clone())
            })
            .await
    }

    /// Current balances.
    pub async fn balance(&self, id: &AccountId) -> Result<Account, AuctionError> {
        self.store
            .read(|state| state.account(id).cloned())
            .await
    }

    /// Items this account has won, newest first. Titles come from the
    /// bid's snapshot, since finished auctions no longer exist.
    pub async fn inventory(&self, id: &AccountId) -> Vec<Bid> {
        self.store
            .read(|state| {
                let mut won: Vec<Bid> = state
                    .bids
                    .values()
                    .filter(|b| b.status == BidStatus::Winner && &b.account_id == id)
                    .cloned()
                    .collect();
                won.sort_by(|a, b| b.created_seq.cmp(&a.created_seq));
                won
            })
            .await
    }

    /// The account's ledger history, newest first, capped at `limit`.
    pub async fn history(&self, id: &AccountId, limit: usize) -> Vec<LedgerEntry> {
        self.store
            .read(|state| {
                state
                    .ledger
                    .iter()
                    .rev()
                    .filter(|e| &e.account_id == id)
                    .take(limit)
                    .cloned()
                    .collect()
            })
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::config::LedgerConfig;
    use crate::types::{AuctionId, BidId};
    use chrono::Utc;

    fn services(allow_overdraft: bool) -> Accounts {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let store = Arc::new(Store::new());
        let ledger = Ledger::new(&LedgerConfig { allow_overdraft }, clock.clone());
        Accounts::new(store, ledger, clock)
    }

    #[tokio::test]
    async fn test_login_creates_account_once() {
        let accounts = services(true);
        let alice = AccountId::new("alice");

        let created = accounts.login(&alice).await.unwrap();
        assert_eq!(created.available, 0);

        accounts.deposit(&alice, 500).await.unwrap();
        // Second login returns the same account, funds intact.
        let again = accounts.login(&alice).await.unwrap();
        assert_eq!(again.available, 500);
    }

    #[tokio::test]
    async fn test_deposit_and_withdraw() {
        let accounts = services(true);
        let alice = AccountId::new("alice");
        accounts.login(&alice).await.unwrap();

        accounts.deposit(&alice, 1000).await.unwrap();
        let after = accounts.deposit(&alice, -300).await.unwrap();
        assert_eq!(after.available, 700);

        let history = accounts.history(&alice, 10).await;
        assert_eq!(history.len(), 2);
        // Newest first.
        assert_eq!(history[0].amount, -300);
        assert_eq!(history[1].amount, 1000);
    }

    #[tokio::test]
    async fn test_deposit_overdraft_policy() {
        let accounts = services(false);
        let alice = AccountId::new("alice");
        accounts.login(&alice).await.unwrap();
        accounts.deposit(&alice, 100).await.unwrap();

        let result = accounts.deposit(&alice, -500).await;
        assert!(matches!(
            result,
            Err(AuctionError::InsufficientFunds { .. })
        ));
    }

    #[tokio::test]
    async fn test_balance_unknown_account() {
        let accounts = services(true);
        let result = accounts.balance(&AccountId::new("ghost")).await;
        assert!(matches!(result, Err(AuctionError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_inventory_lists_only_wins() {
        let accounts = services(true);
        let alice = AccountId::new("alice");
        accounts.login(&alice).await.unwrap();

        let auction_id = AuctionId::generate();
        accounts
            .store
            .transaction(|state| {
                for (status, amount) in [
                    (BidStatus::Winner, 80),
                    (BidStatus::Lost, 40),
                    (BidStatus::Winner, 120),
                ] {
                    let seq = state.next_seq();
                    let bid = Bid {
                        id: BidId::generate(),
                        auction_id,
                        account_id: alice.clone(),
                        amount,
                        round_index: 0,
                        status,
                        snapshot_title: format!("Lot {amount}"),
                        transferred_from: None,
                        transferred_at: None,
                        created_at: Utc::now(),
                        created_seq: seq,
                    };
                    state.bids.insert(bid.id, bid);
                }
                Ok(())
            })
            .await
            .unwrap();

        let inventory = accounts.inventory(&alice).await;
        assert_eq!(inventory.len(), 2);
        // Newest win first.
        assert_eq!(inventory[0].amount, 120);
        assert_eq!(inventory[1].amount, 80);
    }

    #[tokio::test]
    async fn test_history_respects_limit() {
        let accounts = services(true);
        let alice = AccountId::new("alice");
        accounts.login(&alice).await.unwrap();
        for i in 1..=5 {
            accounts.deposit(&alice, i * 10).await.unwrap();
        }

        let history = accounts.history(&alice, 3).await;
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].amount, 50);
    }
}
