//! In-memory transactional store.
//!
//! Stands in for the persistence collaborator: a store offering atomic
//! multi-record transactions and ordered bid queries. All state lives
//! behind one `tokio::sync::RwLock`; a compound operation holds the write
//! lock for its whole duration, so concurrent bids — or a bid racing a
//! round resolution — serialize instead of interleaving.
//!
//! [`Store::transaction`] adds abort semantics on top: the closure runs
//! against a draft copy of the state and the draft replaces the live state
//! only on `Ok`. An `Err` leaves no partial effect, which is exactly the
//! contract round resolution and bid admission need.

use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::types::{
    Account, AccountId, Auction, AuctionError, AuctionId, Bid, BidId, BidStatus, LedgerEntry,
};

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// The complete mutable state of the engine.
#[derive(Debug, Clone, Default)]
pub struct StoreState {
    pub accounts: HashMap<AccountId, Account>,
    pub auctions: HashMap<AuctionId, Auction>,
    pub bids: HashMap<BidId, Bid>,
    /// Uniqueness index over *active* bids: at most one per
    /// (account, auction) pair. Admission goes through this, making the
    /// one-active-bid invariant structural rather than defensive.
    active_bids: HashMap<(AccountId, AuctionId), BidId>,
    /// Append-only audit trail.
    pub ledger: Vec<LedgerEntry>,
    next_seq: u64,
}

impl StoreState {
    /// Next value of the global monotonic sequence (bid tie-breaks and
    /// ledger entry ordering).
    pub fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }

    // -- Accounts --

    pub fn account(&self, id: &AccountId) -> Result<&Account, AuctionError> {
        self.accounts
            .get(id)
            .ok_or_else(|| AuctionError::AccountNotFound(id.clone()))
    }

    pub fn account_mut(&mut self, id: &AccountId) -> Result<&mut Account, AuctionError> {
        self.accounts
            .get_mut(id)
            .ok_or_else(|| AuctionError::AccountNotFound(id.clone()))
    }

    // -- Auctions --

    pub fn auction(&self, id: AuctionId) -> Result<&Auction, AuctionError> {
        self.auctions.get(&id).ok_or(AuctionError::AuctionNotFound)
    }

    pub fn auction_mut(&mut self, id: AuctionId) -> Result<&mut Auction, AuctionError> {
        self.auctions
            .get_mut(&id)
            .ok_or(AuctionError::AuctionNotFound)
    }

    // -- Bids --

    pub fn bid(&self, id: BidId) -> Result<&Bid, AuctionError> {
        self.bids.get(&id).ok_or(AuctionError::BidNotFound)
    }

    pub fn bid_mut(&mut self, id: BidId) -> Result<&mut Bid, AuctionError> {
        self.bids.get_mut(&id).ok_or(AuctionError::BidNotFound)
    }

    /// The account's active bid in this auction, if any.
    pub fn active_bid_id(&self, account: &AccountId, auction: AuctionId) -> Option<BidId> {
        self.active_bids.get(&(account.clone(), auction)).copied()
    }

    /// Record a freshly created active bid, enforcing the
    /// one-active-bid-per-(account, auction) invariant.
    pub fn insert_active_bid(&mut self, bid: Bid) -> Result<(), AuctionError> {
        debug_assert_eq!(bid.status, BidStatus::Active);
        let key = (bid.account_id.clone(), bid.auction_id);
        if self.active_bids.contains_key(&key) {
            return Err(AuctionError::InconsistentState(format!(
                "account {} already has an active bid in auction {}",
                bid.account_id, bid.auction_id,
            )));
        }
        self.active_bids.insert(key, bid.id);
        self.bids.insert(bid.id, bid);
        Ok(())
    }

    /// Drop the active-bid index entry when a bid leaves the `Active`
    /// state (win, loss). Must be called in the same transaction as the
    /// status change.
    pub fn clear_active(&mut self, account: &AccountId, auction: AuctionId) {
        self.active_bids.remove(&(account.clone(), auction));
    }

    /// All active bids counting toward the given round of an auction,
    /// ordered by amount descending, ties broken by earlier creation
    /// (first come, first served at equal price).
    pub fn active_bids_for_round(&self, auction: AuctionId, round_index: usize) -> Vec<Bid> {
        let mut bids: Vec<Bid> = self
            .bids
            .values()
            .filter(|b| {
                b.auction_id == auction
                    && b.status == BidStatus::Active
                    && b.round_index == round_index
            })
            .cloned()
            .collect();
        bids.sort_by(|a, b| {
            b.amount
                .cmp(&a.amount)
                .then_with(|| a.created_seq.cmp(&b.created_seq))
        });
        bids
    }

    pub fn push_ledger(&mut self, entry: LedgerEntry) {
        self.ledger.push(entry);
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Shared handle to the engine state.
#[derive(Debug, Default)]
pub struct Store {
    inner: RwLock<StoreState>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    /// Run a compound operation atomically. The closure mutates a draft
    /// copy of the state; the draft is committed only if it returns `Ok`.
    /// On `Err` the live state is untouched.
    pub async fn transaction<T, F>(&self, op: F) -> Result<T, AuctionError>
    where
        F: FnOnce(&mut StoreState) -> Result<T, AuctionError>,
    {
        let mut guard = self.inner.write().await;
        let mut draft = guard.clone();
        let out = op(&mut draft)?;
        *guard = draft;
        Ok(out)
    }

    /// Read-only access to the state.
    pub async fn read<T, F>(&self, f: F) -> T
    where
        F: FnOnce(&StoreState) -> T,
    {
        let guard = self.inner.read().await;
        f(&guard)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_bid(state: &mut StoreState, auction: AuctionId, account: &str, amount: i64) -> Bid {
        let seq = state.next_seq();
        Bid {
            id: BidId::generate(),
            auction_id: auction,
            account_id: AccountId::new(account),
            amount,
            round_index: 0,
            status: BidStatus::Active,
            snapshot_title: "Test".to_string(),
            transferred_from: None,
            transferred_at: None,
            created_at: Utc::now(),
            created_seq: seq,
        }
    }

    #[tokio::test]
    async fn test_transaction_commits_on_ok() {
        let store = Store::new();
        store
            .transaction(|state| {
                state
                    .accounts
                    .insert(AccountId::new("alice"), Account::new(AccountId::new("alice"), Utc::now()));
                Ok(())
            })
            .await
            .unwrap();

        let exists = store
            .read(|state| state.accounts.contains_key(&AccountId::new("alice")))
            .await;
        assert!(exists);
    }

    #[tokio::test]
    async fn test_transaction_aborts_on_err() {
        let store = Store::new();
        let result: Result<(), AuctionError> = store
            .transaction(|state| {
                state
                    .accounts
                    .insert(AccountId::new("alice"), Account::new(AccountId::new("alice"), Utc::now()));
                Err(AuctionError::AuctionNotFound)
            })
            .await;
        assert!(result.is_err());

        // The insert from the failed transaction must not be visible.
        let exists = store
            .read(|state| state.accounts.contains_key(&AccountId::new("alice")))
            .await;
        assert!(!exists);
    }

    #[tokio::test]
    async fn test_active_bid_uniqueness() {
        let store = Store::new();
        let auction_id = AuctionId::generate();

        let result = store
            .transaction(|state| {
                let first = make_bid(state, auction_id, "alice", 50);
                state.insert_active_bid(first)?;
                let second = make_bid(state, auction_id, "alice", 80);
                state.insert_active_bid(second)
            })
            .await;

        match result {
            Err(AuctionError::InconsistentState(_)) => {}
            other => panic!("expected InconsistentState, got {other:?}"),
        }

        // Whole transaction aborted — not even the first bid survives.
        let count = store.read(|state| state.bids.len()).await;
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_clear_active_allows_new_bid() {
        let store = Store::new();
        let auction_id = AuctionId::generate();

        store
            .transaction(|state| {
                let bid = make_bid(state, auction_id, "alice", 50);
                let id = bid.id;
                state.insert_active_bid(bid)?;
                state.bid_mut(id)?.status = BidStatus::Winner;
                state.clear_active(&AccountId::new("alice"), auction_id);

                let next = make_bid(state, auction_id, "alice", 60);
                state.insert_active_bid(next)
            })
            .await
            .unwrap();

        let count = store.read(|state| state.bids.len()).await;
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_active_bids_for_round_ordering() {
        let store = Store::new();
        let auction_id = AuctionId::generate();

        store
            .transaction(|state| {
                for (name, amount) in [("a", 100), ("b", 100), ("c", 50), ("d", 10)] {
                    let bid = make_bid(state, auction_id, name, amount);
                    state.insert_active_bid(bid)?;
                }
                Ok(())
            })
            .await
            .unwrap();

        let ordered = store
            .read(|state| state.active_bids_for_round(auction_id, 0))
            .await;
        let accounts: Vec<&str> = ordered.iter().map(|b| b.account_id.as_str()).collect();
        // Equal amounts resolve earlier-created first: a before b.
        assert_eq!(accounts, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn test_active_bids_for_round_filters_round_and_status() {
        let store = Store::new();
        let auction_id = AuctionId::generate();

        store
            .transaction(|state| {
                let mut stale = make_bid(state, auction_id, "old", 500);
                stale.round_index = 1;
                state.bids.insert(stale.id, stale);

                let mut won = make_bid(state, auction_id, "won", 400);
                won.status = BidStatus::Winner;
                state.bids.insert(won.id, won);

                let live = make_bid(state, auction_id, "live", 30);
                state.insert_active_bid(live)?;
                Ok(())
            })
            .await
            .unwrap();

        let round0 = store
            .read(|state| state.active_bids_for_round(auction_id, 0))
            .await;
        assert_eq!(round0.len(), 1);
        assert_eq!(round0[0].account_id.as_str(), "live");
    }

    #[tokio::test]
    async fn test_missing_lookups() {
        let store = Store::new();
        store
            .transaction(|state| {
                assert!(matches!(
                    state.account(&AccountId::new("ghost")),
                    Err(AuctionError::AccountNotFound(_))
                ));
                assert!(matches!(
                    state.auction(AuctionId::generate()),
                    Err(AuctionError::AuctionNotFound)
                ));
                assert!(matches!(
                    state.bid(BidId::generate()),
                    Err(AuctionError::BidNotFound)
                ));
                Ok(())
            })
            .await
            .unwrap();
    }
}
