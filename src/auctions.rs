//! Auction administration and read views.
//!
//! Creation materializes the full round list up front; from then on only
//! the resolver mutates the auction. Won bids can be handed to another
//! account — an ownership change with provenance, never a ledger
//! movement.

use std::sync::Arc;
use tracing::info;

use crate::clock::Clock;
use crate::config::BiddingConfig;
use crate::store::Store;
use crate::types::{
    AccountId, Auction, AuctionError, AuctionId, AuctionStatus, Bid, BidId, BidStatus, Round,
};

/// Parameters for a new auction. All rounds share the same duration,
/// winner count, and minimum bid.
#[derive(Debug, Clone)]
pub struct AuctionSpec {
    pub title: String,
    pub rounds_count: usize,
    pub round_duration_ms: i64,
    pub winners_count: usize,
    pub min_bid: i64,
}

/// Auction detail plus the current round's standing, best bids first.
#[derive(Debug, Clone)]
pub struct AuctionView {
    pub auction: Auction,
    pub top_bids: Vec<Bid>,
}

pub struct Auctions {
    store: Arc<Store>,
    cfg: BiddingConfig,
    clock: Arc<dyn Clock>,
}

impl Auctions {
    pub fn new(store: Arc<Store>, cfg: BiddingConfig, clock: Arc<dyn Clock>) -> Self {
        Auctions { store, cfg, clock }
    }

    /// Create an auction with a fully materialized round list. Rounds
    /// start unscheduled; the first bid in each starts its clock.
    pub async fn create(&self, spec: AuctionSpec) -> Result<Auction, AuctionError> {
        let title = spec.title.trim().to_string();
        if title.is_empty() {
            return Err(AuctionError::TitleRequired);
        }

        let rounds_count = spec.rounds_count.max(1);
        let winners_count = spec.winners_count.max(1);
        let min_duration_ms = self.cfg.min_round_duration_secs * 1000;
        let duration_ms = if spec.round_duration_ms > 0 {
            spec.round_duration_ms.max(min_duration_ms)
        } else {
            self.cfg.default_round_duration_secs * 1000
        };
        let now = self.clock.now();

        let auction = Auction {
            id: AuctionId::generate(),
            title,
            status: AuctionStatus::Active,
            rounds: (0..rounds_count)
                .map(|i| Round::new(i, duration_ms, winners_count, spec.min_bid))
                .collect(),
            current_round_index: 0,
            created_at: now,
        };

        let created = auction.clone();
        self.store
            .transaction(move |state| {
                state.auctions.insert(auction.id, auction);
                Ok(())
            })
            .await?;

        info!(
            auction = %created.id,
            title = %created.title,
            rounds = created.rounds.len(),
            winners_per_round = winners_count,
            "Auction created"
        );
        Ok(created)
    }

    /// All auctions still running (finished ones are deleted, so this is
    /// everything that exists and is not pending).
    pub async fn list_open(&self) -> Vec<Auction> {
        self.store
            .read(|state| {
                let mut open: Vec<Auction> = state
                    .auctions
                    .values()
                    .filter(|a| a.status == AuctionStatus::Active)
                    .cloned()
                    .collect();
                open.sort_by(|a, b| a.created_at.cmp(&b.created_at));
                open
            })
            .await
    }

    /// Auction detail with the current round's active bids, best first.
    pub async fn get(&self, id: AuctionId) -> Result<AuctionView, AuctionError> {
        self.store
            .read(|state| {
                let auction = state.auction(id)?.clone();
                let top_bids =
                    state.active_bids_for_round(id, auction.current_round_index);
                Ok(AuctionView { auction, top_bids })
            })
            .await
    }

    /// Hand a won item to another account. Ownership change only: no
    /// ledger effect, provenance recorded on the bid.
    pub async fn transfer_bid(
        &self,
        bid_id: BidId,
        from: &AccountId,
        to: &AccountId,
    ) -> Result<Bid, AuctionError> {
        let now = self.clock.now();
        let transferred = self
            .store
            .transaction(|state| {
                // Recipient must exist; the bid must be a win owned by
                // the sender.
                state.account(to)?;
                let bid = state.bid(bid_id)?;
                if &bid.account_id != from {
                    return Err(AuctionError::NotBidOwner(from.clone()));
                }
                if bid.status != BidStatus::Winner {
                    return Err(AuctionError::NotTransferable);
                }

                let bid = state.bid_mut(bid_id)?;
                bid.account_id = to.clone();
                bid.transferred_from = Some(from.clone());
                bid.transferred_at = Some(now);
                Ok(bid.clone())
            })
            .await?;

        info!(
            bid = %bid_id,
            from = %from,
            to = %to,
            "Won bid transferred"
        );
        Ok(transferred)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
