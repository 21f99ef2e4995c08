//! Bid admission — validating and recording a bid against an auction's
//! current round.
//!
//! A first bid reserves its full amount; a repeat bid from the same
//! account upgrades the existing record and reserves only the difference.
//! The first bid a round ever sees starts its clock. All of it — the
//! round start, the reservation, the bid write, and any anti-sniping
//! extension — commits as one transaction: a success response means every
//! part took effect.

use chrono::Duration;
use std::sync::Arc;
use tracing::info;

use crate::clock::Clock;
use crate::config::BiddingConfig;
use crate::ledger::Ledger;
use crate::store::Store;
use crate::sync::KeyedMutex;
use crate::types::{AccountId, AuctionError, AuctionId, AuctionStatus, Bid, BidId, BidStatus};

pub struct Admission {
    store: Arc<Store>,
    ledger: Ledger,
    cfg: BiddingConfig,
    clock: Arc<dyn Clock>,
    account_locks: KeyedMutex<AccountId>,
}

impl Admission {
    pub fn new(
        store: Arc<Store>,
        ledger: Ledger,
        cfg: BiddingConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Admission {
            store,
            ledger,
            cfg,
            clock,
            account_locks: KeyedMutex::new(),
        }
    }

    /// Place (or upgrade) a bid on an active auction's current round.
    ///
    /// Placements are serialized per account; within the store, the whole
    /// placement is atomic.
    pub async fn place_bid(
        &self,
        account_id: &AccountId,
        auction_id: AuctionId,
        amount: i64,
    ) -> Result<Bid, AuctionError> {
        let _account_guard = self.account_locks.acquire(account_id).await;
        let now = self.clock.now();
        let grace = Duration::seconds(self.cfg.grace_window_secs);
        let snipe_window = Duration::seconds(self.cfg.snipe_window_secs);
        let snipe_extension = Duration::seconds(self.cfg.snipe_extension_secs);
        let default_duration = Duration::seconds(self.cfg.default_round_duration_secs);

        let bid = self
            .store
            .transaction(|state| {
                let auction = state.auction(auction_id)?;
                if auction.status != AuctionStatus::Active {
                    return Err(AuctionError::AuctionNotActive);
                }
                let title = auction.title.clone();
                let round_index = auction.current_round_index;

                let auction = state.auction_mut(auction_id)?;
                let round = auction
                    .current_round_mut()
                    .ok_or(AuctionError::RoundNotFound)?;

                // First bid starts the round clock.
                if !round.started() {
                    let duration = if round.duration_ms > 0 {
                        round.duration()
                    } else {
                        default_duration
                    };
                    round.start_time = Some(now);
                    round.end_time = Some(now + duration);
                }

                if round.finalized {
                    return Err(AuctionError::RoundFinished);
                }

                // end_time is always set past this point (set above or on a
                // previous bid together with start_time).
                let end_time = round.end_time.ok_or(AuctionError::RoundNotFound)?;
                if now > end_time + grace {
                    return Err(AuctionError::RoundClosed);
                }

                let min_bid = round.min_bid;
                if amount < min_bid {
                    return Err(AuctionError::BidTooLow { min: min_bid });
                }

                let bid = match state.active_bid_id(account_id, auction_id) {
                    Some(existing_id) => {
                        // Upgrade: reserve only the net increase.
                        let current = state.bid(existing_id)?.amount;
                        if amount <= current {
                            return Err(AuctionError::BidNotHigher {
                                offered: amount,
                                current,
                            });
                        }
                        let diff = amount - current;
                        self.ledger.reserve(
                            state,
                            account_id,
                            diff,
                            &format!("upgrade:{existing_id}"),
                        )?;

                        let bid = state.bid_mut(existing_id)?;
                        bid.amount = amount;
                        bid.round_index = round_index;
                        bid.snapshot_title = title;
                        bid.clone()
                    }
                    None => {
                        let bid_id = BidId::generate();
                        self.ledger.reserve(
                            state,
                            account_id,
                            amount,
                            &format!("bid:{bid_id}"),
                        )?;

                        let seq = state.next_seq();
                        let bid = Bid {
                            id: bid_id,
                            auction_id,
                            account_id: account_id.clone(),
                            amount,
                            round_index,
                            status: BidStatus::Active,
                            snapshot_title: title,
                            transferred_from: None,
                            transferred_at: None,
                            created_at: now,
                            created_seq: seq,
                        };
                        state.insert_active_bid(bid.clone())?;
                        bid
                    }
                };

                // Anti-sniping: a bid landing near the end pushes it out.
                let round = state
                    .auction_mut(auction_id)?
                    .current_round_mut()
                    .ok_or(AuctionError::RoundNotFound)?;
                if let Some(end) = round.end_time {
                    let time_left = end - now;
                    if time_left > Duration::zero() && time_left < snipe_window {
                        let new_end = end + snipe_extension;
                        round.end_time = Some(new_end);
                        info!(
                            auction = %auction_id,
                            round = round.index,
                            new_end = %new_end,
                            "Anti-sniping extension triggered"
                        );
                    }
                }

                Ok(bid)
            })
            .await?;

        info!(
            auction = %auction_id,
            account = %account_id,
            amount = bid.amount,
            round = bid.round_index,
            "Bid admitted"
        );
        Ok(bid)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
