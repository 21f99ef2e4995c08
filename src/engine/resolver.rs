//! Round resolution — settling an expired round.
//!
//! Winners are the top `winners_count` active bids of the round (amount
//! descending, earlier bid wins ties); their reservations are captured.
//! On a non-final round, losers carry over: they stay active and their
//! round index advances. On the final round, losers are refunded and the
//! auction record is deleted outright.
//!
//! The whole resolution runs in one store transaction. Any failure aborts
//! with no partial effect, leaving the round expired so the next scheduler
//! tick retries it.

use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

use crate::clock::Clock;
use crate::ledger::Ledger;
use crate::store::Store;
use crate::types::{AccountId, AuctionError, AuctionId, AuctionStatus, BidStatus};

pub struct Resolver {
    store: Arc<Store>,
    ledger: Ledger,
    clock: Arc<dyn Clock>,
}

impl Resolver {
    pub fn new(store: Arc<Store>, ledger: Ledger, clock: Arc<dyn Clock>) -> Self {
        Resolver {
            store,
            ledger,
            clock,
        }
    }

    /// Resolve the auction's current round if it has expired.
    ///
    /// Returns `Ok(true)` when a round was settled, `Ok(false)` when there
    /// was nothing to do (auction gone, not active, round unstarted, not
    /// yet expired, or already finalized) — the call is an idempotent
    /// no-op in all of those cases.
    pub async fn resolve_round(&self, auction_id: AuctionId) -> Result<bool, AuctionError> {
        let now = self.clock.now();

        self.store
            .transaction(|state| {
                let auction = match state.auctions.get(&auction_id) {
                    Some(a) => a,
                    None => return Ok(false),
                };
                if auction.status != AuctionStatus::Active {
                    return Ok(false);
                }
                let current_index = auction.current_round_index;
                let round = match auction.current_round() {
                    Some(r) => r,
                    None => return Ok(false),
                };
                if !round.due(now) {
                    return Ok(false);
                }
                let winners_count = round.winners_count;
                let last_round = auction.is_last_round(current_index);

                info!(auction = %auction_id, round = current_index, "Resolving round");

                // Active bids of this round, best first. Deduplicate by
                // account — the admission index makes duplicates
                // impossible, so this is defense, not load-bearing logic.
                let candidates = state.active_bids_for_round(auction_id, current_index);
                let mut seen: HashSet<AccountId> = HashSet::new();
                let mut ranked = Vec::with_capacity(candidates.len());
                let mut duplicates = Vec::new();
                for bid in candidates {
                    if seen.insert(bid.account_id.clone()) {
                        ranked.push(bid);
                    } else {
                        warn!(
                            auction = %auction_id,
                            account = %bid.account_id,
                            bid = %bid.id,
                            "Duplicate active bid for account in round — demoting to loser"
                        );
                        duplicates.push(bid);
                    }
                }

                let split = winners_count.min(ranked.len());
                let losers: Vec<_> = ranked
                    .split_off(split)
                    .into_iter()
                    .chain(duplicates)
                    .collect();
                let winners = ranked;

                // Winners: capture the reservation, retire the bid.
                for won in &winners {
                    let reference =
                        format!("win:{auction_id}:r{current_index}:{}", won.id);
                    self.ledger
                        .capture(state, &won.account_id, won.amount, &reference)?;
                    state.bid_mut(won.id)?.status = BidStatus::Winner;
                    state.clear_active(&won.account_id, auction_id);
                }

                if last_round {
                    // End of auction: refund every loser, then delete the
                    // record. Bids keep their title snapshot.
                    for lost in &losers {
                        let reference = format!("refund:{auction_id}:{}", lost.id);
                        self.ledger
                            .release(state, &lost.account_id, lost.amount, &reference)?;
                        state.bid_mut(lost.id)?.status = BidStatus::Lost;
                        state.clear_active(&lost.account_id, auction_id);
                    }
                    state.auctions.remove(&auction_id);
                    info!(
                        auction = %auction_id,
                        winners = winners.len(),
                        refunded = losers.len(),
                        "Auction finished and deleted"
                    );
                } else {
                    // Carry losers into the next round: reservation stays,
                    // no ledger movement, round index advances.
                    let next_index = current_index + 1;
                    for lost in &losers {
                        state.bid_mut(lost.id)?.round_index = next_index;
                    }

                    let auction = state.auction_mut(auction_id)?;
                    auction
                        .current_round_mut()
                        .ok_or(AuctionError::RoundNotFound)?
                        .finalized = true;
                    auction.current_round_index = next_index;
                    info!(
                        auction = %auction_id,
                        round = current_index,
                        winners = winners.len(),
                        carried_over = losers.len(),
                        "Round resolved, advancing"
                    );
                }

                Ok(true)
            })
            .await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
