//! Scheduler loop — the only driver of round resolution.
//!
//! A low-frequency poller scans all active auctions and hands each one
//! whose current round has expired to the resolver. An in-flight set
//! gives per-auction exclusivity: a slow resolution is never started a
//! second time for the same auction, even across overlapping sweeps.
//! Admission never resolves rounds itself; it only starts their clocks.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::engine::resolver::Resolver;
use crate::store::Store;
use crate::types::{AuctionId, AuctionStatus};

pub struct Scheduler {
    store: Arc<Store>,
    resolver: Arc<Resolver>,
    clock: Arc<dyn Clock>,
    poll_interval: Duration,
    in_flight: Mutex<HashSet<AuctionId>>,
}

impl Scheduler {
    pub fn new(
        store: Arc<Store>,
        resolver: Arc<Resolver>,
        clock: Arc<dyn Clock>,
        cfg: &EngineConfig,
    ) -> Self {
        Scheduler {
            store,
            resolver,
            clock,
            poll_interval: Duration::from_millis(cfg.poll_interval_ms),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// One scan pass: resolve every auction whose current round is due.
    /// Returns how many rounds were settled.
    pub async fn sweep(&self) -> usize {
        let now = self.clock.now();
        let due: Vec<AuctionId> = self
            .store
            .read(|state| {
                state
                    .auctions
                    .values()
                    .filter(|a| {
                        a.status == AuctionStatus::Active
                            && a.current_round().map_or(false, |r| r.due(now))
                    })
                    .map(|a| a.id)
                    .collect()
            })
            .await;

        let mut settled = 0;
        for auction_id in due {
            // Per-auction exclusivity: skip anything another sweep is
            // still working on.
            if !self.in_flight.lock().unwrap().insert(auction_id) {
                debug!(auction = %auction_id, "Resolution already in flight, skipping");
                continue;
            }

            let result = self.resolver.resolve_round(auction_id).await;
            self.in_flight.lock().unwrap().remove(&auction_id);

            match result {
                Ok(true) => settled += 1,
                Ok(false) => {}
                Err(e) => {
                    // The transaction aborted; the round is still expired
                    // and the next tick retries it.
                    error!(
                        auction = %auction_id,
                        error = %e,
                        defect = e.is_defect(),
                        "Round resolution failed, will retry next tick"
                    );
                }
            }
        }
        settled
    }

    /// Spawn the polling loop. The returned handle can be aborted for
    /// shutdown; each tick is a full sweep.
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        info!(
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Auction engine started"
        );
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(self.poll_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                let settled = self.sweep().await;
                if settled > 0 {
                    debug!(settled, "Sweep settled rounds");
                }
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
