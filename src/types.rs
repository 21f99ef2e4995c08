//! Shared types for the GAVEL settlement engine.
//!
//! These types form the data model used across all modules: accounts and
//! their two balances, auctions with their materialized round list, bids,
//! and the append-only ledger audit trail. They are designed to be stable
//! so that the store, admission, and resolution modules can depend on them
//! without circular references.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identifiers
// ---------------------------------------------------------------------------

/// Opaque caller-supplied account identifier. The engine trusts whatever
/// the request layer resolved; it never interprets the contents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        AccountId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        AccountId(s.to_string())
    }
}

/// Auction identifier, generated by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuctionId(Uuid);

impl AuctionId {
    pub fn generate() -> Self {
        AuctionId(Uuid::new_v4())
    }
}

impl fmt::Display for AuctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Bid identifier, generated by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BidId(Uuid);

impl BidId {
    pub fn generate() -> Self {
        BidId(Uuid::new_v4())
    }
}

impl fmt::Display for BidId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// A fund-holding account. `available` is spendable; `reserved` is locked
/// against open bids. Invariant: `reserved` equals the sum of this
/// account's currently-active bid amounts across all auctions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    /// Spendable balance in the smallest currency unit. May go negative
    /// only through `adjust_available` under the overdraft policy.
    pub available: i64,
    /// Funds locked against active bids. Never negative.
    pub reserved: i64,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(id: AccountId, created_at: DateTime<Utc>) -> Self {
        Account {
            id,
            available: 0,
            reserved: 0,
            created_at,
        }
    }

    /// Total wealth from the account holder's perspective.
    pub fn total(&self) -> i64 {
        self.available + self.reserved
    }
}

impl fmt::Display for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (available: {}, reserved: {})",
            self.id, self.available, self.reserved,
        )
    }
}

// ---------------------------------------------------------------------------
// Auction & Round
// ---------------------------------------------------------------------------

/// Auction lifecycle status.
///
/// `Finished` exists for completeness of the state machine, but the engine
/// deletes the auction record outright when the final round resolves, so a
/// stored auction is never observed in this state. Won bids carry a title
/// snapshot precisely because of that.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuctionStatus {
    Pending,
    Active,
    Finished,
}

impl fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuctionStatus::Pending => write!(f, "PENDING"),
            AuctionStatus::Active => write!(f, "ACTIVE"),
            AuctionStatus::Finished => write!(f, "FINISHED"),
        }
    }
}

/// One timed bidding phase within an auction.
///
/// `start_time`/`end_time` are both unset until the first bid arrives;
/// that bid starts the clock. Once `finalized` is set the round admits no
/// further bids and is never resolved again.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Round {
    /// Position within the auction. Immutable.
    pub index: usize,
    /// Reservation window length in milliseconds.
    pub duration_ms: i64,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    /// How many top bidders win this round.
    pub winners_count: usize,
    pub min_bid: i64,
    pub finalized: bool,
}

impl Round {
    pub fn new(index: usize, duration_ms: i64, winners_count: usize, min_bid: i64) -> Self {
        Round {
            index,
            duration_ms,
            start_time: None,
            end_time: None,
            winners_count,
            min_bid,
            finalized: false,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::milliseconds(self.duration_ms)
    }

    /// Whether the round's clock has begun.
    pub fn started(&self) -> bool {
        self.start_time.is_some()
    }

    /// Expired and still awaiting resolution.
    pub fn due(&self, now: DateTime<Utc>) -> bool {
        !self.finalized && self.end_time.map_or(false, |end| now >= end)
    }
}

/// A multi-round auction. Created with a fully materialized round list;
/// the resolver advances `current_round_index` until the last round
/// resolves, at which point the record is deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Auction {
    pub id: AuctionId,
    pub title: String,
    pub status: AuctionStatus,
    pub rounds: Vec<Round>,
    pub current_round_index: usize,
    pub created_at: DateTime<Utc>,
}

impl Auction {
    pub fn current_round(&self) -> Option<&Round> {
        self.rounds.get(self.current_round_index)
    }

    pub fn current_round_mut(&mut self) -> Option<&mut Round> {
        self.rounds.get_mut(self.current_round_index)
    }

    /// Whether the given round index is the auction's final round.
    pub fn is_last_round(&self, index: usize) -> bool {
        index + 1 >= self.rounds.len()
    }
}

impl fmt::Display for Auction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}, round {}/{})",
            self.id,
            self.title,
            self.status,
            self.current_round_index + 1,
            self.rounds.len(),
        )
    }
}

// ---------------------------------------------------------------------------
// Bid
// ---------------------------------------------------------------------------

/// Bid lifecycle status.
///
/// `Outbid` is kept for model parity (an unused-reserved state) but no
/// current transition produces it: losing bids either carry over as
/// `Active` or finish as `Lost`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BidStatus {
    Active,
    Winner,
    Outbid,
    Lost,
}

impl fmt::Display for BidStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BidStatus::Active => write!(f, "ACTIVE"),
            BidStatus::Winner => write!(f, "WINNER"),
            BidStatus::Outbid => write!(f, "OUTBID"),
            BidStatus::Lost => write!(f, "LOST"),
        }
    }
}

/// A bid record. At most one `Active` bid exists per (account, auction)
/// pair — a higher bid from the same account upgrades this record in
/// place. `created_seq` is never changed by an upgrade, so a carried-over
/// bid keeps its first-come priority at equal price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
    pub id: BidId,
    pub auction_id: AuctionId,
    pub account_id: AccountId,
    pub amount: i64,
    /// The round this bid currently counts toward. Advanced on carryover.
    pub round_index: usize,
    pub status: BidStatus,
    /// Auction title at bid time, so the record stays meaningful after
    /// the auction is deleted.
    pub snapshot_title: String,
    /// Set when a won item is handed to another account.
    pub transferred_from: Option<AccountId>,
    pub transferred_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Store-assigned monotonic sequence; the tie-breaker for equal
    /// amounts (earlier wins).
    pub created_seq: u64,
}

impl fmt::Display for Bid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} on \"{}\" by {} (round {})",
            self.status, self.amount, self.snapshot_title, self.account_id, self.round_index,
        )
    }
}

// ---------------------------------------------------------------------------
// Ledger entries
// ---------------------------------------------------------------------------

/// Kind of balance-affecting operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Deposit,
    Withdrawal,
    Reserve,
    Release,
    Capture,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Deposit => write!(f, "DEPOSIT"),
            EntryKind::Withdrawal => write!(f, "WITHDRAWAL"),
            EntryKind::Reserve => write!(f, "RESERVE"),
            EntryKind::Release => write!(f, "RELEASE"),
            EntryKind::Capture => write!(f, "CAPTURE"),
        }
    }
}

/// Append-only audit record. `amount` is the signed effect on the
/// account's available balance, except for `Capture`, where it records
/// the reserved amount extinguished (negative). Used for reconciliation,
/// never for control flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub seq: u64,
    pub account_id: AccountId,
    pub amount: i64,
    pub kind: EntryKind,
    /// Ties the entry back to the bid/round that caused it.
    pub reference: Option<String>,
    pub at: DateTime<Utc>,
}

impl fmt::Display for LedgerEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {} {} {}{}",
            self.seq,
            self.kind,
            self.account_id,
            self.amount,
            self.reference
                .as_deref()
                .map(|r| format!(" ({r})"))
                .unwrap_or_default(),
        )
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Domain-specific error types for GAVEL.
#[derive(Debug, thiserror::Error)]
pub enum AuctionError {
    #[error("Auction not found")]
    AuctionNotFound,

    #[error("Auction is not active")]
    AuctionNotActive,

    #[error("Current round not found")]
    RoundNotFound,

    #[error("Round is finished")]
    RoundFinished,

    #[error("Round is closed")]
    RoundClosed,

    #[error("Minimum bid is {min}")]
    BidTooLow { min: i64 },

    #[error("New bid ({offered}) must be higher than existing bid ({current})")]
    BidNotHigher { offered: i64, current: i64 },

    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: i64, available: i64 },

    #[error("Insufficient reserved funds: reserved {reserved}, needed {needed}")]
    InsufficientReserved { reserved: i64, needed: i64 },

    #[error("Inconsistent ledger state: {0}")]
    InconsistentState(String),

    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    #[error("Bid not found")]
    BidNotFound,

    #[error("Bid does not belong to account {0}")]
    NotBidOwner(AccountId),

    #[error("Only winning bids can be transferred")]
    NotTransferable,

    #[error("Title is required")]
    TitleRequired,
}

impl AuctionError {
    /// Whether this error indicates an invariant was already violated
    /// elsewhere (a defect), as opposed to a user input/timing error.
    pub fn is_defect(&self) -> bool {
        matches!(
            self,
            AuctionError::InconsistentState(_) | AuctionError::InsufficientReserved { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // -- Identifier tests --

    #[test]
    fn test_account_id_display() {
        let id = AccountId::new("alice");
        assert_eq!(format!("{id}"), "alice");
        assert_eq!(id.as_str(), "alice");
    }

    #[test]
    fn test_ids_are_unique() {
        assert_ne!(AuctionId::generate(), AuctionId::generate());
        assert_ne!(BidId::generate(), BidId::generate());
    }

    #[test]
    fn test_account_id_serialization_roundtrip() {
        let id = AccountId::new("bob");
        let json = serde_json::to_string(&id).unwrap();
        let parsed: AccountId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, id);
    }

    // -- Account tests --

    #[test]
    fn test_account_new() {
        let acct = Account::new(AccountId::new("alice"), Utc::now());
        assert_eq!(acct.available, 0);
        assert_eq!(acct.reserved, 0);
        assert_eq!(acct.total(), 0);
    }

    #[test]
    fn test_account_total() {
        let mut acct = Account::new(AccountId::new("alice"), Utc::now());
        acct.available = 70;
        acct.reserved = 30;
        assert_eq!(acct.total(), 100);
    }

    #[test]
    fn test_account_display() {
        let mut acct = Account::new(AccountId::new("alice"), Utc::now());
        acct.available = 50;
        let display = format!("{acct}");
        assert!(display.contains("alice"));
        assert!(display.contains("50"));
    }

    // -- Round tests --

    #[test]
    fn test_round_not_started() {
        let round = Round::new(0, 60_000, 3, 10);
        assert!(!round.started());
        assert!(!round.due(Utc::now()));
    }

    #[test]
    fn test_round_due_after_end() {
        let now = Utc::now();
        let mut round = Round::new(0, 60_000, 3, 10);
        round.start_time = Some(now);
        round.end_time = Some(now + Duration::seconds(60));

        assert!(!round.due(now));
        assert!(round.due(now + Duration::seconds(60)));
        assert!(round.due(now + Duration::seconds(90)));
    }

    #[test]
    fn test_round_not_due_when_finalized() {
        let now = Utc::now();
        let mut round = Round::new(0, 60_000, 3, 10);
        round.start_time = Some(now - Duration::seconds(120));
        round.end_time = Some(now - Duration::seconds(60));
        round.finalized = true;
        assert!(!round.due(now));
    }

    #[test]
    fn test_round_duration() {
        let round = Round::new(0, 45_000, 1, 0);
        assert_eq!(round.duration(), Duration::seconds(45));
    }

    // -- Auction tests --

    fn sample_auction(rounds: usize) -> Auction {
        Auction {
            id: AuctionId::generate(),
            title: "Vintage clock".to_string(),
            status: AuctionStatus::Active,
            rounds: (0..rounds).map(|i| Round::new(i, 60_000, 2, 5)).collect(),
            current_round_index: 0,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_auction_current_round() {
        let auction = sample_auction(3);
        assert_eq!(auction.current_round().unwrap().index, 0);
    }

    #[test]
    fn test_auction_current_round_out_of_range() {
        let mut auction = sample_auction(2);
        auction.current_round_index = 5;
        assert!(auction.current_round().is_none());
    }

    #[test]
    fn test_auction_is_last_round() {
        let auction = sample_auction(3);
        assert!(!auction.is_last_round(0));
        assert!(!auction.is_last_round(1));
        assert!(auction.is_last_round(2));
    }

    #[test]
    fn test_auction_serialization_roundtrip() {
        let auction = sample_auction(2);
        let json = serde_json::to_string(&auction).unwrap();
        let parsed: Auction = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.id, auction.id);
        assert_eq!(parsed.rounds.len(), 2);
        assert_eq!(parsed.status, AuctionStatus::Active);
    }

    #[test]
    fn test_auction_display() {
        let auction = sample_auction(3);
        let display = format!("{auction}");
        assert!(display.contains("Vintage clock"));
        assert!(display.contains("round 1/3"));
    }

    // -- Status display tests --

    #[test]
    fn test_status_display() {
        assert_eq!(format!("{}", AuctionStatus::Active), "ACTIVE");
        assert_eq!(format!("{}", BidStatus::Winner), "WINNER");
        assert_eq!(format!("{}", EntryKind::Capture), "CAPTURE");
    }

    // -- LedgerEntry tests --

    #[test]
    fn test_ledger_entry_display() {
        let entry = LedgerEntry {
            seq: 7,
            account_id: AccountId::new("alice"),
            amount: -40,
            kind: EntryKind::Reserve,
            reference: Some("bid:test".to_string()),
            at: Utc::now(),
        };
        let display = format!("{entry}");
        assert!(display.contains("#7"));
        assert!(display.contains("RESERVE"));
        assert!(display.contains("bid:test"));
    }

    // -- AuctionError tests --

    #[test]
    fn test_error_display() {
        let e = AuctionError::BidTooLow { min: 10 };
        assert_eq!(format!("{e}"), "Minimum bid is 10");

        let e = AuctionError::InsufficientFunds {
            needed: 100,
            available: 40,
        };
        assert!(format!("{e}").contains("100"));
        assert!(format!("{e}").contains("40"));
    }

    #[test]
    fn test_error_defect_classification() {
        assert!(AuctionError::InconsistentState("x".into()).is_defect());
        assert!(AuctionError::InsufficientReserved {
            reserved: 0,
            needed: 5
        }
        .is_defect());
        assert!(!AuctionError::AuctionNotFound.is_defect());
        assert!(!AuctionError::InsufficientFunds {
            needed: 1,
            available: 0
        }
        .is_defect());
    }
}
