//! Tournament domain models and prize helpers.

pub mod models;
pub mod prizes;

use serde::Serialize;

/// A record type tracked per entity under a namespace.
pub trait Model: Serialize {
    /// Model name as registered on chain (e.g. "Tournament", "Prize").
    const NAME: &'static str;
}

pub use models::{
    EntryCount, EntryFee, EntryFeeRole, GameConfig, Metadata, Period, Prize, PrizeClaim,
    PrizeType, Registration, Schedule, TokenType, Tournament,
};
pub use prizes::{
    ClaimablePrizes, Payout, PrizeSource, claimable_prizes, entry_fee_payouts, format_amount,
    parse_amount,
};
