//! Prize bookkeeping that feeds the claim builder.

use super::{EntryFee, EntryFeeRole, Prize, PrizeClaim, PrizeType, TokenType};
use crate::core::{Result, SyncError};
use std::collections::HashSet;

/// Where a payout comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrizeSource {
    Sponsored,
    EntryFee,
    EntryFeeGameCreator,
    EntryFeeTournamentCreator,
}

impl PrizeSource {
    pub fn is_creator_share(&self) -> bool {
        matches!(
            self,
            PrizeSource::EntryFeeGameCreator | PrizeSource::EntryFeeTournamentCreator
        )
    }
}

/// A prize as the claim flow sees it: sponsored prizes plus entry-fee payouts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    pub id: u64,
    pub tournament_id: u64,
    pub payout_position: u32,
    pub token_address: String,
    pub token_type: TokenType,
    pub source: PrizeSource,
}

impl Payout {
    pub fn sponsored(prize: &Prize) -> Self {
        Self {
            id: prize.id,
            tournament_id: prize.tournament_id,
            payout_position: prize.payout_position,
            token_address: prize.token_address.clone(),
            token_type: prize.token_type.clone(),
            source: PrizeSource::Sponsored,
        }
    }

    /// Claim tag for this payout
    pub fn prize_type(&self) -> PrizeType {
        match self.source {
            PrizeSource::Sponsored => PrizeType::Sponsored(self.id),
            PrizeSource::EntryFee => {
                PrizeType::EntryFees(EntryFeeRole::Position(self.payout_position))
            }
            PrizeSource::EntryFeeGameCreator => PrizeType::EntryFees(EntryFeeRole::GameCreator),
            PrizeSource::EntryFeeTournamentCreator => {
                PrizeType::EntryFees(EntryFeeRole::TournamentCreator)
            }
        }
    }
}

/// Parse a `0x` hex (or plain decimal) token amount
pub fn parse_amount(raw: &str) -> Result<u128> {
    let raw = raw.trim();
    let parsed = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u128::from_str_radix(hex, 16),
        None => raw.parse::<u128>(),
    };
    parsed.map_err(|err| SyncError::InvalidInput(format!("invalid token amount '{}': {}", raw, err)))
}

/// Render an amount as `0x` hex padded to 64 digits, like a felt on chain
pub fn format_amount(amount: u128) -> String {
    format!("{:#066x}", amount)
}

/// Payouts generated by a tournament's entry fee pool.
///
/// Game creator share first, then tournament creator share (both position 0),
/// then one payout per distribution slot starting at position 1.
pub fn entry_fee_payouts(
    tournament_id: u64,
    entry_fee: Option<&EntryFee>,
    entry_count: u64,
) -> Result<Vec<Payout>> {
    let Some(entry_fee) = entry_fee else {
        return Ok(Vec::new());
    };

    let total = parse_amount(&entry_fee.amount)?
        .checked_mul(u128::from(entry_count))
        .ok_or_else(|| SyncError::InvalidInput("entry fee pool overflows u128".into()))?;
    if total == 0 {
        return Ok(Vec::new());
    }

    let payout = |percent: u8, position: u32, source: PrizeSource| Payout {
        id: 0,
        tournament_id,
        payout_position: position,
        token_address: entry_fee.token_address.clone(),
        token_type: TokenType::Erc20 {
            amount: format_amount(percent_of(total, percent)),
        },
        source,
    };

    let mut payouts = Vec::new();
    if let Some(share) = entry_fee.game_creator_share {
        payouts.push(payout(share, 0, PrizeSource::EntryFeeGameCreator));
    }
    if let Some(share) = entry_fee.tournament_creator_share {
        payouts.push(payout(share, 0, PrizeSource::EntryFeeTournamentCreator));
    }
    for (index, percent) in entry_fee.distribution.iter().enumerate() {
        payouts.push(payout(*percent, index as u32 + 1, PrizeSource::EntryFee));
    }
    Ok(payouts)
}

// floor(total * percent / 100) without overflowing on large pools
fn percent_of(total: u128, percent: u8) -> u128 {
    let percent = u128::from(percent);
    total / 100 * percent + total % 100 * percent / 100
}

/// Unclaimed payouts and the tags to claim them with
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimablePrizes {
    pub payouts: Vec<Payout>,
    pub prize_types: Vec<PrizeType>,
}

/// Work out which payouts can still be claimed.
///
/// Creator shares are always eligible; positional payouts only when that many
/// scores were submitted. Anything with a matching claim row is dropped; the
/// row's `claimed` flag is not consulted, since the indexer only stores a
/// `PrizeClaim` once the claim was made.
pub fn claimable_prizes(
    payouts: &[Payout],
    claims: &[PrizeClaim],
    total_submissions: u32,
) -> ClaimablePrizes {
    let claimed: HashSet<PrizeType> = claims.iter().map(|claim| claim.prize_type).collect();

    let payouts: Vec<Payout> = payouts
        .iter()
        .filter(|payout| {
            payout.source.is_creator_share() || payout.payout_position <= total_submissions
        })
        .filter(|payout| !claimed.contains(&payout.prize_type()))
        .cloned()
        .collect();

    let prize_types = payouts.iter().map(Payout::prize_type).collect();
    ClaimablePrizes {
        payouts,
        prize_types,
    }
}
