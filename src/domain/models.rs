//! On-chain model records tracked per entity.
//!
//! Field names follow the indexer's JSON so that optimistic data and
//! authoritative data merge field for field.

use super::Model;
use crate::core::{Result, SyncError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: u64,
    pub end: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    pub registration: Option<Period>,
    pub game: Period,
    pub submission_duration: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub address: String,
    pub settings_id: u32,
    pub prize_spots: u8,
}

/// Entry fee charged per registration, split between creators and winners.
///
/// `amount` is a `0x` hex token amount; shares and distribution are percents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFee {
    pub token_address: String,
    pub amount: String,
    pub distribution: Vec<u8>,
    pub tournament_creator_share: Option<u8>,
    pub game_creator_share: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tournament {
    pub id: u64,
    pub created_at: u64,
    pub created_by: String,
    pub creator_token_id: u64,
    pub metadata: Metadata,
    pub schedule: Schedule,
    pub game_config: GameConfig,
    pub entry_fee: Option<EntryFee>,
}

impl Model for Tournament {
    const NAME: &'static str = "Tournament";
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    Erc20 { amount: String },
    Erc721 { id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prize {
    pub id: u64,
    pub tournament_id: u64,
    pub payout_position: u32,
    pub token_address: String,
    pub token_type: TokenType,
    pub claimed: bool,
}

impl Model for Prize {
    const NAME: &'static str = "Prize";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryCount {
    pub tournament_id: u64,
    pub count: u32,
}

impl Model for EntryCount {
    const NAME: &'static str = "EntryCount";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    pub tournament_id: u64,
    pub game_token_id: u64,
    pub entry_number: u32,
    pub has_submitted: bool,
}

impl Model for Registration {
    const NAME: &'static str = "Registration";
}

/// Which slice of the entry fee pool a claim targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryFeeRole {
    TournamentCreator,
    GameCreator,
    Position(u32),
}

/// Tag identifying one claimable prize of a tournament.
///
/// Text form: `Sponsored:<prize id>`, `EntryFees.Position:<n>`,
/// `EntryFees.GameCreator`, `EntryFees.TournamentCreator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PrizeType {
    EntryFees(EntryFeeRole),
    Sponsored(u64),
}

impl fmt::Display for PrizeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrizeType::Sponsored(prize_id) => write!(f, "Sponsored:{}", prize_id),
            PrizeType::EntryFees(EntryFeeRole::Position(position)) => {
                write!(f, "EntryFees.Position:{}", position)
            }
            PrizeType::EntryFees(EntryFeeRole::GameCreator) => write!(f, "EntryFees.GameCreator"),
            PrizeType::EntryFees(EntryFeeRole::TournamentCreator) => {
                write!(f, "EntryFees.TournamentCreator")
            }
        }
    }
}

impl FromStr for PrizeType {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || SyncError::InvalidInput(format!("unrecognized prize type '{}'", s));
        let number = |raw: &str| raw.trim().parse::<u64>().map_err(|_| invalid());

        match s.trim() {
            "EntryFees.GameCreator" => Ok(PrizeType::EntryFees(EntryFeeRole::GameCreator)),
            "EntryFees.TournamentCreator" => {
                Ok(PrizeType::EntryFees(EntryFeeRole::TournamentCreator))
            }
            other => {
                if let Some(raw) = other.strip_prefix("Sponsored:") {
                    Ok(PrizeType::Sponsored(number(raw)?))
                } else if let Some(raw) = other.strip_prefix("EntryFees.Position:") {
                    let position = u32::try_from(number(raw)?).map_err(|_| invalid())?;
                    Ok(PrizeType::EntryFees(EntryFeeRole::Position(position)))
                } else {
                    Err(invalid())
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrizeClaim {
    pub tournament_id: u64,
    pub prize_type: PrizeType,
    pub claimed: bool,
}

impl Model for PrizeClaim {
    const NAME: &'static str = "PrizeClaim";
}
