//! Guess Ledger
//!
//! Per-round guess storage. A player holds at most one guess per round and
//! a recorded guess is never removed or overwritten.

use std::collections::BTreeMap;

use crate::game::state::{PlayerId, RoundPhase};

/// Why a guess was not recorded.
///
/// These are expected outcomes, not faults; the engine reports them to the
/// transport as a plain `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum GuessRejection {
    /// Round is not collecting guesses.
    #[error("round is not collecting guesses")]
    WrongPhase,

    /// Value outside `[0, number_range]`.
    #[error("guess {value} outside 0..={number_range}")]
    OutOfRange {
        /// Submitted value.
        value: i64,
        /// Table's upper bound.
        number_range: u32,
    },

    /// Player already guessed this round.
    #[error("player already guessed this round")]
    AlreadyGuessed,

    /// Player not present in the registry.
    #[error("unknown player")]
    UnknownPlayer,
}

/// Accepted guesses for one round.
#[derive(Debug, Default, Clone)]
pub struct GuessLedger {
    guesses: BTreeMap<PlayerId, u32>,
}

impl GuessLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and record a guess. This is the ledger's only mutation path.
    ///
    /// Check-then-set runs under the caller's exclusive borrow, so two
    /// interleaved submissions from one player cannot both pass the
    /// duplicate check.
    pub fn submit(
        &mut self,
        phase: RoundPhase,
        player_id: PlayerId,
        value: i64,
        number_range: u32,
        player_known: bool,
    ) -> Result<u32, GuessRejection> {
        if phase != RoundPhase::Collecting {
            return Err(GuessRejection::WrongPhase);
        }

        if value < 0 || value > number_range as i64 {
            return Err(GuessRejection::OutOfRange { value, number_range });
        }

        if !player_known {
            return Err(GuessRejection::UnknownPlayer);
        }

        if self.guesses.contains_key(&player_id) {
            return Err(GuessRejection::AlreadyGuessed);
        }

        let value = value as u32;
        self.guesses.insert(player_id, value);
        Ok(value)
    }

    /// Recorded guess of a player.
    pub fn guess_of(&self, player_id: &PlayerId) -> Option<u32> {
        self.guesses.get(player_id).copied()
    }

    /// Iterate guesses in player order.
    pub fn iter(&self) -> impl Iterator<Item = (&PlayerId, &u32)> {
        self.guesses.iter()
    }

    /// Number of recorded guesses.
    pub fn len(&self) -> usize {
        self.guesses.len()
    }

    /// Check if no guesses were recorded.
    pub fn is_empty(&self) -> bool {
        self.guesses.is_empty()
    }
}
