//! Table Events
//!
//! Notifications produced by a table's engine. The network layer maps them
//! onto wire messages; the engine never sees the transport.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::game::config::TableId;
use crate::game::registry::PlayerRecord;
use crate::game::state::GameState;

/// Event emitted by a table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TableEvent {
    /// A guess was accepted (targeted at the guesser).
    GuessConfirmed {
        /// Table the guess was placed on.
        table_id: TableId,
        /// Recorded number.
        value: u32,
        /// Guesser's current score.
        score: i64,
    },

    /// Outcome of the guesser's entry in a resolved round (targeted).
    RoundResult {
        /// Resolving table.
        table_id: TableId,
        /// Round that was resolved.
        round_id: u64,
        /// The player's guess.
        guess: u32,
        /// Drawn number.
        target: u32,
        /// Exact match.
        won: bool,
        /// Score credited, zero on a miss.
        reward: i64,
        /// Score after settlement.
        score: i64,
    },

    /// Refreshed player record (targeted).
    PlayerDetails(PlayerRecord),

    /// A round settled; carries the state of the round that replaced it (broadcast).
    RoundSettled {
        /// Resolving table.
        table_id: TableId,
        /// Round that was resolved.
        round_id: u64,
        /// Drawn number.
        target: u32,
        /// Number of exact matches, departed players included.
        winner_count: usize,
        /// Snapshot of the freshly opened round.
        state: GameState,
        /// Wall-clock settlement time.
        settled_at: DateTime<Utc>,
    },

    /// Chat line posted by the table itself (broadcast).
    Chat {
        /// Table's display label.
        author: String,
        /// Announcement text.
        text: String,
    },
}

impl TableEvent {
    /// Chat line authored by a table.
    pub fn chat(author: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Chat {
            author: author.into(),
            text: text.into(),
        }
    }
}
