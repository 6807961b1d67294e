//! Protocol Messages
//!
//! Wire format for client-server communication over WebSocket.
//! All messages are serialized as JSON for debugging ease,
//! with optional binary (bincode) for flat payloads.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::game::config::{GameConfig, TableId};
use crate::game::events::TableEvent;
use crate::game::registry::PlayerRecord;
use crate::game::state::GameState;

// =============================================================================
// CLIENT -> SERVER MESSAGES
// =============================================================================

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Guess a number on a table.
    SubmitGuess(GuessRequest),

    /// Chat line to relay to everyone else.
    ChatMessage(ChatMessage),

    /// Ping for latency measurement.
    Ping {
        /// Client clock, echoed back in the pong.
        timestamp: u64,
    },
}

/// Guess submission.
///
/// `value` is signed and unclamped; the table decides what is playable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessRequest {
    /// Target table.
    pub table_id: TableId,
    /// Guessed number.
    pub value: i64,
}

/// A chat line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Display name of the author.
    pub author: String,
    /// Message body.
    pub text: String,
}

// =============================================================================
// SERVER -> CLIENT MESSAGES
// =============================================================================

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// The receiving player's record.
    PlayerDetails(PlayerRecord),

    /// Table catalogue, sent once on connect.
    Tables {
        /// Every table, in creation order.
        tables: Vec<GameConfig>,
        /// Version of the running server.
        server_version: String,
    },

    /// Every table's snapshot, in creation order (heartbeat).
    GameStates {
        /// One snapshot per table.
        states: Vec<GameState>,
    },

    /// Guess accepted. Only sent to the guesser.
    ConfirmGuess {
        /// Table the guess was placed on.
        table_id: TableId,
        /// Recorded number.
        value: u32,
        /// Guesser's score at the time of the guess.
        score: i64,
    },

    /// Outcome of the receiver's guess in a resolved round.
    RoundResult(RoundResultInfo),

    /// A table settled a round.
    RoundSettled(RoundSettledInfo),

    /// Relayed chat line.
    ChatMessage(ChatMessage),

    /// Pong response.
    Pong {
        /// Echo of the ping's timestamp.
        timestamp: u64,
        /// Server clock in Unix milliseconds.
        server_time: u64,
    },

    /// Error message.
    Error(ServerError),

    /// Server is shutting down.
    Shutdown {
        /// Why the server is going away.
        reason: String,
    },
}

/// Per-player round outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundResultInfo {
    /// Table.
    pub table_id: TableId,
    /// Resolved round.
    pub round_id: u64,
    /// The player's guess.
    pub guess: u32,
    /// Drawn number.
    pub target: u32,
    /// Exact match.
    pub won: bool,
    /// Score credited.
    pub reward: i64,
    /// Score after settlement.
    pub score: i64,
}

/// Round settlement announced to everyone.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundSettledInfo {
    /// Table.
    pub table_id: TableId,
    /// Resolved round.
    pub round_id: u64,
    /// Drawn number.
    pub target: u32,
    /// Number of exact matches.
    pub winner_count: usize,
    /// Snapshot of the round that replaced it.
    pub state: GameState,
    /// Wall-clock settlement time.
    pub settled_at: DateTime<Utc>,
}

/// Server error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerError {
    /// Error code.
    pub code: ErrorCode,
    /// Human-readable message.
    pub message: String,
}

/// Error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Malformed message.
    InvalidInput,
    /// Connection limit reached; the socket is closed after this error.
    ServerOverloaded,
    /// The server could not set up the connection.
    InternalError,
}

impl From<TableEvent> for ServerMessage {
    fn from(event: TableEvent) -> Self {
        match event {
            TableEvent::GuessConfirmed { table_id, value, score } => {
                ServerMessage::ConfirmGuess { table_id, value, score }
            }
            TableEvent::RoundResult { table_id, round_id, guess, target, won, reward, score } => {
                ServerMessage::RoundResult(RoundResultInfo {
                    table_id,
                    round_id,
                    guess,
                    target,
                    won,
                    reward,
                    score,
                })
            }
            TableEvent::PlayerDetails(record) => ServerMessage::PlayerDetails(record),
            TableEvent::RoundSettled { table_id, round_id, target, winner_count, state, settled_at } => {
                ServerMessage::RoundSettled(RoundSettledInfo {
                    table_id,
                    round_id,
                    target,
                    winner_count,
                    state,
                    settled_at,
                })
            }
            TableEvent::Chat { author, text } => {
                ServerMessage::ChatMessage(ChatMessage { author, text })
            }
        }
    }
}

// =============================================================================
// SERIALIZATION HELPERS
// =============================================================================

impl ClientMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Serialize to JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserialize from JSON string.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl GuessRequest {
    /// Serialize to binary.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}
