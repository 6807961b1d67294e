//! Round State Definitions
//!
//! Per-table round state and the snapshot broadcast to spectators.
//! Uses BTreeMap for deterministic iteration order.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};
use tokio::time::Instant;

use crate::game::config::TableId;
use crate::game::ledger::GuessLedger;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Connection identifier of a player (UUID as bytes).
///
/// Implements Ord for deterministic BTreeMap ordering.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[derive(Default)]
pub struct PlayerId(pub [u8; 16]);

impl PlayerId {
    /// Create from raw bytes.
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Fresh random id for a new connection.
    pub fn random() -> Self {
        Self(*uuid::Uuid::new_v4().as_bytes())
    }

    /// Create from UUID string.
    pub fn from_uuid_str(s: &str) -> Option<Self> {
        uuid::Uuid::parse_str(s)
            .ok()
            .map(|u| Self(*u.as_bytes()))
    }

    /// Convert to UUID string.
    pub fn to_uuid_string(&self) -> String {
        uuid::Uuid::from_bytes(self.0).to_string()
    }

    /// Get raw bytes.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    /// Short form used in logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(&self.0[..4]))
    }
}

// =============================================================================
// ROUND PHASE
// =============================================================================

/// Phase of a table's round state machine.
///
/// `Idle` only exists before the table starts; afterwards the table cycles
/// `Collecting -> Resolving -> Collecting` indefinitely.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundPhase {
    /// Table not started yet.
    Idle,
    /// Accepting guesses.
    Collecting,
    /// Drawing the target and settling scores.
    Resolving,
}

// =============================================================================
// ROUND STATE
// =============================================================================

/// State of the current round on one table.
///
/// Owned exclusively by the table's engine; replaced once per round transition.
#[derive(Debug)]
pub struct RoundState {
    /// Current phase.
    pub phase: RoundPhase,
    /// Monotonic round number, starting at 1 once the table runs.
    pub round_id: u64,
    /// Guesses accepted this round.
    pub ledger: GuessLedger,
    /// When the round opened (monotonic clock, drives the deadline).
    pub started_at: Instant,
    /// When the round opened (wall clock, reported to clients).
    pub opened_at: DateTime<Utc>,
}

impl RoundState {
    /// Pre-start state.
    pub fn idle(now: Instant) -> Self {
        Self {
            phase: RoundPhase::Idle,
            round_id: 0,
            ledger: GuessLedger::new(),
            started_at: now,
            opened_at: Utc::now(),
        }
    }

    /// Fresh collecting round following `previous_round_id`.
    pub fn collecting(previous_round_id: u64, now: Instant) -> Self {
        Self {
            phase: RoundPhase::Collecting,
            round_id: previous_round_id + 1,
            ledger: GuessLedger::new(),
            started_at: now,
            opened_at: Utc::now(),
        }
    }

    /// Check if guesses are being accepted.
    pub fn is_collecting(&self) -> bool {
        self.phase == RoundPhase::Collecting
    }
}

// =============================================================================
// GAME STATE SNAPSHOT
// =============================================================================

/// Read-only projection of a table's round, safe to broadcast every tick.
///
/// Carries only the number of guesses, never their values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    /// Table id.
    pub id: TableId,
    /// Current phase.
    pub phase: RoundPhase,
    /// Current round number.
    pub round_id: u64,
    /// Whole seconds until the round resolves (rounded up).
    pub seconds_remaining: u32,
    /// Guesses accepted so far this round.
    pub guess_count: usize,
}
