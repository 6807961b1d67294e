//! Table Configuration
//!
//! Immutable per-table settings and the reward formula derived from them.

use serde::{Serialize, Deserialize};

use crate::game::engine::EngineError;

/// Table identifier, unique within the process.
pub type TableId = u8;

/// Configuration of one table (tier). Fixed at table creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameConfig {
    /// Unique table id.
    pub id: TableId,
    /// Name shown to players.
    pub display_name: String,
    /// Icon shown next to the name.
    pub icon: String,
    /// Inclusive upper bound of playable numbers. Lower bound is 0.
    pub number_range: u32,
    /// Minimum advertised stake.
    pub min_bet: i64,
    /// Maximum advertised stake.
    pub max_bet: i64,
}

impl GameConfig {
    /// Create a table configuration.
    pub fn new(
        id: TableId,
        display_name: impl Into<String>,
        icon: impl Into<String>,
        number_range: u32,
        min_bet: i64,
        max_bet: i64,
    ) -> Self {
        Self {
            id,
            display_name: display_name.into(),
            icon: icon.into(),
            number_range,
            min_bet,
            max_bet,
        }
    }

    /// The three tiers of the reference deployment, in creation order.
    pub fn default_tiers() -> Vec<GameConfig> {
        vec![
            GameConfig::new(0, "Bronze Game", "🥉", 10, 1, 10),
            GameConfig::new(1, "Silver Game", "🥈", 16, 2, 20),
            GameConfig::new(2, "Gold Game", "🥇", 35, 10, 100),
        ]
    }

    /// Check `0 < min_bet <= max_bet`.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.min_bet <= 0 || self.min_bet > self.max_bet {
            return Err(EngineError::InvalidConfig {
                table_id: self.id,
                reason: format!(
                    "bet bounds must satisfy 0 < min_bet <= max_bet (got {}..={})",
                    self.min_bet, self.max_bet
                ),
            });
        }
        Ok(())
    }

    /// Whether `value` is a playable number on this table.
    #[inline]
    pub fn accepts(&self, value: i64) -> bool {
        value >= 0 && value <= self.number_range as i64
    }

    /// Score awarded to each exact-match winner.
    pub fn reward(&self) -> i64 {
        reward(self.min_bet, self.max_bet, self.number_range)
    }
}

/// Reward for an exact match.
///
/// A single guess hits with probability `1 / (number_range + 1)`, so paying
/// `min_bet * (number_range + 1)` keeps the expected value of one guess at
/// `min_bet` on every tier. `max_bet` is advertised only and does not scale
/// the payout.
pub fn reward(min_bet: i64, _max_bet: i64, number_range: u32) -> i64 {
    min_bet.saturating_mul(number_range as i64 + 1)
}
