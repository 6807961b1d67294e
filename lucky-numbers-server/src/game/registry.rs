//! Player Registry
//!
//! Process-wide map from connection id to player record, shared by every
//! table. The transport creates and removes records; engines only read them
//! and mutate `score`.

use std::collections::BTreeMap;
use std::sync::RwLock;

use serde::{Serialize, Deserialize};

use crate::game::engine::EngineError;
use crate::game::state::PlayerId;

/// A connected player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerRecord {
    /// Generated display name.
    pub screen_name: String,
    /// Running score. Signed so that future stake handling may go negative.
    pub score: i64,
}

impl PlayerRecord {
    /// New record with zero score.
    pub fn new(screen_name: impl Into<String>) -> Self {
        Self {
            screen_name: screen_name.into(),
            score: 0,
        }
    }
}

/// Shared player store.
///
/// Lock sections are short and never span an `.await`.
#[derive(Debug, Default)]
pub struct PlayerRegistry {
    players: RwLock<BTreeMap<PlayerId, PlayerRecord>>,
}

impl PlayerRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection, replacing any stale record with the same id.
    pub fn register(&self, player_id: PlayerId, screen_name: impl Into<String>) -> Result<PlayerRecord, EngineError> {
        let record = PlayerRecord::new(screen_name);
        let mut players = self.players.write().map_err(|_| EngineError::RegistryPoisoned)?;
        players.insert(player_id, record.clone());
        Ok(record)
    }

    /// Remove a disconnected player.
    pub fn remove(&self, player_id: &PlayerId) -> Result<Option<PlayerRecord>, EngineError> {
        let mut players = self.players.write().map_err(|_| EngineError::RegistryPoisoned)?;
        Ok(players.remove(player_id))
    }

    /// Copy of a player's record.
    pub fn get(&self, player_id: &PlayerId) -> Result<Option<PlayerRecord>, EngineError> {
        let players = self.players.read().map_err(|_| EngineError::RegistryPoisoned)?;
        Ok(players.get(player_id).cloned())
    }

    /// Check if a player is connected.
    pub fn contains(&self, player_id: &PlayerId) -> Result<bool, EngineError> {
        let players = self.players.read().map_err(|_| EngineError::RegistryPoisoned)?;
        Ok(players.contains_key(player_id))
    }

    /// Add `amount` to a player's score.
    ///
    /// Returns the updated record, or `None` if the player has left.
    pub fn credit(&self, player_id: &PlayerId, amount: i64) -> Result<Option<PlayerRecord>, EngineError> {
        let mut players = self.players.write().map_err(|_| EngineError::RegistryPoisoned)?;
        Ok(players.get_mut(player_id).map(|record| {
            record.score = record.score.saturating_add(amount);
            record.clone()
        }))
    }

    /// Number of connected players.
    pub fn len(&self) -> Result<usize, EngineError> {
        let players = self.players.read().map_err(|_| EngineError::RegistryPoisoned)?;
        Ok(players.len())
    }

    /// Check if nobody is connected.
    pub fn is_empty(&self) -> Result<bool, EngineError> {
        Ok(self.len()? == 0)
    }

    #[cfg(test)]
    pub(crate) fn players_for_test(&self) -> &RwLock<BTreeMap<PlayerId, PlayerRecord>> {
        &self.players
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_remove() {
        let registry = PlayerRegistry::new();
        let id = PlayerId::new([1; 16]);

        let record = registry.register(id, "Brave Otter").unwrap();
        assert_eq!(record.score, 0);
        assert!(registry.contains(&id).unwrap());
        assert_eq!(registry.len().unwrap(), 1);

        let removed = registry.remove(&id).unwrap();
        assert_eq!(removed.unwrap().screen_name, "Brave Otter");
        assert!(registry.is_empty().unwrap());
    }

    #[test]
    fn test_credit() {
        let registry = PlayerRegistry::new();
        let id = PlayerId::new([1; 16]);
        registry.register(id, "Calm Heron").unwrap();

        assert_eq!(registry.credit(&id, 11).unwrap().map(|r| r.score), Some(11));
        let record = registry.credit(&id, -3).unwrap().unwrap();
        assert_eq!(record, PlayerRecord { screen_name: "Calm Heron".to_string(), score: 8 });
        assert_eq!(registry.get(&id).unwrap().unwrap().score, 8);
    }

    #[test]
    fn test_credit_missing_player() {
        let registry = PlayerRegistry::new();
        assert_eq!(registry.credit(&PlayerId::new([9; 16]), 5).unwrap(), None);
    }
}
