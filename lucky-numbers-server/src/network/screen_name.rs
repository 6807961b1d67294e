//! Screen Name Generator
//!
//! Friendly random names for anonymous connections.

use crate::core::rng::DeterministicRng;
use crate::game::state::PlayerId;

const ADJECTIVES: &[&str] = &[
    "Brave", "Calm", "Clever", "Daring", "Eager", "Fancy", "Gentle", "Happy",
    "Jolly", "Kind", "Lucky", "Mighty", "Nimble", "Proud", "Quick", "Swift",
];

const ANIMALS: &[&str] = &[
    "Badger", "Cheetah", "Dolphin", "Eagle", "Falcon", "Gecko", "Heron", "Ibis",
    "Jaguar", "Koala", "Lynx", "Otter", "Panda", "Raven", "Tiger", "Walrus",
];

/// Generates screen names like "Lucky Otter".
#[derive(Debug, Clone)]
pub struct ScreenNameGenerator {
    rng: DeterministicRng,
}

impl ScreenNameGenerator {
    /// Create a generator from a seed.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: DeterministicRng::new(seed),
        }
    }

    /// Next random name.
    pub fn generate(&mut self) -> String {
        let adjective = self.rng.choose(ADJECTIVES).copied().unwrap_or("Lucky");
        let animal = self.rng.choose(ANIMALS).copied().unwrap_or("Player");
        format!("{adjective} {animal}")
    }

    /// Name derived from a player id alone.
    pub fn for_player(player_id: &PlayerId) -> String {
        let mut seed = [0u8; 8];
        seed.copy_from_slice(&player_id.as_bytes()[..8]);
        Self::new(u64::from_le_bytes(seed)).generate()
    }
}
