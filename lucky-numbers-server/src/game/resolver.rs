//! Round Resolver
//!
//! Draws the round's target and settles scores exactly once per round.

use std::collections::BTreeSet;

use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;
use crate::game::config::GameConfig;
use crate::game::engine::EngineError;
use crate::game::ledger::GuessLedger;
use crate::game::registry::{PlayerRegistry, PlayerRecord};
use crate::game::state::{PlayerId, RoundState};

/// Settlement of one guess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerOutcome {
    /// Guessing player.
    pub player_id: PlayerId,
    /// Their recorded guess.
    pub guess: u32,
    /// Exact match with the target.
    pub won: bool,
    /// Score credited this round.
    pub reward: i64,
    /// Record after settlement; `None` if the player left before resolution.
    pub record: Option<PlayerRecord>,
}

impl PlayerOutcome {
    /// Whether the player was still connected at settlement.
    pub fn is_present(&self) -> bool {
        self.record.is_some()
    }
}

/// Result of resolving one round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionResult {
    /// Resolved round.
    pub round_id: u64,
    /// Drawn target.
    pub target: u32,
    /// Players whose guess equals the target, connected or not.
    pub winners: BTreeSet<PlayerId>,
    /// Reward paid to each winner.
    pub reward: i64,
    /// One entry per recorded guess, in player order.
    pub outcomes: Vec<PlayerOutcome>,
}

/// Draw a target uniformly from `[0, number_range]`.
#[inline]
pub fn draw_target(rng: &mut DeterministicRng, number_range: u32) -> u32 {
    rng.next_int_range(0, number_range)
}

/// Exact-match winners: `{ p : guesses[p] == target }`.
pub fn winners(ledger: &GuessLedger, target: u32) -> BTreeSet<PlayerId> {
    ledger.iter()
        .filter(|(_, guess)| **guess == target)
        .map(|(id, _)| *id)
        .collect()
}

/// Settle a round against a known target.
///
/// Winners are credited `reward`; everyone else is left untouched. Players
/// who have left the registry forfeit without failing the round.
pub fn settle(
    round_id: u64,
    ledger: &GuessLedger,
    target: u32,
    reward: i64,
    registry: &PlayerRegistry,
) -> Result<ResolutionResult, EngineError> {
    let winners = winners(ledger, target);
    let mut outcomes = Vec::with_capacity(ledger.len());

    for (player_id, guess) in ledger.iter() {
        let won = winners.contains(player_id);

        // Credit and snapshot under one lock so the record matches the payout
        let record = if won {
            registry.credit(player_id, reward)?
        } else {
            registry.get(player_id)?
        };

        outcomes.push(PlayerOutcome {
            player_id: *player_id,
            guess: *guess,
            won,
            reward: if won && record.is_some() { reward } else { 0 },
            record,
        });
    }

    Ok(ResolutionResult {
        round_id,
        target,
        winners,
        reward,
        outcomes,
    })
}

/// Draw a target for `round` and settle it.
pub fn resolve(
    round: &RoundState,
    config: &GameConfig,
    rng: &mut DeterministicRng,
    registry: &PlayerRegistry,
) -> Result<ResolutionResult, EngineError> {
    let target = draw_target(rng, config.number_range);
    settle(round.round_id, &round.ledger, target, config.reward(), registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::RoundPhase;

    fn player(n: u8) -> PlayerId {
        PlayerId::new([n; 16])
    }

    fn ledger_with(registry: &PlayerRegistry, guesses: &[(u8, i64)]) -> GuessLedger {
        let mut ledger = GuessLedger::new();
        for (n, value) in guesses {
            registry.register(player(*n), format!("p{n}")).unwrap();
            ledger.submit(RoundPhase::Collecting, player(*n), *value, 10, true).unwrap();
        }
        ledger
    }

    #[test]
    fn test_exact_match_winners() {
        let registry = PlayerRegistry::new();
        let ledger = ledger_with(&registry, &[(1, 3), (2, 7), (3, 3)]);

        let result = settle(1, &ledger, 3, 11, &registry).unwrap();

        assert_eq!(result.winners, BTreeSet::from([player(1), player(3)]));
        assert_eq!(registry.get(&player(1)).unwrap().unwrap().score, 11);
        assert_eq!(registry.get(&player(3)).unwrap().unwrap().score, 11);
        // Non-winner untouched
        assert_eq!(registry.get(&player(2)).unwrap().unwrap().score, 0);

        let loser = result.outcomes.iter().find(|o| o.player_id == player(2)).unwrap();
        assert!(!loser.won);
        assert_eq!(loser.reward, 0);
    }

    #[test]
    fn test_no_guesses() {
        let registry = PlayerRegistry::new();
        let result = settle(4, &GuessLedger::new(), 5, 11, &registry).unwrap();
        assert!(result.winners.is_empty());
        assert!(result.outcomes.is_empty());
        assert_eq!(result.round_id, 4);
    }

    #[test]
    fn test_departed_winner_forfeits() {
        let registry = PlayerRegistry::new();
        let ledger = ledger_with(&registry, &[(1, 3), (2, 3)]);
        registry.remove(&player(1)).unwrap();

        let result = settle(1, &ledger, 3, 11, &registry).unwrap();

        // Still an exact match, but nothing is paid to a missing record
        assert!(result.winners.contains(&player(1)));
        let gone = result.outcomes.iter().find(|o| o.player_id == player(1)).unwrap();
        assert!(!gone.is_present());
        assert_eq!(gone.reward, 0);

        assert_eq!(registry.get(&player(2)).unwrap().unwrap().score, 11);
        assert!(registry.get(&player(1)).unwrap().is_none());
    }

    #[test]
    fn test_draw_target_in_range() {
        let mut rng = DeterministicRng::new(99);
        for _ in 0..1000 {
            assert!(draw_target(&mut rng, 35) <= 35);
        }
        assert_eq!(draw_target(&mut rng, 0), 0);
    }

    #[test]
    fn test_widest_table_resolves() {
        let config = GameConfig::new(0, "Wide", "W", u32::MAX, 1, 10);
        assert!(config.validate().is_ok());

        let registry = PlayerRegistry::new();
        let round = RoundState::collecting(0, tokio::time::Instant::now());
        let mut rng = DeterministicRng::new(1);

        let first = resolve(&round, &config, &mut rng, &registry).unwrap();
        let second = resolve(&round, &config, &mut rng, &registry).unwrap();
        assert!(first.target != 0 || second.target != 0);
    }

    #[test]
    fn test_winner_outcome_carries_credited_record() {
        let registry = PlayerRegistry::new();
        let ledger = ledger_with(&registry, &[(1, 4)]);
        registry.credit(&player(1), 5).unwrap();

        let result = settle(2, &ledger, 4, 11, &registry).unwrap();
        let outcome = &result.outcomes[0];
        assert_eq!(outcome.reward, 11);
        assert_eq!(outcome.record.as_ref().map(|r| r.score), Some(16));
    }
}
