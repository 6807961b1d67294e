//! Game Engine
//!
//! Per-table orchestrator. Owns the table's round state, timer and RNG,
//! reads and credits the shared player registry, and reports through two
//! injected capabilities: a [`Broadcaster`] for everyone and a [`Notifier`]
//! for a single player.
//!
//! All methods take `&mut self`; callers serialize access per table (the
//! server keeps each engine behind its own lock).

use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::core::rng::DeterministicRng;
use crate::game::config::{GameConfig, TableId};
use crate::game::events::TableEvent;
use crate::game::ledger::GuessRejection;
use crate::game::registry::PlayerRegistry;
use crate::game::resolver::{self, ResolutionResult};
use crate::game::state::{GameState, PlayerId, RoundPhase, RoundState};
use crate::game::timer::RoundTimer;

/// Publishes an event to every connected client.
pub trait Broadcaster: Send + Sync {
    /// Fire-and-forget publish.
    fn publish(&self, event: TableEvent);
}

/// Sends an event to one connection.
pub trait Notifier: Send + Sync {
    /// Fire-and-forget send. Unknown connections are ignored.
    fn send_to(&self, player_id: PlayerId, event: TableEvent);
}

/// Engine faults. Validation rejections are [`GuessRejection`], not these.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EngineError {
    /// Table configuration violates its invariants.
    #[error("Invalid config for table {table_id}: {reason}")]
    InvalidConfig {
        /// Offending table.
        table_id: TableId,
        /// What is wrong.
        reason: String,
    },

    /// Two tables share an id.
    #[error("Duplicate table id {0}")]
    DuplicateTable(TableId),

    /// The player registry lock was poisoned by a panicking writer.
    #[error("Player registry unavailable")]
    RegistryPoisoned,
}

/// One table's round engine.
pub struct GameEngine {
    config: GameConfig,
    round: RoundState,
    timer: RoundTimer,
    rng: DeterministicRng,
    registry: Arc<PlayerRegistry>,
    broadcaster: Arc<dyn Broadcaster>,
    notifier: Arc<dyn Notifier>,
}

impl GameEngine {
    /// Create an engine in the `Idle` phase.
    pub fn new(
        config: GameConfig,
        timer: RoundTimer,
        rng: DeterministicRng,
        registry: Arc<PlayerRegistry>,
        broadcaster: Arc<dyn Broadcaster>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        Ok(Self {
            config,
            round: RoundState::idle(Instant::now()),
            timer,
            rng,
            registry,
            broadcaster,
            notifier,
        })
    }

    /// `Idle -> Collecting`. Has no effect on a running table.
    pub fn start(&mut self, now: Instant) {
        if self.round.phase != RoundPhase::Idle {
            return;
        }
        self.timer.start(now);
        self.round = RoundState::collecting(self.round.round_id, now);
        info!(
            "Table {} ({}) started: numbers 0..={}, reward {}",
            self.config.id, self.config.display_name, self.config.number_range, self.config.reward()
        );
    }

    /// Submit a guess. `true` iff it was recorded.
    ///
    /// On acceptance the guesser is sent a confirmation carrying their
    /// current score; scores themselves only change at resolution.
    pub fn submit_guess(&mut self, player_id: PlayerId, value: i64) -> bool {
        self.try_submit_guess(player_id, value).is_ok()
    }

    /// Submit a guess, reporting why it was rejected.
    pub fn try_submit_guess(&mut self, player_id: PlayerId, value: i64) -> Result<u32, GuessRejection> {
        // Cheap checks first so the registry is only consulted for plausible guesses
        if !self.round.is_collecting() {
            return Err(GuessRejection::WrongPhase);
        }
        if !self.config.accepts(value) {
            return Err(GuessRejection::OutOfRange {
                value,
                number_range: self.config.number_range,
            });
        }

        let record = match self.registry.get(&player_id) {
            Ok(record) => record,
            Err(e) => {
                error!("Table {}: registry lookup failed for {}: {}", self.config.id, player_id, e);
                None
            }
        };

        let accepted = self.round.ledger.submit(
            self.round.phase,
            player_id,
            value,
            self.config.number_range,
            record.is_some(),
        )?;

        if let Some(record) = record {
            self.notifier.send_to(player_id, TableEvent::GuessConfirmed {
                table_id: self.config.id,
                value: accepted,
                score: record.score,
            });
        }

        debug!("Table {} round {}: {} guessed {}", self.config.id, self.round.round_id, player_id, accepted);
        Ok(accepted)
    }

    /// Current snapshot. Never exposes guess values.
    pub fn game_state(&self, now: Instant) -> GameState {
        GameState {
            id: self.config.id,
            phase: self.round.phase,
            round_id: self.round.round_id,
            seconds_remaining: match self.round.phase {
                RoundPhase::Collecting => self.timer.seconds_remaining(now),
                _ => 0,
            },
            guess_count: self.round.ledger.len(),
        }
    }

    /// Timer entry point. Resolves the round if its deadline has passed.
    ///
    /// Safe to call from both cadences: a round resolves at most once.
    pub fn on_tick(&mut self, now: Instant) -> Option<ResolutionResult> {
        if !self.round.is_collecting() || !self.timer.is_due(now) {
            return None;
        }
        self.resolve_round(self.round.round_id, now)
    }

    /// Resolve round `round_id`. No-op unless it is the current, collecting round.
    ///
    /// Faults are contained here: the error is logged and the table advances
    /// to a fresh round anyway.
    pub fn resolve_round(&mut self, round_id: u64, now: Instant) -> Option<ResolutionResult> {
        if self.round.round_id != round_id || !self.round.is_collecting() {
            return None;
        }

        self.round.phase = RoundPhase::Resolving;

        let result = match resolver::resolve(&self.round, &self.config, &mut self.rng, &self.registry) {
            Ok(result) => Some(result),
            Err(e) => {
                error!(
                    "Table {} round {} failed to resolve, forcing next round: {}",
                    self.config.id, round_id, e
                );
                None
            }
        };

        let opened_at = self.timer.advance(now);
        self.round = RoundState::collecting(round_id, opened_at);

        if let Some(ref result) = result {
            info!(
                "Table {} round {} drew {}: {} guesses, {} winners",
                self.config.id,
                round_id,
                result.target,
                result.outcomes.len(),
                result.winners.len()
            );
            self.announce(result, now);
        }

        result
    }

    /// Deliver per-player outcomes and the aggregate broadcast.
    fn announce(&self, result: &ResolutionResult, now: Instant) {
        let mut winner_names = Vec::new();

        for outcome in &result.outcomes {
            // Departed players forfeit silently
            let Some(record) = &outcome.record else {
                continue;
            };

            if outcome.won {
                winner_names.push(record.screen_name.clone());
            }

            self.notifier.send_to(outcome.player_id, TableEvent::RoundResult {
                table_id: self.config.id,
                round_id: result.round_id,
                guess: outcome.guess,
                target: result.target,
                won: outcome.won,
                reward: outcome.reward,
                score: record.score,
            });
            self.notifier.send_to(outcome.player_id, TableEvent::PlayerDetails(record.clone()));
        }

        self.broadcaster.publish(TableEvent::RoundSettled {
            table_id: self.config.id,
            round_id: result.round_id,
            target: result.target,
            winner_count: result.winners.len(),
            state: self.game_state(now),
            settled_at: Utc::now(),
        });

        if !result.outcomes.is_empty() {
            let text = if winner_names.is_empty() {
                format!("Round {} drew {}. No winners.", result.round_id, result.target)
            } else {
                format!(
                    "Round {} drew {}. Winners: {} (+{} each)",
                    result.round_id,
                    result.target,
                    winner_names.join(", "),
                    result.reward
                )
            };
            let author = format!("{} {}", self.config.icon, self.config.display_name);
            self.broadcaster.publish(TableEvent::chat(author, text));
        }
    }

    /// Table configuration.
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Table id.
    pub fn id(&self) -> TableId {
        self.config.id
    }

    /// Current phase.
    pub fn phase(&self) -> RoundPhase {
        self.round.phase
    }

    /// Current round number.
    pub fn round_id(&self) -> u64 {
        self.round.round_id
    }

    /// Guess recorded by `player_id` this round.
    pub fn guess_of(&self, player_id: &PlayerId) -> Option<u32> {
        self.round.ledger.guess_of(player_id)
    }

    /// Deadline of the current round, once started.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }
}
