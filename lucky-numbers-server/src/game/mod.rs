//! Game Logic Module
//!
//! The per-table round engine. No I/O: time is injected and outbound
//! traffic goes through the [`engine::Broadcaster`] and [`engine::Notifier`]
//! capabilities.
//!
//! ## Module Structure
//!
//! - `config`: Table configuration and reward formula
//! - `state`: Player ids, round state, broadcast snapshot
//! - `registry`: Shared player records
//! - `ledger`: Per-round guess intake
//! - `resolver`: Target draw and settlement
//! - `timer`: Round deadline and cadences
//! - `engine`: Per-table orchestration
//! - `tables`: The process's fixed set of tables
//! - `events`: Events emitted by tables

pub mod config;
pub mod state;
pub mod registry;
pub mod ledger;
pub mod resolver;
pub mod timer;
pub mod engine;
pub mod tables;
pub mod events;

// Re-export key types
pub use config::{GameConfig, TableId};
pub use state::{GameState, PlayerId, RoundPhase, RoundState};
pub use registry::{PlayerRecord, PlayerRegistry};
pub use ledger::{GuessLedger, GuessRejection};
pub use resolver::{ResolutionResult, PlayerOutcome};
pub use timer::{RoundTimer, RoundTiming};
pub use engine::{Broadcaster, EngineError, GameEngine, Notifier};
pub use tables::{SharedEngine, TableSet};
pub use events::TableEvent;
