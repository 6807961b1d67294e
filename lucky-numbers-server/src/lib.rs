//! # Lucky Numbers Game Server
//!
//! Real-time multiplayer number guessing. Several tables (tiers) run side
//! by side; on each, players guess a number during a fixed-length round,
//! the table draws a target, and exact matches score.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   LUCKY NUMBERS SERVER                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/            - Deterministic primitives                 │
//! │  └── rng.rs       - Xorshift128+ PRNG, table seed derivation │
//! │                                                              │
//! │  game/            - Round engine (no I/O)                    │
//! │  ├── config.rs    - Table tiers and reward formula           │
//! │  ├── state.rs     - Round state and broadcast snapshot       │
//! │  ├── registry.rs  - Shared player records                    │
//! │  ├── ledger.rs    - One guess per player per round           │
//! │  ├── resolver.rs  - Target draw and settlement               │
//! │  ├── timer.rs     - Heartbeat and round deadline             │
//! │  ├── engine.rs    - Per-table orchestration                  │
//! │  └── tables.rs    - The process's set of tables              │
//! │                                                              │
//! │  network/         - Networking                               │
//! │  ├── server.rs    - WebSocket server and cadence loops       │
//! │  ├── protocol.rs  - Message types                            │
//! │  └── screen_name.rs - Random screen names                    │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Round lifecycle
//!
//! ```text
//! Idle --(table start)--> Collecting
//! Collecting --(round duration elapsed)--> Resolving
//! Resolving --(resolution complete)--> Collecting   [roundId + 1]
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod config;
pub mod core;
pub mod game;
pub mod logging;
pub mod network;

// Re-export commonly used types
pub use config::{ConfigError, ServerConfig};
pub use core::rng::DeterministicRng;
pub use game::{GameConfig, GameEngine, GameState, PlayerId, PlayerRegistry, RoundPhase, TableSet};
pub use network::{GameServer, GameServerError};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
