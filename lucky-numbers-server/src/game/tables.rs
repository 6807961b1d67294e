//! Table Set
//!
//! The fixed, ordered set of tables a process runs. Every table shares one
//! player registry and one pair of outbound capabilities; each owns its
//! engine behind its own lock.

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::core::rng::DeterministicRng;
use crate::game::config::{GameConfig, TableId};
use crate::game::engine::{Broadcaster, EngineError, GameEngine, Notifier};
use crate::game::registry::PlayerRegistry;
use crate::game::state::{GameState, PlayerId};
use crate::game::timer::{RoundTimer, RoundTiming};

/// An engine shared between the server's tasks.
pub type SharedEngine = Arc<RwLock<GameEngine>>;

/// All tables of the process, in creation order.
pub struct TableSet {
    tables: Vec<SharedEngine>,
    configs: Vec<GameConfig>,
}

impl TableSet {
    /// Build one engine per config.
    ///
    /// `entropy` seeds every table's RNG; each table derives its own stream.
    pub fn new(
        configs: Vec<GameConfig>,
        timing: RoundTiming,
        entropy: [u8; 16],
        registry: Arc<PlayerRegistry>,
        broadcaster: Arc<dyn Broadcaster>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, EngineError> {
        let mut tables = Vec::with_capacity(configs.len());

        for (idx, config) in configs.iter().enumerate() {
            if configs[..idx].iter().any(|c| c.id == config.id) {
                return Err(EngineError::DuplicateTable(config.id));
            }

            let engine = GameEngine::new(
                config.clone(),
                RoundTimer::new(timing.round_duration),
                DeterministicRng::for_table(&entropy, config.id),
                registry.clone(),
                broadcaster.clone(),
                notifier.clone(),
            )?;
            tables.push(Arc::new(RwLock::new(engine)));
        }

        Ok(Self { tables, configs })
    }

    /// Start every table at the same instant.
    pub async fn start_all(&self, now: Instant) {
        for table in &self.tables {
            table.write().await.start(now);
        }
    }

    /// Look up a table by id.
    pub fn get(&self, table_id: TableId) -> Option<SharedEngine> {
        self.configs.iter()
            .position(|c| c.id == table_id)
            .map(|idx| self.tables[idx].clone())
    }

    /// Submit a guess to a table. Unknown tables are rejected here, so an
    /// engine never sees a reference that isn't its own.
    pub async fn submit_guess(&self, table_id: TableId, player_id: PlayerId, value: i64) -> bool {
        match self.get(table_id) {
            Some(table) => table.write().await.submit_guess(player_id, value),
            None => false,
        }
    }

    /// Tick every table. Returns the number of rounds resolved.
    pub async fn tick_all(&self, now: Instant) -> usize {
        let mut resolved = 0;
        for table in &self.tables {
            if table.write().await.on_tick(now).is_some() {
                resolved += 1;
            }
        }
        resolved
    }

    /// Snapshots of every table in creation order.
    pub async fn snapshots(&self, now: Instant) -> Vec<GameState> {
        let mut states = Vec::with_capacity(self.tables.len());
        for table in &self.tables {
            states.push(table.read().await.game_state(now));
        }
        states
    }

    /// Table configurations in creation order.
    pub fn configs(&self) -> &[GameConfig] {
        &self.configs
    }

    /// Engines in creation order.
    pub fn tables(&self) -> &[SharedEngine] {
        &self.tables
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Check if there are no tables.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::game::events::TableEvent;
    use crate::game::state::RoundPhase;

    struct Discard;

    impl Broadcaster for Discard {
        fn publish(&self, _event: TableEvent) {}
    }

    impl Notifier for Discard {
        fn send_to(&self, _player_id: PlayerId, _event: TableEvent) {}
    }

    fn create_table_set(registry: Arc<PlayerRegistry>) -> TableSet {
        TableSet::new(
            GameConfig::default_tiers(),
            RoundTiming::default(),
            [3; 16],
            registry,
            Arc::new(Discard),
            Arc::new(Discard),
        ).unwrap()
    }

    #[tokio::test]
    async fn test_snapshots_in_creation_order() {
        let tables = create_table_set(Arc::new(PlayerRegistry::new()));
        let now = Instant::now();
        tables.start_all(now).await;

        let states = tables.snapshots(now).await;
        assert_eq!(states.iter().map(|s| s.id).collect::<Vec<_>>(), vec![0, 1, 2]);
        assert!(states.iter().all(|s| s.phase == RoundPhase::Collecting && s.round_id == 1));
    }

    #[tokio::test]
    async fn test_unknown_table_rejected() {
        let registry = Arc::new(PlayerRegistry::new());
        let tables = create_table_set(registry.clone());
        tables.start_all(Instant::now()).await;
        let id = PlayerId::new([1; 16]);
        registry.register(id, "Lost Lynx").unwrap();

        assert!(!tables.submit_guess(9, id, 3).await);
        assert!(tables.submit_guess(2, id, 30).await);
        // Range is per table: 30 is invalid on Bronze
        assert!(!tables.submit_guess(0, id, 30).await);
    }

    #[tokio::test]
    async fn test_player_may_guess_on_every_table() {
        let registry = Arc::new(PlayerRegistry::new());
        let tables = create_table_set(registry.clone());
        tables.start_all(Instant::now()).await;
        let id = PlayerId::new([1; 16]);
        registry.register(id, "Busy Bee").unwrap();

        for table_id in 0..3 {
            assert!(tables.submit_guess(table_id, id, 5).await);
        }
    }

    #[tokio::test]
    async fn test_tick_all_resolves_due_tables() {
        let tables = create_table_set(Arc::new(PlayerRegistry::new()));
        let t0 = Instant::now();
        tables.start_all(t0).await;

        assert_eq!(tables.tick_all(t0 + Duration::from_secs(1)).await, 0);
        assert_eq!(tables.tick_all(t0 + Duration::from_secs(10)).await, 3);
        assert!(tables.snapshots(t0).await.iter().all(|s| s.round_id == 2));
    }

    #[test]
    fn test_duplicate_table_ids() {
        let mut configs = GameConfig::default_tiers();
        configs[1].id = 0;
        let result = TableSet::new(
            configs,
            RoundTiming::default(),
            [0; 16],
            Arc::new(PlayerRegistry::new()),
            Arc::new(Discard),
            Arc::new(Discard),
        );
        assert!(matches!(result, Err(EngineError::DuplicateTable(0))));
    }
}
