//! WebSocket Game Server
//!
//! Async WebSocket server for multiplayer connections.
//! Registers players, routes guesses to tables, relays chat and drives the
//! heartbeat and round cadences.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use crate::config::ServerConfig;
use crate::game::config::GameConfig;
use crate::game::engine::{Broadcaster, EngineError, Notifier};
use crate::game::events::TableEvent;
use crate::game::registry::PlayerRegistry;
use crate::game::state::PlayerId;
use crate::game::tables::{SharedEngine, TableSet};
use crate::network::protocol::{
    ChatMessage, ClientMessage, ErrorCode, GuessRequest, ServerError, ServerMessage,
};
use crate::network::screen_name::ScreenNameGenerator;

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Table setup failed.
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

// =============================================================================
// CLIENT DIRECTORY
// =============================================================================

/// Outbound queues of every connection.
///
/// Doubles as the tables' [`Broadcaster`] and [`Notifier`]. Sends never wait:
/// a full or closed queue drops the message.
#[derive(Debug, Default)]
pub struct ClientDirectory {
    clients: RwLock<BTreeMap<PlayerId, mpsc::Sender<ServerMessage>>>,
}

impl ClientDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection.
    pub fn insert(&self, player_id: PlayerId, sender: mpsc::Sender<ServerMessage>) {
        // Only senders live here, so a poisoned map is still consistent
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        clients.insert(player_id, sender);
    }

    /// Remove a connection.
    pub fn remove(&self, player_id: &PlayerId) -> bool {
        let mut clients = self.clients.write().unwrap_or_else(PoisonError::into_inner);
        clients.remove(player_id).is_some()
    }

    /// Number of connections.
    pub fn len(&self) -> usize {
        self.clients.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Check if nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Queue a message for one connection. Returns false if it was dropped.
    pub fn deliver(&self, player_id: &PlayerId, message: ServerMessage) -> bool {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        match clients.get(player_id) {
            Some(sender) => try_queue(player_id, sender, message),
            None => false,
        }
    }

    /// Queue a message for every connection.
    pub fn broadcast(&self, message: &ServerMessage) {
        self.broadcast_except(None, message);
    }

    /// Queue a message for every connection except `skip`.
    pub fn broadcast_except(&self, skip: Option<&PlayerId>, message: &ServerMessage) {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        for (player_id, sender) in clients.iter() {
            if Some(player_id) != skip {
                try_queue(player_id, sender, message.clone());
            }
        }
    }
}

fn try_queue(player_id: &PlayerId, sender: &mpsc::Sender<ServerMessage>, message: ServerMessage) -> bool {
    match sender.try_send(message) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            warn!("Outbound queue full for {}, dropping message", player_id);
            false
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    }
}

impl Broadcaster for ClientDirectory {
    fn publish(&self, event: TableEvent) {
        self.broadcast(&event.into());
    }
}

impl Notifier for ClientDirectory {
    fn send_to(&self, player_id: PlayerId, event: TableEvent) {
        self.deliver(&player_id, event.into());
    }
}

/// One claimed connection slot. Released on drop.
#[derive(Debug)]
struct ConnectionSlot {
    active: Arc<AtomicUsize>,
}

impl ConnectionSlot {
    /// Claim a slot unless `limit` are already taken.
    fn try_claim(active: &Arc<AtomicUsize>, limit: usize) -> Option<Self> {
        active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < limit).then_some(n + 1))
            .ok()
            .map(|_| Self { active: active.clone() })
    }
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::AcqRel);
    }
}

// =============================================================================
// GAME SERVER
// =============================================================================

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Shared player records.
    registry: Arc<PlayerRegistry>,
    /// Connected clients.
    clients: Arc<ClientDirectory>,
    /// Tables, in creation order.
    tables: Arc<TableSet>,
    /// Sockets accepted and not yet cleaned up, handshakes included.
    active: Arc<AtomicUsize>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl GameServer {
    /// Create a server running `tables`.
    pub fn new(config: ServerConfig, tables: Vec<GameConfig>) -> Result<Self, GameServerError> {
        let (shutdown_tx, _) = broadcast::channel(1);
        let registry = Arc::new(PlayerRegistry::new());
        let clients = Arc::new(ClientDirectory::new());
        let entropy = *uuid::Uuid::new_v4().as_bytes();

        let tables = TableSet::new(
            tables,
            config.timing,
            entropy,
            registry.clone(),
            clients.clone(),
            clients.clone(),
        )?;

        Ok(Self {
            config,
            registry,
            clients,
            tables: Arc::new(tables),
            active: Arc::new(AtomicUsize::new(0)),
            shutdown_tx,
        })
    }

    /// Bind the configured address and run until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run on an already bound listener until shutdown.
    #[instrument(skip_all)]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        info!("Game server listening on {}", listener.local_addr()?);

        self.tables.start_all(Instant::now()).await;

        let mut background = Vec::with_capacity(self.tables.len() + 1);

        // Fast cadence: tick every table and broadcast snapshots
        let heartbeat_tables = self.tables.clone();
        let heartbeat_clients = self.clients.clone();
        let heartbeat = self.config.timing.heartbeat_interval;
        background.push(tokio::spawn(async move {
            Self::run_heartbeat_loop(heartbeat_tables, heartbeat_clients, heartbeat).await;
        }));

        // Slow cadence: one task per table waking at its round deadline
        for table in self.tables.tables() {
            let table = table.clone();
            background.push(tokio::spawn(async move {
                Self::run_round_loop(table).await;
            }));
        }

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            match ConnectionSlot::try_claim(&self.active, self.config.max_connections) {
                                Some(slot) => {
                                    info!("New connection from {}", addr);
                                    self.handle_connection(stream, addr, slot);
                                }
                                None => {
                                    warn!("Connection limit reached, rejecting {}", addr);
                                    tokio::spawn(Self::reject_connection(stream, addr));
                                }
                            }
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        for handle in background {
            handle.abort();
        }

        Ok(())
    }

    /// Tell an over-limit client why it is being dropped, then close.
    async fn reject_connection(stream: TcpStream, addr: SocketAddr) {
        let reject = async {
            let mut ws = accept_async(stream).await?;
            let error = ServerMessage::Error(ServerError {
                code: ErrorCode::ServerOverloaded,
                message: "Server is full".to_string(),
            });
            if let Ok(text) = error.to_json() {
                ws.send(Message::Text(text)).await?;
            }
            ws.close(None).await
        };

        match tokio::time::timeout(Duration::from_secs(5), reject).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!("Rejecting {} failed: {}", addr, e),
            Err(_) => debug!("Rejecting {} timed out", addr),
        }
    }

    /// Handle a new WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr, slot: ConnectionSlot) {
        let clients = self.clients.clone();
        let registry = self.registry.clone();
        let tables = self.tables.clone();
        let capacity = self.config.channel_capacity;
        let server_version = self.config.version.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            // Held until cleanup finishes
            let _slot = slot;

            let ws_stream = match accept_async(stream).await {
                Ok(ws) => ws,
                Err(e) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::channel::<ServerMessage>(capacity);

            // Writer runs before anything is queued so small queues never stall
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            });

            // Register player
            let player_id = PlayerId::random();
            let record = match registry.register(player_id, ScreenNameGenerator::for_player(&player_id)) {
                Ok(record) => record,
                Err(e) => {
                    error!("Failed to register {}: {}", addr, e);
                    let _ = msg_tx.send(ServerMessage::Error(ServerError {
                        code: ErrorCode::InternalError,
                        message: "Could not join".to_string(),
                    })).await;
                    drop(msg_tx);
                    let _ = tokio::time::timeout(Duration::from_secs(1), sender_task).await;
                    return;
                }
            };
            info!("Client {} joined as {} ({})", addr, player_id, record.screen_name);

            // Welcome first, then become visible to broadcasts
            let _ = msg_tx.send(ServerMessage::PlayerDetails(record)).await;
            let _ = msg_tx.send(ServerMessage::Tables {
                tables: tables.configs().to_vec(),
                server_version,
            }).await;
            clients.insert(player_id, msg_tx.clone());

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                match ClientMessage::from_json(&text) {
                                    Ok(client_msg) => {
                                        Self::handle_client_message(
                                            player_id,
                                            client_msg,
                                            &tables,
                                            &clients,
                                            &registry,
                                            &msg_tx,
                                        ).await;
                                    }
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", player_id, e);
                                        let _ = msg_tx.send(ServerMessage::Error(ServerError {
                                            code: ErrorCode::InvalidInput,
                                            message: "Invalid message format".to_string(),
                                        })).await;
                                    }
                                }
                            }
                            Some(Ok(Message::Binary(data))) => {
                                // Binary frames carry a bare guess
                                if let Ok(guess) = GuessRequest::from_bytes(&data) {
                                    Self::handle_guess(player_id, guess, &tables).await;
                                }
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", player_id);
                                break;
                            }
                            Some(Err(e)) => {
                                error!("WebSocket error for {}: {}", player_id, e);
                                break;
                            }
                            // Pings are answered by tungstenite itself
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        let _ = msg_tx.send(ServerMessage::Shutdown {
                            reason: "Server shutting down".to_string(),
                        }).await;
                        break;
                    }
                }
            }

            // Cleanup: guesses already on a table are forfeited at resolution
            clients.remove(&player_id);
            if let Err(e) = registry.remove(&player_id) {
                error!("Failed to remove {} from registry: {}", player_id, e);
            }

            // Let queued messages drain, then stop the writer
            drop(msg_tx);
            if tokio::time::timeout(Duration::from_secs(1), sender_task).await.is_err() {
                debug!("Writer for {} did not drain in time", player_id);
            }

            info!("Client {} cleaned up", player_id);
        });
    }

    /// Handle a client message.
    async fn handle_client_message(
        player_id: PlayerId,
        msg: ClientMessage,
        tables: &TableSet,
        clients: &ClientDirectory,
        registry: &PlayerRegistry,
        sender: &mpsc::Sender<ServerMessage>,
    ) {
        match msg {
            ClientMessage::SubmitGuess(guess) => {
                Self::handle_guess(player_id, guess, tables).await;
            }
            ClientMessage::ChatMessage(chat) => {
                Self::handle_chat(player_id, chat, clients, registry);
            }
            ClientMessage::Ping { timestamp } => {
                let _ = sender.send(ServerMessage::Pong {
                    timestamp,
                    server_time: Utc::now().timestamp_millis().max(0) as u64,
                }).await;
            }
        }
    }

    /// Route a guess to its table.
    ///
    /// Unknown tables and invalid guesses are dropped silently; the table
    /// confirms accepted guesses itself.
    async fn handle_guess(player_id: PlayerId, guess: GuessRequest, tables: &TableSet) {
        if tables.get(guess.table_id).is_none() {
            debug!("Guess from {} for unknown table {}", player_id, guess.table_id);
            return;
        }
        tables.submit_guess(guess.table_id, player_id, guess.value).await;
    }

    /// Relay chat to everyone else, signed with the sender's screen name.
    fn handle_chat(
        player_id: PlayerId,
        chat: ChatMessage,
        clients: &ClientDirectory,
        registry: &PlayerRegistry,
    ) {
        let author = match registry.get(&player_id) {
            Ok(Some(record)) => record.screen_name,
            Ok(None) => return,
            Err(e) => {
                error!("Registry lookup failed for chat from {}: {}", player_id, e);
                return;
            }
        };

        let relayed = ServerMessage::ChatMessage(ChatMessage {
            author,
            text: chat.text,
        });
        clients.broadcast_except(Some(&player_id), &relayed);
    }

    /// Tick every table and broadcast snapshots on the heartbeat cadence.
    async fn run_heartbeat_loop(
        tables: Arc<TableSet>,
        clients: Arc<ClientDirectory>,
        period: Duration,
    ) {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let now = Instant::now();
            tables.tick_all(now).await;

            let states = tables.snapshots(now).await;
            clients.broadcast(&ServerMessage::GameStates { states });
        }
    }

    /// Resolve one table at each of its round deadlines.
    async fn run_round_loop(table: SharedEngine) {
        loop {
            let (table_id, deadline) = {
                let engine = table.read().await;
                (engine.id(), engine.next_deadline())
            };

            let Some(deadline) = deadline else {
                warn!("Table {} has no deadline, round loop exiting", table_id);
                return;
            };

            sleep_until(deadline).await;

            // No-op if the heartbeat already resolved this round
            table.write().await.on_tick(Instant::now());
        }
    }

    /// Shutdown the server.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Number of joined players with a live outbound queue.
    pub fn connection_count(&self) -> usize {
        self.clients.len()
    }

    /// Shared player registry.
    pub fn registry(&self) -> &Arc<PlayerRegistry> {
        &self.registry
    }

    /// Tables served.
    pub fn tables(&self) -> &Arc<TableSet> {
        &self.tables
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_server() -> GameServer {
        let config = ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            ..Default::default()
        };
        GameServer::new(config, GameConfig::default_tiers()).unwrap()
    }

    #[tokio::test]
    async fn test_server_creation() {
        let server = create_test_server();
        assert_eq!(server.connection_count(), 0);
        assert_eq!(server.tables().len(), 3);
        assert!(server.registry().is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_server_shutdown() {
        let server = create_test_server();
        server.shutdown();
        // Should not panic
    }

    #[tokio::test]
    async fn test_server_rejects_bad_tables() {
        let bad = vec![GameConfig::new(0, "Broken", "x", 10, 5, 1)];
        let result = GameServer::new(ServerConfig::default(), bad);
        assert!(matches!(result, Err(GameServerError::Engine(EngineError::InvalidConfig { .. }))));
    }

    #[tokio::test]
    async fn test_directory_delivery() {
        let directory = ClientDirectory::new();
        let a = PlayerId::new([1; 16]);
        let b = PlayerId::new([2; 16]);
        let (tx_a, mut rx_a) = mpsc::channel(4);
        let (tx_b, mut rx_b) = mpsc::channel(4);
        directory.insert(a, tx_a);
        directory.insert(b, tx_b);

        directory.send_to(a, TableEvent::GuessConfirmed { table_id: 0, value: 3, score: 0 });
        assert!(matches!(rx_a.recv().await, Some(ServerMessage::ConfirmGuess { value: 3, .. })));
        assert!(rx_b.try_recv().is_err());

        directory.publish(TableEvent::chat("table", "hello"));
        assert!(matches!(rx_a.recv().await, Some(ServerMessage::ChatMessage(_))));
        assert!(matches!(rx_b.recv().await, Some(ServerMessage::ChatMessage(_))));

        directory.broadcast_except(Some(&a), &ServerMessage::Shutdown { reason: "x".into() });
        assert!(rx_a.try_recv().is_err());
        assert!(matches!(rx_b.recv().await, Some(ServerMessage::Shutdown { .. })));
    }

    #[test]
    fn test_connection_slots_respect_limit() {
        let active = Arc::new(AtomicUsize::new(0));

        let first = ConnectionSlot::try_claim(&active, 2).unwrap();
        let _second = ConnectionSlot::try_claim(&active, 2).unwrap();
        assert!(ConnectionSlot::try_claim(&active, 2).is_none());
        assert_eq!(active.load(Ordering::Acquire), 2);

        drop(first);
        assert_eq!(active.load(Ordering::Acquire), 1);
        assert!(ConnectionSlot::try_claim(&active, 2).is_some());
    }

    #[tokio::test]
    async fn test_directory_drops_when_full() {
        let directory = ClientDirectory::new();
        let a = PlayerId::new([1; 16]);
        let (tx, _rx) = mpsc::channel(1);
        directory.insert(a, tx);

        let msg = ServerMessage::Shutdown { reason: "x".into() };
        assert!(directory.deliver(&a, msg.clone()));
        assert!(!directory.deliver(&a, msg.clone()));
        assert!(!directory.deliver(&PlayerId::new([9; 16]), msg));
    }
}
