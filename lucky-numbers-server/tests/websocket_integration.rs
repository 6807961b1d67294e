//! End-to-end tests against a live server on an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

use lucky_numbers::game::RoundTiming;
use lucky_numbers::network::protocol::{
    ChatMessage, ClientMessage, ErrorCode, GuessRequest, ServerMessage,
};
use lucky_numbers::{GameConfig, GameServer, ServerConfig};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const WAIT: Duration = Duration::from_secs(5);

async fn start_server() -> (Arc<GameServer>, SocketAddr) {
    start_server_with(|_| {}).await
}

async fn start_server_with<F>(tweak: F) -> (Arc<GameServer>, SocketAddr)
where
    F: FnOnce(&mut ServerConfig),
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let mut config = ServerConfig {
        bind_addr: addr,
        timing: RoundTiming {
            round_duration: Duration::from_secs(2),
            heartbeat_interval: Duration::from_millis(200),
        },
        ..Default::default()
    };
    tweak(&mut config);
    let server = Arc::new(GameServer::new(config, GameConfig::default_tiers()).unwrap());

    let running = server.clone();
    tokio::spawn(async move {
        running.serve(listener).await.unwrap();
    });

    (server, addr)
}

async fn connect(addr: SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{addr}")).await.unwrap();
    ws
}

async fn send(ws: &mut Client, msg: &ClientMessage) {
    ws.send(Message::Text(msg.to_json().unwrap())).await.unwrap();
}

/// Read until a message matches `pred`, failing after `WAIT`.
async fn next_matching<F>(ws: &mut Client, mut pred: F) -> ServerMessage
where
    F: FnMut(&ServerMessage) -> bool,
{
    tokio::time::timeout(WAIT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    let msg = ServerMessage::from_json(&text).unwrap();
                    if pred(&msg) {
                        return msg;
                    }
                }
                Some(Ok(_)) => continue,
                other => panic!("connection ended: {other:?}"),
            }
        }
    })
    .await
    .expect("timed out waiting for message")
}

async fn screen_name(ws: &mut Client) -> String {
    match next_matching(ws, |m| matches!(m, ServerMessage::PlayerDetails(_))).await {
        ServerMessage::PlayerDetails(record) => {
            assert_eq!(record.score, 0);
            record.screen_name
        }
        _ => unreachable!(),
    }
}

fn guess(table_id: u8, value: i64) -> ClientMessage {
    ClientMessage::SubmitGuess(GuessRequest { table_id, value })
}

#[tokio::test]
async fn test_connect_receives_details_and_tables() {
    let (server, addr) = start_server().await;
    let mut ws = connect(addr).await;

    screen_name(&mut ws).await;
    let tables = next_matching(&mut ws, |m| matches!(m, ServerMessage::Tables { .. })).await;
    if let ServerMessage::Tables { tables, server_version } = tables {
        assert_eq!(tables, GameConfig::default_tiers());
        assert_eq!(server_version, lucky_numbers::VERSION);
    }

    assert_eq!(server.registry().len().unwrap(), 1);
    server.shutdown();
}

#[tokio::test]
async fn test_heartbeat_lists_every_table() {
    let (server, addr) = start_server().await;
    let mut ws = connect(addr).await;

    let msg = next_matching(&mut ws, |m| matches!(m, ServerMessage::GameStates { .. })).await;
    if let ServerMessage::GameStates { states } = msg {
        assert_eq!(states.iter().map(|s| s.id).collect::<Vec<_>>(), vec![0, 1, 2]);
    }
    server.shutdown();
}

#[tokio::test]
async fn test_guess_confirmed_only_when_valid() {
    let (server, addr) = start_server().await;
    let mut ws = connect(addr).await;
    screen_name(&mut ws).await;

    // Out of range for Bronze, unknown table, then a valid guess
    send(&mut ws, &guess(0, 11)).await;
    send(&mut ws, &guess(7, 3)).await;
    send(&mut ws, &guess(0, 4)).await;

    let confirm = next_matching(&mut ws, |m| matches!(m, ServerMessage::ConfirmGuess { .. })).await;
    assert!(matches!(confirm, ServerMessage::ConfirmGuess { table_id: 0, value: 4, score: 0 }));
    server.shutdown();
}

#[tokio::test]
async fn test_round_result_delivered_to_guesser() {
    let (server, addr) = start_server().await;
    let mut ws = connect(addr).await;
    screen_name(&mut ws).await;

    send(&mut ws, &guess(2, 20)).await;
    next_matching(&mut ws, |m| matches!(m, ServerMessage::ConfirmGuess { table_id: 2, .. })).await;

    let result = next_matching(&mut ws, |m| matches!(m, ServerMessage::RoundResult(_))).await;
    if let ServerMessage::RoundResult(info) = result {
        assert_eq!(info.table_id, 2);
        assert_eq!(info.guess, 20);
        assert_eq!(info.won, info.target == 20);
        assert_eq!(info.score, if info.won { 360 } else { 0 });
    }

    // Followed by refreshed details
    next_matching(&mut ws, |m| matches!(m, ServerMessage::PlayerDetails(_))).await;
    server.shutdown();
}

#[tokio::test]
async fn test_chat_relayed_to_others() {
    let (server, addr) = start_server().await;
    let mut alice = connect(addr).await;
    screen_name(&mut alice).await;
    let mut bob = connect(addr).await;
    let bob_name = screen_name(&mut bob).await;

    send(&mut bob, &ClientMessage::ChatMessage(ChatMessage {
        author: "spoofed".to_string(),
        text: "good luck everyone".to_string(),
    })).await;

    let relayed = next_matching(&mut alice, |m| {
        matches!(m, ServerMessage::ChatMessage(c) if c.text == "good luck everyone")
    }).await;
    if let ServerMessage::ChatMessage(chat) = relayed {
        assert_eq!(chat.author, bob_name);
    }
    server.shutdown();
}

#[tokio::test]
async fn test_disconnect_removes_player() {
    let (server, addr) = start_server().await;
    let mut ws = connect(addr).await;
    screen_name(&mut ws).await;
    assert_eq!(server.registry().len().unwrap(), 1);

    ws.close(None).await.unwrap();

    tokio::time::timeout(WAIT, async {
        while server.registry().len().unwrap() > 0 {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("player was not removed");
    assert_eq!(server.connection_count(), 0);
    server.shutdown();
}

#[tokio::test]
async fn test_single_slot_queue_still_welcomes() {
    let (server, addr) = start_server_with(|config| {
        config.channel_capacity = 1;
        // Keep broadcasts out of the single slot while the test runs
        config.timing = RoundTiming {
            round_duration: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(30),
        };
    })
    .await;
    let mut ws = connect(addr).await;

    screen_name(&mut ws).await;
    next_matching(&mut ws, |m| matches!(m, ServerMessage::Tables { .. })).await;

    // The connection is live: a guess still gets its confirmation
    send(&mut ws, &guess(0, 2)).await;
    next_matching(&mut ws, |m| matches!(m, ServerMessage::ConfirmGuess { value: 2, .. })).await;
    server.shutdown();
}

#[tokio::test]
async fn test_over_limit_connection_is_told_why() {
    let (server, addr) = start_server_with(|config| config.max_connections = 1).await;
    let mut first = connect(addr).await;
    screen_name(&mut first).await;

    let mut second = connect(addr).await;
    let rejected = next_matching(&mut second, |m| matches!(m, ServerMessage::Error(_))).await;
    if let ServerMessage::Error(error) = rejected {
        assert_eq!(error.code, ErrorCode::ServerOverloaded);
    }

    assert_eq!(server.registry().len().unwrap(), 1);
    server.shutdown();
}
