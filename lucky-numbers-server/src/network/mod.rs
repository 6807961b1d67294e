//! Network Layer
//!
//! WebSocket server for real-time multiplayer communication.
//! All game rules live in `game/`; this layer only moves messages.

pub mod protocol;
pub mod screen_name;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, GuessRequest, ChatMessage};
pub use screen_name::ScreenNameGenerator;
pub use server::{ClientDirectory, GameServer, GameServerError};
