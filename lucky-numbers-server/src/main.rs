//! Lucky Numbers Game Server
//!
//! Runs the reference tiers until Ctrl-C.

use tracing::{error, info};

use lucky_numbers::{logging, GameConfig, GameServer, ServerConfig, VERSION};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Missing .env is fine
    let _ = dotenvy::dotenv();

    logging::init()?;

    let config = ServerConfig::from_env()?;
    let tiers = GameConfig::default_tiers();

    info!("Lucky Numbers Server v{}", VERSION);
    info!(
        "Round: {:?}, heartbeat: {:?}, tables: {}",
        config.timing.round_duration,
        config.timing.heartbeat_interval,
        tiers.len()
    );
    for tier in &tiers {
        info!(
            "  {} {} (#{}) numbers 0..={}, bets {}..={}, reward {}",
            tier.icon, tier.display_name, tier.id, tier.number_range, tier.min_bet, tier.max_bet, tier.reward()
        );
    }

    let server = GameServer::new(config, tiers)?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = &result {
                error!("Server stopped: {}", e);
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
            server.shutdown();
        }
    }

    Ok(())
}
