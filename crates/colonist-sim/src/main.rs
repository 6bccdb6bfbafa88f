//! Headless colonist simulator.
//!
//! Plays one or more automated games and prints a JSON summary per game.
//! Settings: see [`config::SimConfig`]; logging follows `RUST_LOG`.

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod table;

use config::SimConfig;
use table::Table;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = SimConfig::load()?;
    info!(
        players = config.players,
        games = config.games,
        seed = config.game.seed,
        "Starting simulation"
    );

    let mut wins = vec![0u32; config.players];
    for index in 0..config.games {
        let seed = config.game.seed.wrapping_add(u64::from(index));
        let mut table = Table::new(&config, seed)?;
        let summary = table.play(config.max_ticks)?;
        info!(
            seed,
            turn = table.game().turn(),
            winner = ?summary.winner,
            "Game finished"
        );
        if let Some(winner) = summary.winner {
            wins[winner as usize] += 1;
        }
        println!("{}", serde_json::to_string(&summary)?);
    }

    info!(?wins, "Simulation finished");
    Ok(())
}
