//! BROADSIDE Naval Deck-Combat Simulation Server
//!
//! This is the main entry point for the BROADSIDE server binary. It hosts
//! the authoritative simulation loop; wire framing and session handshakes
//! are bound by the surrounding infrastructure.

use broadside::config::SimConfig;
use broadside::scenario;
use broadside::server;
use clap::{Parser, Subcommand};
use log::{error, info, LevelFilter};
use std::path::PathBuf;
use tokio::sync::{broadcast, mpsc};

/// BROADSIDE - Naval Deck-Combat Simulation Server
#[derive(Parser, Debug)]
#[command(name = "broadside")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the hosting loop
    Start {
        /// Optional YAML overlay on the built-in simulation defaults
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Log level (error, warn, info, debug, trace)
        #[arg(short, long, default_value = "info")]
        log_level: String,
    },

    /// Run a seeded headless demo for a fixed number of ticks
    Demo {
        /// Number of ticks to simulate
        #[arg(short, long, default_value_t = 900)]
        ticks: u64,

        /// Scenario seed
        #[arg(short, long, default_value_t = 42)]
        seed: u64,

        /// Ships in the demo fleet
        #[arg(long, default_value_t = 6)]
        ships: u32,

        /// Players on the demo decks
        #[arg(long, default_value_t = 8)]
        players: u32,

        /// Log level (error, warn, info, debug, trace)
        #[arg(short, long, default_value = "info")]
        log_level: String,
    },
}

fn init_logging(log_level: &str) {
    let level_filter = match log_level.to_lowercase().as_str() {
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to 'info'", log_level);
            LevelFilter::Info
        }
    };
    env_logger::Builder::new().filter_level(level_filter).init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config, log_level } => {
            init_logging(&log_level);

            let sim_config = match config {
                Some(path) => match SimConfig::load_from_file(&path) {
                    Ok(cfg) => {
                        info!("Simulation config loaded from {}", path.display());
                        cfg
                    }
                    Err(e) => {
                        error!("Failed to load simulation config: {}", e);
                        return Err(e.into());
                    }
                },
                None => SimConfig::default(),
            };

            info!("Starting BROADSIDE hosting loop at {} Hz", sim_config.tick_hz);

            // The network layer feeds `input_tx` and subscribes to
            // `update_rx`; the loop runs until that layer closes the inputs.
            let (_input_tx, input_rx) = mpsc::channel(1024);
            let (update_tx, _update_rx) = broadcast::channel(64);
            let world = scenario::demo_world(4, 0, 42);
            server::run(sim_config, world, input_rx, update_tx, None).await?;
            Ok(())
        }

        Commands::Demo { ticks, seed, ships, players, log_level } => {
            init_logging(&log_level);
            info!(
                "Demo: {} ships, {} players, seed {}, {} ticks",
                ships, players, seed, ticks
            );

            let sim_config = SimConfig::default();
            let (_input_tx, input_rx) = mpsc::channel(16);
            let (update_tx, _update_rx) = broadcast::channel(64);
            let world = scenario::demo_world(ships, players, seed);
            let sim = server::run(sim_config, world, input_rx, update_tx, Some(ticks)).await?;

            info!(
                "Demo finished at tick {} ({:.1} s simulated), {} rewind frames stored, {} overruns",
                sim.world.tick,
                sim.world.timestamp_ms / 1000.0,
                sim.rewind.newest_tick().map_or(0, |newest| {
                    newest - sim.rewind.oldest_tick().unwrap_or(newest) + 1
                }),
                sim.overruns()
            );
            Ok(())
        }
    }
}
