//! combatd - run an encounter from a roster file
//!
//! Loads a roster, rolls initiative, and plays through a number of rounds,
//! printing the public (unprivileged) view of the session after each round.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use combatd::combat::{
    DieRoller, Location, PlayerId, RandomRoller, ScriptedRoller, SessionManager, StaticProvider,
    TracingObserver,
};
use combatd::roster::Roster;
use combatd::EngineConfig;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Tabletop combat encounter runner
#[derive(Parser, Debug)]
#[command(name = "combatd", version, about = "Run a combat encounter from a roster")]
struct Args {
    /// Roster TOML file
    #[arg(short, long)]
    roster: PathBuf,

    /// Engine configuration TOML file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of rounds to play
    #[arg(long, default_value_t = 3)]
    rounds: u32,

    /// Fixed d20 results to replay instead of random rolls (e.g. 12,7,19)
    #[arg(long, value_delimiter = ',')]
    seed_rolls: Vec<u32>,

    /// Emit logs as JSON
    #[arg(long)]
    json_logs: bool,
}

fn init_tracing(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "combatd=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.json_logs);

    let config = EngineConfig::load(args.config.as_deref()).context("loading configuration")?;
    let roster = Roster::load(&args.roster).context("loading roster")?;

    let roller: Arc<dyn DieRoller> = if args.seed_rolls.is_empty() {
        Arc::new(RandomRoller)
    } else {
        Arc::new(ScriptedRoller::new(args.seed_rolls.clone()))
    };
    let provider = Arc::new(StaticProvider::new());
    let manager = SessionManager::new(config, provider.clone(), roller, Arc::new(TracingObserver));

    let facilitator = PlayerId::new();
    let session = manager
        .start_session(facilitator)
        .context("facilitator already runs a session")?;

    {
        let mut s = session.lock();
        let added = roster.populate(&provider, &mut s)?;
        info!("{} combatants enter the fray", added);
        s.start_combat();

        let mut printed_round = 0;
        loop {
            let Some(current) = s.skip_surprised().map(|c| c.id()) else {
                warn!("No combatant can act; stopping");
                break;
            };
            if s.round() > args.rounds {
                break;
            }
            if s.round() != printed_round {
                println!("{}", serde_json::to_string_pretty(&s.snapshot(false))?);
                printed_round = s.round();
            }

            if let Some(turn) = s.begin_turn(Location::new("arena", 0.0, 0.0, 0.0)) {
                turn.action_used = true;
            }
            if let Some(name) = s.display_name(current, true) {
                info!("Round {}: {} takes a turn", s.round(), name);
            }
            s.end_turn(current);
        }
    }

    manager.clear();
    Ok(())
}
