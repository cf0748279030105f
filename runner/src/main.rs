// ═══════════════════════════════════════════════════════════════════════
// Runner — CLI entry point for driving games from the command line.
// The engine never logs; every event it emits is rendered here.
// ═══════════════════════════════════════════════════════════════════════

use clap::{Parser, Subcommand};
use dune_agents::{Agent, HeuristicAgent, RandomAgent};
use dune_engine::events::Severity;
use dune_engine::manager::{PhaseManager, StepOutput};
use dune_engine::map;
use dune_engine::types::Faction;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "dune-runner", about = "Dune battle engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single game
    Play {
        #[arg(short, long, default_value_t = 42)]
        seed: u64,
        /// Agent type: "random" or "heuristic"
        #[arg(short, long, default_value = "random")]
        agent: String,
        /// Print the final state as JSON
        #[arg(long, default_value_t = false)]
        dump_state: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Play { seed, agent, dump_state } => cmd_play(seed, &agent, dump_state),
    }
}

fn make_agents(seed: u64, agent_type: &str) -> Vec<Box<dyn Agent>> {
    Faction::ALL
        .iter()
        .enumerate()
        .map(|(i, &f)| -> Box<dyn Agent> {
            let agent_seed = seed.wrapping_add(i as u64);
            match agent_type {
                "heuristic" => Box::new(HeuristicAgent::new(f, agent_seed)),
                _ => Box::new(RandomAgent::new(f, agent_seed)),
            }
        })
        .collect()
}

fn log_events(out: &StepOutput) {
    for event in &out.events {
        match event.severity() {
            Severity::Warning => warn!("{}", event.message()),
            Severity::Info => info!("{}", event.message()),
        }
    }
}

fn cmd_play(seed: u64, agent_type: &str, dump_state: bool) {
    info!("running game: seed={seed}, agents={agent_type}");
    let mut agents = make_agents(seed, agent_type);
    let mut manager = PhaseManager::new();

    let mut out = match manager.start(seed) {
        Ok(out) => out,
        Err(e) => {
            eprintln!("engine error: {e}");
            std::process::exit(1);
        }
    };
    log_events(&out);

    let mut steps = 0u64;
    while !out.game_over && steps < 100_000 {
        steps += 1;
        let responses: Vec<_> = out
            .pending
            .iter()
            .map(|request| {
                let agent = agents
                    .iter_mut()
                    .find(|a| a.faction() == request.faction)
                    .expect("one agent per faction");
                agent.decide(request)
            })
            .collect();
        out = match manager.process_step(out.state, &responses) {
            Ok(out) => out,
            Err(e) => {
                eprintln!("engine error: {e}");
                std::process::exit(1);
            }
        };
        log_events(&out);
    }

    println!();
    println!("game over after {} turns ({steps} decision steps)", out.state.turn);
    match out.state.winner {
        Some(winner) => println!("winner: {winner}"),
        None => println!("no winner"),
    }
    println!();
    println!("final standings:");
    for &f in &out.state.storm_order {
        let fs = out.state.faction(f);
        let strongholds = map::STRONGHOLDS
            .iter()
            .filter(|&&s| out.state.occupies(f, s))
            .count();
        println!(
            "  {:14} -- strongholds: {}, spice: {}, forces lost: {}",
            f.to_string(),
            strongholds,
            fs.spice,
            fs.forces_lost_total,
        );
    }

    if dump_state {
        match serde_json::to_string_pretty(&out.state) {
            Ok(json) => println!("{json}"),
            Err(e) => eprintln!("serialization error: {e}"),
        }
    }
}
