//! Kickwatch demo harness.
//!
//! Spins one real protocol core against scripted party members on an
//! in-process broadcast channel and prints the shared cooldown board. Useful
//! for eyeballing protocol behavior (handshake, missing-peer summary, echo
//! suppression) without a game client attached.

mod sim;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use kickwatch_core::{AbilityCatalog, KickwatchService, Settings};
use kickwatch_types::PeerName;

use crate::sim::{STEP_SECS, Simulation};

#[derive(Parser)]
#[command(version, about = "Party interrupt cooldown board, simulated")]
struct Cli {
    /// Scripted party members besides the local peer
    #[arg(short, long, default_value_t = 4)]
    peers: usize,

    /// Simulated seconds to run
    #[arg(short, long, default_value_t = 40.0)]
    duration: f64,

    /// Local peer name (realm-qualified or short)
    #[arg(long, default_value = "Vexa-SimRealm")]
    name: String,

    /// Interrupt the local peer casts in the script (spell id)
    #[arg(long, default_value_t = 2139)]
    own_ability: u32,

    /// Emit board snapshots as JSON lines instead of bars
    #[arg(long)]
    json: bool,

    /// Run at full speed instead of real time
    #[arg(long)]
    fast: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let settings = Settings::load();
    let european = settings.european_number_format;
    let service = KickwatchService::new(
        PeerName::parse(&cli.name),
        settings,
        AbilityCatalog::load(),
    );

    let mut sim = Simulation::new(service, cli.peers, cli.json, european);
    sim.script(cli.duration);
    sim.form_party(&[cli.own_ability]);

    // The local peer casts early and again once the cooldown returns
    let mut local_casts = vec![4.2, 4.3]; // the 4.3 echo must be suppressed
    let mut at = 31.0;
    while at < cli.duration {
        local_casts.push(at);
        at += 27.0;
    }

    let steps = (cli.duration / STEP_SECS).ceil() as u64;
    let mut cast_seq = 0usize;
    for step in 0..steps {
        sim.step();

        while cast_seq < local_casts.len() && local_casts[cast_seq] <= sim.now() {
            // Echoes of one physical cast share a cast id
            let cast_id = format!("cast-{}", local_casts[cast_seq].floor() as u64);
            sim.local_cast(&cast_id, cli.own_ability);
            cast_seq += 1;
        }

        // Repaint once a second so countdowns visibly move
        sim.render(step % 10 == 0);

        if !cli.fast {
            tokio::time::sleep(std::time::Duration::from_secs_f64(STEP_SECS)).await;
        }
    }
}
