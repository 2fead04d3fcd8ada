//! Telekinesis sandbox - runs a scripted pull, hold and throw headlessly

use anyhow::{Context, Result};
use clap::Parser;
use nalgebra::Vector3;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use telekinesis::config::TelekinesisConfig;
use telekinesis::game::physics::BodyPhysics;
use telekinesis::game::{HolderInput, TelekinesisInstance, Viewpoint};

#[derive(Parser)]
#[command(name = "telekinesis-sandbox")]
#[command(about = "Headless telekinesis sandbox", long_about = None)]
struct Cli {
    /// Path to a telekinesis.toml (defaults are used when omitted)
    #[arg(short, long, env = "TELEKINESIS_CONFIG")]
    config: Option<PathBuf>,
    /// Number of ticks to simulate
    #[arg(short, long, default_value = "240")]
    ticks: u64,
    /// Seed for jitter and spin
    #[arg(short, long, default_value = "1")]
    seed: u64,
}

/// Ticks at which the holder presses the trigger: pull, then throw
const PULL_TICK: u64 = 2;
const THROW_TICK: u64 = 120;

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => TelekinesisConfig::from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => TelekinesisConfig::default(),
    };

    let mut world = TelekinesisInstance::with_seed(config, cli.seed);

    // Floor and a back wall to throw against
    world.spawn_static_box(Vector3::new(0.0, -10.0, 0.0), Vector3::new(3000.0, 10.0, 3000.0));
    world.spawn_static_box(Vector3::new(0.0, 300.0, 1500.0), Vector3::new(1000.0, 300.0, 20.0));

    let prop = world.spawn_primary_prop(Vector3::new(0.0, 30.0, 300.0), Vector3::new(30.0, 30.0, 30.0), 200.0);
    for (i, x) in [-60.0, -30.0, 40.0, 70.0].into_iter().enumerate() {
        let z = 300.0 + if i % 2 == 0 { 50.0 } else { -50.0 };
        world.spawn_mini_prop(Vector3::new(x, 8.0, z), 8.0, 2.0, None);
    }
    let holder = world.spawn_holder(Vector3::new(0.0, 96.0, 0.0));
    world.set_viewpoint(holder, Viewpoint::new(Vector3::new(0.0, 60.0, -250.0), Vector3::new(0.0, -0.05, 1.0)));

    info!(ticks = cli.ticks, seed = cli.seed, prop, holder, "sandbox started");

    for tick in 0..cli.ticks {
        match tick {
            PULL_TICK => world.queue_interact(holder),
            THROW_TICK => {
                // Aim level at the wall before throwing
                world.set_viewpoint(holder, Viewpoint::new(Vector3::new(0.0, 150.0, -250.0), Vector3::z()));
                world.queue_interact(holder);
            }
            t if t > PULL_TICK && t < THROW_TICK => {
                // Sway while holding so the anchor moves
                let sway = ((t as f32) * 0.05).sin() * 0.3;
                world.queue_input(holder, HolderInput::Look { yaw: sway });
            }
            _ => {}
        }

        world.tick();

        for event in world.drain_frame_events() {
            info!(tick = world.tick, ?event, "frame event");
        }
    }

    let state = world.prop(prop).map(|p| p.state());
    let position = world.physics.position(prop);
    info!(?state, ?position, time = world.time(), "sandbox finished");
    Ok(())
}
