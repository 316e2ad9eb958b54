//! waypilot binary: import a waypoint mission, upload it, launch, hand off.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use waypilot::clock::SystemClock;
use waypilot::flight::FlightRunner;
use waypilot::link::mav::MavlinkVehicle;
use waypilot::link::Vehicle;
use waypilot::source::MissionSource;
use waypilot::{sync, PilotError};
use waypilot_core::flight::FlightConfig;
use waypilot_core::wpl;

/// Default vehicle link target: local SITL UDP endpoint.
const DEFAULT_CONNECT: &str = "udpin:0.0.0.0:14551";

#[derive(Parser)]
#[command(name = "waypilot")]
#[command(about = "Import a waypoint mission, upload it to a vehicle, and launch it")]
struct Cli {
    /// Vehicle connection target (udpin:/udpout:/tcpout:/serial:)
    #[arg(long, default_value = DEFAULT_CONNECT)]
    connect: String,

    /// Mission waypoints URL (takes precedence over --file)
    #[arg(long)]
    url: Option<String>,

    /// Mission waypoints file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Takeoff target altitude in meters
    #[arg(long, default_value_t = 20.0)]
    alt: f32,

    /// After upload, download the onboard mission back to this file
    #[arg(long)]
    export: Option<PathBuf>,
}

fn init_logging() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "waypilot=info".into()),
    );
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();

    let source = MissionSource::select(cli.url, cli.file);
    tracing::info!("reading mission from {}", source.describe());
    let text = source.fetch().map_err(PilotError::from)?;
    let mission = wpl::decode(&text).map_err(PilotError::from)?;
    tracing::info!(items = mission.len(), "mission decoded");

    tracing::info!("connecting to vehicle on {}", cli.connect);
    let mut vehicle = MavlinkVehicle::connect(&cli.connect)
        .map_err(PilotError::from)
        .with_context(|| format!("vehicle link {}", cli.connect))?;

    // The link is released on every exit path below; Drop backstops a panic.
    let result = run(&mut vehicle, &mission, cli.alt, cli.export.as_deref());
    vehicle.close();
    result.map_err(Into::into)
}

fn run(
    vehicle: &mut MavlinkVehicle,
    mission: &waypilot_core::mission::Mission,
    target_alt: f32,
    export: Option<&std::path::Path>,
) -> Result<(), PilotError> {
    sync::upload(vehicle, mission)?;

    if let Some(path) = export {
        sync::save(vehicle, path)?;
    }

    let clock = SystemClock::new();
    let config = FlightConfig {
        target_alt,
        ..FlightConfig::default()
    };
    FlightRunner::new(&clock, config).run(vehicle)?;
    Ok(())
}
