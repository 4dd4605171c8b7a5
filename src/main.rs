use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use mecanum_drive_hal::config::{HUB_PORT, LOOP_HZ, RobotConfig, SIM_TICKS_PER_SECOND};
use mecanum_drive_hal::drive::MecanumDrive;
use mecanum_drive_hal::hub::{SerialHub, SimHub};

/// Mecanum drivetrain runtime
#[derive(Debug, Parser)]
#[command(version, about)]
struct Args {
    /// Serial port of the hub
    #[arg(long, default_value = HUB_PORT)]
    port: String,

    /// Robot config (JSON); built-in defaults if omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Run against a simulated hub instead of real hardware
    #[arg(long)]
    sim: bool,
}

#[tokio::main]
async fn main() {
    // Setup logging (set RUST_LOG=info or debug)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init(); // installs the subscriber globally

    let args = Args::parse();

    if let Err(e) = start(args).await {
        eprintln!("Runtime error: {}", e);
        std::process::exit(1);
    }
}

async fn start(args: Args) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let config = match &args.config {
        Some(path) => RobotConfig::load(path)?,
        None => RobotConfig::default(),
    };

    if args.sim {
        info!("Using simulated hub");
        let hub = SimHub::new()
            .with_modules(&config.modules())
            .with_physics(SIM_TICKS_PER_SECOND, 1.0 / LOOP_HZ as f64);
        let drive = MecanumDrive::new(hub, &config)?;
        mecanum_drive_hal::runtime::run(drive).await
    } else {
        let hub = SerialHub::open(&args.port, &config.modules())?;
        let drive = MecanumDrive::new(hub, &config)?;
        mecanum_drive_hal::runtime::run(drive).await
    }
}
