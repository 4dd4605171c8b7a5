// 50 Hz drive loop with watchdog
// Note: the watchdog zeroes the wheel and intake powers when the motion
// controller stops sending commands, so the robot doesn't keep driving on the
// last command it heard.

use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::config::{
    CMD_TIMEOUT, LOOP_HZ, TOPIC_CMD_DRIVE, TOPIC_CMD_GAINS, TOPIC_HEALTH, TOPIC_STATE_DRIVE,
};
use crate::drive::{MecanumDrive, VelocityGains};
use crate::hub::Hub;
use crate::messages::{DriveCommand, DriveTelemetry, RuntimeHealth};

pub struct Runtime {
    latest_cmd: Option<DriveCommand>,
    cmd_received_at: Instant,
    health: RuntimeHealth,
}

impl Runtime {
    pub fn new() -> Self {
        Self {
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    /// Process incoming command
    fn on_command(&mut self, cmd: DriveCommand) {
        self.on_command_at(cmd, Instant::now());
    }

    fn on_command_at(&mut self, cmd: DriveCommand, now: Instant) {
        debug!("Received command: {:?}", &cmd);
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = now;
    }

    /// Compute the command to apply this cycle based on watchdog state
    fn compute_actuation(&mut self) -> DriveCommand {
        self.compute_actuation_at(Instant::now())
    }

    fn compute_actuation_at(&mut self, now: Instant) -> DriveCommand {
        let cmd_age = now.saturating_duration_since(self.cmd_received_at);

        if cmd_age > CMD_TIMEOUT {
            // Watchdog triggered - stop the robot
            if self.health != RuntimeHealth::CmdStale {
                warn!("Command stale ({:?} old), stopping robot", cmd_age);
            }
            self.health = RuntimeHealth::CmdStale;
            DriveCommand::default()
        } else if let Some(cmd) = self.latest_cmd {
            self.health = RuntimeHealth::Ok;
            cmd
        } else {
            // No command ever received
            self.health = RuntimeHealth::CmdStale;
            DriveCommand::default()
        }
    }

    /// Apply one cycle's command and read back telemetry
    fn step<H: Hub>(&mut self, drive: &mut MecanumDrive<H>, cmd: DriveCommand) -> DriveTelemetry {
        let applied = drive
            .set_wheel_powers(cmd.wheels)
            .and_then(|()| drive.set_intake_power(cmd.intake));
        if let Err(e) = applied {
            warn!("Failed to apply drive command: {}", e);
            self.health = RuntimeHealth::HubFault;
        }

        let state = drive.wheel_state();
        let heading = match drive.heading() {
            Ok(heading) => Some(heading),
            Err(e) => {
                warn!("Failed to read heading: {}", e);
                None
            }
        };
        DriveTelemetry::new(state, heading)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn run<H: Hub>(
    mut drive: MecanumDrive<H>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_cmd = session.declare_subscriber(TOPIC_CMD_DRIVE).await?;
    let sub_gains = session.declare_subscriber(TOPIC_CMD_GAINS).await?;
    let pub_state = session.declare_publisher(TOPIC_STATE_DRIVE).await?;
    let pub_health = session.declare_publisher(TOPIC_HEALTH).await?;

    let mut runtime = Runtime::new();
    let mut tick = interval(Duration::from_millis(1000 / LOOP_HZ));

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        LOOP_HZ,
        CMD_TIMEOUT.as_millis()
    );
    info!("Subscribed to: {}, {}", TOPIC_CMD_DRIVE, TOPIC_CMD_GAINS);
    info!("Publishing to: {}, {}", TOPIC_STATE_DRIVE, TOPIC_HEALTH);

    loop {
        tick.tick().await;

        // 1. Drain all pending commands (non-blocking), keep latest
        while let Ok(Some(sample)) = sub_cmd.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<DriveCommand>(&payload) {
                Ok(cmd) => runtime.on_command(cmd),
                Err(e) => warn!("Failed to parse drive command: {}", e),
            }
        }

        // 2. Gain updates are rare; apply each one as it arrives
        while let Ok(Some(sample)) = sub_gains.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<VelocityGains>(&payload) {
                Ok(gains) => {
                    if let Err(e) = drive.set_velocity_gains(gains) {
                        warn!("Failed to set velocity gains: {}", e);
                    }
                }
                Err(e) => warn!("Failed to parse gains: {}", e),
            }
        }

        // 3. Compute actuation (includes watchdog logic), apply, read back
        let cmd = runtime.compute_actuation();
        let telemetry = runtime.step(&mut drive, cmd);

        // 4. Publish telemetry
        let telemetry_json = serde_json::to_string(&telemetry)?;
        pub_state.put(telemetry_json).await?;

        // 5. Publish health
        let health_json = serde_json::to_string(&runtime.health)?;
        pub_health.put(health_json).await?;
    }
}
