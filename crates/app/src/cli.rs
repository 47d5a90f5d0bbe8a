use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::bridge::{
    BridgeConfig, CameraArgs, CommonArgs, DriveArgs, PointArgs, run as run_bridge,
};

/// Live sensor streaming bridges for browser viewers and teleoperation.
#[derive(Debug, Parser)]
#[command(name = "robot-bridge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Serve the camera as an MJPEG stream (default port 8003).
    Camera {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        camera: CameraArgs,
    },
    /// Push point clouds over a binary WebSocket (default port 8004).
    Points {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        points: PointArgs,
    },
    /// Camera feed plus joystick drive relay (default port 8008).
    Teleop {
        #[command(flatten)]
        common: CommonArgs,
        #[command(flatten)]
        camera: CameraArgs,
        #[command(flatten)]
        drive: DriveArgs,
    },
}

impl TryFrom<Command> for BridgeConfig {
    type Error = anyhow::Error;

    fn try_from(command: Command) -> Result<Self> {
        match command {
            Command::Camera { common, camera } => BridgeConfig::camera(common, camera),
            Command::Points { common, points } => BridgeConfig::points(common, points),
            Command::Teleop {
                common,
                camera,
                drive,
            } => BridgeConfig::teleop(common, camera, drive),
        }
    }
}

/// Parse `args` and run the selected bridge until Ctrl+C.
pub fn handle_commands(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    let config = BridgeConfig::try_from(cli.command)?;
    run_bridge(config)
}
