//! Configuration parsing for the streaming bridges.
//!
//! This module owns translation of CLI arguments into a `BridgeConfig` struct
//! which the pipeline, transports, and server use without re-parsing flags.

use std::{fmt, path::PathBuf, time::Duration};

use anyhow::{Result, bail};
use clap::Args;
use sensor_ingest::Delivery;

use crate::bridge::codec::MAX_POINT_COUNT;

pub const CAMERA_PORT: u16 = 8003;
pub const POINTS_PORT: u16 = 8004;
pub const TELEOP_PORT: u16 = 8008;

/// Viewing-only feed favours encode speed.
pub const CAMERA_JPEG_QUALITY: u8 = 75;
/// Teleop feed favours clarity for the driver.
pub const TELEOP_JPEG_QUALITY: u8 = 85;

pub const LINEAR_SPEED: f32 = 0.15;
pub const ANGULAR_SPEED: f32 = 0.3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Which bridge the process runs.
pub enum BridgeKind {
    /// MJPEG camera viewer.
    Camera,
    /// WebSocket point-cloud viewer.
    Points,
    /// Camera feed plus joystick control relay.
    Teleop,
}

impl BridgeKind {
    pub fn label(self) -> &'static str {
        match self {
            BridgeKind::Camera => "camera",
            BridgeKind::Points => "points",
            BridgeKind::Teleop => "teleop",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            BridgeKind::Camera => CAMERA_PORT,
            BridgeKind::Points => POINTS_PORT,
            BridgeKind::Teleop => TELEOP_PORT,
        }
    }
}

impl fmt::Display for BridgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
/// Loop cadences shared by workers and transports.
pub struct Timing {
    /// Idle sleep between `ready()` polls on the ingest thread.
    pub poll_interval: Duration,
    /// How long a transport waits on its feed per drain attempt.
    pub drain_timeout: Duration,
    /// Cooperative sleep after a drain attempt came back empty.
    pub idle_backoff: Duration,
    /// Single-frame endpoint wait before answering 503.
    pub snapshot_timeout: Duration,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            drain_timeout: Duration::from_millis(50),
            idle_backoff: Duration::from_millis(5),
            snapshot_timeout: Duration::from_millis(500),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraOptions {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub jpeg_quality: u8,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointOptions {
    pub points: usize,
    pub rate_hz: f64,
    pub colors: bool,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriveOptions {
    /// m/s at full forward deflection.
    pub linear_speed: f32,
    /// rad/s at full sideways deflection.
    pub angular_speed: f32,
    pub telemetry_hz: f64,
}

#[derive(Clone, Debug, Default)]
/// Optional telemetry knobs for tracing and runtime inspection.
pub struct TelemetryOptions {
    /// Write a Chrome trace JSON file capturing worker/session spans.
    pub chrome_trace_path: Option<PathBuf>,
    /// Enable the Tokio console subscriber.
    pub enable_tokio_console: bool,
}

#[derive(Clone, Debug)]
/// Canonical configuration shared by every stage of a bridge.
pub struct BridgeConfig {
    pub kind: BridgeKind,
    pub bind: String,
    pub port: u16,
    pub delivery: Delivery,
    pub timing: Timing,
    /// Present for the camera and teleop bridges.
    pub camera: Option<CameraOptions>,
    /// Present for the point-cloud bridge.
    pub points: Option<PointOptions>,
    /// Present for the teleop bridge.
    pub drive: Option<DriveOptions>,
    pub telemetry: TelemetryOptions,
}

/// Flags accepted by every bridge subcommand.
#[derive(Debug, Args)]
pub struct CommonArgs {
    /// Address the HTTP server binds to.
    #[arg(long = "bind", value_name = "ADDR", default_value = "0.0.0.0")]
    pub bind: String,
    /// Listen port (defaults to the bridge's well-known port).
    #[arg(long = "port", value_name = "PORT")]
    pub port: Option<u16>,
    /// Whether concurrent viewers share samples or each see every fresh one.
    #[arg(long = "delivery", value_name = "MODE", default_value = "exclusive")]
    pub delivery: Delivery,
    /// Idle sleep between source polls.
    #[arg(long = "poll-interval-ms", value_name = "MS", default_value_t = 1)]
    pub poll_interval_ms: u64,
    /// Per-attempt wait on the feed inside a transport loop.
    #[arg(long = "drain-timeout-ms", value_name = "MS", default_value_t = 50)]
    pub drain_timeout_ms: u64,
    /// Sleep after an empty drain attempt.
    #[arg(long = "idle-backoff-ms", value_name = "MS", default_value_t = 5)]
    pub idle_backoff_ms: u64,
    /// Wait used by the single-frame endpoint.
    #[arg(long = "snapshot-timeout-ms", value_name = "MS", default_value_t = 500)]
    pub snapshot_timeout_ms: u64,
    /// Emit Chrome trace JSON for post-mortem analysis.
    #[arg(long = "chrome-trace", value_name = "PATH")]
    pub chrome_trace: Option<PathBuf>,
    /// Enable the Tokio console instrumentation server.
    #[arg(long = "tokio-console", action = clap::ArgAction::SetTrue)]
    pub tokio_console: bool,
}

/// Simulated camera geometry and encode quality.
#[derive(Debug, Args)]
pub struct CameraArgs {
    #[arg(long = "width", value_name = "PX", default_value_t = 640)]
    pub width: u32,
    #[arg(long = "height", value_name = "PX", default_value_t = 480)]
    pub height: u32,
    #[arg(long = "fps", value_name = "HZ", default_value_t = 30.0)]
    pub fps: f64,
    /// JPEG quality (1-100); defaults depend on the bridge.
    #[arg(long = "jpeg-quality", value_name = "QUALITY")]
    pub jpeg_quality: Option<i32>,
}

#[derive(Debug, Args)]
pub struct PointArgs {
    /// Points per simulated cloud.
    #[arg(long = "points", value_name = "N", default_value_t = 4096)]
    pub points: usize,
    #[arg(long = "rate-hz", value_name = "HZ", default_value_t = 15.0)]
    pub rate_hz: f64,
    /// Publish positions only.
    #[arg(long = "no-colors", action = clap::ArgAction::SetTrue)]
    pub no_colors: bool,
}

#[derive(Debug, Args)]
pub struct DriveArgs {
    #[arg(long = "linear-speed", value_name = "M_PER_S", default_value_t = LINEAR_SPEED)]
    pub linear_speed: f32,
    #[arg(long = "angular-speed", value_name = "RAD_PER_S", default_value_t = ANGULAR_SPEED)]
    pub angular_speed: f32,
    #[arg(long = "telemetry-hz", value_name = "HZ", default_value_t = 20.0)]
    pub telemetry_hz: f64,
}

impl BridgeConfig {
    fn from_common(kind: BridgeKind, common: CommonArgs) -> Result<Self> {
        if common.drain_timeout_ms == 0 {
            bail!("--drain-timeout-ms must be at least 1");
        }
        if common.snapshot_timeout_ms == 0 {
            bail!("--snapshot-timeout-ms must be at least 1");
        }

        Ok(Self {
            kind,
            bind: common.bind,
            port: common.port.unwrap_or(kind.default_port()),
            delivery: common.delivery,
            timing: Timing {
                poll_interval: Duration::from_millis(common.poll_interval_ms),
                drain_timeout: Duration::from_millis(common.drain_timeout_ms),
                idle_backoff: Duration::from_millis(common.idle_backoff_ms),
                snapshot_timeout: Duration::from_millis(common.snapshot_timeout_ms),
            },
            camera: None,
            points: None,
            drive: None,
            telemetry: TelemetryOptions {
                chrome_trace_path: common.chrome_trace,
                enable_tokio_console: common.tokio_console,
            },
        })
    }

    pub fn camera(common: CommonArgs, camera: CameraArgs) -> Result<Self> {
        let mut config = Self::from_common(BridgeKind::Camera, common)?;
        config.camera = Some(camera_options(camera, CAMERA_JPEG_QUALITY)?);
        Ok(config)
    }

    pub fn points(common: CommonArgs, points: PointArgs) -> Result<Self> {
        if points.points == 0 || points.points >= MAX_POINT_COUNT as usize {
            bail!("--points must be between 1 and {}", MAX_POINT_COUNT - 1);
        }
        if points.rate_hz <= 0.0 {
            bail!("--rate-hz must be positive");
        }

        let mut config = Self::from_common(BridgeKind::Points, common)?;
        config.points = Some(PointOptions {
            points: points.points,
            rate_hz: points.rate_hz,
            colors: !points.no_colors,
        });
        Ok(config)
    }

    pub fn teleop(common: CommonArgs, camera: CameraArgs, drive: DriveArgs) -> Result<Self> {
        if !(drive.linear_speed.is_finite() && drive.angular_speed.is_finite()) {
            bail!("drive speeds must be finite");
        }
        if drive.telemetry_hz <= 0.0 {
            bail!("--telemetry-hz must be positive");
        }

        let mut config = Self::from_common(BridgeKind::Teleop, common)?;
        config.camera = Some(camera_options(camera, TELEOP_JPEG_QUALITY)?);
        config.drive = Some(DriveOptions {
            linear_speed: drive.linear_speed,
            angular_speed: drive.angular_speed,
            telemetry_hz: drive.telemetry_hz,
        });
        Ok(config)
    }
}

fn camera_options(args: CameraArgs, default_quality: u8) -> Result<CameraOptions> {
    if args.width == 0 || args.height == 0 {
        bail!("Camera width and height must be positive integers");
    }
    if args.fps <= 0.0 {
        bail!("--fps must be positive");
    }
    let jpeg_quality = args.jpeg_quality.unwrap_or(i32::from(default_quality));
    if !(1..=100).contains(&jpeg_quality) {
        bail!("--jpeg-quality must be an integer between 1 and 100");
    }

    Ok(CameraOptions {
        width: args.width,
        height: args.height,
        fps: args.fps,
        jpeg_quality: jpeg_quality as u8,
    })
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;
    use crate::cli::Cli;

    fn parse(args: &[&str]) -> Result<BridgeConfig> {
        let cli = Cli::try_parse_from(std::iter::once("robot-bridge").chain(args.iter().copied()))?;
        BridgeConfig::try_from(cli.command)
    }

    #[test]
    fn camera_defaults_match_viewer_bridge() {
        let config = parse(&["camera"]).unwrap();
        assert_eq!(config.kind, BridgeKind::Camera);
        assert_eq!(config.port, CAMERA_PORT);
        assert_eq!(config.delivery, Delivery::Exclusive);
        assert_eq!(config.camera.unwrap().jpeg_quality, CAMERA_JPEG_QUALITY);
        assert_eq!(config.timing, Timing::default());
        assert!(config.points.is_none());
    }

    #[test]
    fn teleop_uses_higher_quality_and_drive_speeds() {
        let config = parse(&["teleop", "--delivery", "broadcast"]).unwrap();
        assert_eq!(config.port, TELEOP_PORT);
        assert_eq!(config.delivery, Delivery::Broadcast);
        assert_eq!(config.camera.unwrap().jpeg_quality, TELEOP_JPEG_QUALITY);
        let drive = config.drive.unwrap();
        assert_eq!(drive.linear_speed, LINEAR_SPEED);
        assert_eq!(drive.angular_speed, ANGULAR_SPEED);
    }

    #[test]
    fn rejects_out_of_range_values() {
        assert!(parse(&["camera", "--jpeg-quality", "0"]).is_err());
        assert!(parse(&["camera", "--jpeg-quality", "101"]).is_err());
        assert!(parse(&["points", "--points", "100000"]).is_err());
        assert!(parse(&["points", "--points", "0"]).is_err());
        assert!(parse(&["camera", "--drain-timeout-ms", "0"]).is_err());
    }

    #[test]
    fn port_override_applies() {
        let config = parse(&["points", "--port", "9100", "--no-colors"]).unwrap();
        assert_eq!(config.port, 9100);
        assert!(!config.points.unwrap().colors);
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["robot-bridge"]).is_err());
        assert!(Cli::try_parse_from(["robot-bridge", "camera", "--delivery", "fanout"]).is_err());
    }
}
