//! Live-data streaming bridges that drain robot sensor sources on dedicated
//! threads and serve the freshest sample to browser clients.
//!
//! The module is split into focused submodules:
//! - `config`: CLI configuration parsing.
//! - `pipeline`: Wires sources, workers, watchdog, and server for one bridge.
//! - `encoding`: JPEG encode stage for camera frames.
//! - `codec`: Binary point-cloud wire format.
//! - `transport`: Multipart and WebSocket drain loops.
//! - `relay`: Teleop command ingress and egress.
//! - `server`: Actix Web endpoints.
//! - `watchdog`: Liveness of ingest workers.
//! - `data`: Feed aliases and response bodies shared by handlers.
//! - `telemetry`: Tracing subscriber and Prometheus recorder setup.

/// Re-export bridge settings so callers can configure runs without reaching
/// into submodules.
pub use config::{
    BridgeConfig, BridgeKind, CameraArgs, CommonArgs, DriveArgs, PointArgs, Timing,
};
/// Launch a bridge with a ready-made configuration.
pub use pipeline::run;

pub mod codec;
pub mod config;
pub mod data;
pub mod encoding;
mod pipeline;
pub mod relay;
pub mod server;
pub mod telemetry;
pub mod transport;
pub mod watchdog;
