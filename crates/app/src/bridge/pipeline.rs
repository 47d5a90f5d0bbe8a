//! Bridge supervisor tying together ingest workers, the watchdog, and the
//! HTTP server.
//!
//! Workers run on their own threads and talk to the server only through
//! feeds. A single stop token, cancelled by Ctrl+C, winds everything down.

use std::{
    sync::{Arc, Once},
    thread,
    time::Duration,
};

use anyhow::{Context, Result};
use sensor_ingest::{
    Delivery, Feed, IngestError, IngestWorker, PointCloud, StopToken, TelemetryRecord,
    mock::{SyntheticCamera, SyntheticPointCloud, simulated_drive},
};
use tracing::{info, warn};

use crate::bridge::{
    config::{BridgeConfig, BridgeKind, CameraOptions},
    data::{FrameFeed, PointFeed, TelemetryFeed},
    encoding::JpegTransform,
    relay::{CommandBuffer, CommandEgress},
    server::{ServerState, spawn_server},
    telemetry,
    watchdog::{HealthBeat, IngestHealth, spawn_watchdog},
};

const SUPERVISOR_TICK: Duration = Duration::from_millis(100);

/// Everything a bridge runs besides the server thread.
struct Assembly {
    state: ServerState,
    workers: Vec<thread::JoinHandle<()>>,
    health: Vec<Arc<IngestHealth>>,
}

impl Assembly {
    fn new(state: ServerState) -> Self {
        Self {
            state,
            workers: Vec::new(),
            health: Vec::new(),
        }
    }

    fn track(&mut self, health: &Arc<IngestHealth>, worker: thread::JoinHandle<()>) {
        self.health.push(health.clone());
        self.state.health.push(health.clone());
        self.workers.push(worker);
    }
}

/// Run a bridge until Ctrl+C.
pub fn run(config: BridgeConfig) -> Result<()> {
    static CTRL_HANDLER: Once = Once::new();

    let _telemetry_guard = telemetry::init(&config.telemetry);
    let _ = telemetry::init_metrics_recorder();

    let stop = StopToken::new();
    let handler_stop = stop.clone();
    CTRL_HANDLER.call_once(move || {
        if let Err(err) = ctrlc::set_handler(move || handler_stop.cancel()) {
            warn!("Failed to install Ctrl+C handler: {err}");
        }
    });

    let bridge_span = tracing::info_span!(
        "bridge",
        kind = %config.kind,
        port = config.port,
        delivery = %config.delivery
    );
    let _bridge_guard = bridge_span.enter();

    let mut assembly = match assemble(&config, &stop) {
        Ok(assembly) => assembly,
        Err(err) => {
            stop.cancel();
            return Err(err);
        }
    };

    let watchdog = spawn_watchdog(std::mem::take(&mut assembly.health), stop.clone())
        .context("Failed to spawn watchdog thread");
    let server = watchdog.and_then(|watchdog| {
        spawn_server(assembly.state, &config.bind, config.port).map(|server| (watchdog, server))
    });
    let (watchdog, server) = match server {
        Ok(running) => running,
        Err(err) => {
            stop.cancel();
            join_all(assembly.workers);
            return Err(err);
        }
    };

    info!("bridge running; press Ctrl+C to stop");
    while !stop.is_cancelled() {
        thread::sleep(SUPERVISOR_TICK);
    }

    info!("shutting down bridge");
    server.stop();
    join_all(assembly.workers);
    let _ = watchdog.join();
    Ok(())
}

fn join_all(workers: Vec<thread::JoinHandle<()>>) {
    for worker in workers {
        if worker.join().is_err() {
            warn!("ingest worker panicked during shutdown");
        }
    }
}

fn assemble(config: &BridgeConfig, stop: &StopToken) -> Result<Assembly> {
    let state = ServerState::new(config.kind, config.timing, stop.clone());
    match config.kind {
        BridgeKind::Camera => {
            let camera = config
                .camera
                .context("camera bridge requires camera options")?;
            let frames: FrameFeed = Feed::new("camera", config.delivery);
            let mut assembly = Assembly::new(state.with_frames(frames.clone()));

            let health = IngestHealth::new("camera");
            let worker = camera_worker(camera, frames, config, &health)
                .spawn(stop.clone())
                .context("Failed to spawn camera ingest thread")?;
            assembly.track(&health, worker);
            Ok(assembly)
        }
        BridgeKind::Points => {
            let points = config
                .points
                .context("point bridge requires point options")?;
            let feed: PointFeed = Feed::new("points", config.delivery);
            let mut assembly = Assembly::new(state.with_points(feed.clone()));

            let health = IngestHealth::new("points");
            let source = SyntheticPointCloud::new(points.points, points.colors, points.rate_hz);
            let worker = IngestWorker::new(
                source,
                |cloud: PointCloud| -> Result<Arc<PointCloud>, IngestError> { Ok(Arc::new(cloud)) },
                feed,
            )
            .with_poll_interval(config.timing.poll_interval)
            .with_task(HealthBeat(health.clone()))
            .spawn(stop.clone())
            .context("Failed to spawn point-cloud ingest thread")?;
            assembly.track(&health, worker);
            Ok(assembly)
        }
        BridgeKind::Teleop => {
            let camera = config
                .camera
                .context("teleop bridge requires camera options")?;
            let drive = config
                .drive
                .context("teleop bridge requires drive options")?;

            let frames: FrameFeed = Feed::new("teleop", config.delivery);
            let commands = Arc::new(CommandBuffer::new());
            // The plot client only ever reads, so every listener gets each record.
            let telemetry: TelemetryFeed = Feed::new("drive", Delivery::Broadcast);
            let mut assembly = Assembly::new(
                state
                    .with_frames(frames.clone())
                    .with_commands(commands.clone())
                    .with_telemetry(telemetry.clone()),
            );

            let (control, drive_telemetry) = simulated_drive(drive.telemetry_hz);
            let camera_health = IngestHealth::new("teleop");
            let worker = camera_worker(camera, frames, config, &camera_health)
                .with_task(CommandEgress::new(
                    commands,
                    control,
                    drive.linear_speed,
                    drive.angular_speed,
                ))
                .spawn(stop.clone())
                .context("Failed to spawn teleop ingest thread")?;
            assembly.track(&camera_health, worker);

            let drive_health = IngestHealth::new("drive");
            let worker = IngestWorker::new(
                drive_telemetry,
                |record: TelemetryRecord| -> Result<Arc<TelemetryRecord>, IngestError> {
                    Ok(Arc::new(record))
                },
                telemetry,
            )
            .with_poll_interval(config.timing.poll_interval)
            .with_task(HealthBeat(drive_health.clone()))
            .spawn(stop.clone())
            .context("Failed to spawn drive telemetry thread")?;
            assembly.track(&drive_health, worker);
            Ok(assembly)
        }
    }
}

fn camera_worker(
    camera: CameraOptions,
    frames: FrameFeed,
    config: &BridgeConfig,
    health: &Arc<IngestHealth>,
) -> IngestWorker<SyntheticCamera, JpegTransform> {
    IngestWorker::new(
        SyntheticCamera::new(camera.width, camera.height, camera.fps),
        JpegTransform::new(camera.jpeg_quality),
        frames,
    )
    .with_poll_interval(config.timing.poll_interval)
    .with_task(HealthBeat(health.clone()))
}
