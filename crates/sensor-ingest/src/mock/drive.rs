//! Simulated differential drive: accepts twists, reports pose telemetry.

use std::{
    sync::{Arc, Mutex, PoisonError},
    time::Instant,
};

use super::Pacer;
use crate::{
    source::{ControlSink, SensorSource},
    types::{IngestError, TelemetryRecord, Twist},
};

#[derive(Debug)]
struct DriveState {
    twist: Twist,
    x: f64,
    y: f64,
    theta: f64,
    last_update: Instant,
    writes: u64,
}

impl DriveState {
    fn integrate(&mut self, now: Instant) {
        let dt = now.duration_since(self.last_update).as_secs_f64();
        self.last_update = now;
        let linear = f64::from(self.twist.linear);
        self.theta += f64::from(self.twist.angular) * dt;
        self.x += linear * self.theta.cos() * dt;
        self.y += linear * self.theta.sin() * dt;
    }
}

type Shared = Arc<Mutex<DriveState>>;

fn lock(state: &Shared) -> std::sync::MutexGuard<'_, DriveState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Control half of the simulated drive.
#[derive(Clone)]
pub struct DriveControl {
    state: Shared,
}

impl DriveControl {
    pub fn current_twist(&self) -> Twist {
        lock(&self.state).twist
    }

    pub fn writes(&self) -> u64 {
        lock(&self.state).writes
    }
}

impl ControlSink for DriveControl {
    fn write_twist(&mut self, twist: Twist) -> Result<(), IngestError> {
        let mut state = lock(&self.state);
        state.integrate(Instant::now());
        state.twist = twist;
        state.writes += 1;
        Ok(())
    }
}

/// Telemetry half of the simulated drive.
pub struct DriveTelemetry {
    state: Shared,
    pacer: Pacer,
    started: Instant,
}

impl SensorSource for DriveTelemetry {
    type Sample = TelemetryRecord;

    fn ready(&mut self) -> bool {
        self.pacer.due()
    }

    fn read(&mut self) -> Result<TelemetryRecord, IngestError> {
        self.pacer.advance();
        let now = Instant::now();
        let mut state = lock(&self.state);
        state.integrate(now);

        let timestamp_us = now.duration_since(self.started).as_micros() as u64;
        Ok(TelemetryRecord::new(Some(timestamp_us))
            .with_vector(
                "twist",
                vec![f64::from(state.twist.linear), f64::from(state.twist.angular)],
            )
            .with_vector("pose", vec![state.x, state.y, state.theta]))
    }
}

/// Build the paired control/telemetry handles of one simulated drive.
pub fn simulated_drive(telemetry_hz: f64) -> (DriveControl, DriveTelemetry) {
    let now = Instant::now();
    let state = Arc::new(Mutex::new(DriveState {
        twist: Twist::default(),
        x: 0.0,
        y: 0.0,
        theta: 0.0,
        last_update: now,
        writes: 0,
    }));
    (
        DriveControl {
            state: state.clone(),
        },
        DriveTelemetry {
            state,
            pacer: Pacer::new(telemetry_hz),
            started: now,
        },
    )
}
