//! Simulated sources so the bridges run without robot hardware.
//!
//! Each source paces itself with a fixed sample interval and reports `ready`
//! only once per interval, the way the shared-memory readers do.

mod camera;
mod drive;
mod points;

use std::time::{Duration, Instant};

pub use camera::SyntheticCamera;
pub use drive::{DriveControl, DriveTelemetry, simulated_drive};
pub use points::SyntheticPointCloud;

/// Fixed-rate readiness clock shared by the simulated sources.
#[derive(Clone, Debug)]
pub(crate) struct Pacer {
    interval: Duration,
    next_due: Instant,
}

impl Pacer {
    pub(crate) fn new(rate_hz: f64) -> Self {
        let interval = Duration::from_secs_f64(1.0 / rate_hz.max(0.1));
        Self {
            interval,
            next_due: Instant::now(),
        }
    }

    pub(crate) fn due(&self) -> bool {
        Instant::now() >= self.next_due
    }

    pub(crate) fn advance(&mut self) {
        let now = Instant::now();
        self.next_due += self.interval;
        // fell behind (e.g. debugger pause): resync instead of bursting
        if self.next_due < now {
            self.next_due = now + self.interval;
        }
    }
}
