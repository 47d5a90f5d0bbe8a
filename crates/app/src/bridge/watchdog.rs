use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicU64, Ordering},
    },
    thread,
    time::{Duration, SystemTime, UNIX_EPOCH},
};

use sensor_ingest::{CycleTask, StopToken};
use tracing::{error, info};

pub const WATCHDOG_POLL_INTERVAL_MS: u64 = 500;
pub const WATCHDOG_STALE_THRESHOLD_MS: u64 = 1_500;
pub const WATCHDOG_STARTUP_GRACE_MS: u64 = 5_000;

/// Liveness of one ingest worker, beaten once per loop iteration.
pub struct IngestHealth {
    stream: &'static str,
    last_beat: AtomicU64,
    stale: AtomicBool,
}

impl IngestHealth {
    pub fn new(stream: &'static str) -> Arc<Self> {
        let grace_deadline = current_millis().saturating_add(WATCHDOG_STARTUP_GRACE_MS);
        Arc::new(Self {
            stream,
            last_beat: AtomicU64::new(grace_deadline),
            stale: AtomicBool::new(false),
        })
    }

    pub fn stream(&self) -> &'static str {
        self.stream
    }

    pub fn beat(&self) {
        self.last_beat.store(current_millis(), Ordering::Relaxed);
    }

    pub fn is_stale_at(&self, now: u64) -> bool {
        now.saturating_sub(self.last_beat.load(Ordering::Relaxed)) > WATCHDOG_STALE_THRESHOLD_MS
    }

    pub fn is_stale(&self) -> bool {
        self.is_stale_at(current_millis())
    }

    /// Record the latest verdict; returns true when it changed.
    fn transition(&self, stale: bool) -> bool {
        self.stale.swap(stale, Ordering::Relaxed) != stale
    }
}

/// Cycle hook that keeps an [`IngestHealth`] fresh from inside the worker loop.
pub struct HealthBeat(pub Arc<IngestHealth>);

impl CycleTask for HealthBeat {
    fn run_cycle(&mut self) {
        self.0.beat();
    }
}

/// Log when workers stall or recover. Exits once `stop` is cancelled.
pub fn spawn_watchdog(
    health: Vec<Arc<IngestHealth>>,
    stop: StopToken,
) -> std::io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("bridge-watchdog".into())
        .spawn(move || {
            while !stop.is_cancelled() {
                thread::sleep(Duration::from_millis(WATCHDOG_POLL_INTERVAL_MS));
                let now = current_millis();
                for component in &health {
                    let stale = component.is_stale_at(now);
                    if component.transition(stale) {
                        if stale {
                            error!(stream = component.stream(), "ingest worker stalled");
                            metrics::counter!("bridge_watchdog_stalls_total", "stream" => component.stream())
                                .increment(1);
                        } else {
                            info!(stream = component.stream(), "ingest worker recovered");
                        }
                    }
                }
            }
        })
}

pub(crate) fn current_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_health_is_in_grace_period() {
        let health = IngestHealth::new("camera");
        assert!(!health.is_stale());
        assert!(!health.is_stale_at(current_millis() + WATCHDOG_STARTUP_GRACE_MS));
    }

    #[test]
    fn goes_stale_without_beats() {
        let health = IngestHealth::new("points");
        health.beat();
        let later = current_millis() + WATCHDOG_STALE_THRESHOLD_MS + 100;
        assert!(health.is_stale_at(later));

        let mut beat = HealthBeat(health.clone());
        beat.run_cycle();
        assert!(!health.is_stale());
    }

    #[test]
    fn transition_reports_changes_only() {
        let health = IngestHealth::new("teleop");
        assert!(health.transition(true));
        assert!(!health.transition(true));
        assert!(health.transition(false));
    }
}
