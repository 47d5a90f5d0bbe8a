//! Dedicated ingest loop: poll a [`SensorSource`], transform, publish.
//!
//! One worker runs per physical source on its own OS thread. It never waits on
//! consumers; it only sleeps for the bounded poll interval, between `ready()`
//! checks and after a failed read.

use std::{
    io,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, info, trace};

use crate::{
    feed::Feed,
    freshness::PublishOutcome,
    shutdown::StopToken,
    source::SensorSource,
    types::IngestError,
};

/// Stream-specific conversion applied between `read` and `publish`.
pub trait SampleTransform<In>: Send {
    type Output;

    fn apply(&mut self, input: In) -> Result<Self::Output, IngestError>;
}

/// Publish samples as read.
#[derive(Clone, Copy, Debug, Default)]
pub struct Passthrough;

impl<T> SampleTransform<T> for Passthrough {
    type Output = T;

    fn apply(&mut self, input: T) -> Result<T, IngestError> {
        Ok(input)
    }
}

impl<In, Out, F> SampleTransform<In> for F
where
    F: FnMut(In) -> Result<Out, IngestError> + Send,
{
    type Output = Out;

    fn apply(&mut self, input: In) -> Result<Out, IngestError> {
        self(input)
    }
}

/// Extra work piggy-backed on every loop iteration (command egress, heartbeats).
pub trait CycleTask: Send {
    fn run_cycle(&mut self);

    /// Runs once after the loop exits, before the worker thread ends.
    fn finish(&mut self) {}
}

/// Result of one poll of the source.
#[derive(Debug)]
pub enum CycleOutcome {
    Published(PublishOutcome),
    /// Source had nothing new.
    Empty,
    /// A sample was read but dropped before publish.
    Skipped(IngestError),
}

pub struct IngestWorker<S, X>
where
    S: SensorSource,
    X: SampleTransform<S::Sample>,
{
    name: &'static str,
    source: S,
    transform: X,
    feed: Arc<Feed<X::Output>>,
    tasks: Vec<Box<dyn CycleTask>>,
    poll_interval: Duration,
}

impl<S, X> IngestWorker<S, X>
where
    S: SensorSource + 'static,
    X: SampleTransform<S::Sample> + 'static,
    X::Output: Clone + Send + Sync + 'static,
{
    pub fn new(source: S, transform: X, feed: Arc<Feed<X::Output>>) -> Self {
        Self {
            name: feed.name(),
            source,
            transform,
            feed,
            tasks: Vec::new(),
            poll_interval: Duration::from_millis(1),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_task(mut self, task: impl CycleTask + 'static) -> Self {
        self.tasks.push(Box::new(task));
        self
    }

    /// Check the source once and publish if a sample came through.
    pub fn poll_once(&mut self) -> CycleOutcome {
        if !self.source.ready() {
            return CycleOutcome::Empty;
        }

        let started = Instant::now();
        let sample = match self.source.read().and_then(|raw| self.transform.apply(raw)) {
            Ok(sample) => sample,
            Err(err) => return CycleOutcome::Skipped(err),
        };

        let outcome = self.feed.publish(sample);
        metrics::histogram!("bridge_ingest_cycle_seconds", "stream" => self.name)
            .record(started.elapsed().as_secs_f64());
        CycleOutcome::Published(outcome)
    }

    /// Run until `stop` is cancelled.
    pub fn run(mut self, stop: StopToken) {
        let worker_span = tracing::info_span!("ingest.worker", stream = self.name);
        let _worker_guard = worker_span.enter();
        info!(delivery = %self.feed.delivery(), "ingest worker started");

        while !stop.is_cancelled() {
            let outcome = self.poll_once();
            for task in &mut self.tasks {
                task.run_cycle();
            }

            match outcome {
                CycleOutcome::Published(published) => {
                    metrics::counter!("bridge_samples_published_total", "stream" => self.name)
                        .increment(1);
                    if published == PublishOutcome::Replaced {
                        metrics::counter!("bridge_samples_displaced_total", "stream" => self.name)
                            .increment(1);
                        trace!("pending sample displaced by newer one");
                    }
                }
                CycleOutcome::Empty => thread::sleep(self.poll_interval),
                CycleOutcome::Skipped(err) => {
                    metrics::counter!(
                        "bridge_ingest_skipped_total",
                        "stream" => self.name,
                        "reason" => err.reason()
                    )
                    .increment(1);
                    debug!("skipping sample: {err}");
                    thread::sleep(self.poll_interval);
                }
            }
        }

        for task in &mut self.tasks {
            task.finish();
        }
        info!("ingest worker stopped");
    }

    pub fn spawn(self, stop: StopToken) -> io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name(format!("ingest-{}", self.name))
            .spawn(move || self.run(stop))
    }
}
