//! Sensor-side half of the streaming bridges.
//!
//! - `source`: the blocking reader / control writer contracts.
//! - `freshness`: single-slot drop-oldest buffer.
//! - `feed`: exclusive or broadcast delivery on top of it.
//! - `worker`: the per-source ingest thread.
//! - `mock`: simulated sources for running without hardware.

pub mod feed;
pub mod freshness;
pub mod mock;
pub mod shutdown;
pub mod source;
pub mod types;
pub mod worker;

pub use feed::{Delivery, Feed, Subscription};
pub use freshness::{FreshnessBuffer, PublishOutcome};
pub use shutdown::StopToken;
pub use source::{ControlSink, SensorSource};
pub use types::{FieldValue, Frame, FrameFormat, IngestError, PointCloud, TelemetryRecord, Twist};
pub use worker::{CycleOutcome, CycleTask, IngestWorker, Passthrough, SampleTransform};
