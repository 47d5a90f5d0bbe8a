use std::{collections::BTreeMap, sync::Arc};

use actix_web::web::Bytes;
use sensor_ingest::{Feed, PointCloud, TelemetryRecord};
use serde::Serialize;

/// Encoded JPEG frames.
pub type FrameFeed = Arc<Feed<Bytes>>;
/// Raw point clouds; encoding happens per send.
pub type PointFeed = Arc<Feed<Arc<PointCloud>>>;
pub type TelemetryFeed = Arc<Feed<Arc<TelemetryRecord>>>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamStatus {
    Active,
    Waiting,
    Error,
}

/// Body of `GET /status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub status: StreamStatus,
    pub queue_size: usize,
}

/// One Server-Sent Event on `/telemetry`.
#[derive(Debug, Serialize)]
pub struct TelemetryEvent {
    pub timestamp_us: Option<u64>,
    pub series: BTreeMap<String, f64>,
}

impl From<&TelemetryRecord> for TelemetryEvent {
    fn from(record: &TelemetryRecord) -> Self {
        Self {
            timestamp_us: record.timestamp_us,
            series: record.series().into_iter().collect(),
        }
    }
}
