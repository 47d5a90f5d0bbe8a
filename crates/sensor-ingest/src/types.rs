use std::collections::BTreeMap;

use anyhow::Error;
use thiserror::Error;

/// Raw image frame read from a camera stream.
pub struct Frame {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp_ms: i64,
    pub format: FrameFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameFormat {
    Rgb8,
    Bgr8,
}

impl Frame {
    /// Number of bytes a frame of this size and format must carry.
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 3
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.data.is_empty()
    }
}

/// Point cloud sample as published by a depth camera.
///
/// `point_count` is authoritative: the position and color vectors may carry
/// trailing capacity beyond it, which is ignored downstream.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PointCloud {
    pub point_count: i32,
    pub positions: Vec<[f32; 3]>,
    pub colors: Option<Vec<[u8; 3]>>,
}

/// Counts past `i32::MAX` saturate so range checks reject them instead of wrapping.
fn saturating_count(len: usize) -> i32 {
    i32::try_from(len).unwrap_or(i32::MAX)
}

impl PointCloud {
    pub fn new(positions: Vec<[f32; 3]>, colors: Option<Vec<[u8; 3]>>) -> Self {
        Self {
            point_count: saturating_count(positions.len()),
            positions,
            colors,
        }
    }
}

/// Value of a single named telemetry field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Scalar(f64),
    Vector(Vec<f64>),
}

/// Structured telemetry sample (orientation, drive state, ...).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TelemetryRecord {
    /// Monotonic timestamp in microseconds, when the stream carries one.
    pub timestamp_us: Option<u64>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl TelemetryRecord {
    pub fn new(timestamp_us: Option<u64>) -> Self {
        Self {
            timestamp_us,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_scalar(mut self, name: &str, value: f64) -> Self {
        self.fields.insert(name.to_string(), FieldValue::Scalar(value));
        self
    }

    pub fn with_vector(mut self, name: &str, values: Vec<f64>) -> Self {
        self.fields
            .insert(name.to_string(), FieldValue::Vector(values));
        self
    }

    /// Flatten the record into plottable series.
    ///
    /// Scalars keep their field name, vector elements become `name[i]`, and a
    /// field literally called `timestamp` is skipped.
    pub fn series(&self) -> Vec<(String, f64)> {
        let mut out = Vec::with_capacity(self.fields.len());
        for (name, value) in &self.fields {
            if name == "timestamp" {
                continue;
            }
            match value {
                FieldValue::Scalar(v) => out.push((name.clone(), *v)),
                FieldValue::Vector(values) => {
                    for (idx, v) in values.iter().enumerate() {
                        out.push((format!("{name}[{idx}]"), *v));
                    }
                }
            }
        }
        out
    }
}

/// Linear/angular velocity command written to a drive controller.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Twist {
    /// Forward velocity in m/s.
    pub linear: f32,
    /// Counter-clockwise yaw rate in rad/s.
    pub angular: f32,
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("sensor read failed: {0}")]
    Read(String),
    #[error("frame is empty")]
    EmptyFrame,
    #[error("frame carries {actual} bytes, expected {expected} for {width}x{height}")]
    FrameSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("control write failed: {0}")]
    Control(String),
    #[error(transparent)]
    Other(#[from] Error),
}

impl IngestError {
    /// Short label used for metrics and log fields.
    pub fn reason(&self) -> &'static str {
        match self {
            IngestError::Read(_) => "read",
            IngestError::EmptyFrame => "empty_frame",
            IngestError::FrameSize { .. } => "frame_size",
            IngestError::Encode(_) => "encode",
            IngestError::Control(_) => "control",
            IngestError::Other(_) => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_point_counts_saturate() {
        assert_eq!(saturating_count(12), 12);
        assert_eq!(saturating_count(i32::MAX as usize), i32::MAX);
        assert_eq!(saturating_count(i32::MAX as usize + 1), i32::MAX);
        assert_eq!(saturating_count(u32::MAX as usize + 5), i32::MAX);
        assert_eq!(PointCloud::new(vec![[0.0; 3]; 3], None).point_count, 3);
    }

    #[test]
    fn series_flattens_vectors_and_skips_timestamp() {
        let record = TelemetryRecord::new(Some(10))
            .with_scalar("timestamp", 99.0)
            .with_scalar("speed", 0.5)
            .with_vector("twist", vec![0.1, -0.2]);

        let series = record.series();
        assert_eq!(
            series,
            vec![
                ("speed".to_string(), 0.5),
                ("twist[0]".to_string(), 0.1),
                ("twist[1]".to_string(), -0.2),
            ]
        );
    }

    #[test]
    fn point_count_tracks_positions() {
        let cloud = PointCloud::new(vec![[0.0; 3]; 7], None);
        assert_eq!(cloud.point_count, 7);
    }
}
