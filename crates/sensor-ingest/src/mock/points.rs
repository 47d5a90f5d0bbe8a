use std::f32::consts::TAU;

use super::Pacer;
use crate::{
    source::SensorSource,
    types::{IngestError, PointCloud},
};

/// Rotating spiral point cloud, colored by height.
pub struct SyntheticPointCloud {
    points: usize,
    with_colors: bool,
    pacer: Pacer,
    phase: f32,
}

impl SyntheticPointCloud {
    pub fn new(points: usize, with_colors: bool, rate_hz: f64) -> Self {
        Self {
            points,
            with_colors,
            pacer: Pacer::new(rate_hz),
            phase: 0.0,
        }
    }

    fn generate(&self) -> PointCloud {
        let n = self.points.max(1);
        let mut positions = Vec::with_capacity(n);
        let mut colors = self.with_colors.then(|| Vec::with_capacity(n));

        for i in 0..n {
            let t = i as f32 / n as f32;
            let angle = t * TAU * 8.0 + self.phase;
            let radius = 0.3 + 0.7 * t;
            let z = t * 1.5;
            positions.push([radius * angle.cos(), radius * angle.sin(), z]);
            if let Some(colors) = colors.as_mut() {
                let shade = (t * 255.0) as u8;
                colors.push([shade, 255 - shade, 128]);
            }
        }

        PointCloud::new(positions, colors)
    }
}

impl SensorSource for SyntheticPointCloud {
    type Sample = PointCloud;

    fn ready(&mut self) -> bool {
        self.pacer.due()
    }

    fn read(&mut self) -> Result<PointCloud, IngestError> {
        self.pacer.advance();
        self.phase = (self.phase + 0.05) % TAU;
        Ok(self.generate())
    }
}
