use chrono::Utc;

use super::Pacer;
use crate::{
    source::SensorSource,
    types::{Frame, FrameFormat, IngestError},
};

/// Test-pattern camera producing RGB8 frames with a sweeping bar.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    pacer: Pacer,
    tick: u64,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32, fps: f64) -> Self {
        Self {
            width,
            height,
            pacer: Pacer::new(fps),
            tick: 0,
        }
    }

    fn render(&self) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let mut data = vec![0u8; w * h * 3];
        let bar = (self.tick as usize * 4) % w.max(1);
        for y in 0..h {
            for x in 0..w {
                let idx = (y * w + x) * 3;
                data[idx] = (x * 255 / w.max(1)) as u8;
                data[idx + 1] = (y * 255 / h.max(1)) as u8;
                data[idx + 2] = if x.abs_diff(bar) < 8 { 255 } else { 64 };
            }
        }
        data
    }
}

impl SensorSource for SyntheticCamera {
    type Sample = Frame;

    fn ready(&mut self) -> bool {
        self.pacer.due()
    }

    fn read(&mut self) -> Result<Frame, IngestError> {
        self.pacer.advance();
        self.tick = self.tick.wrapping_add(1);
        Ok(Frame {
            data: self.render(),
            width: self.width,
            height: self.height,
            timestamp_ms: Utc::now().timestamp_millis(),
            format: FrameFormat::Rgb8,
        })
    }
}
