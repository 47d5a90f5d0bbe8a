//! JPEG encode stage run on the camera ingest thread.
//!
//! Encoding happens once per captured frame, before publish, so every viewer
//! of the feed shares the same bytes. Baseline (non-progressive) output with
//! default Huffman tables keeps encode time low.

use std::time::Instant;

use actix_web::web::Bytes;
use image::{ImageBuffer, Rgb, codecs::jpeg::JpegEncoder};
use sensor_ingest::{Frame, FrameFormat, IngestError, SampleTransform};

/// Camera frame → JPEG bytes.
#[derive(Clone, Copy, Debug)]
pub struct JpegTransform {
    quality: u8,
}

impl JpegTransform {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl SampleTransform<Frame> for JpegTransform {
    type Output = Bytes;

    fn apply(&mut self, frame: Frame) -> Result<Bytes, IngestError> {
        encode_jpeg(frame, self.quality)
    }
}

pub fn encode_jpeg(frame: Frame, quality: u8) -> Result<Bytes, IngestError> {
    if frame.is_empty() {
        return Err(IngestError::EmptyFrame);
    }
    let expected = frame.expected_len();
    if frame.data.len() != expected {
        return Err(IngestError::FrameSize {
            width: frame.width,
            height: frame.height,
            expected,
            actual: frame.data.len(),
        });
    }

    let encode_start = Instant::now();
    let Frame {
        mut data,
        width,
        height,
        format,
        ..
    } = frame;
    if format == FrameFormat::Bgr8 {
        bgr_to_rgb_in_place(&mut data);
    }

    let rgb = ImageBuffer::<Rgb<u8>, Vec<u8>>::from_raw(width, height, data).ok_or_else(|| {
        IngestError::Encode("failed to convert frame into image buffer".to_string())
    })?;
    let mut buffer = Vec::with_capacity(expected / 8);
    JpegEncoder::new_with_quality(&mut buffer, quality)
        .encode_image(&rgb)
        .map_err(|err| IngestError::Encode(format!("JPEG encode failed: {err}")))?;

    metrics::histogram!("bridge_jpeg_encode_seconds").record(encode_start.elapsed().as_secs_f64());
    Ok(Bytes::from(buffer))
}

fn bgr_to_rgb_in_place(data: &mut [u8]) {
    for pixel in data.chunks_exact_mut(3) {
        pixel.swap(0, 2);
    }
}
