//! Binary point-cloud frame carried over `/ws/points`.
//!
//! ```text
//! ┌────────────────────┬──────────────────────────────┬──────────────────────────┐
//! │ point_count        │ positions                    │ colors (optional)        │
//! │ i32 little-endian  │ P × (x,y,z) f16 little-endian│ P × (r,g,b) u8           │
//! │ 4 bytes            │ P × 6 bytes                  │ P × 3 bytes              │
//! └────────────────────┴──────────────────────────────┴──────────────────────────┘
//! ```
//!
//! There is no presence flag for colors: a receiver reads them only when the
//! frame is long enough to hold the full color block. Valid frames satisfy
//! `0 < point_count < 100000`; anything else is rejected on both ends.
//!
//! Positions are narrowed to half precision. The loss (about three decimal
//! digits) is accepted to keep frames small.

use actix_web::web::Bytes;
use half::f16;
use sensor_ingest::PointCloud;
use thiserror::Error;

pub const HEADER_LEN: usize = 4;
/// Exclusive upper bound on `point_count`.
pub const MAX_POINT_COUNT: i32 = 100_000;

const POSITION_STRIDE: usize = 3 * 2;
const COLOR_STRIDE: usize = 3;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("point count {0} outside (0, {MAX_POINT_COUNT})")]
    PointCount(i64),
    #[error("cloud declares {declared} points but carries {available} positions")]
    MissingPositions { declared: usize, available: usize },
    #[error("cloud declares {declared} points but carries {available} colors")]
    MissingColors { declared: usize, available: usize },
    #[error("frame of {len} bytes is shorter than the {needed} bytes its header requires")]
    Truncated { len: usize, needed: usize },
}

/// Positions and colors recovered from a frame, widened back to f32.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedCloud {
    pub positions: Vec<[f32; 3]>,
    pub colors: Option<Vec<[u8; 3]>>,
}

impl DecodedCloud {
    pub fn point_count(&self) -> usize {
        self.positions.len()
    }
}

/// Byte length of a frame holding `points` points.
pub fn encoded_len(points: usize, with_colors: bool) -> usize {
    let colors = if with_colors { points * COLOR_STRIDE } else { 0 };
    HEADER_LEN + points * POSITION_STRIDE + colors
}

fn check_count(point_count: i64) -> Result<usize, CodecError> {
    if point_count <= 0 || point_count >= i64::from(MAX_POINT_COUNT) {
        return Err(CodecError::PointCount(point_count));
    }
    Ok(point_count as usize)
}

/// Encode the first `point_count` points of `cloud`.
pub fn encode_point_cloud(cloud: &PointCloud) -> Result<Bytes, CodecError> {
    let count = check_count(i64::from(cloud.point_count))?;
    let positions = cloud
        .positions
        .get(..count)
        .ok_or(CodecError::MissingPositions {
            declared: count,
            available: cloud.positions.len(),
        })?;
    let colors = match cloud.colors.as_ref() {
        Some(colors) => Some(colors.get(..count).ok_or(CodecError::MissingColors {
            declared: count,
            available: colors.len(),
        })?),
        None => None,
    };

    let mut frame = Vec::with_capacity(encoded_len(count, colors.is_some()));
    frame.extend_from_slice(&cloud.point_count.to_le_bytes());
    for point in positions {
        for axis in point {
            frame.extend_from_slice(&f16::from_f32(*axis).to_bits().to_le_bytes());
        }
    }
    if let Some(colors) = colors {
        for rgb in colors {
            frame.extend_from_slice(rgb);
        }
    }

    Ok(Bytes::from(frame))
}

/// Receiver-side decode, mirroring what the browser viewer does.
pub fn decode_point_cloud(frame: &[u8]) -> Result<DecodedCloud, CodecError> {
    let header: [u8; HEADER_LEN] = frame
        .get(..HEADER_LEN)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or(CodecError::Truncated {
            len: frame.len(),
            needed: HEADER_LEN,
        })?;
    let count = check_count(i64::from(i32::from_le_bytes(header)))?;

    let positions_end = encoded_len(count, false);
    if frame.len() < positions_end {
        return Err(CodecError::Truncated {
            len: frame.len(),
            needed: positions_end,
        });
    }

    let positions = frame[HEADER_LEN..positions_end]
        .chunks_exact(POSITION_STRIDE)
        .map(|point| {
            let axis = |i: usize| {
                f16::from_bits(u16::from_le_bytes([point[2 * i], point[2 * i + 1]])).to_f32()
            };
            [axis(0), axis(1), axis(2)]
        })
        .collect();

    let colors_end = encoded_len(count, true);
    let colors = (frame.len() >= colors_end).then(|| {
        frame[positions_end..colors_end]
            .chunks_exact(COLOR_STRIDE)
            .map(|rgb| [rgb[0], rgb[1], rgb[2]])
            .collect()
    });

    Ok(DecodedCloud { positions, colors })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spiral(points: usize) -> Vec<[f32; 3]> {
        (0..points)
            .map(|i| {
                let t = i as f32 * 0.173 + 0.05;
                [t.cos() * 2.5, t.sin() * -1.25, 0.01 + t * 0.3]
            })
            .collect()
    }

    fn within_half_precision(original: f32, decoded: f32) -> bool {
        let tolerance = (original.abs() * 2f32.powi(-10)).max(2f32.powi(-24));
        (original - decoded).abs() <= tolerance
    }

    #[test]
    fn frame_length_without_colors() {
        let cloud = PointCloud::new(spiral(321), None);
        let frame = encode_point_cloud(&cloud).unwrap();
        assert_eq!(frame.len(), 4 + 321 * 3 * 2);
        assert_eq!(&frame[..4], &321i32.to_le_bytes());

        let decoded = decode_point_cloud(&frame).unwrap();
        assert_eq!(decoded.point_count(), 321);
        assert!(decoded.colors.is_none());
    }

    #[test]
    fn frame_length_with_colors() {
        let colors: Vec<[u8; 3]> = (0..50u8).map(|i| [i, 255 - i, 7]).collect();
        let cloud = PointCloud::new(spiral(50), Some(colors.clone()));
        let frame = encode_point_cloud(&cloud).unwrap();
        assert_eq!(frame.len(), 4 + 50 * 3 * 2 + 50 * 3);

        let decoded = decode_point_cloud(&frame).unwrap();
        assert_eq!(decoded.colors, Some(colors));
    }

    #[test]
    fn positions_survive_within_half_precision() {
        let positions = spiral(2_000);
        let frame = encode_point_cloud(&PointCloud::new(positions.clone(), None)).unwrap();
        let decoded = decode_point_cloud(&frame).unwrap();

        for (original, decoded) in positions.iter().zip(&decoded.positions) {
            for axis in 0..3 {
                assert!(
                    within_half_precision(original[axis], decoded[axis]),
                    "{} decoded as {}",
                    original[axis],
                    decoded[axis]
                );
            }
        }
    }

    #[test]
    fn special_values_keep_their_class() {
        let cloud = PointCloud::new(
            vec![[f32::INFINITY, f32::NEG_INFINITY, f32::NAN], [1e-6, -0.0, 70_000.0]],
            None,
        );
        let decoded = decode_point_cloud(&encode_point_cloud(&cloud).unwrap()).unwrap();
        let [a, b] = [decoded.positions[0], decoded.positions[1]];
        assert_eq!(a[0], f32::INFINITY);
        assert_eq!(a[1], f32::NEG_INFINITY);
        assert!(a[2].is_nan());
        // subnormal half
        assert!(b[0] > 0.0 && b[0] < 6.2e-5);
        assert!(b[1] == 0.0 && b[1].is_sign_negative());
        // beyond f16::MAX
        assert_eq!(b[2], f32::INFINITY);
    }

    #[test]
    fn out_of_range_counts_are_rejected() {
        let mut cloud = PointCloud::new(Vec::new(), None);
        assert_eq!(encode_point_cloud(&cloud), Err(CodecError::PointCount(0)));

        cloud.point_count = -3;
        assert_eq!(encode_point_cloud(&cloud), Err(CodecError::PointCount(-3)));

        let big = PointCloud::new(vec![[0.0; 3]; MAX_POINT_COUNT as usize], None);
        assert_eq!(
            encode_point_cloud(&big),
            Err(CodecError::PointCount(i64::from(MAX_POINT_COUNT)))
        );

        let mut frame = 100_000i32.to_le_bytes().to_vec();
        frame.resize(encoded_len(100_000, false), 0);
        assert_eq!(
            decode_point_cloud(&frame),
            Err(CodecError::PointCount(100_000))
        );
        assert_eq!(
            decode_point_cloud(&0i32.to_le_bytes()),
            Err(CodecError::PointCount(0))
        );
    }

    #[test]
    fn decoder_ignores_partial_color_block() {
        let cloud = PointCloud::new(spiral(10), Some(vec![[9, 9, 9]; 10]));
        let frame = encode_point_cloud(&cloud).unwrap();
        let clipped = &frame[..frame.len() - 1];
        assert!(decode_point_cloud(clipped).unwrap().colors.is_none());
    }

    #[test]
    fn truncated_frames_are_rejected() {
        assert!(matches!(
            decode_point_cloud(&[1, 0]),
            Err(CodecError::Truncated { needed: 4, .. })
        ));

        let frame = encode_point_cloud(&PointCloud::new(spiral(4), None)).unwrap();
        assert!(matches!(
            decode_point_cloud(&frame[..frame.len() - 2]),
            Err(CodecError::Truncated { .. })
        ));
    }

    #[test]
    fn encoder_honours_declared_count() {
        let mut cloud = PointCloud::new(spiral(8), Some(vec![[1, 2, 3]; 8]));
        cloud.point_count = 5;
        let frame = encode_point_cloud(&cloud).unwrap();
        assert_eq!(frame.len(), encoded_len(5, true));

        cloud.point_count = 9;
        assert_eq!(
            encode_point_cloud(&cloud),
            Err(CodecError::MissingPositions {
                declared: 9,
                available: 8
            })
        );

        cloud.positions = spiral(9);
        assert_eq!(
            encode_point_cloud(&cloud),
            Err(CodecError::MissingColors {
                declared: 9,
                available: 8
            })
        );
    }
}
