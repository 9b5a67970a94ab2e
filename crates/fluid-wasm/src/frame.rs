//! Precomputed particle frames.
//!
//! Layout, little-endian: `[u32 count][f32 radius][f32 x 3 x count]`.

use std::fmt;

use glam::Vec3;

const HEADER_BYTES: usize = 8;
const PARTICLE_BYTES: usize = 12;

#[derive(Debug, Clone, PartialEq)]
pub struct ParticleFrame {
    pub radius: f32,
    pub positions: Vec<Vec3>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Fewer than the eight header bytes.
    MissingHeader(usize),
    /// The header announces more particles than the payload holds.
    Truncated { count: usize, available: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::MissingHeader(len) => {
                write!(f, "Particle frame needs an 8 byte header, got {} bytes", len)
            }
            FrameError::Truncated { count, available } => write!(
                f,
                "Particle frame announces {} particles but holds {}",
                count, available
            ),
        }
    }
}

impl std::error::Error for FrameError {}

fn read_f32(bytes: &[u8]) -> f32 {
    f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

/// Decode one frame. Trailing bytes after the announced particles are ignored.
pub fn decode_frame(bytes: &[u8]) -> Result<ParticleFrame, FrameError> {
    if bytes.len() < HEADER_BYTES {
        return Err(FrameError::MissingHeader(bytes.len()));
    }
    let count = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;
    let radius = read_f32(&bytes[4..8]);

    let payload = &bytes[HEADER_BYTES..];
    let available = payload.len() / PARTICLE_BYTES;
    if available < count {
        return Err(FrameError::Truncated { count, available });
    }

    let positions = payload
        .chunks_exact(PARTICLE_BYTES)
        .take(count)
        .map(|p| Vec3::new(read_f32(&p[0..4]), read_f32(&p[4..8]), read_f32(&p[8..12])))
        .collect();
    Ok(ParticleFrame { radius, positions })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(radius: f32, positions: &[[f32; 3]]) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(positions.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&radius.to_le_bytes());
        for p in positions {
            for c in p {
                bytes.extend_from_slice(&c.to_le_bytes());
            }
        }
        bytes
    }

    #[test]
    fn test_decode_frame() {
        let bytes = encode(0.05, &[[1.0, 2.0, 3.0], [-1.0, 0.5, 0.0]]);
        let frame = decode_frame(&bytes).unwrap();
        assert_eq!(frame.radius, 0.05);
        assert_eq!(frame.positions, vec![Vec3::new(1.0, 2.0, 3.0), Vec3::new(-1.0, 0.5, 0.0)]);
    }

    #[test]
    fn test_empty_frame() {
        let frame = decode_frame(&encode(0.1, &[])).unwrap();
        assert!(frame.positions.is_empty());
    }

    #[test]
    fn test_short_input_rejected() {
        assert_eq!(decode_frame(&[0, 0, 0]), Err(FrameError::MissingHeader(3)));

        let mut bytes = encode(0.1, &[[0.0; 3], [1.0; 3]]);
        bytes.truncate(bytes.len() - 1);
        assert_eq!(
            decode_frame(&bytes),
            Err(FrameError::Truncated { count: 2, available: 1 })
        );
    }
}
