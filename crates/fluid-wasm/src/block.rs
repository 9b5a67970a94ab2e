//! Jittered particle blocks.

use fluid_core::math::hash11;
use glam::Vec3;

/// Lattice dimensions of a spawned block, as received from JavaScript.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockDims {
    pub nx: u32,
    pub ny: u32,
    pub nz: u32,
}

impl BlockDims {
    /// Number of lattice points, saturating instead of overflowing.
    pub fn count(&self) -> usize {
        (self.nx as usize)
            .saturating_mul(self.ny as usize)
            .saturating_mul(self.nz as usize)
    }
}

/// At most `limit` positions of an `nx * ny * nz` lattice starting at
/// `origin`, z fastest. Each point moves by up to `jitter * spacing / 2`
/// per axis, derived from `seed`.
pub fn block_positions(origin: Vec3, dims: BlockDims, spacing: f32, jitter: f32, seed: f32, limit: usize) -> Vec<Vec3> {
    let (ny, nz) = (dims.ny as usize, dims.nz as usize);
    let plane = ny.saturating_mul(nz);
    (0..dims.count().min(limit))
        .map(|i| {
            let lattice = Vec3::new((i / plane) as f32, ((i / nz) % ny) as f32, (i % nz) as f32);
            let n = i as f32 * 3.0 + seed;
            let offset = Vec3::new(hash11(n), hash11(n + 1.0), hash11(n + 2.0)) - Vec3::splat(0.5);
            origin + lattice * spacing + offset * jitter * spacing
        })
        .collect()
}
