use glam::Vec3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::fluids::KernelConstants;
use crate::grid::SpatialHashGrid;
use crate::particle::ParticleSet;

/// Compute density and pressure for the first `particles.count` particles.
///
/// `rho_a = max(rho_0, sum_b poly6 * (h^2 - r_ab^2)^3)`, the sum running over
/// every particle within `h` including `a` itself, and
/// `p_a = k * (rho_a - rho_0)`. Flooring at the reference density keeps
/// pressure non-negative, so isolated particles feel no pressure at all.
///
/// The grid must have been built from the current positions.
pub fn compute_density_pressure(
    particles: &mut ParticleSet,
    grid: &SpatialHashGrid,
    kernel: &KernelConstants,
    density_reference: f32,
    pressure_constant: f32,
) {
    let count = particles.count.min(grid.capacity());
    let positions = &particles.position;

    let evaluate = |(i, (rho, p)): (usize, (&mut f32, &mut f32))| {
        let density = density_at(positions, i, grid, kernel);
        *rho = density.max(density_reference);
        *p = pressure_constant * (*rho - density_reference);
    };

    #[cfg(feature = "parallel")]
    {
        particles.density[..count]
            .par_iter_mut()
            .zip(particles.pressure[..count].par_iter_mut())
            .enumerate()
            .for_each(evaluate);
    }

    #[cfg(not(feature = "parallel"))]
    {
        particles.density[..count]
            .iter_mut()
            .zip(particles.pressure[..count].iter_mut())
            .enumerate()
            .for_each(evaluate);
    }
}

/// Raw (unfloored) kernel sum around particle `i`.
#[inline]
fn density_at(positions: &[Vec3], i: usize, grid: &SpatialHashGrid, kernel: &KernelConstants) -> f32 {
    let pos_i = positions[i];
    let mut rho = 0.0_f32;
    grid.for_each_neighbor(pos_i, kernel.radius(), |j| {
        let r_sq = (pos_i - positions[j as usize]).length_squared();
        rho += kernel.poly6(r_sq);
    });
    rho
}
