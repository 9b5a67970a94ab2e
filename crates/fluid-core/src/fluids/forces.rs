use glam::Vec3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::fluids::KernelConstants;
use crate::grid::SpatialHashGrid;
use crate::math::clamp_length;
use crate::particle::ParticleSet;

/// Inputs shared by every particle during the force pass.
pub struct ForceParams {
    pub viscosity: f32,
    pub gravity: Vec3,
    pub max_acceleration: f32,
}

/// Compute per-particle acceleration from pressure, viscosity and gravity.
///
/// Pressure uses the symmetric spiky gradient weighted by
/// `(p_a + p_b) / (2 rho_a rho_b)`; viscosity uses the laplacian kernel on
/// the relative velocity. Both are scaled by `m_b / m_a`. The total is
/// rescaled to `max_acceleration` when longer.
///
/// Density and pressure must be current (see `compute_density_pressure`).
pub fn compute_accelerations(
    particles: &mut ParticleSet,
    grid: &SpatialHashGrid,
    kernel: &KernelConstants,
    params: &ForceParams,
) {
    let count = particles.count.min(grid.capacity());
    let view = NeighborView {
        position: &particles.position,
        velocity: &particles.velocity,
        mass: &particles.mass,
        density: &particles.density,
        pressure: &particles.pressure,
    };

    let evaluate = |(i, acc): (usize, &mut Vec3)| {
        *acc = acceleration_at(&view, i, grid, kernel, params);
    };

    #[cfg(feature = "parallel")]
    {
        particles.acceleration[..count]
            .par_iter_mut()
            .enumerate()
            .for_each(evaluate);
    }

    #[cfg(not(feature = "parallel"))]
    {
        particles.acceleration[..count]
            .iter_mut()
            .enumerate()
            .for_each(evaluate);
    }
}

/// Read-only slices of the particle state needed by neighbors.
struct NeighborView<'a> {
    position: &'a [Vec3],
    velocity: &'a [Vec3],
    mass: &'a [f32],
    density: &'a [f32],
    pressure: &'a [f32],
}

fn acceleration_at(
    p: &NeighborView<'_>,
    a: usize,
    grid: &SpatialHashGrid,
    kernel: &KernelConstants,
    params: &ForceParams,
) -> Vec3 {
    let pos_a = p.position[a];
    let vel_a = p.velocity[a];
    let rho_a = p.density[a];
    let p_a = p.pressure[a];
    let inv_mass_a = 1.0 / p.mass[a];

    let mut pressure_acc = Vec3::ZERO;
    let mut viscosity_acc = Vec3::ZERO;

    grid.for_each_neighbor(pos_a, kernel.radius(), |b| {
        let b = b as usize;
        if b == a {
            return;
        }
        let r = pos_a - p.position[b];
        let r_sq = r.length_squared();
        if r_sq >= kernel.radius_sq() || r_sq <= 0.0 {
            return;
        }
        let r_len = r_sq.sqrt();
        let rho_b = p.density[b];
        let mass_ratio = p.mass[b] * inv_mass_a;

        // spiky constant is negative: the gradient points from a toward b,
        // subtracting it pushes a away when pressures are positive
        let grad = kernel.spiky_gradient(r, r_len);
        let shared_pressure = (p_a + p.pressure[b]) / (2.0 * rho_a * rho_b);
        pressure_acc -= grad * shared_pressure * mass_ratio;

        let lap = kernel.viscosity_laplacian(r_len);
        viscosity_acc += (p.velocity[b] - vel_a) * (lap * mass_ratio * params.viscosity / rho_b);
    });

    let acc = pressure_acc + viscosity_acc + params.gravity;
    clamp_length(acc, params.max_acceleration)
}
