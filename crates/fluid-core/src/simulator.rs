use glam::Vec3;

use crate::boundary::Boundary;
use crate::config::{validate_smoothing_radius, SphConfig};
use crate::error::ConfigError;
use crate::fluids::density::compute_density_pressure;
use crate::fluids::forces::{compute_accelerations, ForceParams};
use crate::fluids::KernelConstants;
use crate::grid::SpatialHashGrid;
use crate::math::clamp_length;
use crate::particle::ParticleSet;

/// Courant-style safety factor shared by the three step limits.
const STEP_SAFETY: f32 = 0.4;

/// Timing statistics from a single `step` call.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepStats {
    /// Number of substeps executed.
    pub substeps: u32,
    /// Size of the last substep in seconds.
    pub last_time_step: f32,
    /// Number of active particles.
    pub particle_count: u32,
}

/// Weakly compressible SPH simulator with adaptive substepping.
///
/// Each substep runs rebuild grid -> density -> forces -> adaptive time step
/// -> integrate -> boundary, until the requested frame time is consumed.
pub struct Simulator {
    pub particles: ParticleSet,
    config: SphConfig,
    kernel: KernelConstants,
    grid: SpatialHashGrid,
    boundary: Option<Box<dyn Boundary>>,
}

impl Simulator {
    pub fn new(max_particles: usize, config: SphConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let kernel = KernelConstants::new(config.smoothing_radius)?;
        Ok(Self {
            particles: ParticleSet::new(max_particles),
            grid: SpatialHashGrid::new(config.smoothing_radius, max_particles),
            config,
            kernel,
            boundary: None,
        })
    }

    pub fn config(&self) -> &SphConfig {
        &self.config
    }

    pub fn kernel(&self) -> &KernelConstants {
        &self.kernel
    }

    pub fn grid(&self) -> &SpatialHashGrid {
        &self.grid
    }

    /// Replace the whole configuration. Nothing changes if validation fails.
    pub fn set_config(&mut self, config: SphConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let kernel = KernelConstants::new(config.smoothing_radius)?;
        self.grid.set_spacing(config.smoothing_radius);
        self.kernel = kernel;
        self.config = config;
        Ok(())
    }

    /// Change the interaction radius, recomputing kernel constants and grid spacing.
    pub fn set_smoothing_radius(&mut self, radius: f32) -> Result<(), ConfigError> {
        let radius = validate_smoothing_radius(radius)?;
        self.kernel = KernelConstants::new(radius)?;
        self.grid.set_spacing(radius);
        self.config.smoothing_radius = radius;
        Ok(())
    }

    pub fn smoothing_radius(&self) -> f32 {
        self.kernel.radius()
    }

    /// Install the collision collaborator invoked after every substep.
    pub fn set_boundary(&mut self, boundary: Box<dyn Boundary>) {
        self.boundary = Some(boundary);
    }

    pub fn clear_boundary(&mut self) {
        self.boundary = None;
    }

    /// Append particles at rest density mass (`h^3 * rho_0`).
    pub fn add_particles(&mut self, positions: &[Vec3], velocities: &[Vec3]) -> usize {
        let h = self.kernel.radius();
        let mass = h * h * h * self.config.density_reference;
        self.particles.add_particles(positions, velocities, mass)
    }

    /// Advance the simulation by `delta_time` seconds.
    ///
    /// Never takes a substep longer than the time still remaining.
    pub fn step(&mut self, delta_time: f32) -> StepStats {
        let mut stats = StepStats {
            particle_count: self.particles.count as u32,
            ..Default::default()
        };
        if !delta_time.is_finite() || delta_time <= 0.0 || self.particles.count == 0 {
            return stats;
        }

        let mut time_left = delta_time;
        while time_left > 0.0 {
            self.grid.build(&self.particles.position, self.particles.count);
            self.compute_density();
            self.compute_forces();

            let mut dt = self.compute_time_step();
            if dt >= time_left {
                dt = time_left;
                time_left = 0.0;
            } else {
                time_left -= dt;
            }

            self.integrate(dt);
            self.resolve_boundary();

            stats.substeps += 1;
            stats.last_time_step = dt;
        }

        stats
    }

    /// Density and pressure pass. Requires a grid built from current positions.
    pub fn compute_density(&mut self) {
        compute_density_pressure(
            &mut self.particles,
            &self.grid,
            &self.kernel,
            self.config.density_reference,
            self.config.pressure_constant,
        );
    }

    /// Acceleration pass. Requires current density and pressure.
    pub fn compute_forces(&mut self) {
        let params = ForceParams {
            viscosity: self.config.viscosity,
            gravity: self.config.gravity,
            max_acceleration: self.config.max_acceleration,
        };
        compute_accelerations(&mut self.particles, &self.grid, &self.kernel, &params);
    }

    /// Largest step satisfying the velocity, acceleration and sound-speed limits,
    /// never less than `min_time_step`.
    pub fn compute_time_step(&self) -> f32 {
        let h = self.kernel.radius();
        let mut max_vel_sq = 0.0_f32;
        let mut max_acc_sq = 0.0_f32;
        let mut max_sound_sq = 0.0_f32;

        for i in 0..self.particles.count {
            max_vel_sq = max_vel_sq.max(self.particles.velocity[i].length_squared());
            max_acc_sq = max_acc_sq.max(self.particles.acceleration[i].length_squared());
            let rho = self.particles.density[i];
            let sound_sq = if rho < 1e-5 {
                0.0
            } else {
                self.particles.pressure[i] / rho
            };
            max_sound_sq = max_sound_sq.max(sound_sq);
        }

        let velocity_step = STEP_SAFETY * h / max_vel_sq.sqrt().max(1.0);
        let max_acc = max_acc_sq.sqrt();
        let acceleration_step = if max_acc > 0.0 {
            STEP_SAFETY * (h / max_acc).sqrt()
        } else {
            f32::INFINITY
        };
        let sound_step = STEP_SAFETY * h / max_sound_sq.sqrt().max(1.0);

        let step = velocity_step.min(acceleration_step).min(sound_step);
        if step.is_nan() {
            self.config.min_time_step
        } else {
            step.max(self.config.min_time_step)
        }
    }

    /// Semi-implicit Euler with the velocity cap applied before moving.
    pub fn integrate(&mut self, dt: f32) {
        let max_velocity = self.config.max_velocity;
        let p = &mut self.particles;
        for i in 0..p.count {
            let vel = clamp_length(p.velocity[i] + p.acceleration[i] * dt, max_velocity);
            p.velocity[i] = vel;
            p.position[i] += vel * dt;
        }
    }

    fn resolve_boundary(&mut self) {
        if let Some(boundary) = self.boundary.as_mut() {
            boundary.resolve(
                &mut self.particles.position,
                &mut self.particles.velocity,
                self.particles.count,
                self.config.particle_radius,
            );
        }
    }
}
