use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, ensure_positive, ConfigError};

/// Tunables of the SPH simulator.
///
/// The simulator keeps its own validated copy; go through
/// `Simulator::set_config` or the typed setters to change values so that the
/// kernel constants are recomputed together with the radius.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SphConfig {
    /// Interaction cutoff and grid cell spacing.
    pub smoothing_radius: f32,
    /// Rest density; computed density never drops below it.
    pub density_reference: f32,
    /// Stiffness of the linear equation of state.
    pub pressure_constant: f32,
    pub viscosity: f32,
    pub gravity: Vec3,
    /// Lower bound of the adaptive step, in seconds.
    pub min_time_step: f32,
    pub max_velocity: f32,
    pub max_acceleration: f32,
    /// Collision radius handed to the boundary resolver.
    pub particle_radius: f32,
}

impl Default for SphConfig {
    fn default() -> Self {
        Self {
            smoothing_radius: 0.2,
            density_reference: 2000.0,
            pressure_constant: 20.0,
            viscosity: 0.005,
            gravity: Vec3::new(0.0, -9.8, 0.0),
            min_time_step: 1.0 / 145.0,
            max_velocity: 75.0,
            max_acceleration: 2000.0,
            particle_radius: 0.1,
        }
    }
}

impl SphConfig {
    /// Check every field, returning the first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_smoothing_radius(self.smoothing_radius)?;
        ensure_positive("density_reference", self.density_reference)?;
        ensure_finite("pressure_constant", self.pressure_constant)?;
        ensure_finite("viscosity", self.viscosity)?;
        if !self.gravity.is_finite() {
            return Err(ConfigError::NonFinite { name: "gravity" });
        }
        ensure_positive("min_time_step", self.min_time_step)?;
        ensure_positive("max_velocity", self.max_velocity)?;
        ensure_positive("max_acceleration", self.max_acceleration)?;
        ensure_positive("particle_radius", self.particle_radius)?;
        Ok(())
    }
}

/// A radius of zero or less turns every kernel constant into NaN or infinity.
pub fn validate_smoothing_radius(radius: f32) -> Result<f32, ConfigError> {
    if radius.is_finite() && radius > 0.0 {
        Ok(radius)
    } else {
        Err(ConfigError::InvalidSmoothingRadius(radius))
    }
}
