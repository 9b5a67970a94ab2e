//! SPH kernels and the per-particle density and force passes.

pub mod density;
pub mod forces;

use glam::Vec3;
use std::f32::consts::PI;

use crate::config::validate_smoothing_radius;
use crate::error::ConfigError;

/// Kernel normalization constants derived from the smoothing radius `h`.
///
/// Built only through `KernelConstants::new`, so a value in hand always
/// matches its radius.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct KernelConstants {
    radius: f32,
    radius_sq: f32,
    /// `315 / (64 * PI * h^9)`
    poly6: f32,
    /// `-45 / (PI * h^6)`
    spiky_gradient: f32,
    /// `45 / (PI * h^6)`
    viscosity_laplacian: f32,
}

impl KernelConstants {
    pub fn new(radius: f32) -> Result<Self, ConfigError> {
        let h = validate_smoothing_radius(radius)?;
        let h3 = h * h * h;
        let h6 = h3 * h3;
        let h9 = h6 * h3;
        Ok(Self {
            radius: h,
            radius_sq: h * h,
            poly6: 315.0 / (64.0 * PI * h9),
            spiky_gradient: -45.0 / (PI * h6),
            viscosity_laplacian: 45.0 / (PI * h6),
        })
    }

    #[inline]
    pub fn radius(&self) -> f32 {
        self.radius
    }

    #[inline]
    pub fn radius_sq(&self) -> f32 {
        self.radius_sq
    }

    #[inline]
    pub fn poly6_constant(&self) -> f32 {
        self.poly6
    }

    #[inline]
    pub fn spiky_constant(&self) -> f32 {
        self.spiky_gradient
    }

    #[inline]
    pub fn viscosity_constant(&self) -> f32 {
        self.viscosity_laplacian
    }

    /// Poly6 smoothing kernel for density estimation, taking the squared distance.
    ///
    /// Returns `poly6 * (h^2 - r^2)^3` when `r < h`, and `0.0` otherwise.
    #[inline]
    pub fn poly6(&self, r_sq: f32) -> f32 {
        if r_sq >= self.radius_sq {
            return 0.0;
        }
        let diff = self.radius_sq - r_sq;
        self.poly6 * diff * diff * diff
    }

    /// Spiky kernel gradient for the pressure force.
    ///
    /// Returns `(r / r_len) * spiky * (h - r_len)^2` when `0 < r_len < h`,
    /// and `Vec3::ZERO` otherwise. Points from the particle toward `r`'s origin.
    #[inline]
    pub fn spiky_gradient(&self, r: Vec3, r_len: f32) -> Vec3 {
        if r_len >= self.radius || r_len <= 1e-6 {
            return Vec3::ZERO;
        }
        let diff = self.radius - r_len;
        (r / r_len) * self.spiky_gradient * diff * diff
    }

    /// Viscosity kernel laplacian: `visc * (h - r)` inside the support, else `0.0`.
    #[inline]
    pub fn viscosity_laplacian(&self, r_len: f32) -> f32 {
        if r_len >= self.radius {
            return 0.0;
        }
        self.viscosity_laplacian * (self.radius - r_len)
    }
}
