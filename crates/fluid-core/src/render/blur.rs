//! Separable blur applied to channel textures.
//!
//! Two kernels: a plain Gaussian for color, and a bilateral one for depth
//! and thickness that also weighs each tap by how far its value is from the
//! center texel, so silhouettes stay sharp.
//!
//! `blur_image` is the CPU port of the blur fragment shader; GPU backends
//! upload `BlurUniforms` as-is.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec4};
use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, ConfigError};
use crate::render::image::Image;
use crate::render::FAR_DEPTH;

/// Largest accepted `kernel_radius`; each output texel reads `2r + 1` taps.
pub const MAX_BLUR_KERNEL_RADIUS: u32 = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlurKernel {
    Gaussian,
    Bilateral,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlurAxis {
    X,
    Y,
}

impl BlurAxis {
    pub fn direction(self) -> [f32; 2] {
        match self {
            BlurAxis::X => [1.0, 0.0],
            BlurAxis::Y => [0.0, 1.0],
        }
    }
}

/// Per-channel blur configuration.
///
/// `enabled` and `size_divisor` decide which textures exist, so changing
/// them requires re-initialization. The other fields are read at blur time.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurSettings {
    pub enabled: bool,
    /// Taps on each side of the center texel.
    pub kernel_radius: u32,
    /// Spatial falloff: weight is `exp(-(offset * scale)^2)`.
    pub scale: f32,
    /// Value falloff of the bilateral kernel: `exp(-(diff * depth_falloff)^2)`.
    pub depth_falloff: f32,
    /// Blur targets are `primary size / size_divisor`.
    pub size_divisor: u32,
}

impl Default for BlurSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            kernel_radius: 10,
            scale: 0.1,
            depth_falloff: 100.0,
            size_divisor: 1,
        }
    }
}

impl BlurSettings {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.size_divisor == 0 {
            return Err(ConfigError::InvalidSizeDivisor(self.size_divisor));
        }
        if self.kernel_radius > MAX_BLUR_KERNEL_RADIUS {
            return Err(ConfigError::BlurKernelTooLarge(self.kernel_radius));
        }
        ensure_finite("blur_scale", self.scale)?;
        ensure_finite("blur_depth_falloff", self.depth_falloff)?;
        Ok(())
    }
}

/// Uniform block of one blur pass.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct BlurUniforms {
    pub direction: [f32; 2],
    pub filter_radius: u32,
    pub scale: f32,
    pub depth_falloff: f32,
    /// Pixel radius of a unit-depth particle in the blur target; 0 disables
    /// the per-texel radius cap.
    pub projected_particle_constant: f32,
    pub _pad: [f32; 2],
}

/// One directional pass.
#[derive(Clone, Copy, Debug)]
pub struct BlurPass {
    pub kernel: BlurKernel,
    pub axis: BlurAxis,
    pub uniforms: BlurUniforms,
}

impl BlurPass {
    pub fn new(kernel: BlurKernel, axis: BlurAxis, settings: &BlurSettings, projected_particle_constant: f32) -> Self {
        Self {
            kernel,
            axis,
            uniforms: BlurUniforms {
                direction: axis.direction(),
                filter_radius: settings.kernel_radius.min(MAX_BLUR_KERNEL_RADIUS),
                scale: settings.scale,
                depth_falloff: settings.depth_falloff,
                projected_particle_constant,
                _pad: [0.0; 2],
            },
        }
    }
}

#[inline]
pub fn gaussian_weight(offset: f32, scale: f32) -> f32 {
    let x = offset * scale;
    (-x * x).exp()
}

#[inline]
pub fn bilateral_weight(offset: f32, scale: f32, value_diff: f32, depth_falloff: f32) -> f32 {
    let d = value_diff * depth_falloff;
    gaussian_weight(offset, scale) * (-d * d).exp()
}

/// Run one blur pass from `src` into `dst`.
///
/// Taps are spaced one `dst` texel apart along the pass axis; `src` may be
/// larger than `dst` (the first pass of a downsized blur).
pub fn blur_image(src: &Image, dst: &mut Image, kernel: BlurKernel, uniforms: &BlurUniforms) {
    let step = Vec2::from(uniforms.direction) * dst.texel_size();
    for y in 0..dst.height {
        for x in 0..dst.width {
            let uv = dst.uv_of(x, y);
            let value = match kernel {
                BlurKernel::Gaussian => gaussian_at(src, uv, step, uniforms),
                BlurKernel::Bilateral => bilateral_at(src, uv, step, uniforms),
            };
            dst.set(x, y, value);
        }
    }
}

fn gaussian_at(src: &Image, uv: Vec2, step: Vec2, u: &BlurUniforms) -> Vec4 {
    let radius = u.filter_radius as i32;
    let mut sum = Vec4::ZERO;
    let mut wsum = 0.0;
    for k in -radius..=radius {
        let w = gaussian_weight(k as f32, u.scale);
        sum += src.sample(uv + step * k as f32) * w;
        wsum += w;
    }
    sum / wsum
}

fn bilateral_at(src: &Image, uv: Vec2, step: Vec2, u: &BlurUniforms) -> Vec4 {
    let center = src.sample(uv);
    let c = center.x;
    // empty depth texels stay empty
    if c >= FAR_DEPTH || c < 0.0 {
        return center;
    }

    let mut radius = u.filter_radius;
    if u.projected_particle_constant > 0.0 && c > 0.0 {
        let cap = (u.projected_particle_constant / c).ceil() as u32;
        radius = radius.min(cap.max(1));
    }
    let radius = radius as i32;

    let mut sum = 0.0;
    let mut sum_second = 0.0;
    let mut wsum = 0.0;
    for k in -radius..=radius {
        let s = src.sample(uv + step * k as f32);
        let w = bilateral_weight(k as f32, u.scale, s.x - c, u.depth_falloff);
        sum += s.x * w;
        sum_second += s.y * w;
        wsum += w;
    }
    // the center tap always has weight 1
    Vec4::new(sum / wsum, sum_second / wsum, center.z, center.w)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_weight_peaks_at_center() {
        assert_eq!(gaussian_weight(0.0, 0.3), 1.0);
        assert!(gaussian_weight(2.0, 0.3) < gaussian_weight(1.0, 0.3));
    }

    #[test]
    fn test_kernel_radius_bounded() {
        let mut settings = BlurSettings {
            kernel_radius: MAX_BLUR_KERNEL_RADIUS,
            ..BlurSettings::default()
        };
        assert!(settings.validate().is_ok());
        settings.kernel_radius = MAX_BLUR_KERNEL_RADIUS + 1;
        assert_eq!(
            settings.validate(),
            Err(ConfigError::BlurKernelTooLarge(MAX_BLUR_KERNEL_RADIUS + 1))
        );
    }

    #[test]
    fn test_bilateral_weight_drops_across_edges() {
        let same = bilateral_weight(1.0, 0.1, 0.0, 100.0);
        let edge = bilateral_weight(1.0, 0.1, 0.5, 100.0);
        assert!(edge < same * 1e-6, "large value jumps must be nearly ignored");
    }
}
