//! The seam between the fluid pipeline and whatever owns the GPU.
//!
//! The pipeline decides what is drawn into which texture and in what order;
//! a `RenderBackend` allocates textures, runs the particle, blur and
//! composite passes, and reports whether compiled passes are ready.

use glam::{Vec3, Vec4};

use crate::render::blur::BlurPass;
use crate::render::camera::Camera;
use crate::render::shading::{CompositeDefines, CompositeUniforms, DebugFeature};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PassId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureFormat {
    /// View depth only.
    R32Float,
    /// View depth in R, particle speed in G.
    Rg32Float,
    /// Accumulated thickness.
    R16Float,
    /// Diffuse particle color.
    Rgba8Unorm,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TextureDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
}

/// Fragment program used when splatting particles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParticleShader {
    /// Nearest view depth of the particle sphere; discards outside the disc.
    Depth { write_velocity: bool },
    /// Additive `alpha * sqrt(1 - r^2)` per fragment.
    Thickness,
    /// Particle color, depth tested.
    Diffuse,
}

/// One draw call worth of particles.
pub struct ParticleBatch<'a> {
    pub positions: &'a [Vec3],
    pub velocities: Option<&'a [Vec3]>,
    pub colors: Option<&'a [Vec4]>,
    pub count: usize,
    /// World-space diameter of each particle.
    pub particle_size: f32,
    pub thickness_alpha: f32,
    /// Used by the diffuse shader when `colors` is absent.
    pub default_color: Vec4,
}

/// Textures read by the composite pass.
#[derive(Clone, Copy, Debug)]
pub struct CompositeTextures {
    /// Blurred depth when available, raw otherwise.
    pub depth: TextureId,
    pub depth_raw: TextureId,
    pub thickness: TextureId,
    pub diffuse: Option<TextureId>,
    pub background_depth: Option<TextureId>,
    /// Lat-long environment sampled along reflected rays.
    pub environment: Option<TextureId>,
    pub debug: Option<(TextureId, DebugFeature)>,
}

pub trait RenderBackend {
    /// Size of the color target the composite pass writes into.
    fn output_size(&self) -> (u32, u32);

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId;

    fn release_texture(&mut self, id: TextureId);

    /// Compile (or start compiling) the composite program for `defines`.
    fn create_composite_pass(&mut self, defines: &CompositeDefines) -> PassId;

    fn release_pass(&mut self, id: PassId);

    /// `false` while the program is still compiling; the frame is skipped.
    fn is_pass_ready(&self, id: PassId) -> bool;

    /// Make `id` the target of subsequent clears and draws.
    fn bind_target(&mut self, id: TextureId);

    fn clear(&mut self, value: Vec4);

    fn draw_particles(&mut self, camera: &Camera, batch: &ParticleBatch<'_>, shader: ParticleShader);

    fn unbind_target(&mut self);

    fn blur(&mut self, src: TextureId, dst: TextureId, pass: &BlurPass);

    /// Shade the fluid over the current output color.
    fn composite(&mut self, pass: PassId, textures: &CompositeTextures, uniforms: &CompositeUniforms);
}
